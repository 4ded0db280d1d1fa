use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeType {
    HeavyUser,
    EarlyBird,
    NightOwl,
    Consistent,
    Marathon,
    RisingStar,
}

impl BadgeType {
    pub const ALL: [BadgeType; 6] = [
        BadgeType::HeavyUser,
        BadgeType::EarlyBird,
        BadgeType::NightOwl,
        BadgeType::Consistent,
        BadgeType::Marathon,
        BadgeType::RisingStar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeType::HeavyUser => "HEAVY_USER",
            BadgeType::EarlyBird => "EARLY_BIRD",
            BadgeType::NightOwl => "NIGHT_OWL",
            BadgeType::Consistent => "CONSISTENT",
            BadgeType::Marathon => "MARATHON",
            BadgeType::RisingStar => "RISING_STAR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub student_id: String,
    #[serde(rename = "type")]
    pub badge_type: BadgeType,
    pub rank: u32,
    /// Minutes for duration categories, minute-of-day for the time bands,
    /// day count for CONSISTENT, minute delta for RISING_STAR.
    pub value: i64,
}

pub type CohortBadges = BTreeMap<BadgeType, Vec<Badge>>;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeReport {
    pub exam_track: CohortBadges,
    pub general: CohortBadges,
    pub total_exam_students: usize,
    pub total_general_students: usize,
    pub week: WeekWindow,
    pub previous_week: WeekWindow,
    pub skipped_records: usize,
}
