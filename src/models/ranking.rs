use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MIN_TOP_N: usize = 1;
pub const MAX_TOP_N: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub student_id: String,
    pub total_minutes: i64,
    pub visit_count: u32,
    pub rank: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRanking {
    pub month: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub top_n: usize,
    pub entries: Vec<RankingEntry>,
    pub total_students: usize,
    pub skipped_records: usize,
}
