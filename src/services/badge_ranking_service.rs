use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::models::attendance::AttendanceRecord;
use crate::models::badge::{Badge, BadgeReport, BadgeType, CohortBadges, WeekWindow};
use crate::models::settings::{CohortRules, MinuteBand};
use crate::models::student::{Cohort, Student};
use crate::ports::{RecordStore, StudentRegistry};
use crate::services::cohort_index::CohortIndex;
use crate::services::ranking_utils::{olympic_rank, within_rank, Direction};
use crate::services::settings_service::SettingsService;
use crate::utils::calendar::resolve_week;

const MAX_BADGE_RANK: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct BadgeBands {
    pub early_bird: MinuteBand,
    pub night_owl: MinuteBand,
}

/// Per-student aggregates for the scored week plus the week before.
#[derive(Debug, Default, Clone)]
struct StudentWeek {
    sessions: u32,
    total_minutes: i64,
    longest_session: i64,
    days: BTreeSet<NaiveDate>,
    early_entries: Vec<i64>,
    late_exits: Vec<i64>,
    previous_minutes: i64,
}

struct BadgeRule {
    badge: BadgeType,
    direction: Direction,
    score: fn(&StudentWeek) -> Option<i64>,
}

const BADGE_RULES: [BadgeRule; 6] = [
    BadgeRule {
        badge: BadgeType::HeavyUser,
        direction: Direction::Descending,
        score: heavy_user_score,
    },
    BadgeRule {
        badge: BadgeType::EarlyBird,
        direction: Direction::Ascending,
        score: early_bird_score,
    },
    BadgeRule {
        badge: BadgeType::NightOwl,
        direction: Direction::Descending,
        score: night_owl_score,
    },
    BadgeRule {
        badge: BadgeType::Consistent,
        direction: Direction::Descending,
        score: consistent_score,
    },
    BadgeRule {
        badge: BadgeType::Marathon,
        direction: Direction::Descending,
        score: marathon_score,
    },
    BadgeRule {
        badge: BadgeType::RisingStar,
        direction: Direction::Descending,
        score: rising_star_score,
    },
];

pub struct BadgeRankingService {
    store: Arc<dyn RecordStore>,
    registry: Arc<dyn StudentRegistry>,
    settings: Arc<SettingsService>,
}

impl BadgeRankingService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<dyn StudentRegistry>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    /// Badges for the Monday..Sunday week containing `reference`.
    pub fn weekly_badges(&self, reference: NaiveDate) -> AppResult<BadgeReport> {
        let (start, _) = resolve_week(reference);
        self.badges_from(start)
    }

    /// Badges for the seven days starting at `start`, compared against the
    /// seven days before it.
    pub fn badges_from(&self, start: NaiveDate) -> AppResult<BadgeReport> {
        let settings = self.settings.get()?;
        let week = WeekWindow {
            start,
            end: start + Duration::days(6),
        };
        let previous_week = WeekWindow {
            start: start - Duration::days(7),
            end: start - Duration::days(1),
        };

        let records = self
            .store
            .attendance_between(previous_week.start, week.end)?;
        let students = self.registry.list()?;
        let bands = BadgeBands {
            early_bird: settings.early_bird_band,
            night_owl: settings.night_owl_band,
        };

        let report = compute_badges(
            &records,
            &students,
            &settings.cohorts,
            bands,
            week,
            previous_week,
        );
        debug!(
            target: "app::badges",
            week_start = %report.week.start,
            exam_students = report.total_exam_students,
            general_students = report.total_general_students,
            skipped = report.skipped_records,
            "weekly badges computed"
        );
        Ok(report)
    }
}

pub fn compute_badges(
    records: &[AttendanceRecord],
    students: &[Student],
    rules: &CohortRules,
    bands: BadgeBands,
    week: WeekWindow,
    previous_week: WeekWindow,
) -> BadgeReport {
    let index = CohortIndex::build(students, rules);
    let mut weeks: HashMap<Cohort, BTreeMap<String, StudentWeek>> = HashMap::new();
    let mut skipped_records = 0usize;

    for record in records {
        let in_week = record.date >= week.start && record.date <= week.end;
        let in_previous = record.date >= previous_week.start && record.date <= previous_week.end;
        if !in_week && !in_previous {
            continue;
        }

        let cohort = match index.resolve(&record.student_id) {
            Ok(Some(cohort)) => cohort,
            Ok(None) => continue,
            Err(_) => {
                skipped_records += 1;
                continue;
            }
        };

        let Some(minutes) = record.duration_minutes() else {
            skipped_records += 1;
            continue;
        };

        let entry = weeks
            .entry(cohort)
            .or_default()
            .entry(record.student_id.clone())
            .or_default();

        if in_previous {
            entry.previous_minutes += minutes;
            continue;
        }

        entry.sessions += 1;
        entry.total_minutes += minutes;
        entry.longest_session = entry.longest_session.max(minutes);
        entry.days.insert(record.date);

        let entry_minute = minute_of_day(record.entry_time);
        if bands.early_bird.contains(entry_minute) {
            entry.early_entries.push(entry_minute as i64);
        }
        if let Some(exit) = record.exit_time {
            let exit_minute = minute_of_day(exit);
            if bands.night_owl.contains(exit_minute) {
                entry.late_exits.push(exit_minute as i64);
            }
        }
    }

    if skipped_records > 0 {
        warn!(
            target: "app::badges",
            skipped_records,
            "records excluded from badge scoring"
        );
    }

    let empty = BTreeMap::new();
    BadgeReport {
        exam_track: rank_cohort(weeks.get(&Cohort::ExamTrack).unwrap_or(&empty)),
        general: rank_cohort(weeks.get(&Cohort::General).unwrap_or(&empty)),
        total_exam_students: index.population(Cohort::ExamTrack),
        total_general_students: index.population(Cohort::General),
        week,
        previous_week,
        skipped_records,
    }
}

fn rank_cohort(weeks: &BTreeMap<String, StudentWeek>) -> CohortBadges {
    BADGE_RULES
        .iter()
        .map(|rule| {
            let scored: Vec<(String, i64)> = weeks
                .iter()
                .filter_map(|(student_id, week)| {
                    (rule.score)(week).map(|score| (student_id.clone(), score))
                })
                .collect();

            let badges = within_rank(olympic_rank(scored, rule.direction), MAX_BADGE_RANK)
                .into_iter()
                .map(|entry| Badge {
                    student_id: entry.item,
                    badge_type: rule.badge,
                    rank: entry.rank,
                    value: entry.score,
                })
                .collect();

            (rule.badge, badges)
        })
        .collect()
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn rounded_mean(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let total: i64 = values.iter().sum();
    Some((total as f64 / values.len() as f64).round() as i64)
}

fn heavy_user_score(week: &StudentWeek) -> Option<i64> {
    (week.sessions > 0).then_some(week.total_minutes)
}

fn early_bird_score(week: &StudentWeek) -> Option<i64> {
    rounded_mean(&week.early_entries)
}

fn night_owl_score(week: &StudentWeek) -> Option<i64> {
    rounded_mean(&week.late_exits)
}

// No secondary key for equal day counts: ties share the rank.
fn consistent_score(week: &StudentWeek) -> Option<i64> {
    (week.sessions > 0).then_some(week.days.len() as i64)
}

fn marathon_score(week: &StudentWeek) -> Option<i64> {
    (week.sessions > 0).then_some(week.longest_session)
}

fn rising_star_score(week: &StudentWeek) -> Option<i64> {
    if week.sessions == 0 {
        return None;
    }
    let delta = week.total_minutes - week.previous_minutes;
    (delta > 0).then_some(delta)
}
