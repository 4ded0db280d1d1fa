use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::attendance::AttendanceRecord;
use crate::models::ranking::{MonthlyRanking, RankingEntry, MAX_TOP_N, MIN_TOP_N};
use crate::models::settings::CohortRules;
use crate::models::student::Student;
use crate::ports::{RecordStore, StudentRegistry};
use crate::services::cohort_index::CohortIndex;
use crate::services::ranking_utils::{first_distinct_ranks, olympic_rank, Direction};
use crate::services::settings_service::SettingsService;
use crate::utils::calendar::resolve_month;

#[derive(Debug, Default, Clone, Copy)]
struct MonthTotals {
    minutes: i64,
    visits: u32,
}

/// Calendar-month study-time leaderboard.
pub struct MonthlyRankingService {
    store: Arc<dyn RecordStore>,
    registry: Arc<dyn StudentRegistry>,
    settings: Arc<SettingsService>,
}

impl MonthlyRankingService {
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

    pub fn leaderboard(&self, month: &str, top_n: usize) -> AppResult<MonthlyRanking> {
        ensure_top_n(top_n)?;
        let (start, end) = resolve_month(month)?;
        let settings = self.settings.get()?;

        let records = self.store.attendance_between(start, end)?;
        let students = self.registry.list()?;
        let ranking = build_monthly_ranking(
            month.trim(),
            start,
            end,
            top_n,
            &records,
            &students,
            &settings.cohorts,
        );

        info!(
            target: "app::ranking",
            month = %ranking.month,
            top_n,
            returned = ranking.entries.len(),
            skipped = ranking.skipped_records,
            "monthly ranking computed"
        );
        Ok(ranking)
    }
}

pub fn build_monthly_ranking(
    month: &str,
    start: NaiveDate,
    end: NaiveDate,
    top_n: usize,
    records: &[AttendanceRecord],
    students: &[Student],
    rules: &CohortRules,
) -> MonthlyRanking {
    let index = CohortIndex::build(students, rules);
    let mut totals: BTreeMap<String, MonthTotals> = BTreeMap::new();
    let mut skipped_records = 0usize;

    for record in records {
        if record.date < start || record.date > end {
            continue;
        }
        match index.resolve(&record.student_id) {
            Ok(Some(_)) => {}
            Ok(None) => continue,
            Err(_) => {
                skipped_records += 1;
                continue;
            }
        }
        let Some(minutes) = record.duration_minutes() else {
            skipped_records += 1;
            continue;
        };

        let entry = totals.entry(record.student_id.clone()).or_default();
        entry.minutes += minutes;
        entry.visits += 1;
    }

    if skipped_records > 0 {
        warn!(
            target: "app::ranking",
            skipped_records,
            "records excluded from monthly ranking"
        );
    }

    let total_students = totals.len();
    let scored: Vec<((String, u32), i64)> = totals
        .into_iter()
        .map(|(student_id, totals)| ((student_id, totals.visits), totals.minutes))
        .collect();

    let entries = first_distinct_ranks(olympic_rank(scored, Direction::Descending), top_n)
        .into_iter()
        .map(|entry| RankingEntry {
            student_id: entry.item.0,
            visit_count: entry.item.1,
            total_minutes: entry.score,
            rank: entry.rank,
        })
        .collect();

    MonthlyRanking {
        month: month.to_string(),
        start_date: start,
        end_date: end,
        top_n,
        entries,
        total_students,
        skipped_records,
    }
}

fn ensure_top_n(top_n: usize) -> AppResult<()> {
    if !(MIN_TOP_N..=MAX_TOP_N).contains(&top_n) {
        return Err(AppError::validation_with_details(
            "topN out of bounds",
            json!({"topN": top_n, "min": MIN_TOP_N, "max": MAX_TOP_N}),
        ));
    }
    Ok(())
}
