use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::models::occupancy::{HeatmapResult, OccupancySnapshot, TrendPoint, TrendResult};
use crate::models::settings::OperatingWindow;
use crate::ports::RecordStore;
use crate::services::settings_service::SettingsService;
use crate::utils::calendar::{ensure_range, parse_date, weekday_label, WEEKDAY_ORDER};
use crate::utils::stats::{mean_i64, percentile, round2};

/// Occupancy heatmaps and weekday/weekend trend bands over 15-minute
/// snapshots. Stateless apart from its collaborators.
pub struct TimeSeriesAggregator {
    store: Arc<dyn RecordStore>,
    settings: Arc<SettingsService>,
}

impl TimeSeriesAggregator {
    pub fn new(store: Arc<dyn RecordStore>, settings: Arc<SettingsService>) -> Self {
        Self { store, settings }
    }

    pub fn heatmap(&self, from: NaiveDate, to: NaiveDate) -> AppResult<HeatmapResult> {
        ensure_range(from, to)?;
        let window = self.settings.get()?.operating_window;
        let snapshots = self.store.occupancy_between(from, to)?;
        let result = build_heatmap(&snapshots, from, to, window);
        debug!(
            target: "app::heatmap",
            %from,
            %to,
            samples = result.sample_count,
            skipped = result.skipped_rows,
            "heatmap computed"
        );
        Ok(result)
    }

    pub fn trends(&self, from: NaiveDate, to: NaiveDate) -> AppResult<TrendResult> {
        ensure_range(from, to)?;
        let window = self.settings.get()?.operating_window;
        let snapshots = self.store.occupancy_between(from, to)?;
        let result = build_trends(&snapshots, from, to, window);
        debug!(
            target: "app::heatmap",
            %from,
            %to,
            weekday_samples = result.weekday_samples,
            weekend_samples = result.weekend_samples,
            "trends computed"
        );
        Ok(result)
    }

    /// Same as [`Self::heatmap`] for `YYYY-MM-DD` request parameters.
    pub fn heatmap_for(&self, from: &str, to: &str) -> AppResult<HeatmapResult> {
        self.heatmap(parse_date(from)?, parse_date(to)?)
    }

    pub fn trends_for(&self, from: &str, to: &str) -> AppResult<TrendResult> {
        self.trends(parse_date(from)?, parse_date(to)?)
    }
}

pub fn build_heatmap(
    snapshots: &[OccupancySnapshot],
    from: NaiveDate,
    to: NaiveDate,
    window: OperatingWindow,
) -> HeatmapResult {
    let hours: Vec<u32> = window.hours().collect();
    let width = hours.len();
    let mut sums = vec![vec![0i64; width]; 7];
    let mut counts = vec![vec![0i64; width]; 7];
    let mut sample_count = 0usize;
    let mut skipped_rows = 0usize;

    for snapshot in snapshots {
        if snapshot.date < from || snapshot.date > to {
            continue;
        }
        if !snapshot.is_well_formed() {
            skipped_rows += 1;
            continue;
        }
        if snapshot.hour < window.open_hour || snapshot.hour >= window.close_hour {
            continue;
        }

        let row = snapshot.weekday.num_days_from_monday() as usize;
        let column = (snapshot.hour - window.open_hour) as usize;
        sums[row][column] += snapshot.total;
        counts[row][column] += 1;
        sample_count += 1;
    }

    if skipped_rows > 0 {
        warn!(target: "app::heatmap", skipped_rows, "malformed snapshots excluded from heatmap");
    }

    let matrix: Vec<Vec<f64>> = sums
        .iter()
        .zip(counts.iter())
        .map(|(row_sums, row_counts)| {
            row_sums
                .iter()
                .zip(row_counts.iter())
                .map(|(sum, count)| {
                    if *count == 0 {
                        0.0
                    } else {
                        round2(*sum as f64 / *count as f64)
                    }
                })
                .collect()
        })
        .collect();

    let max_value = matrix
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(0.0_f64, f64::max);

    HeatmapResult {
        matrix,
        weekday_labels: WEEKDAY_ORDER
            .iter()
            .map(|day| weekday_label(*day).to_string())
            .collect(),
        hour_labels: hours.iter().map(|hour| format!("{hour:02}:00")).collect(),
        max_value,
        from,
        to,
        sample_count,
        skipped_rows,
    }
}

pub fn build_trends(
    snapshots: &[OccupancySnapshot],
    from: NaiveDate,
    to: NaiveDate,
    window: OperatingWindow,
) -> TrendResult {
    let mut weekday: BTreeMap<(u32, u32), Vec<i64>> = BTreeMap::new();
    let mut weekend: BTreeMap<(u32, u32), Vec<i64>> = BTreeMap::new();
    let mut weekday_samples = 0usize;
    let mut weekend_samples = 0usize;
    let mut skipped_rows = 0usize;

    for snapshot in snapshots {
        if snapshot.date < from || snapshot.date > to {
            continue;
        }
        if !snapshot.is_well_formed() {
            skipped_rows += 1;
            continue;
        }
        if !window.contains(snapshot.fractional_hour()) {
            continue;
        }

        let key = (snapshot.hour, snapshot.minute);
        if snapshot.is_weekend() {
            weekend.entry(key).or_default().push(snapshot.total);
            weekend_samples += 1;
        } else {
            weekday.entry(key).or_default().push(snapshot.total);
            weekday_samples += 1;
        }
    }

    if skipped_rows > 0 {
        warn!(target: "app::heatmap", skipped_rows, "malformed snapshots excluded from trends");
    }

    TrendResult {
        weekday_mean: build_trend_points(weekday),
        weekend_mean: build_trend_points(weekend),
        from,
        to,
        weekday_samples,
        weekend_samples,
        skipped_rows,
    }
}

fn build_trend_points(buckets: BTreeMap<(u32, u32), Vec<i64>>) -> Vec<TrendPoint> {
    buckets
        .into_iter()
        .map(|((hour, minute), mut values)| {
            values.sort_unstable();
            TrendPoint {
                time: hour as f64 + minute as f64 / 60.0,
                mean: round2(mean_i64(&values)),
                p10: round2(percentile(&values, 0.10)),
                p25: round2(percentile(&values, 0.25)),
                p75: round2(percentile(&values, 0.75)),
                p90: round2(percentile(&values, 0.90)),
            }
        })
        .collect()
}
