use super::metrics::{self, MetricDefinition, QUALITY_INDEX};
use super::scoring::{aggregate_score, calculate_score};
use crate::models::{
    HourlyIndexPoint, MetricId, QualityRating, QualityReport, ScoreResult, WeatherSnapshot,
};

/// Score each metric in `catalog` at `index`.
///
/// Metrics with no value in the snapshot are returned separately and left out
/// of the scores.
pub fn score_metrics(
    snapshot: &WeatherSnapshot,
    catalog: &[MetricDefinition],
    index: Option<usize>,
) -> (Vec<ScoreResult>, Vec<MetricId>) {
    let mut scored = Vec::with_capacity(catalog.len());
    let mut missing = Vec::new();

    for metric in catalog {
        match metric.value(snapshot, index) {
            Some(value) => scored.push(ScoreResult {
                id: metric.id,
                label: metric.label,
                unit: metric.unit,
                optimal: metric.optimal,
                weight: metric.weight,
                value,
                score: calculate_score(value, metric.optimal),
            }),
            None => missing.push(metric.id),
        }
    }

    (scored, missing)
}

fn overall(scored: &[ScoreResult]) -> u8 {
    let pairs: Vec<(u8, f64)> = scored.iter().map(|s| (s.score, s.weight)).collect();
    aggregate_score(&pairs)
}

/// Daily quality index from the current readings.
pub fn quality_report(snapshot: &WeatherSnapshot) -> QualityReport {
    let (metrics, missing) = score_metrics(snapshot, &QUALITY_INDEX, None);
    if !missing.is_empty() {
        tracing::debug!(?missing, "Snapshot lacks values for some quality metrics");
    }

    let overall = overall(&metrics);
    QualityReport {
        overall,
        rating: QualityRating::from_score(overall),
        metrics,
        missing,
    }
}

/// Equal-weight index for every hour in the snapshot.
pub fn hourly_index(snapshot: &WeatherSnapshot) -> Vec<HourlyIndexPoint> {
    let catalog = metrics::hourly_chart();
    snapshot
        .hourly
        .time
        .iter()
        .enumerate()
        .map(|(i, time)| {
            let (scored, _) = score_metrics(snapshot, &catalog, Some(i));
            HourlyIndexPoint {
                time: *time,
                score: overall(&scored),
            }
        })
        .collect()
}

/// The last `hours` points of [`hourly_index`].
pub fn recent_hourly_index(snapshot: &WeatherSnapshot, hours: usize) -> Vec<HourlyIndexPoint> {
    let mut points = hourly_index(snapshot);
    let skip = points.len().saturating_sub(hours);
    points.drain(..skip);
    points
}
