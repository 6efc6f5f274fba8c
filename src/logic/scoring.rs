use crate::models::OptimalRange;

/// Score a metric value against its optimal band, 0-100.
///
/// Inside the band the score is 100. Outside it loses 50 points per full band
/// width of distance from the nearest bound, floored at 0. A zero-width band
/// only accepts its exact value.
pub fn calculate_score(value: f64, optimal: OptimalRange) -> u8 {
    if !value.is_finite() {
        return 0;
    }

    if optimal.contains(value) {
        return 100;
    }

    let range_width = optimal.width();
    if range_width <= 0.0 {
        return if value == optimal.min { 100 } else { 0 };
    }

    let distance = if value < optimal.min {
        optimal.min - value
    } else {
        value - optimal.max
    };

    let score = 100.0 - (distance / range_width) * 50.0;
    score.round().clamp(0.0, 100.0) as u8
}

/// Weighted sum of `(score, weight)` pairs, rounded.
///
/// Weights are taken as given; callers own normalization.
pub fn aggregate_score(scored: &[(u8, f64)]) -> u8 {
    let total: f64 = scored
        .iter()
        .map(|(score, weight)| f64::from(*score) * weight)
        .sum();
    total.round().clamp(0.0, 100.0) as u8
}
