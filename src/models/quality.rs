use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricId {
    AirTemp,
    Humidity,
    Precipitation,
    WindSpeed,
    UvIndex,
    SoilTemp,
    CloudCover,
    Sunshine,
}

impl MetricId {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricId::AirTemp => "airTemp",
            MetricId::Humidity => "humidity",
            MetricId::Precipitation => "precipitation",
            MetricId::WindSpeed => "windSpeed",
            MetricId::UvIndex => "uvIndex",
            MetricId::SoilTemp => "soilTemp",
            MetricId::CloudCover => "cloudCover",
            MetricId::Sunshine => "sunshine",
        }
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive optimal band for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalRange {
    pub min: f64,
    pub max: f64,
}

impl OptimalRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

impl std::fmt::Display for OptimalRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// One metric's value and its 0-100 score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub id: MetricId,
    pub label: &'static str,
    pub unit: &'static str,
    pub optimal: OptimalRange,
    pub weight: f64,
    pub value: f64,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityRating {
    Deficient,
    Caution,
    Optimal,
}

impl QualityRating {
    pub fn from_score(score: u8) -> Self {
        if score < 50 {
            QualityRating::Deficient
        } else if score < 80 {
            QualityRating::Caution
        } else {
            QualityRating::Optimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityRating::Deficient => "Deficiente",
            QualityRating::Caution => "Precaución",
            QualityRating::Optimal => "Óptimo",
        }
    }

    pub fn color(&self) -> ratatui::style::Color {
        use ratatui::style::Color;
        match self {
            QualityRating::Deficient => Color::Red,
            QualityRating::Caution => Color::Yellow,
            QualityRating::Optimal => Color::Green,
        }
    }
}

impl std::fmt::Display for QualityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Daily quality index for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub overall: u8,
    pub rating: QualityRating,
    pub metrics: Vec<ScoreResult>,
    /// Metrics the snapshot had no value for; they contribute nothing
    pub missing: Vec<MetricId>,
}

/// One point of the hourly rolling index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyIndexPoint {
    pub time: NaiveDateTime,
    pub score: u8,
}
