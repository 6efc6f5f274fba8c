use crate::error::{CacaoWatchError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized weather payload for one zone at one fetch time.
///
/// Every array inside `hourly` has the same length as `hourly.time`, and every
/// array inside `daily` the same length as `daily.time`. Index `i` across the
/// hourly arrays always refers to `hourly.time[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub elevation: Option<f64>,
    pub current: CurrentConditions,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
    /// Hourly units as reported by the provider, keyed by field name
    #[serde(default)]
    pub units: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub time: NaiveDateTime,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub apparent_temperature: f64,
    pub wind_speed_10m: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<NaiveDateTime>,
    pub temperature_2m: Vec<Option<f64>>,
    pub relative_humidity_2m: Vec<Option<f64>>,
    pub uv_index: Vec<Option<f64>>,
    pub wind_speed_10m: Vec<Option<f64>>,
    pub cloud_cover: Vec<Option<f64>>,
    pub soil_temperature_6cm: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub time: Vec<NaiveDate>,
    pub precipitation_sum: Vec<Option<f64>>,
    /// Seconds of sunshine per day
    pub sunshine_duration: Vec<Option<f64>>,
    pub weather_code: Vec<Option<u8>>,
}

impl HourlySeries {
    fn check_lengths(&self) -> Result<()> {
        let expected = self.time.len();
        let fields = [
            ("temperature_2m", self.temperature_2m.len()),
            ("relative_humidity_2m", self.relative_humidity_2m.len()),
            ("uv_index", self.uv_index.len()),
            ("wind_speed_10m", self.wind_speed_10m.len()),
            ("cloud_cover", self.cloud_cover.len()),
            ("soil_temperature_6cm", self.soil_temperature_6cm.len()),
        ];
        check_group("hourly", expected, &fields)
    }
}

impl DailySeries {
    fn check_lengths(&self) -> Result<()> {
        let expected = self.time.len();
        let fields = [
            ("precipitation_sum", self.precipitation_sum.len()),
            ("sunshine_duration", self.sunshine_duration.len()),
            ("weather_code", self.weather_code.len()),
        ];
        check_group("daily", expected, &fields)
    }
}

fn check_group(group: &str, expected: usize, fields: &[(&str, usize)]) -> Result<()> {
    for (name, len) in fields {
        if *len != expected {
            return Err(CacaoWatchError::InvalidData(format!(
                "{}.{} has {} values, expected {}",
                group, name, len, expected
            )));
        }
    }
    Ok(())
}

impl WeatherSnapshot {
    /// Enforce the parallel-array invariant for the hourly and daily groups.
    pub fn validate(&self) -> Result<()> {
        self.hourly.check_lengths()?;
        self.daily.check_lengths()
    }

    /// Hourly index matching the hour of the current reading.
    ///
    /// Prefers an exact timestamp match; falls back to the first entry with the
    /// same hour of day when the series does not cover the current date.
    pub fn current_hour_index(&self) -> Option<usize> {
        let hour_start = self
            .current
            .time
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))?;

        self.hourly
            .time
            .iter()
            .position(|t| *t == hour_start)
            .or_else(|| {
                self.hourly
                    .time
                    .iter()
                    .position(|t| t.hour() == hour_start.hour())
            })
    }

    /// Daily index for the date of the current reading, else the last day.
    pub fn today_index(&self) -> Option<usize> {
        let today = self.current.time.date();
        self.daily
            .time
            .iter()
            .position(|d| *d == today)
            .or_else(|| self.daily.time.len().checked_sub(1))
    }

    pub fn unit(&self, field: &str) -> &str {
        self.units.get(field).map(String::as_str).unwrap_or("")
    }

    /// Daily outlook rows, most recent last
    pub fn daily_outlook(&self) -> Vec<DailyOutlook> {
        self.daily
            .time
            .iter()
            .enumerate()
            .map(|(i, date)| DailyOutlook {
                date: *date,
                precipitation_mm: self.daily.precipitation_sum.get(i).copied().flatten(),
                sunshine_hours: self
                    .daily
                    .sunshine_duration
                    .get(i)
                    .copied()
                    .flatten()
                    .map(|s| s / 3600.0),
                condition: self
                    .daily
                    .weather_code
                    .get(i)
                    .copied()
                    .flatten()
                    .map(WeatherCondition::from_wmo_code)
                    .unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyOutlook {
    pub date: NaiveDate,
    pub precipitation_mm: Option<f64>,
    pub sunshine_hours: Option<f64>,
    pub condition: WeatherCondition,
}

/// A snapshot paired with the moment it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub snapshot: WeatherSnapshot,
    pub fetched_at: DateTime<Utc>,
}

/// Weather condition categories from WMO weather interpretation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Overcast,
    Fog,
    Drizzle,
    Rain,
    Showers,
    Thunderstorm,
    #[default]
    Unknown,
}

impl WeatherCondition {
    pub fn from_wmo_code(code: u8) -> Self {
        match code {
            0 => WeatherCondition::Clear,
            1 | 2 => WeatherCondition::PartlyCloudy,
            3 => WeatherCondition::Overcast,
            45 | 48 => WeatherCondition::Fog,
            51..=57 => WeatherCondition::Drizzle,
            61..=67 => WeatherCondition::Rain,
            80..=82 => WeatherCondition::Showers,
            95..=99 => WeatherCondition::Thunderstorm,
            _ => WeatherCondition::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Clear => "Despejado",
            WeatherCondition::PartlyCloudy => "Parcialmente nublado",
            WeatherCondition::Overcast => "Nublado",
            WeatherCondition::Fog => "Niebla",
            WeatherCondition::Drizzle => "Llovizna",
            WeatherCondition::Rain => "Lluvia",
            WeatherCondition::Showers => "Chubascos",
            WeatherCondition::Thunderstorm => "Tormenta",
            WeatherCondition::Unknown => "?",
        }
    }

    pub fn has_precipitation(&self) -> bool {
        matches!(
            self,
            WeatherCondition::Drizzle
                | WeatherCondition::Rain
                | WeatherCondition::Showers
                | WeatherCondition::Thunderstorm
        )
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").expect("valid test timestamp")
    }

    /// Two days of hourly data starting at midnight, current reading at 10:15
    /// on the first day.
    pub fn sample_snapshot() -> WeatherSnapshot {
        let start = at("2025-03-10T00:00");
        let hours = 48;
        let time: Vec<NaiveDateTime> = (0..hours)
            .map(|h| start + chrono::Duration::hours(h as i64))
            .collect();

        WeatherSnapshot {
            latitude: -1.35,
            longitude: -80.58,
            timezone: "America/Guayaquil".into(),
            elevation: Some(250.0),
            current: CurrentConditions {
                time: at("2025-03-10T10:15"),
                temperature_2m: 26.0,
                relative_humidity_2m: 85.0,
                apparent_temperature: 29.0,
                wind_speed_10m: 10.0,
            },
            hourly: HourlySeries {
                temperature_2m: (0..hours).map(|h| Some(20.0 + h as f64 % 12.0)).collect(),
                relative_humidity_2m: vec![Some(85.0); hours],
                uv_index: vec![Some(3.0); hours],
                wind_speed_10m: vec![Some(8.0); hours],
                cloud_cover: vec![Some(70.0); hours],
                soil_temperature_6cm: vec![Some(26.0); hours],
                time,
            },
            daily: DailySeries {
                time: vec![
                    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date"),
                    NaiveDate::from_ymd_opt(2025, 3, 11).expect("valid date"),
                ],
                precipitation_sum: vec![Some(6.0), Some(12.0)],
                sunshine_duration: vec![Some(18_000.0), Some(3_600.0)],
                weather_code: vec![Some(61), Some(3)],
            },
            units: HashMap::from([("temperature_2m".to_string(), "°C".to_string())]),
        }
    }
}
