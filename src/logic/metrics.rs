use crate::models::{MetricId, OptimalRange, WeatherSnapshot};

/// Reads a metric out of a snapshot.
///
/// `None` index means "now": current readings, the current hour, today.
/// `Some(i)` reads the hourly series at `i`, and daily series at `i / 24`.
pub type MetricAccessor = fn(&WeatherSnapshot, Option<usize>) -> Option<f64>;

#[derive(Debug, Clone, Copy)]
pub struct MetricDefinition {
    pub id: MetricId,
    pub label: &'static str,
    pub optimal: OptimalRange,
    pub weight: f64,
    pub unit: &'static str,
    pub accessor: MetricAccessor,
}

impl MetricDefinition {
    pub fn value(&self, snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
        (self.accessor)(snapshot, index).filter(|v| v.is_finite())
    }
}

/// Weights of the daily quality index; they sum to 1.0.
pub static QUALITY_INDEX: [MetricDefinition; 8] = [
    MetricDefinition {
        id: MetricId::AirTemp,
        label: "Temperatura Aire",
        optimal: OptimalRange::new(24.0, 29.0),
        weight: 0.25,
        unit: "°C",
        accessor: air_temp,
    },
    MetricDefinition {
        id: MetricId::Humidity,
        label: "Humedad Relativa",
        optimal: OptimalRange::new(80.0, 90.0),
        weight: 0.20,
        unit: "%",
        accessor: humidity,
    },
    MetricDefinition {
        id: MetricId::Precipitation,
        label: "Precipitación",
        optimal: OptimalRange::new(5.0, 6.7),
        weight: 0.15,
        unit: "mm/día",
        accessor: precipitation,
    },
    MetricDefinition {
        id: MetricId::WindSpeed,
        label: "Velocidad Viento",
        optimal: OptimalRange::new(5.0, 15.0),
        weight: 0.10,
        unit: "km/h",
        accessor: wind_speed,
    },
    MetricDefinition {
        id: MetricId::UvIndex,
        label: "Índice UV",
        optimal: OptimalRange::new(0.0, 6.0),
        weight: 0.08,
        unit: "",
        accessor: uv_index,
    },
    MetricDefinition {
        id: MetricId::SoilTemp,
        label: "Temperatura Suelo",
        optimal: OptimalRange::new(25.0, 27.0),
        weight: 0.08,
        unit: "°C",
        accessor: soil_temp,
    },
    MetricDefinition {
        id: MetricId::CloudCover,
        label: "Cobertura Nubosa",
        optimal: OptimalRange::new(60.0, 75.0),
        weight: 0.07,
        unit: "%",
        accessor: cloud_cover,
    },
    MetricDefinition {
        id: MetricId::Sunshine,
        label: "Horas Sol Filtrado",
        optimal: OptimalRange::new(4.0, 6.0),
        weight: 0.07,
        unit: "h/día",
        accessor: sunshine_hours,
    },
];

const HOURLY_WEIGHT: f64 = 0.125;

/// The quality index metrics with equal weights, for the hourly chart.
pub fn hourly_chart() -> [MetricDefinition; 8] {
    QUALITY_INDEX.map(|m| MetricDefinition {
        weight: HOURLY_WEIGHT,
        ..m
    })
}

pub fn find(id: MetricId) -> Option<&'static MetricDefinition> {
    QUALITY_INDEX.iter().find(|m| m.id == id)
}

fn hourly_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

fn hour_index(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<usize> {
    index.or_else(|| snapshot.current_hour_index())
}

fn day_index(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<usize> {
    match index {
        Some(i) => Some(i / 24),
        None => snapshot.today_index(),
    }
}

fn air_temp(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    match index {
        Some(i) => hourly_at(&snapshot.hourly.temperature_2m, i),
        None => Some(snapshot.current.temperature_2m),
    }
}

fn humidity(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    match index {
        Some(i) => hourly_at(&snapshot.hourly.relative_humidity_2m, i),
        None => Some(snapshot.current.relative_humidity_2m),
    }
}

fn wind_speed(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    match index {
        Some(i) => hourly_at(&snapshot.hourly.wind_speed_10m, i),
        None => Some(snapshot.current.wind_speed_10m),
    }
}

fn precipitation(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    let day = day_index(snapshot, index)?;
    hourly_at(&snapshot.daily.precipitation_sum, day)
}

fn sunshine_hours(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    let day = day_index(snapshot, index)?;
    hourly_at(&snapshot.daily.sunshine_duration, day).map(|secs| secs / 3600.0)
}

fn uv_index(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    let hour = hour_index(snapshot, index)?;
    hourly_at(&snapshot.hourly.uv_index, hour)
}

fn soil_temp(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    let hour = hour_index(snapshot, index)?;
    hourly_at(&snapshot.hourly.soil_temperature_6cm, hour)
}

fn cloud_cover(snapshot: &WeatherSnapshot, index: Option<usize>) -> Option<f64> {
    let hour = hour_index(snapshot, index)?;
    hourly_at(&snapshot.hourly.cloud_cover, hour)
}
