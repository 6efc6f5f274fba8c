pub mod gauge;

pub use gauge::{humidity_gauge, score_gauge, temperature_gauge, wind_gauge};
