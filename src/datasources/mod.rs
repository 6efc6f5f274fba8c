pub mod geocoding;
pub mod openmeteo;

pub use geocoding::GeocodingClient;
pub use openmeteo::OpenMeteoClient;

use crate::error::TransportError;
use crate::models::{Coordinates, WeatherSnapshot};
use std::future::Future;

/// Source of weather snapshots for a location.
///
/// Implementations do not retry; retry policy belongs to the caller.
pub trait WeatherFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        coordinates: Coordinates,
    ) -> impl Future<Output = Result<WeatherSnapshot, TransportError>> + Send;
}
