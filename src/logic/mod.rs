pub mod cache;
pub mod metrics;
pub mod orchestrator;
pub mod quality;
pub mod retry;
pub mod scoring;

pub use cache::{CacheStore, WeatherCache};
pub use orchestrator::{DataOrigin, FetchOrchestrator, FetchState};
pub use retry::RetryPolicy;
