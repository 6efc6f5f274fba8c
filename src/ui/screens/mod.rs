pub mod dashboard;
pub mod hourly;

pub use dashboard::DashboardScreen;
pub use hourly::HourlyScreen;
