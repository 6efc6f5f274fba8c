pub mod quality;
pub mod snapshot;
pub mod zone;

pub use quality::*;
pub use snapshot::*;
pub use zone::*;
