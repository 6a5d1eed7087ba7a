//! Common types shared by the hub dashboard crates.

pub mod error;
pub mod snapshot;

pub use error::{DashError, DashResult, ErrorKind};
pub use snapshot::{ForecastPoint, Snapshot, MAX_FORECAST_POINTS};
