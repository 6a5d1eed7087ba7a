//! Hub dashboard service: configuration, scheduling and display sinks.

pub mod config;
pub mod scheduler;
pub mod sink;

pub use config::{DashboardConfig, DisplayConfig};
pub use scheduler::{CycleStatus, Schedule, Scheduler};
pub use sink::{DisplaySink, PngFileSink};
