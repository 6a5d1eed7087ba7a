//! Data acquisition from the home automation hub.
//!
//! Fetches each dashboard metric independently over the hub's REST API and a
//! short-lived WebSocket session, and folds the results into a [`Snapshot`]:
//! - Spot electricity price and soil moisture (REST state)
//! - Hourly forecast and today's low/high (WebSocket `weather.get_forecasts`)
//! - Energy consumed since local midnight (REST history)
//!
//! [`Snapshot`]: dashboard_common::Snapshot

pub mod config;
pub mod daynight;
pub mod energy;
pub mod rest;
pub mod updater;
pub mod websocket;

pub use config::{EntityIds, ForecastSource, HubConfig, TimeoutConfig};
pub use rest::HubClient;
pub use updater::{CycleError, Field, FieldOutcome, UpdateReport, Updater};
pub use websocket::{ForecastKind, HubSession, SessionTimeouts, MAX_DISCARDED_MESSAGES};
