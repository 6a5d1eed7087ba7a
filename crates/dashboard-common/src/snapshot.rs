//! Normalized dashboard state shared between acquisition and rendering.

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

/// Number of hourly forecast points kept from the hub's forecast list.
pub const MAX_FORECAST_POINTS: usize = 3;

/// One hourly weather prediction as reported by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(rename = "datetime")]
    pub timestamp: DateTime<FixedOffset>,
    pub temperature: f64,
    /// Condition token such as `"rainy"` or `"partlycloudy"`
    #[serde(default)]
    pub condition: String,
}

impl ForecastPoint {
    /// Re-express the timestamp in the host's local offset.
    ///
    /// The hub reports UTC; converting once at acquisition keeps the hour label
    /// a pure function of the snapshot.
    pub fn into_local(self) -> Self {
        Self {
            timestamp: self.timestamp.with_timezone(&Local).fixed_offset(),
            ..self
        }
    }
}

/// The single mutable state object refreshed every cycle.
///
/// NaN marks "never observed" for the temperature and soil fields; zero is a
/// plausible reading for all of them so it cannot double as a sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub electric_cost_cents_per_kwh: f64,
    pub forecast: Vec<ForecastPoint>,
    pub day_low: f64,
    pub day_high: f64,
    pub day_low_high_observed_at: Option<DateTime<Local>>,
    pub daily_energy_kwh: f64,
    pub soil_moisture_percent: f64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            electric_cost_cents_per_kwh: 0.0,
            forecast: Vec::new(),
            day_low: f64::NAN,
            day_high: f64::NAN,
            day_low_high_observed_at: None,
            daily_energy_kwh: 0.0,
            soil_moisture_percent: f64::NAN,
        }
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the forecast with the first [`MAX_FORECAST_POINTS`] entries, in order.
    pub fn set_forecast(&mut self, points: impl IntoIterator<Item = ForecastPoint>) {
        self.forecast = points.into_iter().take(MAX_FORECAST_POINTS).collect();
    }

    pub fn has_day_low_high(&self) -> bool {
        !self.day_low.is_nan() || !self.day_high.is_nan()
    }

    /// Field-wise equality that treats two NaN sentinels as equal.
    pub fn same_as(&self, other: &Snapshot) -> bool {
        fn same(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b
        }

        same(self.electric_cost_cents_per_kwh, other.electric_cost_cents_per_kwh)
            && self.forecast == other.forecast
            && same(self.day_low, other.day_low)
            && same(self.day_high, other.day_high)
            && self.day_low_high_observed_at == other.day_low_high_observed_at
            && same(self.daily_energy_kwh, other.daily_energy_kwh)
            && same(self.soil_moisture_percent, other.soil_moisture_percent)
    }
}
