//! Hub connection settings and the entities the dashboard reads.
//!
//! Every key has a default so a config file only needs the values that
//! differ from the stock deployment.

use std::time::Duration;

use serde::Deserialize;

/// Connection and entity configuration for one hub.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// REST API root, e.g. `http://homeassistant.local:8123/api`
    pub base_url: String,
    /// WebSocket endpoint; derived from `base_url` when absent
    pub websocket_url: Option<String>,
    /// Long-lived access token, normally supplied through the environment
    pub access_token: String,
    pub entities: EntityIds,
    pub forecast_source: ForecastSource,
    pub timeouts: TimeoutConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: "http://homeassistant.local:8123/api".to_string(),
            websocket_url: None,
            access_token: String::new(),
            entities: EntityIds::default(),
            forecast_source: ForecastSource::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl HubConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// WebSocket URL: explicit override, or `base_url` with the scheme
    /// switched to ws/wss and `/websocket` appended.
    pub fn websocket_url(&self) -> String {
        if let Some(url) = &self.websocket_url {
            return url.clone();
        }

        let base = self.base_url();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/websocket", ws_base)
    }
}

/// Entity ids for each dashboard metric.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntityIds {
    pub electric_cost: String,
    pub hourly_forecast: String,
    pub day_night_forecast: String,
    pub energy_consumed: String,
    pub soil_moisture: String,
}

impl Default for EntityIds {
    fn default() -> Self {
        Self {
            electric_cost: "sensor.comed_5_minute_price".to_string(),
            hourly_forecast: "weather.kpwk_hourly".to_string(),
            day_night_forecast: "weather.kpwk_daynight".to_string(),
            energy_consumed: "sensor.home_energy_meter_gen5_electric_consumed_kwh".to_string(),
            soil_moisture: "sensor.garden_soil_moisture".to_string(),
        }
    }
}

/// Where forecast series come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastSource {
    /// `weather.get_forecasts` over a WebSocket session
    #[default]
    WebSocket,
    /// `attributes.forecast` of the weather entity state (older hubs)
    Rest,
}

/// Timeouts, in seconds, for every blocking hub interaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_secs: u64,
    pub request_secs: u64,
    /// Upper bound on waiting for one WebSocket reply, handshake included
    pub response_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
            response_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn response(&self) -> Duration {
        Duration::from_secs(self.response_secs)
    }
}
