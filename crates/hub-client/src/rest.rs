//! REST access to hub entity states and history.

use chrono::{DateTime, FixedOffset};
use dashboard_common::{DashError, DashResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::HubConfig;

/// Body of `GET /states/{entity_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub state: String,
    #[serde(default)]
    pub attributes: Value,
}

/// Thin client over the hub's REST API.
///
/// Every request carries the bearer token and is bounded by the configured
/// connect and total timeouts.
pub struct HubClient {
    client: Client,
    base_url: String,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> DashResult<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|e| DashError::Connection {
                entity: "hub".to_string(),
                message: format!("invalid access token header: {}", e),
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| DashError::Connection {
                entity: "hub".to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    /// Current state object of an entity.
    pub async fn state(&self, entity_id: &str) -> DashResult<EntityState> {
        let url = format!("{}/states/{}", self.base_url, entity_id);
        self.get_json(entity_id, self.client.get(url)).await
    }

    /// Entity state parsed as a finite number.
    pub async fn numeric_state(&self, entity_id: &str) -> DashResult<f64> {
        let state = self.state(entity_id).await?;
        parse_numeric(entity_id, &state.state)
    }

    /// `attributes.forecast` of a weather entity.
    pub async fn forecast_attribute(&self, entity_id: &str) -> DashResult<Vec<Value>> {
        let state = self.state(entity_id).await?;
        match state.attributes.get("forecast") {
            Some(Value::Array(points)) => Ok(points.clone()),
            _ => Err(DashError::MissingField {
                entity: entity_id.to_string(),
                field: "attributes.forecast".to_string(),
            }),
        }
    }

    /// Recorded states of one entity from `since` until now.
    ///
    /// The hub answers with one array per requested entity; only the first is
    /// returned.
    pub async fn history(
        &self,
        entity_id: &str,
        since: DateTime<FixedOffset>,
    ) -> DashResult<Vec<Value>> {
        let url = format!("{}/history/period/{}", self.base_url, since.to_rfc3339());
        let request = self
            .client
            .get(url)
            .query(&[("filter_entity_id", entity_id), ("minimal_response", "")]);

        let mut series: Vec<Vec<Value>> = self.get_json(entity_id, request).await?;
        if series.is_empty() {
            return Err(DashError::ShortResponse {
                entity: entity_id.to_string(),
                expected: 1,
                got: 0,
            });
        }
        Ok(series.swap_remove(0))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        entity_id: &str,
        request: RequestBuilder,
    ) -> DashResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(entity_id, e))?;

        let status = response.status();
        debug!(entity = entity_id, status = status.as_u16(), "Hub responded");
        if !status.is_success() {
            return Err(DashError::HttpStatus {
                entity: entity_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(entity_id, e))?;
        serde_json::from_str(&body).map_err(|e| DashError::payload(entity_id, e))
    }
}

fn transport_error(entity_id: &str, err: reqwest::Error) -> DashError {
    if err.is_timeout() {
        DashError::Timeout(entity_id.to_string())
    } else {
        DashError::Connection {
            entity: entity_id.to_string(),
            message: err.to_string(),
        }
    }
}

/// Parse an entity state string as a finite number.
///
/// The hub reports `"unavailable"` or `"unknown"` for sensors that dropped
/// off; those, and textual NaN/inf, are payload errors.
pub fn parse_numeric(entity_id: &str, raw: &str) -> DashResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DashError::NotNumeric {
            entity: entity_id.to_string(),
            value: raw.to_string(),
        })
}
