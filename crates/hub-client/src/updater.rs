//! Best-effort refresh of every snapshot field.
//!
//! Failures are handled at three explicit levels:
//! - point: a malformed energy reading is skipped inside the reduction
//! - field: a transport or payload error leaves that field stale
//! - cycle: a violated WebSocket handshake leaves the session's fields stale
//!   and is returned to the caller as [`CycleError`] once every other field
//!   has been refreshed

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, TimeZone, Timelike};
use dashboard_common::{DashError, DashResult, ForecastPoint, Snapshot};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{ForecastSource, HubConfig};
use crate::daynight::{self, DayLowHigh};
use crate::energy::{self, EnergyReduction};
use crate::rest::HubClient;
use crate::websocket::{ForecastKind, HubSession, SessionTimeouts};

/// Snapshot fields refreshed by the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ElectricCost,
    Forecast,
    DayLowHigh,
    DailyEnergy,
    SoilMoisture,
}

/// What happened to one field during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Updated,
    /// Fetched fine but nothing applied (e.g. no day/night entry for today)
    Unchanged,
    /// Previous value kept because the fetch failed
    Stale(DashError),
}

/// Per-field outcomes of one update cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    outcomes: Vec<(Field, FieldOutcome)>,
    /// Energy history points skipped as non-numeric
    pub skipped_energy_points: usize,
}

impl UpdateReport {
    fn record(&mut self, field: Field, outcome: FieldOutcome) {
        self.outcomes.push((field, outcome));
    }

    pub fn outcome(&self, field: Field) -> Option<&FieldOutcome> {
        self.outcomes
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, outcome)| outcome)
    }

    pub fn stale_fields(&self) -> Vec<Field> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FieldOutcome::Stale(_)))
            .map(|(field, _)| *field)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.stale_fields().is_empty()
    }
}

/// The WebSocket session could not be established because the hub broke the
/// handshake. All REST-sourced fields were still refreshed.
#[derive(Debug, Error)]
#[error("WebSocket session aborted: {source}")]
pub struct CycleError {
    pub source: DashError,
    pub report: UpdateReport,
}

/// Populates a [`Snapshot`] from the hub.
pub struct Updater {
    client: HubClient,
    config: HubConfig,
}

impl Updater {
    pub fn new(config: HubConfig) -> DashResult<Self> {
        let client = HubClient::new(&config)?;
        Ok(Self { client, config })
    }

    /// Refresh every field in sequence. Individual failures are logged and
    /// recorded in the report without stopping later steps.
    #[instrument(skip_all, fields(forecast_source = ?self.config.forecast_source))]
    pub async fn update(&self, snapshot: &mut Snapshot) -> Result<UpdateReport, CycleError> {
        let entities = &self.config.entities;
        let mut report = UpdateReport::default();

        let cost = self.client.numeric_state(&entities.electric_cost).await;
        report.record(
            Field::ElectricCost,
            apply_numeric(
                &mut snapshot.electric_cost_cents_per_kwh,
                &entities.electric_cost,
                cost,
            ),
        );

        let session_error = match self.config.forecast_source {
            ForecastSource::WebSocket => self.refresh_forecasts_websocket(snapshot, &mut report).await,
            ForecastSource::Rest => {
                self.refresh_forecasts_rest(snapshot, &mut report).await;
                None
            }
        };

        let energy = self.fetch_daily_energy(Local::now()).await;
        if let Ok(reduction) = &energy {
            report.skipped_energy_points = reduction.skipped.len();
        }
        report.record(
            Field::DailyEnergy,
            apply_energy(snapshot, &entities.energy_consumed, energy),
        );

        let soil = self.client.numeric_state(&entities.soil_moisture).await;
        report.record(
            Field::SoilMoisture,
            apply_numeric(
                &mut snapshot.soil_moisture_percent,
                &entities.soil_moisture,
                soil,
            ),
        );

        info!(stale = ?report.stale_fields(), "Update cycle finished");

        match session_error {
            Some(source) => Err(CycleError { source, report }),
            None => Ok(report),
        }
    }

    /// Both forecast series over one session. Returns the handshake error, if
    /// any, so the caller can report it after the remaining fields run.
    async fn refresh_forecasts_websocket(
        &self,
        snapshot: &mut Snapshot,
        report: &mut UpdateReport,
    ) -> Option<DashError> {
        let entities = &self.config.entities;
        let timeouts = SessionTimeouts {
            connect: self.config.timeouts.connect(),
            response: self.config.timeouts.response(),
        };

        let mut session = match HubSession::connect(
            &self.config.websocket_url(),
            &self.config.access_token,
            timeouts,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "WebSocket session unavailable, forecast fields left stale");
                report.record(Field::Forecast, FieldOutcome::Stale(e.clone()));
                report.record(Field::DayLowHigh, FieldOutcome::Stale(e.clone()));
                return e.is_handshake_failure().then_some(e);
            }
        };

        let hourly = session
            .get_forecasts(&entities.hourly_forecast, ForecastKind::Hourly)
            .await
            .and_then(|points| parse_forecast(&entities.hourly_forecast, &points));
        report.record(
            Field::Forecast,
            apply_forecast(snapshot, &entities.hourly_forecast, hourly),
        );

        let day_night = session
            .get_forecasts(&entities.day_night_forecast, ForecastKind::TwiceDaily)
            .await;
        report.record(
            Field::DayLowHigh,
            apply_day_night(snapshot, &entities.day_night_forecast, day_night, Local::now()),
        );

        session.close().await;
        None
    }

    async fn refresh_forecasts_rest(&self, snapshot: &mut Snapshot, report: &mut UpdateReport) {
        let entities = &self.config.entities;

        let hourly = self
            .client
            .forecast_attribute(&entities.hourly_forecast)
            .await
            .and_then(|points| parse_forecast(&entities.hourly_forecast, &points));
        report.record(
            Field::Forecast,
            apply_forecast(snapshot, &entities.hourly_forecast, hourly),
        );

        let day_night = self
            .client
            .forecast_attribute(&entities.day_night_forecast)
            .await;
        report.record(
            Field::DayLowHigh,
            apply_day_night(snapshot, &entities.day_night_forecast, day_night, Local::now()),
        );
    }

    async fn fetch_daily_energy(&self, now: DateTime<Local>) -> DashResult<EnergyReduction> {
        let entity = &self.config.entities.energy_consumed;
        let points = self.client.history(entity, local_midnight(&now)).await?;
        Ok(energy::reduce_history(entity, &points))
    }
}

/// Start of the current day in `now`'s time zone.
pub fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<FixedOffset> {
    now.timezone()
        .from_local_datetime(&now.date_naive().and_time(NaiveTime::MIN))
        .earliest()
        // Midnight skipped by a DST jump: fall back to wall-clock arithmetic.
        .unwrap_or_else(|| now.clone() - Duration::seconds(now.num_seconds_from_midnight() as i64))
        .fixed_offset()
}

/// First forecast points, in order, with timestamps in local time.
pub fn parse_forecast(entity_id: &str, points: &[Value]) -> DashResult<Vec<ForecastPoint>> {
    points
        .iter()
        .take(dashboard_common::MAX_FORECAST_POINTS)
        .map(|raw| {
            serde_json::from_value::<ForecastPoint>(raw.clone())
                .map(ForecastPoint::into_local)
                .map_err(|e| DashError::payload(entity_id, e))
        })
        .collect()
}

fn stale(entity_id: &str, err: DashError) -> FieldOutcome {
    warn!(entity = entity_id, error = %err, kind = ?err.kind(), "Keeping previous value");
    FieldOutcome::Stale(err)
}

pub fn apply_numeric(target: &mut f64, entity_id: &str, result: DashResult<f64>) -> FieldOutcome {
    match result {
        Ok(value) => {
            *target = value;
            FieldOutcome::Updated
        }
        Err(e) => stale(entity_id, e),
    }
}

pub fn apply_forecast(
    snapshot: &mut Snapshot,
    entity_id: &str,
    result: DashResult<Vec<ForecastPoint>>,
) -> FieldOutcome {
    match result {
        Ok(points) => {
            snapshot.set_forecast(points);
            FieldOutcome::Updated
        }
        Err(e) => stale(entity_id, e),
    }
}

/// Assign today's low/high and stamp the observation time when anything
/// applied.
pub fn apply_day_night<Tz: TimeZone>(
    snapshot: &mut Snapshot,
    entity_id: &str,
    result: DashResult<Vec<Value>>,
    now: DateTime<Tz>,
) -> FieldOutcome {
    let entries = match result {
        Ok(entries) => entries,
        Err(e) => return stale(entity_id, e),
    };

    if entries.len() < daynight::DAY_NIGHT_ENTRIES {
        warn!(entity = entity_id, got = entries.len(), "Short day/night forecast");
    }

    let selection = daynight::select_today(entity_id, &entries, &now);
    if selection.is_empty() {
        if selection.skipped > 0 {
            return stale(
                entity_id,
                DashError::Json {
                    entity: entity_id.to_string(),
                    message: format!("{} malformed day/night entries", selection.skipped),
                },
            );
        }
        return FieldOutcome::Unchanged;
    }

    let DayLowHigh { low, high, .. } = selection;
    if let Some(low) = low {
        snapshot.day_low = low;
    }
    if let Some(high) = high {
        snapshot.day_high = high;
    }
    snapshot.day_low_high_observed_at = Some(now.with_timezone(&Local));
    FieldOutcome::Updated
}

pub fn apply_energy(
    snapshot: &mut Snapshot,
    entity_id: &str,
    result: DashResult<EnergyReduction>,
) -> FieldOutcome {
    match result {
        Ok(reduction) => {
            snapshot.daily_energy_kwh = reduction.total_kwh;
            FieldOutcome::Updated
        }
        Err(e) => stale(entity_id, e),
    }
}
