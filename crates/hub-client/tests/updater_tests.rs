//! End-to-end acquisition tests against the in-process mock hub.
//!
//! Covers:
//! - A full cycle over REST + WebSocket
//! - Per-field failure isolation
//! - Handshake violations reported as cycle errors
//! - Id correlation with interleaved traffic, timeouts and discard caps

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local};
use dashboard_common::{DashError, ErrorKind, Snapshot};
use hub_client::{
    EntityIds, Field, FieldOutcome, ForecastSource, HubConfig, HubSession, SessionTimeouts,
    TimeoutConfig, Updater,
};
use serde_json::json;
use test_utils::{
    assert_approx_eq, energy_history, hourly_forecast, twice_daily_for, MockHub, MockHubHandle,
    WsBehavior,
};

const TOKEN: &str = "test-token";

// ============================================================================
// Helpers
// ============================================================================

fn config_for(hub: &MockHubHandle) -> HubConfig {
    HubConfig {
        base_url: hub.base_url(),
        access_token: TOKEN.to_string(),
        timeouts: TimeoutConfig {
            connect_secs: 2,
            request_secs: 2,
            response_secs: 1,
        },
        ..Default::default()
    }
}

fn forecast_start() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-06-01T15:00:00+00:00").unwrap()
}

/// Mock hub answering every default entity.
fn healthy_hub() -> MockHub {
    let ids = EntityIds::default();
    MockHub::new()
        .state(&ids.electric_cost, "3.4")
        .state(&ids.soil_moisture, "41.5")
        .history(
            &ids.energy_consumed,
            energy_history(&ids.energy_consumed, &["10", "12", "15", "2", "5"]),
        )
        .forecasts(
            &ids.hourly_forecast,
            "hourly",
            hourly_forecast(forecast_start(), 5, "rainy"),
        )
        .forecasts(
            &ids.day_night_forecast,
            "twice_daily",
            twice_daily_for(&Local::now(), 84.0, 63.0),
        )
}

fn seeded_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.electric_cost_cents_per_kwh = 9.9;
    snapshot.day_low = 50.0;
    snapshot.day_high = 70.0;
    snapshot.daily_energy_kwh = 1.25;
    snapshot.soil_moisture_percent = 12.0;
    snapshot
}

async fn wait_for_closed_sessions(hub: &MockHubHandle, expected: usize) -> usize {
    for _ in 0..50 {
        if hub.websocket_sessions_closed() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    hub.websocket_sessions_closed()
}

// ============================================================================
// Full cycle
// ============================================================================

#[tokio::test]
async fn test_full_cycle_updates_every_field() {
    let hub = healthy_hub().spawn().await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = Snapshot::new();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(report.is_complete(), "stale: {:?}", report.stale_fields());
    assert_eq!(snapshot.electric_cost_cents_per_kwh, 3.4);
    assert_eq!(snapshot.soil_moisture_percent, 41.5);
    assert_approx_eq!(snapshot.daily_energy_kwh, 10.0, 1e-9);
    assert_eq!(snapshot.day_high, 84.0);
    assert_eq!(snapshot.day_low, 63.0);
    assert!(snapshot.day_low_high_observed_at.is_some());

    let temps: Vec<f64> = snapshot.forecast.iter().map(|p| p.temperature).collect();
    assert_eq!(temps, vec![70.0, 71.0, 72.0]);
    assert_eq!(snapshot.forecast[0].condition, "rainy");
    assert_eq!(snapshot.forecast[0].timestamp, forecast_start());
}

#[tokio::test]
async fn test_rest_requests_carry_bearer_token_and_history_filter() {
    let hub = healthy_hub().spawn().await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = Snapshot::new();
    updater.update(&mut snapshot).await.unwrap();

    let requests = hub.requests();
    assert!(!requests.is_empty());
    for request in &requests {
        assert_eq!(
            request.authorization.as_deref(),
            Some("Bearer test-token"),
            "missing token on {}",
            request.path
        );
    }

    let history = requests
        .iter()
        .find(|r| r.path.starts_with("/api/history/period/"))
        .expect("history was requested");
    let query = history.query.as_deref().unwrap_or("");
    assert!(query.contains("filter_entity_id=sensor.home_energy_meter_gen5_electric_consumed_kwh"));
    assert!(query.contains("minimal_response"));
    assert!(history.path.contains("T00:00:00"), "not midnight: {}", history.path);
}

#[tokio::test]
async fn test_websocket_conversation_shape() {
    let hub = healthy_hub().spawn().await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = Snapshot::new();
    updater.update(&mut snapshot).await.unwrap();

    let messages = hub.websocket_messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], json!({ "type": "auth", "access_token": TOKEN }));

    assert_eq!(messages[1]["id"], 1);
    assert_eq!(messages[1]["type"], "call_service");
    assert_eq!(messages[1]["domain"], "weather");
    assert_eq!(messages[1]["service"], "get_forecasts");
    assert_eq!(messages[1]["service_data"]["type"], "hourly");
    assert_eq!(messages[1]["target"]["entity_id"], "weather.kpwk_hourly");
    assert_eq!(messages[1]["return_response"], true);

    assert_eq!(messages[2]["id"], 2);
    assert_eq!(messages[2]["service_data"]["type"], "twice_daily");

    assert_eq!(wait_for_closed_sessions(&hub, 1).await, 1);
}

// ============================================================================
// Field isolation
// ============================================================================

#[tokio::test]
async fn test_failing_electric_cost_keeps_previous_value() {
    let ids = EntityIds::default();
    let hub = healthy_hub()
        .failing_state(&ids.electric_cost, 500)
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert_eq!(snapshot.electric_cost_cents_per_kwh, 9.9);
    assert_eq!(
        report.outcome(Field::ElectricCost),
        Some(&FieldOutcome::Stale(DashError::HttpStatus {
            entity: ids.electric_cost.clone(),
            status: 500
        }))
    );
    assert_eq!(report.stale_fields(), vec![Field::ElectricCost]);
    assert_eq!(snapshot.soil_moisture_percent, 41.5);
}

#[tokio::test]
async fn test_non_numeric_soil_moisture_is_payload_error() {
    let ids = EntityIds::default();
    let hub = healthy_hub()
        .state(&ids.soil_moisture, "unavailable")
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert_eq!(snapshot.soil_moisture_percent, 12.0);
    match report.outcome(Field::SoilMoisture) {
        Some(FieldOutcome::Stale(e)) => assert_eq!(e.kind(), ErrorKind::Payload),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_history_keeps_energy() {
    let ids = EntityIds::default();
    let hub = MockHub::new()
        .state(&ids.electric_cost, "3.4")
        .state(&ids.soil_moisture, "41.5")
        .spawn()
        .await;
    let mut config = config_for(&hub);
    config.forecast_source = ForecastSource::Rest;
    let updater = Updater::new(config).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert_eq!(snapshot.daily_energy_kwh, 1.25);
    assert!(report.stale_fields().contains(&Field::DailyEnergy));
}

#[tokio::test]
async fn test_energy_with_malformed_point() {
    let ids = EntityIds::default();
    let hub = healthy_hub()
        .history(
            &ids.energy_consumed,
            energy_history(&ids.energy_consumed, &["5", "unavailable", "9"]),
        )
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert_eq!(snapshot.daily_energy_kwh, 0.0);
    assert_eq!(report.skipped_energy_points, 1);
    assert_eq!(report.outcome(Field::DailyEnergy), Some(&FieldOutcome::Updated));
}

#[tokio::test]
async fn test_empty_history_response_is_short() {
    let ids = EntityIds::default();
    let hub = healthy_hub()
        .history(&ids.energy_consumed, json!([]))
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert_eq!(snapshot.daily_energy_kwh, 1.25);
    assert!(matches!(
        report.outcome(Field::DailyEnergy),
        Some(FieldOutcome::Stale(DashError::ShortResponse { .. }))
    ));
}

#[tokio::test]
async fn test_slow_rest_field_times_out() {
    let ids = EntityIds::default();
    let hub = healthy_hub()
        .delayed_state(&ids.electric_cost, "3.4", Duration::from_secs(4))
        .spawn()
        .await;
    let mut config = config_for(&hub);
    config.timeouts.request_secs = 1;
    let updater = Updater::new(config).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(matches!(
        report.outcome(Field::ElectricCost),
        Some(FieldOutcome::Stale(DashError::Timeout(_)))
    ));
    assert_eq!(snapshot.electric_cost_cents_per_kwh, 9.9);
    assert_eq!(report.stale_fields(), vec![Field::ElectricCost]);
    assert_eq!(snapshot.soil_moisture_percent, 41.5);
}

// ============================================================================
// WebSocket handshake and correlation
// ============================================================================

#[tokio::test]
async fn test_wrong_greeting_is_cycle_error() {
    let hub = healthy_hub()
        .websocket(WsBehavior::WrongGreeting)
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let err = updater.update(&mut snapshot).await.unwrap_err();

    assert!(matches!(err.source, DashError::UnexpectedMessage { .. }));
    assert_eq!(err.source.kind(), ErrorKind::Protocol);
    assert!(snapshot.forecast.is_empty());
    assert_eq!(snapshot.day_low, 50.0);
    assert_eq!(snapshot.day_high, 70.0);
    assert!(snapshot.day_low_high_observed_at.is_none());

    // REST-sourced fields still ran
    assert_eq!(snapshot.electric_cost_cents_per_kwh, 3.4);
    assert_approx_eq!(snapshot.daily_energy_kwh, 10.0, 1e-9);
    assert_eq!(snapshot.soil_moisture_percent, 41.5);
    assert_eq!(
        err.report.stale_fields(),
        vec![Field::Forecast, Field::DayLowHigh]
    );

    // No credentials are sent after a bad greeting
    assert!(hub.websocket_messages().is_empty());
}

#[tokio::test]
async fn test_non_json_greeting_is_cycle_error() {
    let hub = healthy_hub()
        .websocket(WsBehavior::GarbageGreeting)
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let err = updater.update(&mut snapshot).await.unwrap_err();

    assert_eq!(
        err.source,
        DashError::UnexpectedMessage {
            expected: "auth_required".to_string(),
            got: "<non-JSON>".to_string()
        }
    );
    assert_eq!(
        err.report.stale_fields(),
        vec![Field::Forecast, Field::DayLowHigh]
    );
    assert_eq!(snapshot.day_low, 50.0);
    assert_eq!(snapshot.electric_cost_cents_per_kwh, 3.4);
    assert!(hub.websocket_messages().is_empty());
}

#[tokio::test]
async fn test_silent_greeting_times_out_without_cycle_error() {
    let hub = healthy_hub()
        .websocket(WsBehavior::SilentGreeting)
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(matches!(
        report.outcome(Field::Forecast),
        Some(FieldOutcome::Stale(DashError::Timeout(_)))
    ));
    assert!(matches!(
        report.outcome(Field::DayLowHigh),
        Some(FieldOutcome::Stale(DashError::Timeout(_)))
    ));
    assert_eq!(snapshot.day_high, 70.0);
    assert_eq!(report.outcome(Field::ElectricCost), Some(&FieldOutcome::Updated));
    assert_eq!(report.outcome(Field::DailyEnergy), Some(&FieldOutcome::Updated));
    assert!(hub.websocket_messages().is_empty());
    assert_eq!(wait_for_closed_sessions(&hub, 1).await, 1);
}

#[tokio::test]
async fn test_wss_url_reaches_tls_handshake() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    // Plain TCP peer: accepts and hangs up, so the TLS handshake fails
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    let timeouts = SessionTimeouts {
        connect: Duration::from_secs(2),
        response: Duration::from_secs(1),
    };

    let result = HubSession::connect(
        &format!("wss://127.0.0.1:{}/api/websocket", port),
        TOKEN,
        timeouts,
    )
    .await;

    let err = match result {
        Ok(_) => panic!("plain TCP peer accepted a TLS session"),
        Err(e) => e,
    };
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(
        !err.to_string().contains("not compiled in"),
        "TLS unavailable: {}",
        err
    );
}

#[tokio::test]
async fn test_rejected_auth_is_cycle_error() {
    let hub = healthy_hub()
        .websocket(WsBehavior::RejectAuth)
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = Snapshot::new();

    let err = updater.update(&mut snapshot).await.unwrap_err();

    assert_eq!(
        err.source,
        DashError::AuthRejected("Invalid access token or password".to_string())
    );
    assert!(snapshot.forecast.is_empty());
    assert!(snapshot.day_low.is_nan());
    assert_eq!(wait_for_closed_sessions(&hub, 1).await, 1);
}

#[tokio::test]
async fn test_interleaved_messages_are_discarded() {
    let hub = healthy_hub().websocket(WsBehavior::Noisy).spawn().await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = Snapshot::new();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(report.is_complete(), "stale: {:?}", report.stale_fields());
    assert_eq!(snapshot.forecast.len(), 3);
    assert_eq!(snapshot.day_high, 84.0);
    assert_eq!(snapshot.day_low, 63.0);
}

#[tokio::test]
async fn test_unresponsive_hub_times_out_per_field() {
    let hub = healthy_hub()
        .websocket(WsBehavior::Unresponsive)
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = seeded_snapshot();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(matches!(
        report.outcome(Field::Forecast),
        Some(FieldOutcome::Stale(DashError::Timeout(_)))
    ));
    assert!(matches!(
        report.outcome(Field::DayLowHigh),
        Some(FieldOutcome::Stale(DashError::Timeout(_)))
    ));
    assert_eq!(snapshot.day_low, 50.0);
    assert_eq!(snapshot.electric_cost_cents_per_kwh, 3.4);
}

#[tokio::test]
async fn test_flood_of_unrelated_messages_is_capped() {
    let hub = healthy_hub().websocket(WsBehavior::Flood).spawn().await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = Snapshot::new();

    let report = updater.update(&mut snapshot).await.unwrap();

    match report.outcome(Field::Forecast) {
        Some(FieldOutcome::Stale(DashError::UnmatchedResponse { id, discarded })) => {
            assert_eq!(*id, 1);
            assert_eq!(*discarded, hub_client::MAX_DISCARDED_MESSAGES);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(snapshot.forecast.is_empty());
}

#[tokio::test]
async fn test_unreachable_websocket_is_transport_error() {
    let hub = healthy_hub().spawn().await;
    let mut config = config_for(&hub);
    // Nothing listens on the discard port
    config.websocket_url = Some("ws://127.0.0.1:9/api/websocket".to_string());
    let updater = Updater::new(config).unwrap();
    let mut snapshot = Snapshot::new();

    let report = updater.update(&mut snapshot).await.unwrap();

    match report.outcome(Field::Forecast) {
        Some(FieldOutcome::Stale(e)) => assert_eq!(e.kind(), ErrorKind::Transport),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(snapshot.electric_cost_cents_per_kwh, 3.4);
}

#[tokio::test]
async fn test_missing_forecast_entity_is_field_error() {
    let ids = EntityIds::default();
    let hub = MockHub::new()
        .state(&ids.electric_cost, "3.4")
        .forecasts(
            &ids.day_night_forecast,
            "twice_daily",
            twice_daily_for(&Local::now(), 80.0, 61.0),
        )
        .spawn()
        .await;
    let updater = Updater::new(config_for(&hub)).unwrap();
    let mut snapshot = Snapshot::new();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(matches!(
        report.outcome(Field::Forecast),
        Some(FieldOutcome::Stale(DashError::ServiceCall { id: 1, .. }))
    ));
    assert_eq!(report.outcome(Field::DayLowHigh), Some(&FieldOutcome::Updated));
    assert_eq!(snapshot.day_high, 80.0);
}

// ============================================================================
// REST forecast source
// ============================================================================

#[tokio::test]
async fn test_rest_forecast_source() {
    let ids = EntityIds::default();
    let hub = healthy_hub()
        .state_with_attributes(
            &ids.hourly_forecast,
            "rainy",
            json!({ "forecast": hourly_forecast(forecast_start(), 4, "cloudy") }),
        )
        .state_with_attributes(
            &ids.day_night_forecast,
            "sunny",
            json!({ "forecast": twice_daily_for(&Local::now(), 77.0, 58.0) }),
        )
        .spawn()
        .await;
    let mut config = config_for(&hub);
    config.forecast_source = ForecastSource::Rest;
    let updater = Updater::new(config).unwrap();
    let mut snapshot = Snapshot::new();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(report.is_complete(), "stale: {:?}", report.stale_fields());
    assert_eq!(snapshot.forecast.len(), 3);
    assert_eq!(snapshot.forecast[2].condition, "cloudy");
    assert_eq!(snapshot.day_high, 77.0);
    assert_eq!(snapshot.day_low, 58.0);
    assert!(hub.websocket_messages().is_empty());
}

#[tokio::test]
async fn test_rest_forecast_without_attribute_is_stale() {
    let ids = EntityIds::default();
    let hub = healthy_hub()
        .state(&ids.hourly_forecast, "rainy")
        .spawn()
        .await;
    let mut config = config_for(&hub);
    config.forecast_source = ForecastSource::Rest;
    let updater = Updater::new(config).unwrap();
    let mut snapshot = Snapshot::new();

    let report = updater.update(&mut snapshot).await.unwrap();

    assert!(matches!(
        report.outcome(Field::Forecast),
        Some(FieldOutcome::Stale(DashError::MissingField { .. }))
    ));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_partial_yaml_config() {
    let yaml = r#"
base_url: http://hub.lan:8123/api
forecast_source: rest
entities:
  electric_cost: sensor.spot_price
timeouts:
  response_secs: 5
"#;
    let config: HubConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.base_url, "http://hub.lan:8123/api");
    assert_eq!(config.forecast_source, ForecastSource::Rest);
    assert_eq!(config.entities.electric_cost, "sensor.spot_price");
    assert_eq!(config.entities.hourly_forecast, "weather.kpwk_hourly");
    assert_eq!(config.timeouts.response(), Duration::from_secs(5));
    assert_eq!(config.timeouts.connect(), Duration::from_secs(10));
    assert_eq!(config.websocket_url(), "ws://hub.lan:8123/api/websocket");
}
