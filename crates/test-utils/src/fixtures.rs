//! Hub payload fixtures.
//!
//! Shapes follow what the hub actually returns: string states, forecast lists
//! keyed by `datetime`, and day/night entries flagged with `is_daytime`.

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use serde_json::{json, Value};

/// Body of `GET /states/{entity_id}` for a plain sensor.
pub fn entity_state(entity_id: &str, state: &str) -> Value {
    json!({
        "entity_id": entity_id,
        "state": state,
        "attributes": {},
        "last_changed": "2024-06-01T12:00:00+00:00",
    })
}

/// Hourly forecast points starting at `start`, one hour apart.
///
/// Temperatures count up from 70 so order is easy to assert on.
pub fn hourly_forecast(start: DateTime<FixedOffset>, count: usize, condition: &str) -> Value {
    let points: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "datetime": (start + Duration::hours(i as i64)).to_rfc3339(),
                "temperature": 70 + i as i64,
                "condition": condition,
                "precipitation_probability": 10,
            })
        })
        .collect();
    Value::Array(points)
}

/// Two day/night entries for the calendar day of `day`.
pub fn twice_daily_for<Tz: TimeZone>(day: &DateTime<Tz>, high: f64, low: f64) -> Value {
    let zone = day.timezone();
    let date = day.date_naive();
    let at = |hour: u32| {
        let naive = date.and_hms_opt(hour, 0, 0).expect("valid hour");
        zone.from_local_datetime(&naive)
            .earliest()
            .expect("unambiguous local time")
            .fixed_offset()
            .to_rfc3339()
    };
    json!([
        { "datetime": at(6), "temperature": high, "is_daytime": true, "condition": "sunny" },
        { "datetime": at(18), "temperature": low, "is_daytime": false, "condition": "clear-night" },
    ])
}

/// History response (array of arrays) for one entity with the given states.
pub fn energy_history(entity_id: &str, states: &[&str]) -> Value {
    let points: Vec<Value> = states
        .iter()
        .enumerate()
        .map(|(i, state)| {
            if i == 0 {
                json!({
                    "entity_id": entity_id,
                    "state": state,
                    "attributes": { "unit_of_measurement": "kWh" },
                    "last_changed": "2024-06-01T05:00:00+00:00",
                })
            } else {
                json!({ "state": state, "last_changed": "2024-06-01T06:00:00+00:00" })
            }
        })
        .collect();
    json!([points])
}
