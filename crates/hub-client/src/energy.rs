//! Reduction of a cumulative energy meter's history into a daily total.
//!
//! The meter reports a running kWh counter. Consecutive readings are summed
//! pairwise:
//! - `current >= previous`: the difference is consumption within the period
//! - `current < previous`: the counter restarted from zero, so `current`
//!   itself is counted and whatever accrued before the reset is forfeited
//!
//! A point whose state is not numeric contributes nothing, and neither pair
//! that touches it is counted.

use serde_json::Value;
use tracing::warn;

/// A history point that could not be read as a number.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPoint {
    pub index: usize,
    pub value: String,
}

/// Outcome of reducing one history series.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyReduction {
    pub total_kwh: f64,
    pub skipped: Vec<SkippedPoint>,
}

/// Numeric value of a history point's `state`, if it has one.
///
/// Accepts both the string states the hub normally reports and bare numbers.
pub fn point_value(point: &Value) -> Option<f64> {
    let value = match point.get("state")? {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Pairwise total over already-parsed readings; `None` marks an invalid point.
pub fn reduce_readings(readings: &[Option<f64>]) -> f64 {
    readings
        .windows(2)
        .map(|pair| match (pair[0], pair[1]) {
            (Some(previous), Some(current)) if current >= previous => current - previous,
            (Some(_), Some(current)) => current,
            _ => 0.0,
        })
        .sum()
}

/// Reduce a raw history series, warning once per skipped point.
pub fn reduce_history(entity_id: &str, points: &[Value]) -> EnergyReduction {
    let mut skipped = Vec::new();
    let readings: Vec<Option<f64>> = points
        .iter()
        .enumerate()
        .map(|(index, point)| {
            let value = point_value(point);
            if value.is_none() {
                let raw = point
                    .get("state")
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| point.to_string());
                warn!(entity = entity_id, index, value = %raw, "Skipping non-numeric history point");
                skipped.push(SkippedPoint { index, value: raw });
            }
            value
        })
        .collect();

    EnergyReduction {
        total_kwh: reduce_readings(&readings),
        skipped,
    }
}
