//! Today's low and high from a twice-daily (day/night) forecast series.

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Number of leading entries examined; the series alternates day and night.
pub const DAY_NIGHT_ENTRIES: usize = 2;

#[derive(Debug, Clone, Deserialize)]
struct DayNightEntry {
    datetime: DateTime<FixedOffset>,
    temperature: f64,
    #[serde(alias = "daytime")]
    is_daytime: bool,
}

/// Values found for today; `None` where the series had nothing applicable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayLowHigh {
    pub low: Option<f64>,
    pub high: Option<f64>,
    /// Entries dropped as malformed
    pub skipped: usize,
}

impl DayLowHigh {
    pub fn is_empty(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

/// Pick today's daytime (high) and nighttime (low) temperatures.
///
/// "Today" is the calendar date of `now` in its own time zone, evaluated at
/// the moment of the call. Entries dated another day, malformed entries, and
/// missing entries are skipped; each malformed one is logged as a warning.
pub fn select_today<Tz: TimeZone>(
    entity_id: &str,
    entries: &[Value],
    now: &DateTime<Tz>,
) -> DayLowHigh {
    let today = now.date_naive();
    let zone = now.timezone();
    let mut selection = DayLowHigh::default();

    for (index, raw) in entries.iter().take(DAY_NIGHT_ENTRIES).enumerate() {
        let entry: DayNightEntry = match serde_json::from_value(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    entity = entity_id,
                    index,
                    value = %raw,
                    error = %e,
                    "Skipping malformed day/night entry"
                );
                selection.skipped += 1;
                continue;
            }
        };

        if entry.datetime.with_timezone(&zone).date_naive() != today {
            debug!(index, datetime = %entry.datetime, "Day/night entry is not for today");
            continue;
        }

        if entry.is_daytime {
            selection.high = Some(entry.temperature);
        } else {
            selection.low = Some(entry.temperature);
        }
    }

    selection
}
