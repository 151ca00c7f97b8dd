/// Next-pivot marker placement on the market time axis
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::error::{MonitorError, Result};
use crate::time::{TradingCalendar, US_EQUITY_SESSION};
use crate::types::IntervalResult;

/// Wall-clock format of backend OHLCV timestamps
pub const CHART_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotMarker {
    pub interval: String,
    /// Same format as the OHLCV `Date` column
    pub time: String,
    pub price: f64,
    pub kind: String,
    pub confidence: f64,
}

/// Bar length in minutes for labels like `5m`, `1h`, `1d`
pub fn interval_minutes(label: &str) -> Result<i64> {
    let label = label.trim();
    let unknown = || MonitorError::UnknownInterval(label.to_string());

    let split = label.len().checked_sub(1).ok_or_else(unknown)?;
    if !label.is_char_boundary(split) {
        return Err(unknown());
    }
    let (count, unit) = label.split_at(split);
    let count: i64 = count.parse().map_err(|_| unknown())?;
    if count <= 0 {
        return Err(unknown());
    }

    let per_unit = match unit {
        "m" => 1,
        "h" => 60,
        "d" => 24 * 60,
        _ => return Err(unknown()),
    };
    count.checked_mul(per_unit).ok_or_else(unknown)
}

pub fn parse_chart_time(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), CHART_TIME_FORMAT)
        .map_err(|e| MonitorError::InvalidTimestamp(format!("{:?}: {}", raw, e)))
}

/// Project a chart timestamp forward; unparseable input comes back unchanged.
///
/// With a calendar, snaps skip weekends and holidays; without one they move
/// a single calendar day.
pub fn project_timestamp(raw: &str, offset_minutes: i64, calendar: Option<&TradingCalendar>) -> String {
    let last = match parse_chart_time(raw) {
        Ok(t) => t,
        Err(e) => {
            debug!("Not projecting: {}", e);
            return raw.to_string();
        }
    };

    let next = match calendar {
        Some(cal) => cal.next_trading_session_local(&US_EQUITY_SESSION, last, offset_minutes),
        None => US_EQUITY_SESSION.next_local(last, offset_minutes),
    };
    next.format(CHART_TIME_FORMAT).to_string()
}

/// Marker one bar after the last OHLCV row, at the predicted price
pub fn project_next_pivot(
    label: &str,
    interval: &IntervalResult,
    calendar: Option<&TradingCalendar>,
) -> Option<PivotMarker> {
    let prediction = interval.prediction.as_ref()?;
    let last = interval.last_row()?;

    let offset = match interval_minutes(label) {
        Ok(m) => m,
        Err(e) => {
            debug!("No marker for {}: {}", label, e);
            return None;
        }
    };

    Some(PivotMarker {
        interval: label.to_string(),
        time: project_timestamp(&last.date, offset, calendar),
        price: prediction.estimated_value,
        kind: prediction.predicted_type_name.clone(),
        confidence: prediction.confidence,
    })
}
