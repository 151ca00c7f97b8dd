/// Core type definitions for the pivot monitor
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body POSTed to the prediction endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub symbol: String,
    pub intervals: Vec<String>,
    pub period_map: BTreeMap<String, String>,
}

impl PredictionRequest {
    pub fn for_symbol(symbol: &str, config: &Config) -> Self {
        PredictionRequest {
            symbol: symbol.to_string(),
            intervals: config.intervals.clone(),
            period_map: config.period_map.clone(),
        }
    }
}

/// Top-level backend response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub consensus: Option<Consensus>,
    #[serde(default)]
    pub intervals: BTreeMap<String, IntervalResult>,
}

impl PredictionResponse {
    pub fn interval(&self, label: &str) -> Option<&IntervalResult> {
        self.intervals.get(label)
    }
}

/// Cross-interval agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub avg_entry: Option<f64>,
    #[serde(default)]
    pub avg_exit: Option<f64>,
    #[serde(default)]
    pub risk_reward: Option<f64>,
}

/// One OHLCV row as the backend serializes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRow {
    /// Market-local wall clock, `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Open", default)]
    pub open: Option<f64>,
    #[serde(rename = "High", default)]
    pub high: Option<f64>,
    #[serde(rename = "Low", default)]
    pub low: Option<f64>,
    #[serde(rename = "Close", default)]
    pub close: Option<f64>,
    #[serde(rename = "Volume", default)]
    pub volume: Option<f64>,
}

/// Model output for the next pivot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_type_name: String,
    /// 0..1
    pub confidence: f64,
    pub estimated_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceStatus {
    Convergent,
    Divergent,
    Neutral,
    #[serde(other)]
    Unknown,
}

impl ConvergenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergenceStatus::Convergent => "convergent",
            ConvergenceStatus::Divergent => "divergent",
            ConvergenceStatus::Neutral => "neutral",
            ConvergenceStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderDirection {
    Up,
    Down,
    Flat,
    #[serde(other)]
    Unknown,
}

impl LeaderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderDirection::Up => "up",
            LeaderDirection::Down => "down",
            LeaderDirection::Flat => "flat",
            LeaderDirection::Unknown => "unknown",
        }
    }
}

/// Per-interval analysis block
///
/// Every field other than the series may be absent; absent values render
/// as placeholders downstream and never fail the decode. The index-relative
/// fields (`spy_pct_change` through `signal_agrees_with_leader`) are only
/// populated for the 15m interval.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalResult {
    #[serde(deserialize_with = "null_as_default")]
    pub ohlcv: Vec<OhlcvRow>,
    #[serde(deserialize_with = "null_as_default")]
    pub peaks: Vec<usize>,
    #[serde(deserialize_with = "null_as_default")]
    pub troughs: Vec<usize>,
    pub prediction: Option<Prediction>,
    pub entry: Option<f64>,
    pub exit_target: Option<f64>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub risk_reward: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_valid: bool,
    pub latest_price: Option<f64>,
    pub latest_timestamp: Option<String>,
    pub atr: Option<f64>,
    pub atr_ratio: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub low_volatility: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub macd_tick: bool,
    pub projected_time_et: Option<String>,

    pub spy_pct_change: Option<f64>,
    pub qqq_pct_change: Option<f64>,
    pub convergence_status: Option<ConvergenceStatus>,
    pub leader: Option<String>,
    pub leader_direction: Option<LeaderDirection>,
    pub signal_agrees_with_leader: Option<bool>,
}

impl IntervalResult {
    pub fn last_row(&self) -> Option<&OhlcvRow> {
        self.ohlcv.last()
    }

    /// Peak rows, skipping indices outside the series
    pub fn peak_rows(&self) -> Vec<&OhlcvRow> {
        self.peaks.iter().filter_map(|&i| self.ohlcv.get(i)).collect()
    }

    pub fn trough_rows(&self) -> Vec<&OhlcvRow> {
        self.troughs.iter().filter_map(|&i| self.ohlcv.get(i)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Monitor configuration (loaded from TOML + `PIVOT_*` env)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Backend
    pub endpoint: String,
    pub request_timeout_sec: u64,

    // Request
    pub symbol: String,
    pub intervals: Vec<String>,

    // Projection
    pub skip_non_trading_days: bool,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,

    // Kept last so it serializes as a trailing TOML table
    pub period_map: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let period_map = [("5m", "30d"), ("15m", "30d"), ("1h", "60d")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config {
            endpoint: "http://127.0.0.1:8000/predict".to_string(),
            request_timeout_sec: 30,
            symbol: "SPY".to_string(),
            intervals: vec!["5m".to_string(), "15m".to_string(), "1h".to_string()],
            skip_non_trading_days: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            period_map,
        }
    }
}
