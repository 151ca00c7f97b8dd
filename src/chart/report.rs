/// One-line text summaries of a prediction response
use crate::time::TradingCalendar;
use crate::types::{Consensus, IntervalResult, PredictionResponse};

use super::projection::project_next_pivot;

const PLACEHOLDER: &str = "-";

fn num(value: Option<f64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| format!("{:.2}", v))
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| format!("{:+.2}%", v))
}

pub fn consensus_line(consensus: Option<&Consensus>) -> String {
    match consensus {
        Some(c) => format!(
            "consensus {} entry={} exit={} rr={}",
            c.kind,
            num(c.avg_entry),
            num(c.avg_exit),
            num(c.risk_reward)
        ),
        None => format!("consensus {}", PLACEHOLDER),
    }
}

pub fn interval_line(label: &str, interval: &IntervalResult, calendar: Option<&TradingCalendar>) -> String {
    let mut line = format!(
        "{} {} price={} entry={} target={} support={} resistance={} rr={}",
        label,
        if interval.is_valid { "valid" } else { "invalid" },
        num(interval.latest_price),
        num(interval.entry),
        num(interval.exit_target),
        num(interval.support),
        num(interval.resistance),
        num(interval.risk_reward),
    );

    match project_next_pivot(label, interval, calendar) {
        Some(marker) => line.push_str(&format!(
            " next={}@{:.2} ({:.0}%) at {}",
            marker.kind,
            marker.price,
            marker.confidence * 100.0,
            marker.time
        )),
        None => line.push_str(&format!(" next={}", PLACEHOLDER)),
    }

    if interval.low_volatility {
        line.push_str(" low-vol");
    }
    if interval.macd_tick {
        line.push_str(" macd-tick");
    }

    if let Some(status) = interval.convergence_status {
        line.push_str(&format!(
            " spy={} qqq={} {} leader={} {} agrees={}",
            pct(interval.spy_pct_change),
            pct(interval.qqq_pct_change),
            status.as_str(),
            interval.leader.as_deref().unwrap_or(PLACEHOLDER),
            interval.leader_direction.map_or(PLACEHOLDER, |d| d.as_str()),
            interval
                .signal_agrees_with_leader
                .map_or(PLACEHOLDER, |a| if a { "yes" } else { "no" }),
        ));
    }

    line
}

/// Consensus first, then intervals in the requested order
pub fn summarize(response: &PredictionResponse, order: &[String], calendar: Option<&TradingCalendar>) -> Vec<String> {
    let mut lines = vec![consensus_line(response.consensus.as_ref())];
    for label in order {
        match response.interval(label) {
            Some(interval) => lines.push(interval_line(label, interval, calendar)),
            None => lines.push(format!("{} {}", label, PLACEHOLDER)),
        }
    }
    lines
}
