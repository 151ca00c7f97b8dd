pub mod projection;
pub mod report;

pub use projection::{interval_minutes, parse_chart_time, project_next_pivot, project_timestamp, PivotMarker};
pub use report::summarize;
