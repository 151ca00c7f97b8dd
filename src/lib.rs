pub mod types;
pub mod error;
pub mod time;
pub mod client;
pub mod scheduler;
pub mod chart;
pub mod config;
pub mod logging;

pub use types::*;
pub use error::{MonitorError, Result};
