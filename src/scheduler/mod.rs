pub mod refresh;

pub use refresh::{RefreshScheduler, RefreshSnapshot, RefreshTrigger, REFRESH_INTERVAL};
