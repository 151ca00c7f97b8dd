pub mod session;
pub mod holidays;
pub mod clock;

pub use session::{
    get_market_timings, is_market_open, is_session_open_for_refresh, next_session_instant,
    next_session_local, SessionWindow, US_EQUITY_SESSION,
};
pub use holidays::{is_trading_day, next_trading_day, TradingCalendar};
pub use clock::{Clock, ManualClock, SystemClock};
