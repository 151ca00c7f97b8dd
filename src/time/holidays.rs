/// NYSE Holiday Calendar Management
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use std::collections::HashSet;

use super::session::SessionWindow;

/// Full-day NYSE closures, observed dates (update annually)
const NYSE_HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2024
    (2024, 1, 1),   // New Year's Day
    (2024, 1, 15),  // MLK Day
    (2024, 2, 19),  // Presidents' Day
    (2024, 3, 29),  // Good Friday
    (2024, 5, 27),  // Memorial Day
    (2024, 6, 19),  // Juneteenth
    (2024, 7, 4),   // Independence Day
    (2024, 9, 2),   // Labor Day
    (2024, 11, 28), // Thanksgiving
    (2024, 12, 25), // Christmas
    // 2025
    (2025, 1, 1),
    (2025, 1, 9),   // National Day of Mourning
    (2025, 1, 20),
    (2025, 2, 17),
    (2025, 4, 18),
    (2025, 5, 26),
    (2025, 6, 19),
    (2025, 7, 4),
    (2025, 9, 1),
    (2025, 11, 27),
    (2025, 12, 25),
    // 2026
    (2026, 1, 1),
    (2026, 1, 19),
    (2026, 2, 16),
    (2026, 4, 3),
    (2026, 5, 25),
    (2026, 6, 19),
    (2026, 7, 3),   // Independence Day (observed)
    (2026, 9, 7),
    (2026, 11, 26),
    (2026, 12, 25),
];

pub fn get_nyse_holidays() -> HashSet<NaiveDate> {
    NYSE_HOLIDAYS
        .iter()
        .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .collect()
}

/// Weekends plus a set of full-day closures
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    holidays: HashSet<NaiveDate>,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::nyse()
    }
}

impl TradingCalendar {
    pub fn nyse() -> Self {
        TradingCalendar { holidays: get_nyse_holidays() }
    }

    pub fn with_holidays(holidays: HashSet<NaiveDate>) -> Self {
        TradingCalendar { holidays }
    }

    /// Check if a date is a trading day (not weekend, not holiday)
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.holidays.contains(&date)
    }

    /// First trading day strictly after `from_date`; `None` past the end of the date range
    fn following_trading_day(&self, from_date: NaiveDate) -> Option<NaiveDate> {
        let mut date = from_date.succ_opt()?;
        while !self.is_trading_day(date) {
            date = date.succ_opt()?;
        }
        Some(date)
    }

    /// First trading day strictly after `from_date`
    ///
    /// Returns `from_date` when no later date is representable.
    pub fn next_trading_day(&self, from_date: NaiveDate) -> NaiveDate {
        self.following_trading_day(from_date).unwrap_or(from_date)
    }

    /// `from_date` itself when it trades, otherwise the next trading day
    pub fn this_or_next_trading_day(&self, from_date: NaiveDate) -> NaiveDate {
        if self.is_trading_day(from_date) {
            from_date
        } else {
            self.next_trading_day(from_date)
        }
    }

    /// Calendar-aware projection.
    ///
    /// Uses the same boundary tests as [`SessionWindow::next_local`], but a
    /// snap lands on a trading day open, and an in-session candidate on a
    /// closed day moves to the next trading day open.
    pub fn next_trading_session_local(
        &self,
        session: &SessionWindow,
        last: NaiveDateTime,
        offset_minutes: i64,
    ) -> NaiveDateTime {
        let candidate = Duration::try_minutes(offset_minutes)
            .and_then(|d| last.checked_add_signed(d))
            .unwrap_or(last);
        let date = candidate.date();

        if session.is_past_close(&candidate) || !self.is_trading_day(date) {
            // Nothing representable ahead: keep the candidate
            return self
                .following_trading_day(date)
                .map_or(candidate, |day| session.open_on(day));
        }

        if session.is_before_open(&candidate) {
            session.open_on(date)
        } else {
            candidate
        }
    }
}

/// Check a date against the NYSE calendar
pub fn is_trading_day(date: NaiveDate) -> bool {
    TradingCalendar::nyse().is_trading_day(date)
}

/// Get next NYSE trading day
pub fn next_trading_day(from_date: NaiveDate) -> NaiveDate {
    TradingCalendar::nyse().next_trading_day(from_date)
}
