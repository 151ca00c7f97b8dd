/// Market session and timing utilities
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// Regular trading hours of a market, in its local zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub tz: Tz,
    /// Minutes since local midnight
    pub open_minute: u32,
    pub close_minute: u32,
    /// Padding either side of the session during which background refresh still runs
    pub refresh_buffer_min: u32,
}

/// NYSE/Nasdaq regular session: 09:30-16:00 America/New_York, refresh 09:25-16:05
pub const US_EQUITY_SESSION: SessionWindow = SessionWindow {
    tz: New_York,
    open_minute: 9 * 60 + 30,
    close_minute: 16 * 60,
    refresh_buffer_min: 5,
};

impl SessionWindow {
    pub fn open_time(&self) -> NaiveTime {
        NaiveTime::default() + Duration::minutes(self.open_minute as i64)
    }

    pub fn close_time(&self) -> NaiveTime {
        NaiveTime::default() + Duration::minutes(self.close_minute as i64)
    }

    /// Convert an absolute instant to the market's wall clock
    pub fn local(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.tz)
    }

    pub fn minutes_since_midnight(&self, now: DateTime<Utc>) -> u32 {
        let local = self.local(now);
        local.hour() * 60 + local.minute()
    }

    /// Padded window test used to gate background refresh (both ends inclusive)
    pub fn is_open_for_refresh(&self, now: DateTime<Utc>) -> bool {
        let minutes = self.minutes_since_midnight(now);
        let start = self.open_minute.saturating_sub(self.refresh_buffer_min);
        let end = self.close_minute + self.refresh_buffer_min;
        (start..=end).contains(&minutes)
    }

    /// Unpadded regular session: open <= t < close
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let current = self.local(now).time();
        current >= self.open_time() && current < self.close_time()
    }

    /// Strictly after close at minute resolution; exactly 16:00 is not past close
    pub fn is_past_close(&self, t: &NaiveDateTime) -> bool {
        let (close_h, close_m) = (self.close_minute / 60, self.close_minute % 60);
        t.hour() > close_h || (t.hour() == close_h && t.minute() > close_m)
    }

    /// Strictly before open; exactly 09:30 is not before open
    pub fn is_before_open(&self, t: &NaiveDateTime) -> bool {
        let (open_h, open_m) = (self.open_minute / 60, self.open_minute % 60);
        t.hour() < open_h || (t.hour() == open_h && t.minute() < open_m)
    }

    pub fn open_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.open_time())
    }

    /// Project `last + offset_minutes` onto the session at wall-clock level.
    ///
    /// A candidate past close moves to the next calendar day's open (one day
    /// only, weekends included); a candidate before open moves to that day's
    /// open. Anything else is returned unchanged.
    pub fn next_local(&self, last: NaiveDateTime, offset_minutes: i64) -> NaiveDateTime {
        let candidate = offset(last, offset_minutes);

        if self.is_past_close(&candidate) {
            match candidate.date().succ_opt() {
                Some(next_day) => self.open_on(next_day),
                None => candidate,
            }
        } else if self.is_before_open(&candidate) {
            self.open_on(candidate.date())
        } else {
            candidate
        }
    }

    /// Same projection for an absolute instant
    pub fn next_instant(&self, last: DateTime<Utc>, offset_minutes: i64) -> DateTime<Utc> {
        let candidate = Duration::try_minutes(offset_minutes)
            .and_then(|d| last.checked_add_signed(d))
            .unwrap_or(last);
        let local_last = self.local(last).naive_local();
        let projected = self.next_local(local_last, offset_minutes);

        if projected == self.local(candidate).naive_local() {
            return candidate;
        }
        self.to_instant(projected).unwrap_or(candidate)
    }

    /// Resolve a market wall-clock time; DST folds pick the earlier instant
    pub fn to_instant(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Today's open and close as UTC instants
    pub fn timings(&self, date: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let day = self.local(date).date_naive();
        let open = self.to_instant(self.open_on(day))?;
        let close = self.to_instant(day.and_time(self.close_time()))?;
        Some((open, close))
    }
}

fn offset(t: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    Duration::try_minutes(minutes)
        .and_then(|d| t.checked_add_signed(d))
        .unwrap_or(t)
}

/// Whether background refresh may run at `now` (09:25-16:05 New York, inclusive)
pub fn is_session_open_for_refresh(now: DateTime<Utc>) -> bool {
    US_EQUITY_SESSION.is_open_for_refresh(now)
}

/// Next valid trading instant at least `offset_minutes` after `last`
pub fn next_session_instant(last: DateTime<Utc>, offset_minutes: i64) -> DateTime<Utc> {
    US_EQUITY_SESSION.next_instant(last, offset_minutes)
}

/// Wall-clock variant for chart timestamps, which are already market-local
pub fn next_session_local(last: NaiveDateTime, offset_minutes: i64) -> NaiveDateTime {
    US_EQUITY_SESSION.next_local(last, offset_minutes)
}

/// Check if the regular session is open
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    US_EQUITY_SESSION.is_open(now)
}

/// Get market timings for today
pub fn get_market_timings(date: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    US_EQUITY_SESSION.timings(date)
}

/// Monday to Friday in the market zone (ignores holidays)
pub fn is_weekday(date: DateTime<Utc>) -> bool {
    date.with_timezone(&New_York).weekday().num_days_from_monday() < 5
}
