//! Request quota gate for the Weather Underground API.
//!
//! Developer API keys carry a daily cap and a per-minute cap. The gate
//! tracks both: a counter that resets when the calendar date advances,
//! and a rolling 60-second window of grant timestamps. State lives for
//! one agent run only and is never persisted.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::VecDeque;

/// Length of the rolling per-minute window.
const WINDOW_SECS: i64 = 60;

/// Combined daily and per-minute request gate.
///
/// Owned by the poll loop; `try_acquire` takes the current instant as an
/// argument so the clock can be driven from tests. The caller must not
/// pass instants that go backwards.
#[derive(Debug)]
pub struct RequestQuota {
    daily_count: u32,
    reset_date: NaiveDate,
    /// Grant instants inside the trailing window, oldest first.
    window: VecDeque<DateTime<Utc>>,
    daily_threshold: u32,
    minute_threshold: u32,
}

impl RequestQuota {
    pub fn new(daily_threshold: u32, minute_threshold: u32, now: DateTime<Utc>) -> Self {
        Self {
            daily_count: 0,
            reset_date: now.date_naive(),
            window: VecDeque::new(),
            daily_threshold,
            minute_threshold,
        }
    }

    /// Decide whether a request may go out at `now`, and record it if so.
    ///
    /// The daily counter resets exactly once when the date advances past
    /// the stored reset date. When the daily cap denies, the minute
    /// window is left untouched; window entries older than 60 seconds
    /// are purged before the minute check, never after. A denial only
    /// skips the current cycle — nothing is queued or retried.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today > self.reset_date {
            self.reset_date = today;
            self.daily_count = 0;
        }

        if self.daily_count >= self.daily_threshold {
            return false;
        }

        let cutoff = now - Duration::seconds(WINDOW_SECS);
        while self.window.front().is_some_and(|t| *t < cutoff) {
            self.window.pop_front();
        }

        if (self.window.len() as u32) < self.minute_threshold {
            self.window.push_back(now);
            self.daily_count += 1;
            true
        } else {
            false
        }
    }

    /// Requests granted since the last daily reset.
    pub fn daily_count(&self) -> u32 {
        self.daily_count
    }
}
