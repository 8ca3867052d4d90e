use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::HippoError;
use crate::rate_limit::{RateLimitStore, SharedRecord};
use crate::window::{self, FIVE_MINUTE_SECS, HOUR_SECS};

// Source of "now" for window evaluation
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// A clock that only moves when told to
#[cfg(test)]
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// Configured hourly ceiling, the five-minute one is derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub hourly: u32,
}

impl RateLimit {
    pub fn new(hourly: u32) -> Self {
        Self { hourly }
    }

    // ceil(hourly / 2)
    pub fn five_minute(&self) -> u32 {
        self.hourly.div_ceil(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitResult {
    Admitted,
    RateLimited,
    // no webhook or no limit configured, storage untouched
    Disabled,
}

#[derive(Clone)]
pub struct NotificationGate {
    record: SharedRecord,
    limit: Option<RateLimit>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NotificationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationGate")
            .field("record", &self.record)
            .field("limit", &self.limit)
            .finish()
    }
}

impl NotificationGate {
    // `limit = None` disables the gate
    pub fn new(cache_dir: impl AsRef<Path>, limit: Option<RateLimit>) -> Self {
        Self::with_clock(cache_dir, limit, Arc::new(SystemClock))
    }

    pub fn with_clock(
        cache_dir: impl AsRef<Path>,
        limit: Option<RateLimit>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            record: SharedRecord::in_dir(cache_dir),
            limit,
            clock,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit.is_some()
    }

    pub fn record(&self) -> &SharedRecord {
        &self.record
    }

    /// Blocks on the record lock. Resets are persisted even on denial, counts
    /// only move when both windows admit.
    pub fn try_admit(&self) -> Result<AdmitResult, HippoError> {
        let Some(limit) = self.limit else {
            return Ok(AdmitResult::Disabled);
        };

        let mut locked = self.record.lock()?;
        let now = self.clock.now();
        let store = locked.load_or_default(now);

        let (hourly, hourly_ok) = window::evaluate(
            store.hourly,
            now,
            TimeDelta::seconds(HOUR_SECS),
            limit.hourly,
        );
        let (five_minute, five_minute_ok) = window::evaluate(
            store.five_minute,
            now,
            TimeDelta::seconds(FIVE_MINUTE_SECS),
            limit.five_minute(),
        );

        let mut next = RateLimitStore {
            hourly,
            five_minute,
        };

        let result = if hourly_ok && five_minute_ok {
            next.hourly.count = next.hourly.count.saturating_add(1);
            next.five_minute.count = next.five_minute.count.saturating_add(1);
            AdmitResult::Admitted
        } else {
            tracing::debug!(
                hourly_count = next.hourly.count,
                five_minute_count = next.five_minute.count,
                hourly_ok,
                five_minute_ok,
                "Notification rate limited"
            );
            AdmitResult::RateLimited
        };

        if next != store {
            locked.persist(&next)?;
        }

        Ok(result)
    }
}
