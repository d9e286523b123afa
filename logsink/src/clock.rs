use std::sync::atomic::{AtomicI64, Ordering};
use time::OffsetDateTime;

/// Source of wall-clock time for rotation decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    fn now_nanos(&self) -> i64 {
        let nanos = self.now().unix_timestamp_nanos();
        i64::try_from(nanos).unwrap_or(i64::MAX)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new(nanos: i64) -> ManualClock {
        ManualClock {
            nanos: AtomicI64::new(nanos),
        }
    }

    pub fn from_datetime(date: OffsetDateTime) -> ManualClock {
        let nanos = i64::try_from(date.unix_timestamp_nanos()).unwrap_or(i64::MAX);
        ManualClock::new(nanos)
    }

    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, duration: std::time::Duration) {
        let delta = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.nanos.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        let nanos = self.nanos.load(Ordering::SeqCst);
        OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
