//! Timestamp source for audit fields

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of audit timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

static LAST_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Wall clock truncated to microseconds, strictly increasing per process
///
/// Two calls never return the same instant, so a mutation always moves
/// `updated_at` forward even within one clock tick. Microseconds match
/// what SQL timestamp columns keep.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = LAST_MICROS.load(Ordering::Relaxed);
        loop {
            let next = if wall > last { wall } else { last + 1 };
            match LAST_MICROS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return DateTime::<Utc>::from_timestamp_micros(next).unwrap_or_else(Utc::now),
                Err(current) => last = current,
            }
        }
    }
}
