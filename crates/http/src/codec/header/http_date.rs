//! `Date` header values.
//!
//! Formatting an IMF-fixdate for every response is wasted work when thousands
//! of responses go out within the same second, so the formatted value is
//! cached process-wide and swapped whenever the wall clock enters a new second.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use httpdate::fmt_http_date;
use once_cell::sync::Lazy;

struct CachedDate {
    second: u64,
    value: String,
}

impl CachedDate {
    fn at(now: SystemTime) -> Self {
        Self { second: unix_second(now), value: fmt_http_date(now) }
    }
}

static CURRENT: Lazy<ArcSwap<CachedDate>> = Lazy::new(|| ArcSwap::from_pointee(CachedDate::at(SystemTime::now())));

fn unix_second(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

/// Calls `f` with the current date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub(crate) fn with_http_date<F, R>(f: F) -> R
where
    F: FnOnce(&str) -> R,
{
    let now = SystemTime::now();
    let current = CURRENT.load();
    if current.second == unix_second(now) {
        return f(&current.value);
    }

    let fresh = Arc::new(CachedDate::at(now));
    CURRENT.store(Arc::clone(&fresh));
    f(&fresh.value)
}
