use chrono::{DateTime, Utc};

/// Whole hours by which `now` is past `promised`; 0 when on time or early.
pub fn lateness_hours(promised: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    if now <= promised {
        return 0;
    }
    // num_hours truncates toward zero; the span is positive here
    (now - promised).num_hours().unsigned_abs()
}
