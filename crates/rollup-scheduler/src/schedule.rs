use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::types::DailySchedule;

/// Compute the next UTC execution time for `schedule` strictly *after* `from`.
///
/// Returns `None` only when the wall-clock time is out of range.
pub fn compute_next_run(schedule: &DailySchedule, tz: Tz, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(schedule.hour as u32, schedule.minute as u32, 0)?;
    let today = from.with_timezone(&tz).date_naive();

    (0..=2)
        .filter_map(|offset| resolve_local(tz, (today + Duration::days(offset)).and_time(time)))
        .find(|candidate| *candidate > from)
}

/// Map a local wall-clock time to UTC.
///
/// Ambiguous times resolve to the earlier instant. Times inside a DST gap move
/// forward to the first minute that exists.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => (1..=180)
            .find_map(|m| tz.from_local_datetime(&(naive + Duration::minutes(m))).earliest())
            .map(|dt| dt.with_timezone(&Utc)),
    }
}
