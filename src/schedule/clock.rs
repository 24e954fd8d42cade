use crate::config::ScheduleConfig;
use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Display format for the next shutdown time, e.g. "05:00 Oct 17"
pub const DISPLAY_FORMAT: &str = "%H:%M %b %-d";

/// The first instant the shutdown clock should fire, seen from `now`.
///
/// In uptime mode this is `now` plus the configured hours and minutes. In
/// wall-clock mode it is today at `hour:minute:00`, or the same time
/// tomorrow when that has already passed.
pub fn next_shutdown_at<Z: TimeZone>(now: &DateTime<Z>, schedule: &ScheduleConfig) -> DateTime<Z> {
    if schedule.uptime {
        return now.clone()
            + Duration::hours(i64::from(schedule.hour))
            + Duration::minutes(i64::from(schedule.minute));
    }

    let tz = now.timezone();
    let at = NaiveTime::from_hms_opt(schedule.hour, schedule.minute, 0).unwrap_or_default();
    let today = now.date_naive();

    let candidate = resolve_local(&tz, today.and_time(at));
    if candidate >= *now {
        return candidate;
    }

    match today.succ_opt() {
        Some(tomorrow) => resolve_local(&tz, tomorrow.and_time(at)),
        None => candidate + Duration::days(1),
    }
}

/// Next shutdown in UTC, plus its display form in the schedule's timezone.
/// Uses the machine's local time unless `schedule.timezone` names a zone.
pub fn first_fire(now: DateTime<Utc>, schedule: &ScheduleConfig) -> (DateTime<Utc>, String) {
    match schedule
        .timezone
        .as_deref()
        .and_then(|name| name.parse::<Tz>().ok())
    {
        Some(tz) => {
            let at = next_shutdown_at(&now.with_timezone(&tz), schedule);
            (at.with_timezone(&Utc), at.format(DISPLAY_FORMAT).to_string())
        }
        None => {
            let at = next_shutdown_at(&now.with_timezone(&Local), schedule);
            (at.with_timezone(&Utc), at.format(DISPLAY_FORMAT).to_string())
        }
    }
}

/// Map a local wall-clock time to an instant. Ambiguous times (clocks going
/// back) take the earlier instant; times skipped by a DST jump are shifted
/// forward by the size of the jump, so 02:30 in a 02:00-03:00 gap is 03:30.
fn resolve_local<Z: TimeZone>(tz: &Z, naive: NaiveDateTime) -> DateTime<Z> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before_gap = tz
                .from_local_datetime(&(naive - Duration::hours(3)))
                .earliest()
                .map(|at| at.offset().fix().local_minus_utc())
                .unwrap_or(0);
            tz.from_utc_datetime(&(naive - Duration::seconds(i64::from(before_gap))))
        }
    }
}
