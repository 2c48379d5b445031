use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Weekday};

/// Longest stretch of non-existent wall-clock time we are willing to skip.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Pin a wall-clock date and time to an instant in `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times that
/// fall inside a DST gap move forward to the first wall-clock minute that
/// exists.
pub fn localize<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..MAX_GAP_MINUTES {
                probe += Duration::minutes(1);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt;
                }
            }
            tz.from_utc_datetime(&naive)
        }
    }
}

/// Local midnight of the Monday that opens the week containing `now`.
pub fn cycle_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    localize(
        &now.timezone(),
        week_start(now.date_naive()),
        NaiveTime::MIN,
    )
}

/// First occurrence of `time` strictly after `now`.
pub fn next_daily<Tz: TimeZone>(now: &DateTime<Tz>, time: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = localize(&tz, today, time);
    if candidate > *now {
        return candidate;
    }
    localize(&tz, today + Duration::days(1), time)
}

/// First occurrence of `weekday` at `time` strictly after `now`.
pub fn next_weekly<Tz: TimeZone>(
    now: &DateTime<Tz>,
    weekday: Weekday,
    time: NaiveTime,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let days_ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    let day = today + Duration::days(i64::from(days_ahead));
    let candidate = localize(&tz, day, time);
    if candidate > *now {
        return candidate;
    }
    localize(&tz, day + Duration::days(7), time)
}
