use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone,
    Utc,
};
use chrono_tz::Tz;

/// Clinic-local calendar date of an instant.
pub fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => at.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Midnight can fall inside a DST gap; the day then starts an hour later.
        LocalResult::None => resolve_local(naive + Duration::hours(1), tz),
    }
}

/// `[start, end)` in UTC covering one clinic-local calendar day.
pub fn local_day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = resolve_local(date.and_hms_opt(0, 0, 0).unwrap_or_default(), tz);
    let next = date.succ_opt().unwrap_or(date);
    let end = resolve_local(next.and_hms_opt(0, 0, 0).unwrap_or_default(), tz);
    (start, end)
}

/// Start of the clinic-local day `days_back` days before `now`'s day.
pub fn local_day_start(now: DateTime<Utc>, tz: Tz, days_back: i64) -> DateTime<Utc> {
    let date = local_date(now, tz) - Duration::days(days_back);
    local_day_bounds(date, tz).0
}

/// Start of the clinic-local month containing `now`.
pub fn local_month_start(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let date = local_date(now, tz);
    let first = date.with_day(1).unwrap_or(date);
    local_day_bounds(first, tz).0
}

/// UTC timestamp safe to embed in a PostgREST query string (no `+` offset).
pub fn query_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a `YYYY-MM-DD` filter value, ignoring anything malformed.
pub fn parse_filter_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bounds_follow_clinic_offset() {
        let tz = chrono_tz::America::Santiago;
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let (start, end) = local_day_bounds(date, tz);

        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 16, 3, 0, 0).unwrap());
    }

    #[test]
    fn query_timestamps_use_zulu() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
        assert_eq!(query_timestamp(at), "2025-01-15T03:00:00Z");
    }

    #[test]
    fn filter_dates_ignore_garbage() {
        assert_eq!(
            parse_filter_date(Some("2025-03-01")),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert_eq!(parse_filter_date(Some("01/03/2025")), None);
        assert_eq!(parse_filter_date(Some("")), None);
        assert_eq!(parse_filter_date(None), None);
    }

    #[test]
    fn month_start_is_first_local_day() {
        let tz = chrono_tz::America::Santiago;
        let now = Utc.with_ymd_and_hms(2025, 1, 20, 15, 0, 0).unwrap();
        assert_eq!(
            local_month_start(now, tz),
            Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap()
        );
    }
}
