use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::timeline::day_bucket;

/// Short recency label for list rows: the clock time for today, "Yesterday",
/// otherwise the date. `None` for unparseable timestamps.
pub fn time_or_date_label(timestamp: &str, today: NaiveDate) -> Option<String> {
    let (date, time) = parse_date_time(timestamp)?;
    if date == today {
        Some(time.format("%H:%M").to_string())
    } else {
        day_bucket(timestamp, today)
    }
}

/// The clock time of a timestamp, for message rows.
pub fn time_label(timestamp: &str) -> Option<String> {
    let (_, time) = parse_date_time(timestamp)?;
    Some(time.format("%H:%M").to_string())
}

fn parse_date_time(timestamp: &str) -> Option<(NaiveDate, NaiveTime)> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|dt| (dt.date(), dt.time()))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_recency() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            time_or_date_label("2024-01-03T14:32:00+00:00", today).as_deref(),
            Some("14:32")
        );
        assert_eq!(
            time_or_date_label("2024-01-02T08:00:00+00:00", today).as_deref(),
            Some("Yesterday")
        );
        assert_eq!(
            time_or_date_label("2023-11-20T08:00:00+00:00", today).as_deref(),
            Some("20/11/2023")
        );
        assert_eq!(time_label("2024-01-03T14:32:00+00:00").as_deref(), Some("14:32"));
        assert_eq!(time_or_date_label("garbage", today), None);
    }
}
