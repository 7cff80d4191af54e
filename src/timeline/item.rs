use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::backend::query::PaginationToken;

/// The record-side contract the timeline engine needs: a unique id, a
/// recency timestamp for day bucketing, and the cursor boundary value used
/// to request the page after this record.
///
/// Implemented by both row types so one engine serves the message thread and
/// the chat list.
pub trait TimelineRecord: Clone + Send + Sync + 'static {
    /// Backend-assigned identifier, unique within one context.
    fn record_id(&self) -> i64;

    /// ISO-8601 recency timestamp. Records without a parseable timestamp are
    /// dropped by the engine.
    fn timestamp(&self) -> Option<&str>;

    /// The cursor boundary for the next older page.
    fn pagination_token(&self) -> PaginationToken;
}

/// One entry of a rendered timeline: either a real record or a synthetic
/// divider between two days.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "kind",
    content = "value"
)]
pub enum TimelineItem<R> {
    /// A record rendered as a regular row.
    Content(R),
    /// A divider carrying a day label ("Today", "Yesterday", or a date).
    ///
    /// In the newest-first list, every maximal run of same-day content is
    /// followed by exactly one divider for that day, so that a reversed list
    /// view shows the label above its day's rows.
    DateSeparator(String),
}

impl<R> TimelineItem<R> {
    pub fn as_content(&self) -> Option<&R> {
        match self {
            TimelineItem::Content(record) => Some(record),
            TimelineItem::DateSeparator(_) => None,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, TimelineItem::DateSeparator(_))
    }
}

/// Maps a timestamp to its day label: "Today", "Yesterday", or `dd/mm/yyyy`.
///
/// `today` is pinned by the caller so that a timeline keeps bucketing
/// consistently for its whole lifetime. Returns `None` for timestamps that
/// cannot be parsed.
pub fn day_bucket(timestamp: &str, today: NaiveDate) -> Option<String> {
    let date = parse_day(timestamp)?;
    if date == today {
        Some("Today".to_owned())
    } else if Some(date) == today.pred_opt() {
        Some("Yesterday".to_owned())
    } else {
        Some(date.format("%d/%m/%Y").to_string())
    }
}

pub(crate) fn parse_day(timestamp: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.naive_utc().date())
        .or_else(|_| {
            // Backends sometimes emit timestamps without a zone offset.
            NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date())
        })
        .ok()
}
