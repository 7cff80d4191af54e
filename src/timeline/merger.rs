use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use super::item::{TimelineItem, TimelineRecord, day_bucket};

/// Minimal list-view mutations, emitted by every timeline operation so the
/// adapter can patch its rendered list instead of re-diffing snapshots.
///
/// Indices refer to the list state at the moment the mutation applies;
/// mutations of one batch must be replayed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "op")]
pub enum TimelineMutation {
    /// A single item was inserted at `index`.
    Insert { index: usize },
    /// `len` items were inserted contiguously starting at `index`.
    InsertRange { index: usize, len: usize },
    /// The item at `index` was removed.
    Remove { index: usize },
    /// The item at `index` was replaced in place.
    Replace { index: usize },
    /// The whole list changed; re-render from a fresh snapshot.
    Reset,
}

/// How live update events touch an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Replace the row in place; its position is governed by creation order.
    /// Used by message threads (e.g. a seen-flag flip).
    InPlace,
    /// Remove the row and re-insert it at the head: new activity re-surfaces
    /// a chat at the top of the list.
    Resurface,
}

/// An ordered, newest-first list of records interleaved with day separators,
/// fed from two directions: pages of older history appended at the tail and
/// live events arriving at the head.
///
/// Exactly one instance exists per context and all mutations go through its
/// owner's lock; the separator bookkeeping below is not safe under
/// concurrent writers.
#[derive(Debug)]
pub struct Timeline<R: TimelineRecord> {
    items: Vec<TimelineItem<R>>,
    /// Ids of every loaded record. Any batch or live insert is checked
    /// against this set first, whatever its source.
    loaded_ids: HashSet<i64>,
    update_policy: UpdatePolicy,
    /// Pinned at creation so bucketing stays consistent across a session.
    today: NaiveDate,
}

impl<R: TimelineRecord> Timeline<R> {
    pub fn new(update_policy: UpdatePolicy) -> Self {
        Self::with_today(update_policy, chrono::Utc::now().date_naive())
    }

    pub fn with_today(update_policy: UpdatePolicy, today: NaiveDate) -> Self {
        Self {
            items: Vec::new(),
            loaded_ids: HashSet::new(),
            update_policy,
            today,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TimelineItem<R>] {
        &self.items
    }

    pub fn contains(&self, record_id: i64) -> bool {
        self.loaded_ids.contains(&record_id)
    }

    /// Number of content items (separators excluded).
    pub fn content_len(&self) -> usize {
        self.loaded_ids.len()
    }

    /// The loaded record with the given id, if any.
    pub fn record(&self, record_id: i64) -> Option<&R> {
        self.items.iter().find_map(|item| {
            item.as_content()
                .filter(|record| record.record_id() == record_id)
        })
    }

    /// A cloned view of the list, for rendering. The owner's lock makes this
    /// safe to take while mutations are in flight.
    pub fn snapshot(&self) -> Vec<TimelineItem<R>> {
        self.items.clone()
    }

    /// Appends one page of older records (newest-first within the page) at
    /// the tail, weaving in day separators.
    ///
    /// The subtle part is the page boundary: the previous page closed with a
    /// separator for its oldest bucket, but whether that bucket's run is
    /// really over is only known now. If this page continues the same
    /// bucket, the trailing separator is retracted and re-emitted once the
    /// run actually ends. The page again closes with a separator for its own
    /// last bucket.
    ///
    /// Records already loaded, and records without a usable timestamp, are
    /// dropped. Re-applying a page is therefore a no-op.
    pub fn apply_page(&mut self, records: Vec<R>) -> Vec<TimelineMutation> {
        let mut fresh = Vec::with_capacity(records.len());
        for record in records {
            if self.loaded_ids.contains(&record.record_id()) {
                debug!("skipping already-loaded record {}", record.record_id());
                continue;
            }
            match self.bucket_of(&record) {
                Some(bucket) => fresh.push((record, bucket)),
                None => warn!(
                    "dropping record {} without a usable timestamp",
                    record.record_id()
                ),
            }
        }
        if fresh.is_empty() {
            return Vec::new();
        }

        let mut mutations = Vec::new();

        // `open` is the bucket whose run is still missing its separator.
        let mut open: Option<String> = None;
        let continues_tail_bucket = matches!(
            self.items.last(),
            Some(TimelineItem::DateSeparator(tail)) if *tail == fresh[0].1
        );
        if continues_tail_bucket {
            let index = self.items.len() - 1;
            self.items.pop();
            mutations.push(TimelineMutation::Remove { index });
            open = Some(fresh[0].1.clone());
        }

        let start = self.items.len();
        for (record, bucket) in fresh {
            match &open {
                Some(current) if *current != bucket => {
                    self.items
                        .push(TimelineItem::DateSeparator(current.clone()));
                    open = Some(bucket);
                }
                Some(_) => {}
                None => open = Some(bucket),
            }
            self.loaded_ids.insert(record.record_id());
            self.items.push(TimelineItem::Content(record));
        }
        if let Some(last) = open {
            self.items.push(TimelineItem::DateSeparator(last));
        }

        mutations.push(TimelineMutation::InsertRange {
            index: start,
            len: self.items.len() - start,
        });
        mutations
    }

    /// Prepends a record that just arrived on the live feed.
    ///
    /// If the record shares the day of the current head run it joins that
    /// run; otherwise it opens a new run, whose separator goes between the
    /// new item and the old head.
    pub fn apply_insert(&mut self, record: R) -> Vec<TimelineMutation> {
        if self.loaded_ids.contains(&record.record_id()) {
            debug!(
                "skipping duplicate live insert for record {}",
                record.record_id()
            );
            return Vec::new();
        }
        let Some(bucket) = self.bucket_of(&record) else {
            warn!(
                "dropping live record {} without a usable timestamp",
                record.record_id()
            );
            return Vec::new();
        };

        let head_bucket = self
            .items
            .iter()
            .find_map(|item| item.as_content())
            .and_then(|head| self.bucket_of(head));

        self.loaded_ids.insert(record.record_id());
        self.items.insert(0, TimelineItem::Content(record));
        let mut mutations = vec![TimelineMutation::Insert { index: 0 }];

        match head_bucket {
            Some(previous) if previous == bucket => {}
            Some(_) => {
                self.items.insert(1, TimelineItem::DateSeparator(bucket));
                mutations.push(TimelineMutation::Insert { index: 1 });
            }
            None => {
                // First record overall: close its run at the tail.
                let index = self.items.len();
                self.items.push(TimelineItem::DateSeparator(bucket));
                mutations.push(TimelineMutation::Insert { index });
            }
        }
        mutations
    }

    /// Applies a live update event for an already-created record, according
    /// to this timeline's [`UpdatePolicy`]. Updates for records outside the
    /// loaded window are dropped.
    pub fn apply_update(&mut self, record: R) -> Vec<TimelineMutation> {
        match self.update_policy {
            UpdatePolicy::InPlace => {
                let Some(index) = self.position_of(record.record_id()) else {
                    debug!(
                        "update for record {} outside the loaded window",
                        record.record_id()
                    );
                    return Vec::new();
                };
                self.items[index] = TimelineItem::Content(record);
                vec![TimelineMutation::Replace { index }]
            }
            UpdatePolicy::Resurface => {
                let mut mutations = self.apply_remove(record.record_id());
                mutations.extend(self.apply_insert(record));
                mutations
            }
        }
    }

    /// Removes the record with the given id, along with its day separator if
    /// the removal emptied the run.
    pub fn apply_remove(&mut self, record_id: i64) -> Vec<TimelineMutation> {
        let Some(index) = self.position_of(record_id) else {
            debug!("remove for record {record_id} outside the loaded window");
            return Vec::new();
        };
        self.items.remove(index);
        self.loaded_ids.remove(&record_id);
        let mut mutations = vec![TimelineMutation::Remove { index }];

        // The run's separator is orphaned when nothing of the run remains
        // above it: it now either starts the list or directly follows the
        // previous run's separator.
        let orphaned = match self.items.get(index) {
            Some(item) if item.is_separator() => {
                index == 0 || self.items[index - 1].is_separator()
            }
            _ => false,
        };
        if orphaned {
            self.items.remove(index);
            mutations.push(TimelineMutation::Remove { index });
        }
        mutations
    }

    /// Drops everything, e.g. before reloading the first page.
    pub fn clear(&mut self) -> Vec<TimelineMutation> {
        if self.items.is_empty() {
            return Vec::new();
        }
        self.items.clear();
        self.loaded_ids.clear();
        vec![TimelineMutation::Reset]
    }

    fn bucket_of(&self, record: &R) -> Option<String> {
        record
            .timestamp()
            .and_then(|timestamp| day_bucket(timestamp, self.today))
    }

    fn position_of(&self, record_id: i64) -> Option<usize> {
        self.items.iter().position(|item| {
            item.as_content()
                .is_some_and(|record| record.record_id() == record_id)
        })
    }
}
