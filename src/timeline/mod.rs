mod item;
mod merger;
mod paginator;

pub use item::{TimelineItem, TimelineRecord, day_bucket};
pub use merger::{Timeline, TimelineMutation, UpdatePolicy};
pub use paginator::CursorPaginator;

use serde::Serialize;

use crate::backend::realtime::ChannelState;

/// The possible background updates delivered to the UI for one timeline
/// context (a conversation or the chat list).
///
/// These are sent through the context's update channel by the worker and
/// feed tasks, and drained by the adapter's event loop whenever the global
/// refresh signal fires.
#[derive(Debug, Clone, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "event",
    content = "data"
)]
pub enum TimelineUpdate {
    /// One batch of list mutations was applied to the timeline. Indices are
    /// valid against the list state right before the batch, in order, so a
    /// list view can replay them as minimal diffs.
    Mutations(Vec<TimelineMutation>),
    /// A backward pagination request was started.
    PaginationRunning,
    /// A backward pagination request finished. `fully_paginated` is set once
    /// the start of history was reached; further requests are no-ops.
    PaginationIdle { fully_paginated: bool },
    /// A backward pagination request failed. `network` distinguishes
    /// connectivity failures, which deserve a retry affordance.
    PaginationError { message: String, network: bool },
    /// The set of participant ids currently present on the channel changed.
    PresenceChanged { present: Vec<String> },
    /// The live feed channel moved to a new join state.
    ChannelStateChanged(ChannelState),
}
