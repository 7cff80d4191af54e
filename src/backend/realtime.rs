use std::sync::Arc;

use async_trait::async_trait;
use bitflags::bitflags;
use eyeball::Subscriber;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::BackendError;

/// State of the process-wide realtime transport.
///
/// This is independent from the per-context [`ChannelState`]: one connection
/// carries many channels, and tearing down a context must never touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Join lifecycle of one logical subscription topic.
///
/// A channel may only be joined while the connection is `Connected`. When the
/// connection drops, every channel falls back to `Idle` and has to be
/// rejoined by whoever owns it; the transport does not rejoin on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelState {
    Idle,
    Joining,
    Joined,
    Left,
    Errored,
}

bitflags! {
    /// Which row-level change kinds a subscription should deliver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChangeKinds: u8 {
        const INSERT = 0b001;
        const UPDATE = 0b010;
        const DELETE = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change delivered on a channel.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    /// The row after the change. Empty for deletes on backends that only
    /// replicate the old row.
    pub record: Value,
    /// The row before the change, when the backend replicates it.
    pub old_record: Option<Value>,
}

/// Identifies a subscription topic and the table changes it should carry.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub topic: String,
    pub schema: String,
    pub table: String,
    pub kinds: ChangeKinds,
}

impl ChannelSpec {
    pub fn new(topic: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            schema: "public".to_owned(),
            table: table.into(),
            kinds: ChangeKinds::all(),
        }
    }
}

/// The payload a participant announces about itself on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceState {
    pub uid: String,
}

/// One batch of join/leave deltas on a channel's presence sub-feed.
#[derive(Debug, Clone, Default)]
pub struct PresenceDiff {
    pub joins: Vec<PresenceState>,
    pub leaves: Vec<PresenceState>,
}

pub type EventStream = BoxStream<'static, ChangeEvent>;
pub type PresenceStream = BoxStream<'static, PresenceDiff>;

/// One joined (or joinable) subscription topic.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Joins the channel. Events are only guaranteed to be delivered after
    /// this resolves. Fails when the connection is not up.
    async fn join(&self) -> Result<(), BackendError>;

    /// Leaves the channel and releases the server-side subscription.
    async fn leave(&self) -> Result<(), BackendError>;

    /// Observable join state, for gating UI actions on connected-and-joined.
    fn state(&self) -> Subscriber<ChannelState>;

    /// The stream of row-level changes. Take it once, before `join`.
    fn events(&self) -> EventStream;

    /// The parallel presence sub-feed of join/leave deltas.
    fn presence(&self) -> PresenceStream;

    /// Announces the given presence payload for the current participant.
    async fn track(&self, state: PresenceState) -> Result<(), BackendError>;
}

/// The realtime transport: one process-wide connection, many channels.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn connect(&self) -> Result<(), BackendError>;

    async fn disconnect(&self);

    /// Observable transport state.
    fn connection_state(&self) -> Subscriber<ConnectionState>;

    /// Creates a channel handle for the given spec. Creation is cheap and
    /// does not join; the caller drives the join/leave lifecycle.
    fn channel(&self, spec: ChannelSpec) -> Arc<dyn EventChannel>;
}
