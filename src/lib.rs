use serde::{Serialize, ser::Serializer};

pub mod backend;
pub mod chats;
pub mod conversation;
pub(crate) mod events;
pub mod init;
pub mod models;
pub mod timeline;
pub(crate) mod utils;

pub type Result<T> = std::result::Result<T, Error>;

/// chat-ui-core Error enum
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error(transparent)]
    Backend(#[from] backend::BackendError),
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

// Re-exports

pub use backend::{
    BackendError, ChatBackend,
    query::{PaginationToken, QueryRequest, TableQuery},
    realtime::{
        ChangeEvent, ChangeFeed, ChangeKind, ChangeKinds, ChannelSpec, ChannelState,
        ConnectionState, EventChannel, PresenceDiff, PresenceState,
    },
    storage::{BlobStore, UploadEvent},
};
pub use chats::session::{ChatListSession, ChatsCollectionStatus};
pub use conversation::media::{MediaUpload, UploadState};
pub use conversation::session::ConversationSession;
pub use events::notifications::{
    ToastNotification, ToastNotificationVariant, drain_toast_notifications,
};
pub use events::presence::PresenceSet;
pub use init::singletons::{UIUpdateMessage, subscribe_to_events};
pub use models::message::{Message, MessageKind};
pub use models::requests::ChatRequest;
pub use models::{chat::Chat, profile::Profile};
pub use timeline::{
    CursorPaginator, Timeline, TimelineItem, TimelineMutation, TimelineRecord, TimelineUpdate,
    UpdatePolicy,
};

// The adapter needs some channel types to wire its own event loop
pub use tokio::sync::mpsc;
pub use tokio::sync::oneshot;
pub use tokio::sync::watch;
