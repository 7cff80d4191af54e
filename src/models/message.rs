use serde::{Deserialize, Serialize};

use crate::backend::query::PaginationToken;
use crate::models::profile::Profile;
use crate::timeline::TimelineRecord;

/// What a message row carries: plain text, or a public URL to an uploaded
/// image or video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    Image,
    Video,
}

/// One message row, as stored by the backend.
///
/// Rows are immutable once created except for the `seen` flag, which the
/// recipient flips server-side; an in-place timeline update carries the
/// rewritten row back to the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Message {
    pub id: i64,
    pub author_id: Option<String>,
    pub chat_id: i64,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub created_at: Option<String>,
    #[serde(default)]
    pub seen: bool,
    /// Joined author projection; present on paged rows, absent on live
    /// change-feed records.
    #[serde(rename = "profiles")]
    pub author: Option<Profile>,
}

impl TimelineRecord for Message {
    fn record_id(&self) -> i64 {
        self.id
    }

    fn timestamp(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    fn pagination_token(&self) -> PaginationToken {
        PaginationToken::Id(self.id)
    }
}
