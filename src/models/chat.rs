use serde::{Deserialize, Serialize};

use crate::backend::query::PaginationToken;
use crate::models::message::MessageKind;
use crate::timeline::TimelineRecord;

/// One row of the inbox view: a chat between the current user and one peer,
/// denormalized with its last-message summary and the peer's display fields.
///
/// Rows coming straight off the `chats` change feed lack the view-only
/// columns (`name`, `profile_image`); those arrive as `None` and the
/// reconciler resolves the full row before the list ever sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Chat {
    pub id: i64,
    pub user1: Option<String>,
    pub user2: String,
    pub last_message_id: Option<i64>,
    pub last_message_author_id: Option<String>,
    pub last_message_content: Option<String>,
    pub last_message_seen: Option<bool>,
    #[serde(rename = "last_message_type")]
    pub last_message_kind: Option<MessageKind>,
    #[serde(rename = "name")]
    pub other_user_name: Option<String>,
    #[serde(rename = "profile_image")]
    pub other_user_profile_image: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Chat {
    /// The peer's id, from whichever side of the pair is not `me`.
    pub fn peer_of(&self, me: &str) -> Option<&str> {
        match self.user1.as_deref() {
            Some(user1) if user1 != me => Some(user1),
            _ if self.user2 != me => Some(&self.user2),
            _ => None,
        }
    }

    /// Short recency label for the inbox row ("14:32", "Yesterday", a date).
    pub fn updated_label(&self, today: chrono::NaiveDate) -> Option<String> {
        crate::utils::time_or_date_label(self.updated_at.as_deref()?, today)
    }
}

impl TimelineRecord for Chat {
    fn record_id(&self) -> i64 {
        self.id
    }

    fn timestamp(&self) -> Option<&str> {
        // Inbox recency follows activity, not creation.
        self.updated_at.as_deref().or(self.created_at.as_deref())
    }

    fn pagination_token(&self) -> PaginationToken {
        PaginationToken::Timestamp(
            self.updated_at
                .clone()
                .or_else(|| self.created_at.clone())
                .unwrap_or_default(),
        )
    }
}
