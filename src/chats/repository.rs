use std::sync::Arc;

use serde_json::json;

use crate::backend::ChatBackend;
use crate::backend::error::BackendError;
use crate::backend::query::{QueryRequest, select_one};
use crate::models::{chat::Chat, message::Message, profile::Profile};

/// Data access for the inbox: the denormalized chat list view and the point
/// lookups the chat feed needs to resolve its events.
#[derive(Clone)]
pub struct ChatsRepository {
    client: Arc<dyn ChatBackend>,
}

impl ChatsRepository {
    pub fn new(client: Arc<dyn ChatBackend>) -> Self {
        Self { client }
    }

    /// The full inbox row for one chat, with the view-only peer columns.
    pub async fn inbox_chat_by_id(&self, chat_id: i64) -> Result<Option<Chat>, BackendError> {
        select_one(
            self.client.query(),
            "inbox",
            QueryRequest::new().eq("id", json!(chat_id)),
        )
        .await
    }

    /// The message a chat's last-message summary points at.
    pub async fn message_by_id(&self, message_id: i64) -> Result<Option<Message>, BackendError> {
        select_one(
            self.client.query(),
            "messages",
            QueryRequest::new().eq("id", json!(message_id)),
        )
        .await
    }

    /// Exact-email profile lookup for the start-chat flow. `Ok(None)` means
    /// no such user; the caller treats that as a valid answer.
    pub async fn search_profile_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Profile>, BackendError> {
        select_one(
            self.client.query(),
            "profiles",
            QueryRequest::new()
                .eq("email", email)
                .projection("id, name, email, profile_image"),
        )
        .await
    }
}
