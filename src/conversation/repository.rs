use std::sync::Arc;

use serde_json::json;

use crate::backend::error::BackendError;
use crate::backend::query::{QueryRequest, select_one};
use crate::backend::ChatBackend;
use crate::init::singletons::CURRENT_USER_ID;
use crate::models::chat::Chat;
use crate::models::message::MessageKind;

/// Data access for one conversation: the chat row and its messages.
#[derive(Clone)]
pub struct MessageRepository {
    client: Arc<dyn ChatBackend>,
}

impl MessageRepository {
    pub fn new(client: Arc<dyn ChatBackend>) -> Self {
        Self { client }
    }

    /// The existing chat with the given peer, on whichever side of the pair
    /// they are. `Ok(None)` means no chat exists yet; the caller then defers
    /// creation to the first send instead of treating this as a failure.
    pub async fn chat_by_peer(&self, peer_id: &str) -> Result<Option<Chat>, BackendError> {
        select_one(
            self.client.query(),
            "chats",
            QueryRequest::new()
                .any_eq("user1", peer_id)
                .any_eq("user2", peer_id),
        )
        .await
    }

    /// Creates the chat row with the given peer. The backend fills in the
    /// current user as the other side.
    pub async fn create_chat(&self, peer_id: &str) -> Result<Chat, BackendError> {
        let row = self
            .client
            .query()
            .insert("chats", json!({ "user2": peer_id }))
            .await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<(), BackendError> {
        self.client
            .query()
            .delete("chats", vec![("id".to_owned(), json!(chat_id))])
            .await
    }

    /// Inserts a message row. The stored row comes back on the live feed;
    /// there is no local echo.
    pub async fn insert_message(
        &self,
        chat_id: i64,
        content: &str,
        kind: MessageKind,
        seen: bool,
    ) -> Result<(), BackendError> {
        let author_id = CURRENT_USER_ID.get().cloned();
        self.client
            .query()
            .insert(
                "messages",
                json!({
                    "chat_id": chat_id,
                    "author_id": author_id,
                    "content": content,
                    "type": kind,
                    "seen": seen,
                }),
            )
            .await?;
        Ok(())
    }

    /// Flips the seen flag server-side. The rewritten row comes back as an
    /// update event on the live feed.
    pub async fn set_message_seen(&self, message_id: i64) -> Result<(), BackendError> {
        self.client
            .query()
            .update(
                "messages",
                json!({ "seen": true }),
                vec![("id".to_owned(), json!(message_id))],
            )
            .await
    }
}
