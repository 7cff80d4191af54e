use std::{
    collections::BTreeMap,
    sync::{Mutex, OnceLock},
};

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc::UnboundedSender};

use crate::backend::ChatBackend;
use crate::conversation::session::ConversationHandle;
use crate::models::requests::ChatRequest;

/// The backend client, shared process-wide. Contexts come and go; this (and
/// its realtime connection) outlives them all.
pub static CLIENT: OnceLock<Arc<dyn ChatBackend>> = OnceLock::new();

pub fn get_client() -> Option<Arc<dyn ChatBackend>> {
    CLIENT.get().cloned()
}

/// The id of the logged-in user, set once at init.
pub static CURRENT_USER_ID: OnceLock<String> = OnceLock::new();

/// The sender used by `submit_async_request` to reach the worker task.
/// Currently there is only one, but it can be cloned if we need more
/// concurrent senders.
pub static REQUEST_SENDER: OnceLock<UnboundedSender<ChatRequest>> = OnceLock::new();

/// Shared state of every currently-open conversation, keyed by chat id, so
/// the worker can reach a conversation's timeline and paginator.
pub static ACTIVE_CONVERSATIONS: Mutex<BTreeMap<i64, ConversationHandle>> =
    Mutex::new(BTreeMap::new());

pub(crate) fn register_conversation(chat_id: i64, handle: ConversationHandle) {
    ACTIVE_CONVERSATIONS
        .lock()
        .unwrap()
        .insert(chat_id, handle);
}

pub(crate) fn unregister_conversation(chat_id: i64) {
    ACTIVE_CONVERSATIONS.lock().unwrap().remove(&chat_id);
}

pub(crate) fn try_get_conversation(chat_id: i64) -> Option<ConversationHandle> {
    ACTIVE_CONVERSATIONS.lock().unwrap().get(&chat_id).cloned()
}

#[derive(Debug, Clone)]
pub enum UIUpdateMessage {
    RefreshUI,
}

// Global broadcaster instance
static GLOBAL_BROADCASTER: OnceLock<GlobalBroadcaster> = OnceLock::new();

pub struct GlobalBroadcaster {
    sender: broadcast::Sender<UIUpdateMessage>,
}

impl GlobalBroadcaster {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    fn broadcast(
        &self,
        message: UIUpdateMessage,
    ) -> Result<usize, broadcast::error::SendError<UIUpdateMessage>> {
        self.sender.send(message)
    }

    fn subscribe(&self) -> broadcast::Receiver<UIUpdateMessage> {
        self.sender.subscribe()
    }
}

// Initialize the global broadcaster (call this once at startup)
pub fn init_broadcaster(capacity: usize) -> Result<(), &'static str> {
    GLOBAL_BROADCASTER
        .set(GlobalBroadcaster::new(capacity))
        .map_err(|_| "Broadcaster already initialized")
}

/// Signals the adapter's event loop that new state is ready to be drained.
/// Sending with no subscriber yet is fine; the signal is only a nudge.
pub fn broadcast_event(message: UIUpdateMessage) -> Result<usize, &'static str> {
    let broadcaster = GLOBAL_BROADCASTER
        .get()
        .ok_or("Broadcaster not initialized. Call init_broadcaster() first.")?;

    Ok(broadcaster.broadcast(message).unwrap_or(0))
}

/// Creates a receiver for the UI refresh signal.
pub fn subscribe_to_events() -> Result<broadcast::Receiver<UIUpdateMessage>, &'static str> {
    let broadcaster = GLOBAL_BROADCASTER
        .get()
        .ok_or("Broadcaster not initialized. Call init_broadcaster() first.")?;

    Ok(broadcaster.subscribe())
}
