use std::sync::{Arc, Mutex};

use eyeball::Subscriber;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::backend::realtime::{
    ChangeEvent, ChangeKind, ChannelState, EventStream, PresenceStream,
};
use crate::chats::repository::ChatsRepository;
use crate::chats::session::{ChatListUpdate, enqueue_chat_list_update};
use crate::events::presence::PresenceSet;
use crate::init::singletons::{UIUpdateMessage, broadcast_event};
use crate::models::requests::submit_async_request;
use crate::models::{chat::Chat, message::Message, requests::ChatRequest};
use crate::timeline::{Timeline, TimelineUpdate};

/// Decodes a change-feed row into a domain record. Malformed payloads are
/// dropped with a diagnostic; they must never take the feed loop down.
fn decode_record<T: DeserializeOwned>(table: &str, record: &Value) -> Option<T> {
    match serde_json::from_value(record.clone()) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            warn!("dropping undecodable {table} change event: {error}");
            None
        }
    }
}

/// The record id a delete event refers to, from whichever side of the event
/// the backend replicated.
fn deleted_id(event: &ChangeEvent) -> Option<i64> {
    event
        .old_record
        .as_ref()
        .and_then(|old| old.get("id"))
        .or_else(|| event.record.get("id"))
        .and_then(Value::as_i64)
}

/// Feed loop for one conversation: routes message events for `chat_id` into
/// its timeline, in receipt order.
///
/// A freshly inserted message from the peer also triggers the server-side
/// seen flip; the rewritten row then comes back as an update event and lands
/// in place (the row's position is governed by creation order).
pub(crate) async fn run_message_feed(
    mut events: EventStream,
    timeline: Arc<Mutex<Timeline<Message>>>,
    update_sender: UnboundedSender<TimelineUpdate>,
    chat_id: i64,
    own_user_id: String,
) {
    while let Some(event) = events.next().await {
        if event.table != "messages" {
            continue;
        }
        let mutations = match event.kind {
            ChangeKind::Insert => {
                let Some(message) = decode_record::<Message>(&event.table, &event.record) else {
                    continue;
                };
                if message.chat_id != chat_id {
                    continue;
                }
                if message.author_id.as_deref() != Some(own_user_id.as_str()) {
                    submit_async_request(ChatRequest::SetMessageSeen {
                        message_id: message.id,
                    });
                }
                timeline.lock().unwrap().apply_insert(message)
            }
            ChangeKind::Update => {
                let Some(message) = decode_record::<Message>(&event.table, &event.record) else {
                    continue;
                };
                if message.chat_id != chat_id {
                    continue;
                }
                timeline.lock().unwrap().apply_update(message)
            }
            ChangeKind::Delete => {
                let Some(id) = deleted_id(&event) else {
                    warn!("dropping message delete event without an id");
                    continue;
                };
                timeline.lock().unwrap().apply_remove(id)
            }
        };
        if !mutations.is_empty() {
            let _ = update_sender.send(TimelineUpdate::Mutations(mutations));
            let _ = broadcast_event(UIUpdateMessage::RefreshUI);
        }
    }
    debug!("message feed loop ended for conversation {chat_id}");
}

/// Feed loop for the chat list: resolves each event to a full inbox row and
/// enqueues the resulting list update.
///
/// An update event only carries the bare chats row (`last_message_id`, no
/// message body), so the referenced message is point-looked-up first. A
/// failed lookup drops the event; the subscription keeps running.
pub(crate) async fn run_chat_feed(mut events: EventStream, repository: ChatsRepository) {
    while let Some(event) = events.next().await {
        if event.table != "chats" {
            continue;
        }
        match event.kind {
            ChangeKind::Insert => {
                let Some(chat) = decode_record::<Chat>(&event.table, &event.record) else {
                    continue;
                };
                // The change feed replicates the bare table row; the list
                // renders the inbox view, so resolve the full row.
                match repository.inbox_chat_by_id(chat.id).await {
                    Ok(Some(full)) => enqueue_chat_list_update(ChatListUpdate::AddChat(full)),
                    Ok(None) => debug!("inserted chat {} vanished before resolution", chat.id),
                    Err(error) => {
                        warn!("dropping chat insert event, resolution failed: {error}");
                    }
                }
            }
            ChangeKind::Update => {
                let Some(chat) = decode_record::<Chat>(&event.table, &event.record) else {
                    continue;
                };
                let Some(last_message_id) = chat.last_message_id else {
                    debug!("chat {} update without a last message, ignoring", chat.id);
                    continue;
                };
                match repository.message_by_id(last_message_id).await {
                    Ok(Some(message)) => {
                        enqueue_chat_list_update(ChatListUpdate::UpdateLatestMessage {
                            chat_id: chat.id,
                            message,
                            updated_at: chat.updated_at.clone(),
                        });
                    }
                    Ok(None) => {
                        warn!("last message {last_message_id} of chat {} not found", chat.id);
                    }
                    Err(error) => {
                        warn!("dropping chat update event, resolution failed: {error}");
                    }
                }
            }
            ChangeKind::Delete => {
                let Some(chat_id) = deleted_id(&event) else {
                    warn!("dropping chat delete event without an id");
                    continue;
                };
                enqueue_chat_list_update(ChatListUpdate::RemoveChat { chat_id });
            }
        }
    }
    debug!("chat feed loop ended");
}

/// Folds the presence sub-feed into the context's presence set and tells the
/// UI who is currently around.
pub(crate) async fn run_presence_feed(
    mut diffs: PresenceStream,
    presence: Arc<Mutex<PresenceSet>>,
    update_sender: UnboundedSender<TimelineUpdate>,
) {
    while let Some(diff) = diffs.next().await {
        let present = {
            let mut lock = presence.lock().unwrap();
            lock.apply(&diff);
            lock.ids()
        };
        let _ = update_sender.send(TimelineUpdate::PresenceChanged { present });
        let _ = broadcast_event(UIUpdateMessage::RefreshUI);
    }
    debug!("presence feed loop ended");
}

/// Forwards channel join-state transitions to the UI, so it can gate the
/// composer on connected-and-joined.
pub(crate) async fn watch_channel_state(
    mut state: Subscriber<ChannelState>,
    update_sender: UnboundedSender<TimelineUpdate>,
) {
    while let Some(next) = state.next().await {
        let _ = update_sender.send(TimelineUpdate::ChannelStateChanged(next));
        let _ = broadcast_event(UIUpdateMessage::RefreshUI);
    }
}
