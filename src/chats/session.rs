use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use crossbeam_queue::SegQueue;
use serde::Serialize;
use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::backend::ChatBackend;
use crate::backend::error::BackendError;
use crate::backend::realtime::{ChannelSpec, ConnectionState, EventChannel};
use crate::chats::repository::ChatsRepository;
use crate::events::reconciler;
use crate::init::singletons::{UIUpdateMessage, broadcast_event, get_client};
use crate::models::requests::{ChatRequest, submit_async_request};
use crate::models::{chat::Chat, message::Message, profile::Profile};
use crate::timeline::{
    CursorPaginator, Timeline, TimelineItem, TimelineUpdate, UpdatePolicy,
};
use crate::Result;

const PAGE_SIZE: usize = 15;

/// The possible updates to the chat list.
///
/// These are enqueued by the chat feed task (which has already resolved each
/// event to full rows) and drained by [`ChatListSession::process_pending_updates`]
/// on the adapter's refresh tick.
#[derive(Debug)]
pub enum ChatListUpdate {
    /// A new chat appeared on the live feed.
    AddChat(Chat),
    /// A fresh last-message summary for a chat; re-surfaces it at the top.
    UpdateLatestMessage {
        chat_id: i64,
        message: Message,
        updated_at: Option<String>,
    },
    /// The chat was deleted upstream.
    RemoveChat { chat_id: i64 },
}

static PENDING_CHAT_LIST_UPDATES: SegQueue<ChatListUpdate> = SegQueue::new();

/// Enqueues a chat list update and signals the UI that one is available.
pub(crate) fn enqueue_chat_list_update(update: ChatListUpdate) {
    PENDING_CHAT_LIST_UPDATES.push(update);
    let _ = broadcast_event(UIUpdateMessage::RefreshUI);
}

/// The status label shown under the chat list.
#[derive(Debug, Clone, Serialize)]
#[serde(
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    tag = "status",
    content = "message"
)]
pub enum ChatsCollectionStatus {
    NotLoaded(String),
    Loading(String),
    Loaded(String),
    Error(String),
}

/// The inbox screen's context: a timeline of chats ordered by activity,
/// paged backward over `updated_at` and re-sorted live as messages arrive.
pub struct ChatListSession {
    client: Arc<dyn ChatBackend>,
    repository: ChatsRepository,
    timeline: Arc<Mutex<Timeline<Chat>>>,
    paginator: CursorPaginator<Chat>,
    status: ChatsCollectionStatus,
    update_sender: UnboundedSender<TimelineUpdate>,
    channel: Option<Arc<dyn EventChannel>>,
    feed_tasks: Vec<JoinHandle<()>>,
}

impl ChatListSession {
    /// Creates the inbox context. Returns the session plus the receiver the
    /// adapter drains for every timeline update.
    pub fn new() -> Result<(Self, UnboundedReceiver<TimelineUpdate>)> {
        let client = get_client().ok_or_else(|| anyhow!("backend client not initialized"))?;
        let repository = ChatsRepository::new(client.clone());
        let paginator =
            CursorPaginator::<Chat>::new(client.clone(), "inbox", "updated_at", PAGE_SIZE);
        let (update_sender, update_receiver) = unbounded_channel();

        Ok((
            Self {
                client,
                repository,
                timeline: Arc::new(Mutex::new(Timeline::new(UpdatePolicy::Resurface))),
                paginator,
                status: ChatsCollectionStatus::NotLoaded("Initiating".to_owned()),
                update_sender,
                channel: None,
                feed_tasks: Vec::new(),
            },
            update_receiver,
        ))
    }

    pub fn snapshot(&self) -> Vec<TimelineItem<Chat>> {
        self.timeline.lock().unwrap().snapshot()
    }

    pub fn status(&self) -> &ChatsCollectionStatus {
        &self.status
    }

    /// Resets the list and loads the newest page of chats.
    pub async fn load_first_page(&mut self) -> Result<()> {
        self.status = ChatsCollectionStatus::Loading("Loading chats...".to_owned());
        let mutations = self.timeline.lock().unwrap().clear();
        if !mutations.is_empty() {
            let _ = self
                .update_sender
                .send(TimelineUpdate::Mutations(mutations));
        }
        self.paginator.reset();
        self.fetch_next_page().await
    }

    /// Loads the next older page of chats. A no-op once exhausted.
    pub async fn load_next_page(&mut self) -> Result<()> {
        self.fetch_next_page().await
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        let _ = self.update_sender.send(TimelineUpdate::PaginationRunning);
        let _ = broadcast_event(UIUpdateMessage::RefreshUI);

        match self.paginator.next_page().await {
            Ok(Some(chats)) => {
                let mutations = self.timeline.lock().unwrap().apply_page(chats);
                if !mutations.is_empty() {
                    let _ = self
                        .update_sender
                        .send(TimelineUpdate::Mutations(mutations));
                }
                self.update_status_chats_count();
                let _ = self.update_sender.send(TimelineUpdate::PaginationIdle {
                    fully_paginated: self.paginator.is_exhausted(),
                });
                let _ = broadcast_event(UIUpdateMessage::RefreshUI);
                Ok(())
            }
            Ok(None) => {
                self.update_status_chats_count();
                let _ = self.update_sender.send(TimelineUpdate::PaginationIdle {
                    fully_paginated: true,
                });
                let _ = broadcast_event(UIUpdateMessage::RefreshUI);
                Ok(())
            }
            Err(err) => {
                warn!("Loading chats failed: {err}");
                self.status = ChatsCollectionStatus::Error("Something went wrong!".to_owned());
                let _ = self.update_sender.send(TimelineUpdate::PaginationError {
                    message: err.to_string(),
                    network: err.is_network(),
                });
                let _ = broadcast_event(UIUpdateMessage::RefreshUI);
                Err(err.into())
            }
        }
    }

    /// Joins the chat feed channel and starts resolving live events into
    /// pending list updates.
    pub async fn start_live_updates(&mut self) -> Result<()> {
        if self.channel.is_some() {
            debug!("Chat list is already subscribed to live updates");
            return Ok(());
        }
        if self.client.realtime().connection_state().get() != ConnectionState::Connected {
            return Err(
                BackendError::Network("realtime transport is not connected".to_owned()).into(),
            );
        }

        let channel = self
            .client
            .realtime()
            .channel(ChannelSpec::new("#chats", "chats"));
        let events = channel.events();
        let channel_state = channel.state();
        channel.join().await.map_err(crate::Error::from)?;

        self.feed_tasks
            .push(Handle::current().spawn(reconciler::run_chat_feed(
                events,
                self.repository.clone(),
            )));
        self.feed_tasks
            .push(Handle::current().spawn(reconciler::watch_channel_state(
                channel_state,
                self.update_sender.clone(),
            )));
        self.channel = Some(channel);
        Ok(())
    }

    /// Leaves the chat feed channel and stops the feed tasks.
    pub async fn stop_live_updates(&mut self) {
        for task in self.feed_tasks.drain(..) {
            task.abort();
        }
        if let Some(channel) = self.channel.take() {
            if let Err(err) = channel.leave().await {
                warn!("Failed to leave chat list channel: {err}");
            }
        }
    }

    /// Applies every pending live update to the list. Called by the
    /// adapter's event loop on each refresh signal.
    pub fn process_pending_updates(&mut self) {
        let mut mutations = Vec::new();
        let mut num_updates: usize = 0;
        while let Some(update) = PENDING_CHAT_LIST_UPDATES.pop() {
            num_updates += 1;
            let mut timeline = self.timeline.lock().unwrap();
            match update {
                ChatListUpdate::AddChat(chat) => {
                    if timeline.contains(chat.id) {
                        mutations.extend(timeline.apply_update(chat));
                    } else {
                        mutations.extend(timeline.apply_insert(chat));
                    }
                }
                ChatListUpdate::UpdateLatestMessage {
                    chat_id,
                    message,
                    updated_at,
                } => {
                    let Some(existing) = timeline.record(chat_id).cloned() else {
                        debug!("Latest-message update for chat {chat_id} outside the loaded window");
                        continue;
                    };
                    let resurfaced = Chat {
                        last_message_id: Some(message.id),
                        last_message_author_id: message.author_id.clone(),
                        last_message_content: message.content.clone(),
                        last_message_seen: Some(message.seen),
                        last_message_kind: Some(message.kind),
                        updated_at: updated_at.or(existing.updated_at.clone()),
                        ..existing
                    };
                    mutations.extend(timeline.apply_update(resurfaced));
                }
                ChatListUpdate::RemoveChat { chat_id } => {
                    mutations.extend(timeline.apply_remove(chat_id));
                }
            }
        }
        if num_updates > 0 {
            debug!("Chat list processed {num_updates} pending updates");
            if !mutations.is_empty() {
                let _ = self
                    .update_sender
                    .send(TimelineUpdate::Mutations(mutations));
            }
            self.update_status_chats_count();
        }
    }

    /// Exact-email profile lookup for the start-chat flow. `Ok(None)` flips
    /// the UI into create-on-first-send mode instead of an error state.
    pub async fn search_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let (response_sender, response_receiver) = tokio::sync::oneshot::channel();
        submit_async_request(ChatRequest::SearchProfileByEmail {
            email: email.to_owned(),
            response_sender,
        });
        response_receiver
            .await
            .map_err(|_| anyhow!("worker dropped the profile search request"))?
    }

    /// Deletes a chat; the removal comes back through the live feed.
    pub fn delete_chat(&self, chat_id: i64) {
        submit_async_request(ChatRequest::DeleteChat { chat_id });
    }

    fn update_status_chats_count(&mut self) {
        let num_chats = self.timeline.lock().unwrap().content_len();
        self.status = if self.paginator.is_exhausted() {
            ChatsCollectionStatus::Loaded(format!("Loaded {num_chats} chats."))
        } else {
            ChatsCollectionStatus::Loading(format!("Loaded {num_chats} chats so far."))
        };
    }
}

impl Drop for ChatListSession {
    fn drop(&mut self) {
        for task in self.feed_tasks.drain(..) {
            task.abort();
        }
        if let Some(channel) = self.channel.take() {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(async move {
                    let _ = channel.leave().await;
                });
            }
        }
    }
}
