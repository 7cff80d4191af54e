use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::backend::error::BackendError;
use crate::backend::realtime::{ChannelSpec, ConnectionState, EventChannel, PresenceState};
use crate::backend::ChatBackend;
use crate::conversation::media::{MediaUpload, UploadState};
use crate::conversation::repository::MessageRepository;
use crate::events::presence::PresenceSet;
use crate::events::reconciler;
use crate::init::singletons::{
    CURRENT_USER_ID, get_client, register_conversation, unregister_conversation,
};
use crate::models::message::{Message, MessageKind};
use crate::models::requests::{ChatRequest, submit_async_request};
use crate::timeline::{
    CursorPaginator, Timeline, TimelineItem, TimelineUpdate, UpdatePolicy,
};
use crate::Result;

const PAGE_SIZE: usize = 15;

/// The shared pieces of one open conversation, kept in the process-wide
/// registry so the async worker can reach them by chat id.
#[derive(Clone)]
pub struct ConversationHandle {
    pub(crate) timeline: Arc<Mutex<Timeline<Message>>>,
    pub(crate) paginator: Arc<tokio::sync::Mutex<CursorPaginator<Message>>>,
    pub(crate) update_sender: UnboundedSender<TimelineUpdate>,
}

/// One open message thread: its timeline, its paginator, its channel
/// subscription and its presence set. Created on screen-enter, dropped on
/// screen-exit; dropping leaves the channel but never the shared connection.
pub struct ConversationSession {
    peer_id: String,
    chat_id: Option<i64>,
    /// Set while no chat row exists yet with this peer: creation is
    /// deferred to the first send instead of being an error.
    deferred_peer: Option<String>,
    client: Arc<dyn ChatBackend>,
    repository: MessageRepository,
    timeline: Arc<Mutex<Timeline<Message>>>,
    paginator: Option<Arc<tokio::sync::Mutex<CursorPaginator<Message>>>>,
    update_sender: UnboundedSender<TimelineUpdate>,
    presence: Arc<Mutex<PresenceSet>>,
    channel: Option<Arc<dyn EventChannel>>,
    feed_tasks: Vec<JoinHandle<()>>,
}

impl ConversationSession {
    /// Opens the conversation with the given peer, resolving the chat row.
    /// Returns the session plus the receiver the adapter drains for every
    /// timeline update.
    pub async fn open(peer_id: &str) -> Result<(Self, UnboundedReceiver<TimelineUpdate>)> {
        let client = get_client().ok_or_else(|| anyhow!("backend client not initialized"))?;
        let repository = MessageRepository::new(client.clone());
        let (update_sender, update_receiver) = unbounded_channel();

        let mut session = Self {
            peer_id: peer_id.to_owned(),
            chat_id: None,
            deferred_peer: None,
            client,
            repository,
            timeline: Arc::new(Mutex::new(Timeline::new(UpdatePolicy::InPlace))),
            paginator: None,
            update_sender,
            presence: Arc::new(Mutex::new(PresenceSet::new())),
            channel: None,
            feed_tasks: Vec::new(),
        };

        match session.repository.chat_by_peer(peer_id).await? {
            Some(chat) => session.adopt_chat(chat.id),
            None => {
                info!("No chat with {peer_id} yet, deferring creation to the first send");
                session.deferred_peer = Some(peer_id.to_owned());
            }
        }

        Ok((session, update_receiver))
    }

    fn adopt_chat(&mut self, chat_id: i64) {
        self.chat_id = Some(chat_id);
        self.deferred_peer = None;

        let paginator = Arc::new(tokio::sync::Mutex::new(
            CursorPaginator::<Message>::new(self.client.clone(), "messages", "id", PAGE_SIZE)
                .with_filter("chat_id", chat_id)
                .with_projection("*, profiles(id, profile_image)"),
        ));
        self.paginator = Some(paginator.clone());
        register_conversation(
            chat_id,
            ConversationHandle {
                timeline: self.timeline.clone(),
                paginator,
                update_sender: self.update_sender.clone(),
            },
        );
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.chat_id
    }

    /// Whether the chat row does not exist yet and will be created by the
    /// first send.
    pub fn is_deferred(&self) -> bool {
        self.deferred_peer.is_some()
    }

    pub fn snapshot(&self) -> Vec<TimelineItem<Message>> {
        self.timeline.lock().unwrap().snapshot()
    }

    /// Participant ids currently present on this conversation's channel.
    pub fn present_ids(&self) -> Vec<String> {
        self.presence.lock().unwrap().ids()
    }

    /// Resets the timeline and requests the newest page of history.
    pub fn load_first_page(&self) {
        let Some(chat_id) = self.chat_id else {
            // Brand-new conversation: there is no history.
            let _ = self.update_sender.send(TimelineUpdate::PaginationIdle {
                fully_paginated: true,
            });
            return;
        };
        let mutations = self.timeline.lock().unwrap().clear();
        if !mutations.is_empty() {
            let _ = self
                .update_sender
                .send(TimelineUpdate::Mutations(mutations));
        }
        if let Some(paginator) = &self.paginator {
            match paginator.try_lock() {
                Ok(mut paginator) => paginator.reset(),
                Err(_) => warn!("Resetting conversation {chat_id} while a page load is running"),
            }
        }
        submit_async_request(ChatRequest::PaginateConversation {
            chat_id,
            cursor: None,
        });
    }

    /// Requests the next older page. Duplicate scroll triggers are ignored:
    /// one while a request is in flight, and one whose boundary was already
    /// served.
    pub fn load_next_page(&self) {
        let Some(chat_id) = self.chat_id else { return };
        let Some(paginator) = &self.paginator else {
            return;
        };
        let Ok(paginator) = paginator.try_lock() else {
            debug!("Pagination in flight for conversation {chat_id}, ignoring trigger");
            return;
        };
        if paginator.is_exhausted() {
            return;
        }
        let cursor = paginator.cursor().cloned();
        drop(paginator);
        submit_async_request(ChatRequest::PaginateConversation { chat_id, cursor });
    }

    /// Joins the conversation's channel, announces our presence, and starts
    /// routing live events into the timeline. Fails while the shared
    /// transport is not connected; the caller rejoins after a reconnect.
    pub async fn start_live_updates(&mut self) -> Result<()> {
        let Some(chat_id) = self.chat_id else {
            return Err(anyhow!("cannot start live updates before the chat exists").into());
        };
        if self.channel.is_some() {
            debug!("Conversation {chat_id} is already subscribed to live updates");
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
            .channel(ChannelSpec::new("#messages", "messages"));
        let events = channel.events();
        let presence_stream = channel.presence();
        let channel_state = channel.state();

        channel.join().await.map_err(crate::Error::from)?;
        let own_user_id = CURRENT_USER_ID.get().cloned().unwrap_or_default();
        channel
            .track(PresenceState {
                uid: own_user_id.clone(),
            })
            .await
            .map_err(crate::Error::from)?;

        self.feed_tasks
            .push(Handle::current().spawn(reconciler::run_message_feed(
                events,
                self.timeline.clone(),
                self.update_sender.clone(),
                chat_id,
                own_user_id,
            )));
        self.feed_tasks
            .push(Handle::current().spawn(reconciler::run_presence_feed(
                presence_stream,
                self.presence.clone(),
                self.update_sender.clone(),
            )));
        self.feed_tasks
            .push(Handle::current().spawn(reconciler::watch_channel_state(
                channel_state,
                self.update_sender.clone(),
            )));
        self.channel = Some(channel);
        Ok(())
    }

    /// Leaves the channel and stops the feed tasks. The shared connection
    /// stays up for other contexts.
    pub async fn stop_live_updates(&mut self) {
        for task in self.feed_tasks.drain(..) {
            task.abort();
        }
        if let Some(channel) = self.channel.take() {
            if let Err(err) = channel.leave().await {
                warn!("Failed to leave conversation channel: {err}");
            }
        }
    }

    /// Sends a text or media-URL message. On the first send of a deferred
    /// conversation the chat row is created first.
    ///
    /// The seen flag is pre-set when the peer is currently present on the
    /// channel; best-effort, not a delivery receipt.
    pub async fn send_message(&mut self, content: String, kind: MessageKind) -> Result<()> {
        if let Some(peer) = self.deferred_peer.clone() {
            let chat = self.repository.create_chat(&peer).await?;
            info!("Created chat {} with {peer} on first send", chat.id);
            self.adopt_chat(chat.id);
        }
        let chat_id = self.chat_id.expect("chat exists after creation");
        let seen = self.presence.lock().unwrap().contains(&self.peer_id);
        submit_async_request(ChatRequest::SendMessage {
            chat_id,
            content,
            kind,
            seen,
        });
        Ok(())
    }

    /// Uploads a captured media payload and sends the resulting message.
    /// Returns the watch receiver driving the progress bar.
    pub fn upload_media(&self, media: MediaUpload) -> Result<watch::Receiver<UploadState>> {
        let Some(chat_id) = self.chat_id else {
            return Err(anyhow!("cannot upload media before the chat exists").into());
        };
        let (progress_sender, progress_receiver) = watch::channel(UploadState::default());
        submit_async_request(ChatRequest::UploadMedia {
            chat_id,
            media,
            progress_sender,
        });
        Ok(progress_receiver)
    }

    /// Deletes the whole chat. The removal lands on the chat list through
    /// its live feed.
    pub fn delete_chat(&self) {
        if let Some(chat_id) = self.chat_id {
            submit_async_request(ChatRequest::DeleteChat { chat_id });
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        for task in self.feed_tasks.drain(..) {
            task.abort();
        }
        if let Some(channel) = self.channel.take() {
            // Leaving is async; detach it. Only this context's subscription
            // is released, never the shared connection.
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(async move {
                    let _ = channel.leave().await;
                });
            }
        }
        if let Some(chat_id) = self.chat_id {
            unregister_conversation(chat_id);
        }
    }
}
