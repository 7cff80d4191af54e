use anyhow::bail;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, warn};

use crate::conversation::media;
use crate::conversation::repository::MessageRepository;
use crate::events::notifications::{
    ToastNotification, ToastNotificationVariant, enqueue_toast_notification,
};
use crate::init::singletons::{
    UIUpdateMessage, broadcast_event, get_client, try_get_conversation,
};
use crate::models::requests::ChatRequest;
use crate::timeline::TimelineUpdate;

/// The entry point of the async worker task.
///
/// All this task does is wait for [`ChatRequest`]s from the UI-driven
/// non-async side and execute each within the async runtime, one spawned
/// task per request.
pub(crate) async fn async_worker(
    mut request_receiver: UnboundedReceiver<ChatRequest>,
) -> anyhow::Result<()> {
    debug!("Started async_worker task.");
    while let Some(request) = request_receiver.recv().await {
        match request {
            ChatRequest::PaginateConversation { chat_id, cursor } => {
                let Some(handle) = try_get_conversation(chat_id) else {
                    warn!("Skipping pagination request for unknown conversation {chat_id}");
                    continue;
                };

                // Spawn a new async task that will make the actual page request.
                let _paginate_task = Handle::current().spawn(async move {
                    // In-flight guard: the running request holds this lock.
                    let Ok(mut paginator) = handle.paginator.try_lock() else {
                        debug!("Pagination already running for conversation {chat_id}, skipping");
                        return;
                    };
                    // Stale-trigger guard: the boundary moved since this
                    // request was queued, so it duplicates one already served.
                    if paginator.cursor() != cursor.as_ref() {
                        debug!("Dropping stale pagination trigger for conversation {chat_id}");
                        return;
                    }

                    debug!("Starting backward pagination for conversation {chat_id}...");
                    let _ = handle.update_sender.send(TimelineUpdate::PaginationRunning);
                    let _ = broadcast_event(UIUpdateMessage::RefreshUI);

                    match paginator.next_page().await {
                        Ok(Some(records)) => {
                            let mutations =
                                handle.timeline.lock().unwrap().apply_page(records);
                            if !mutations.is_empty() {
                                let _ = handle
                                    .update_sender
                                    .send(TimelineUpdate::Mutations(mutations));
                            }
                            let _ = handle.update_sender.send(TimelineUpdate::PaginationIdle {
                                fully_paginated: paginator.is_exhausted(),
                            });
                        }
                        Ok(None) => {
                            let _ = handle.update_sender.send(TimelineUpdate::PaginationIdle {
                                fully_paginated: true,
                            });
                        }
                        Err(err) => {
                            warn!("Pagination failed for conversation {chat_id}: {err}");
                            let _ = handle.update_sender.send(TimelineUpdate::PaginationError {
                                message: err.to_string(),
                                network: err.is_network(),
                            });
                        }
                    }
                    let _ = broadcast_event(UIUpdateMessage::RefreshUI);
                });
            }

            ChatRequest::SendMessage {
                chat_id,
                content,
                kind,
                seen,
            } => {
                let Some(client) = get_client() else { continue };
                let _send_task = Handle::current().spawn(async move {
                    debug!("Sending {kind:?} message to chat {chat_id}...");
                    let repository = MessageRepository::new(client);
                    match repository.insert_message(chat_id, &content, kind, seen).await {
                        Ok(()) => debug!("Sent message to chat {chat_id}."),
                        Err(err) => {
                            warn!("Failed to send message to chat {chat_id}: {err}");
                            enqueue_toast_notification(ToastNotification::new(
                                format!("Failed to send message. Error: {err}"),
                                None,
                                ToastNotificationVariant::Error,
                            ));
                        }
                    }
                });
            }

            ChatRequest::SetMessageSeen { message_id } => {
                let Some(client) = get_client() else { continue };
                let _seen_task = Handle::current().spawn(async move {
                    let repository = MessageRepository::new(client);
                    if let Err(err) = repository.set_message_seen(message_id).await {
                        // Best-effort: the flag stays unset until the next
                        // observation; nothing to surface to the user.
                        warn!("Failed to mark message {message_id} as seen: {err}");
                    }
                });
            }

            ChatRequest::DeleteChat { chat_id } => {
                let Some(client) = get_client() else { continue };
                let _delete_task = Handle::current().spawn(async move {
                    debug!("Sending request to delete chat {chat_id}...");
                    let repository = MessageRepository::new(client);
                    match repository.delete_chat(chat_id).await {
                        Ok(()) => {
                            enqueue_toast_notification(ToastNotification::new(
                                "Chat deleted.".to_owned(),
                                None,
                                ToastNotificationVariant::Success,
                            ));
                        }
                        Err(err) => {
                            error!("Failed to delete chat {chat_id}: {err}");
                            enqueue_toast_notification(ToastNotification::new(
                                "Deletion failed!".to_owned(),
                                None,
                                ToastNotificationVariant::Error,
                            ));
                        }
                    }
                });
            }

            ChatRequest::SearchProfileByEmail {
                email,
                response_sender,
            } => {
                let Some(client) = get_client() else { continue };
                let _search_task = Handle::current().spawn(async move {
                    let repository = crate::chats::repository::ChatsRepository::new(client);
                    let result = repository
                        .search_profile_by_email(&email)
                        .await
                        .map_err(crate::Error::from);
                    let _ = response_sender.send(result);
                });
            }

            ChatRequest::UploadMedia {
                chat_id,
                media,
                progress_sender,
            } => {
                let Some(client) = get_client() else { continue };
                let _upload_task = Handle::current().spawn(media::run_upload(
                    client,
                    chat_id,
                    media,
                    progress_sender,
                ));
            }
        }
    }

    error!("async_worker task ended unexpectedly");
    bail!("async_worker task ended unexpectedly")
}
