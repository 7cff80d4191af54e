use tokio::sync::{oneshot, watch};

use crate::backend::query::PaginationToken;
use crate::conversation::media::{MediaUpload, UploadState};
use crate::init::singletons::REQUEST_SENDER;
use crate::models::{message::MessageKind, profile::Profile};

/// Submits a request to the worker task to be executed asynchronously.
pub(crate) fn submit_async_request(req: ChatRequest) {
    REQUEST_SENDER
        .get()
        .expect("BUG: request sender not initialized, call init() first")
        .send(req)
        .expect("BUG: async worker task receiver has died!");
}

/// The set of requests for async work that can be made to the worker task.
pub enum ChatRequest {
    /// Request to load the next older page of a conversation's timeline.
    ///
    /// `cursor` is the pagination boundary observed when the request was
    /// triggered; the worker drops the request if the paginator has advanced
    /// past it in the meantime (duplicate scroll triggers).
    PaginateConversation {
        chat_id: i64,
        cursor: Option<PaginationToken>,
    },
    /// Request to insert a new message into the given chat.
    ///
    /// `seen` is pre-computed from the presence set: a message composed while
    /// the peer has the conversation open is marked seen on send. This is a
    /// best-effort heuristic, not a delivery receipt.
    SendMessage {
        chat_id: i64,
        content: String,
        kind: MessageKind,
        seen: bool,
    },
    /// Request to flip the seen flag of the given message server-side.
    ///
    /// This request does not return a response; the rewritten row comes back
    /// on the live feed as an update event.
    SetMessageSeen { message_id: i64 },
    /// Request to delete the given chat and everything in it.
    DeleteChat { chat_id: i64 },
    /// Request to look up a profile by exact email address.
    ///
    /// `Ok(None)` means no such user, which the start-chat flow treats as a
    /// valid answer rather than an error.
    SearchProfileByEmail {
        email: String,
        response_sender: oneshot::Sender<crate::Result<Option<Profile>>>,
    },
    /// Request to upload a media payload and then send the message carrying
    /// its public URL. Progress is reported through the watch channel.
    UploadMedia {
        chat_id: i64,
        media: MediaUpload,
        progress_sender: watch::Sender<UploadState>,
    },
}
