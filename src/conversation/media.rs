use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use crate::backend::ChatBackend;
use crate::backend::storage::UploadEvent;
use crate::conversation::repository::MessageRepository;
use crate::events::notifications::{
    ToastNotification, ToastNotificationVariant, enqueue_toast_notification,
};
use crate::models::message::MessageKind;

/// A captured media payload waiting to be uploaded and sent.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// File name as captured, used as the tail of the storage key.
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: mime::Mime,
    /// `Image` or `Video`; decides the target bucket and the message kind.
    pub kind: MessageKind,
}

/// Progress of one media upload, published through a watch channel so the
/// adapter can drive a progress bar.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadState {
    pub in_progress: bool,
    /// Fraction sent, in `0.0..=1.0`.
    pub progress: f32,
    /// Set once the upload completed and the message was sent.
    pub url: Option<Url>,
    pub error: Option<String>,
}

/// Uploads the payload and, on success, sends the image/video message
/// carrying its public URL.
pub(crate) async fn run_upload(
    client: Arc<dyn ChatBackend>,
    chat_id: i64,
    media: MediaUpload,
    progress_sender: watch::Sender<UploadState>,
) {
    let bucket = match media.kind {
        MessageKind::Image => "images",
        MessageKind::Video => "videos",
        MessageKind::Text => {
            warn!("BUG: refusing to upload a text message as media");
            return;
        }
    };
    // Salted key, so re-capturing under the same file name busts caches.
    let key = format!("{:08x}_{}", rand::random::<u32>(), media.name);

    let fail = |message: String| {
        let _ = progress_sender.send(UploadState {
            in_progress: false,
            error: Some(message.clone()),
            ..UploadState::default()
        });
        enqueue_toast_notification(ToastNotification::new(
            "Failed to upload media.".to_owned(),
            Some(message),
            ToastNotificationVariant::Error,
        ));
    };

    debug!("Uploading {} bytes to {bucket}/{key}...", media.bytes.len());
    let mut events = match client
        .storage()
        .upload(bucket, &key, media.bytes, media.content_type.clone())
        .await
    {
        Ok(stream) => stream,
        Err(err) => {
            fail(err.to_string());
            return;
        }
    };

    while let Some(event) = events.next().await {
        match event {
            Ok(UploadEvent::Progress(fraction)) => {
                let _ = progress_sender.send(UploadState {
                    in_progress: true,
                    progress: fraction,
                    ..UploadState::default()
                });
            }
            Ok(UploadEvent::Complete(url)) => {
                debug!("Upload of {bucket}/{key} complete: {url}");
                let repository = MessageRepository::new(client.clone());
                match repository
                    .insert_message(chat_id, url.as_str(), media.kind, false)
                    .await
                {
                    Ok(()) => {
                        let _ = progress_sender.send(UploadState {
                            in_progress: false,
                            progress: 1.0,
                            url: Some(url),
                            error: None,
                        });
                    }
                    Err(err) => fail(format!("upload succeeded but sending failed: {err}")),
                }
                return;
            }
            Err(err) => {
                warn!("Upload of {bucket}/{key} failed: {err}");
                fail(err.to_string());
                return;
            }
        }
    }
    fail("upload stream ended without completing".to_owned());
}
