use async_trait::async_trait;
use futures::stream::BoxStream;
use url::Url;

use super::error::BackendError;

/// Progress report of one object upload.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Fraction of the payload sent so far, in `0.0..=1.0`.
    Progress(f32),
    /// The upload finished; the object is reachable at this public URL.
    Complete(Url),
}

pub type UploadStream = BoxStream<'static, Result<UploadEvent, BackendError>>;

/// Object storage for media payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Starts an upload and returns its progress stream. The stream ends
    /// with [`UploadEvent::Complete`] or an error item.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: mime::Mime,
    ) -> Result<UploadStream, BackendError>;

    /// The public URL an uploaded object will be served from.
    fn public_url(&self, bucket: &str, key: &str) -> Result<Url, BackendError>;
}
