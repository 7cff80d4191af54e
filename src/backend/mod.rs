pub mod error;
pub mod query;
pub mod realtime;
pub mod storage;

pub use error::BackendError;

use self::query::TableQuery;
use self::realtime::ChangeFeed;
use self::storage::BlobStore;

/// The full capability set this crate expects from the backend SDK.
///
/// The SDK itself (transport, auth, retries, reconnection back-off) stays on
/// the adapter's side of this boundary; the core only ever talks to these
/// three interfaces.
pub trait ChatBackend: Send + Sync + 'static {
    /// Read/write access to the relational tables and views.
    fn query(&self) -> &dyn TableQuery;
    /// The realtime change-feed transport.
    fn realtime(&self) -> &dyn ChangeFeed;
    /// Object storage for media uploads.
    fn storage(&self) -> &dyn BlobStore;
}
