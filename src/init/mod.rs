pub mod singletons;
pub(crate) mod workers;

use std::sync::Arc;

use anyhow::anyhow;
use tokio::{runtime::Handle, sync::mpsc::unbounded_channel};
use tracing::{error, info};

use crate::backend::{ChatBackend, realtime::ConnectionState};
use crate::models::requests::ChatRequest;
use crate::{Result, init::singletons::get_client};

use self::singletons::{CLIENT, CURRENT_USER_ID, REQUEST_SENDER};

/// Call once when the app starts, after the adapter has authenticated.
///
/// Stores the process-wide backend client, starts the async worker and
/// brings the realtime transport up. Per-screen contexts
/// ([`crate::ConversationSession`], [`crate::ChatListSession`]) are created
/// and torn down independently on top of this.
pub async fn init(client: Arc<dyn ChatBackend>, user_id: impl Into<String>) -> Result<()> {
    CLIENT
        .set(client)
        .unwrap_or_else(|_| panic!("BUG: backend client already set!"));
    CURRENT_USER_ID
        .set(user_id.into())
        .expect("BUG: CURRENT_USER_ID already set!");

    singletons::init_broadcaster(16).expect("Couldn't init the UI broadcaster");

    // Channel between the UI thread(s) and the async worker task.
    let (sender, receiver) = unbounded_channel::<ChatRequest>();
    REQUEST_SENDER
        .set(sender)
        .expect("BUG: REQUEST_SENDER already set!");

    let _worker = Handle::current().spawn(async move {
        if let Err(err) = workers::async_worker(receiver).await {
            error!("Error: async worker task ended:\n\t{err:?}");
        }
    });

    let client = get_client().expect("client was set above");
    client.realtime().connect().await?;
    info!("Realtime transport connected");
    Ok(())
}

/// Reconnects the realtime transport if the app comes back to the
/// foreground with the connection gone. Channels of open contexts fall back
/// to idle on a drop and have to be rejoined by their owners.
pub async fn on_app_resume() -> Result<()> {
    let client = get_client().ok_or_else(|| anyhow!("backend client not initialized"))?;
    if client.realtime().connection_state().get() != ConnectionState::Connected {
        client.realtime().connect().await?;
        info!("Realtime transport reconnected");
    }
    Ok(())
}

/// Tears the realtime transport down on full app exit. Individual contexts
/// never do this themselves; they only leave their own channels.
pub async fn on_app_exit() {
    if let Some(client) = get_client() {
        client.realtime().disconnect().await;
        info!("Realtime transport disconnected");
    }
}
