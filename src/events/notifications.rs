use crossbeam_queue::SegQueue;
use serde::Serialize;

use crate::init::singletons::{UIUpdateMessage, broadcast_event};

/// A user-visible transient notice (failed send, failed delete, network
/// trouble). The adapter decides how to render it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastNotification {
    message: String,
    description: Option<String>,
    variant: ToastNotificationVariant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ToastNotificationVariant {
    Default,
    Description,
    Success,
    Info,
    Warning,
    Error,
}

impl ToastNotification {
    pub fn new(
        message: String,
        description: Option<String>,
        variant: ToastNotificationVariant,
    ) -> Self {
        if description.is_some() {
            // A description forces the description variant.
            Self {
                message,
                description,
                variant: ToastNotificationVariant::Description,
            }
        } else {
            Self {
                message,
                description: None,
                variant,
            }
        }
    }
}

static PENDING_TOASTS: SegQueue<ToastNotification> = SegQueue::new();

/// Enqueues a notice for the adapter and signals the UI to refresh.
pub fn enqueue_toast_notification(notification: ToastNotification) {
    PENDING_TOASTS.push(notification);
    let _ = broadcast_event(UIUpdateMessage::RefreshUI);
}

/// Takes every pending notice, oldest first. Called by the adapter's event
/// loop on each refresh signal.
pub fn drain_toast_notifications() -> Vec<ToastNotification> {
    let mut drained = Vec::new();
    while let Some(notification) = PENDING_TOASTS.pop() {
        drained.push(notification);
    }
    drained
}
