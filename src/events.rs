use std::collections::BTreeSet;

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotificationId {
    PendingOpportunities,
    PrivacyPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    RemoveNotification(NotificationId),
}

/// In-process publish/subscribe between components that do not know each
/// other. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HubEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: HubEvent) {
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        tracing::debug!(?event, receivers, "Published hub event");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }
}

/// Banner notifications currently on display.
#[derive(Debug, Default)]
pub struct NotificationBar {
    active: BTreeSet<NotificationId>,
}

impl NotificationBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, id: NotificationId) {
        self.active.insert(id);
    }

    pub fn is_showing(&self, id: NotificationId) -> bool {
        self.active.contains(&id)
    }

    pub fn apply(&mut self, event: &HubEvent) {
        match event {
            HubEvent::RemoveNotification(id) => {
                self.active.remove(id);
            }
        }
    }

    /// Applies every event already queued on `receiver` without waiting.
    pub fn drain(&mut self, receiver: &mut broadcast::Receiver<HubEvent>) {
        loop {
            match receiver.try_recv() {
                Ok(event) => self.apply(&event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification bar fell behind the event bus");
                }
                Err(_) => break,
            }
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &NotificationId> {
        self.active.iter()
    }
}
