//! In-process group broadcast for WebSocket push. Each group name maps to a
//! `tokio::sync::broadcast` channel that is created on first subscribe.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use common::RealtimeEvent;
use compute::NotificationSink;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

const GROUP_CAPACITY: usize = 64;

#[derive(Debug, Default)]
pub struct NotificationHub {
    groups: RwLock<HashMap<String, broadcast::Sender<RealtimeEvent>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins `group`, creating its channel if this is the first member.
    pub fn subscribe(&self, group: &str) -> broadcast::Receiver<RealtimeEvent> {
        if let Ok(groups) = self.groups.read() {
            if let Some(sender) = groups.get(group) {
                return sender.subscribe();
            }
        }
        let mut groups = match self.groups.write() {
            Ok(groups) => groups,
            Err(poisoned) => {
                warn!("notification hub lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        debug!(group, "creating broadcast group");
        groups
            .entry(group.to_string())
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Sends to every current member. Returns how many received it; a group
    /// nobody has joined gets 0.
    pub fn broadcast(&self, group: &str, event: RealtimeEvent) -> usize {
        let Ok(groups) = self.groups.read() else {
            return 0;
        };
        match groups.get(group) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops groups whose members have all disconnected.
    pub fn prune(&self) {
        if let Ok(mut groups) = self.groups.write() {
            groups.retain(|_, sender| sender.receiver_count() > 0);
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().map(|groups| groups.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationSink for NotificationHub {
    async fn publish(&self, group: &str, event: RealtimeEvent) {
        let delivered = self.broadcast(group, event);
        trace!(group, delivered, "realtime event published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn members_receive_group_events() {
        let hub = NotificationHub::new();
        let mut first = hub.subscribe("user_1");
        let mut second = hub.subscribe("user_1");
        let mut other = hub.subscribe("user_2");

        hub.publish("user_1", RealtimeEvent::UnreadCount { count: 2 }).await;

        assert_eq!(first.recv().await.unwrap(), RealtimeEvent::UnreadCount { count: 2 });
        assert_eq!(second.recv().await.unwrap(), RealtimeEvent::UnreadCount { count: 2 });
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn publishing_to_an_empty_group_is_a_no_op() {
        let hub = NotificationHub::new();
        assert_eq!(hub.broadcast("vendor_9", RealtimeEvent::error("nobody listening")), 0);
        assert_eq!(hub.group_count(), 0);
    }

    #[test]
    fn prune_forgets_abandoned_groups() {
        let hub = NotificationHub::new();
        let receiver = hub.subscribe("user_3");
        assert_eq!(hub.group_count(), 1);
        drop(receiver);
        hub.prune();
        assert_eq!(hub.group_count(), 0);
    }
}
