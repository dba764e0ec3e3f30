//! Actor-owned adapter registry.
//!
//! A single spawned task exclusively owns the channel → adapter map; every
//! read and write goes through a command channel with oneshot replies.
//! Readers therefore always observe an atomic before/after state of any
//! recovery in flight, and snapshots are defensive copies rather than live
//! views of the map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::adapters::ChannelAdapter;
use crate::models::NotificationChannel;

/// Lifecycle state of a registered channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initializing,
    Ready,
    Degraded,
    Failed,
}

/// Registry entry: the adapter plus its lifecycle state.
#[derive(Clone)]
pub struct AdapterEntry {
    pub adapter: Arc<dyn ChannelAdapter>,
    pub state: ChannelState,
}

enum Command {
    Insert {
        channel: NotificationChannel,
        entry: AdapterEntry,
        reply: oneshot::Sender<()>,
    },
    Get {
        channel: NotificationChannel,
        reply: oneshot::Sender<Option<AdapterEntry>>,
    },
    SetState {
        channel: NotificationChannel,
        state: ChannelState,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<(NotificationChannel, AdapterEntry)>>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the registry owner task.
#[derive(Clone)]
pub struct AdapterRegistry {
    tx: mpsc::Sender<Command>,
}

impl AdapterRegistry {
    /// Spawns the owner task. Must be called within a tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(32);

        tokio::spawn(async move {
            let mut entries: HashMap<NotificationChannel, AdapterEntry> = HashMap::new();

            while let Some(command) = rx.recv().await {
                match command {
                    Command::Insert {
                        channel,
                        entry,
                        reply,
                    } => {
                        entries.insert(channel, entry);
                        let _ = reply.send(());
                    }
                    Command::Get { channel, reply } => {
                        let _ = reply.send(entries.get(&channel).cloned());
                    }
                    Command::SetState {
                        channel,
                        state,
                        reply,
                    } => {
                        let updated = match entries.get_mut(&channel) {
                            Some(entry) => {
                                entry.state = state;
                                true
                            }
                            None => false,
                        };
                        let _ = reply.send(updated);
                    }
                    Command::Snapshot { reply } => {
                        let mut snapshot: Vec<_> = entries
                            .iter()
                            .map(|(channel, entry)| (*channel, entry.clone()))
                            .collect();
                        snapshot.sort_by_key(|(channel, _)| *channel);
                        let _ = reply.send(snapshot);
                    }
                    Command::Clear { reply } => {
                        entries.clear();
                        let _ = reply.send(());
                    }
                }
            }
        });

        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
        fallback: T,
    ) -> T {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(build(reply)).await.is_err() {
            return fallback;
        }
        rx.await.unwrap_or(fallback)
    }

    pub async fn insert(&self, channel: NotificationChannel, entry: AdapterEntry) {
        self.request(
            |reply| Command::Insert {
                channel,
                entry,
                reply,
            },
            (),
        )
        .await;
    }

    pub async fn get(&self, channel: NotificationChannel) -> Option<AdapterEntry> {
        self.request(|reply| Command::Get { channel, reply }, None).await
    }

    /// Updates the state of a registered channel; `false` if unregistered.
    pub async fn set_state(&self, channel: NotificationChannel, state: ChannelState) -> bool {
        self.request(
            |reply| Command::SetState {
                channel,
                state,
                reply,
            },
            false,
        )
        .await
    }

    /// Consistent copy of all entries, ordered by channel.
    pub async fn snapshot(&self) -> Vec<(NotificationChannel, AdapterEntry)> {
        self.request(|reply| Command::Snapshot { reply }, Vec::new()).await
    }

    pub async fn clear(&self) {
        self.request(|reply| Command::Clear { reply }, ()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SmsAdapter;

    fn entry(state: ChannelState) -> AdapterEntry {
        AdapterEntry {
            adapter: Arc::new(SmsAdapter::new()),
            state,
        }
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let registry = AdapterRegistry::spawn();
        assert!(registry.get(NotificationChannel::Sms).await.is_none());

        registry
            .insert(NotificationChannel::Sms, entry(ChannelState::Initializing))
            .await;

        let fetched = registry.get(NotificationChannel::Sms).await.unwrap();
        assert_eq!(fetched.state, ChannelState::Initializing);
    }

    #[tokio::test]
    async fn test_set_state() {
        let registry = AdapterRegistry::spawn();
        registry
            .insert(NotificationChannel::Sms, entry(ChannelState::Initializing))
            .await;

        assert!(registry.set_state(NotificationChannel::Sms, ChannelState::Ready).await);
        assert_eq!(
            registry.get(NotificationChannel::Sms).await.unwrap().state,
            ChannelState::Ready
        );

        // Unregistered channels report false rather than creating entries.
        assert!(!registry.set_state(NotificationChannel::Webhook, ChannelState::Ready).await);
    }

    #[tokio::test]
    async fn test_snapshot_is_defensive_copy() {
        let registry = AdapterRegistry::spawn();
        registry
            .insert(NotificationChannel::Webhook, entry(ChannelState::Ready))
            .await;
        registry
            .insert(NotificationChannel::Sms, entry(ChannelState::Ready))
            .await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        // Ordered by channel, not insertion.
        assert_eq!(snapshot[0].0, NotificationChannel::Sms);

        registry.clear().await;
        // The copy we took is unaffected by the clear.
        assert_eq!(snapshot.len(), 2);
        assert!(registry.snapshot().await.is_empty());
    }
}
