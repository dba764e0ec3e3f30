//! In-memory SMS provider for tests and local development.
//!
//! Accepts every message, stores it keyed by a deterministic reference,
//! and never performs network I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;

use crate::error::NotifyResult;

use super::provider::{OutboundSms, ProviderReceipt, SmsProvider};

/// A message the provider accepted.
#[derive(Debug, Clone)]
pub struct StoredSms {
    pub to: String,
    pub from: String,
    pub body: String,
    pub status_callback: Option<String>,
}

#[derive(Default)]
struct Inner {
    messages: DashMap<String, StoredSms>,
    counter: AtomicU64,
}

/// Cloneable handle over a shared message store, so tests can keep a
/// handle to the instance they registered.
#[derive(Clone, Default)]
pub struct MemorySmsProvider {
    inner: Arc<Inner>,
}

impl MemorySmsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages accepted so far.
    pub fn sent_count(&self) -> usize {
        self.inner.messages.len()
    }

    /// Looks up an accepted message by its reference.
    pub fn message(&self, reference: &str) -> Option<StoredSms> {
        self.inner.messages.get(reference).map(|m| m.clone())
    }

    /// All accepted messages in acceptance order.
    pub fn messages(&self) -> Vec<StoredSms> {
        let mut entries: Vec<(String, StoredSms)> = self
            .inner
            .messages
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        // References are "mem-<n>"; sort by n for acceptance order.
        entries.sort_by_key(|(key, _)| {
            key.trim_start_matches("mem-").parse::<u64>().unwrap_or(0)
        });
        entries.into_iter().map(|(_, m)| m).collect()
    }
}

#[async_trait]
impl SmsProvider for MemorySmsProvider {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn send_message(&self, message: &OutboundSms) -> NotifyResult<ProviderReceipt> {
        let seq = self.inner.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let reference = format!("mem-{seq}");

        self.inner.messages.insert(
            reference.clone(),
            StoredSms {
                to: message.to.clone(),
                from: message.from.clone(),
                body: message.body.clone(),
                status_callback: message.status_callback.clone(),
            },
        );

        Ok(ProviderReceipt {
            raw: json!({ "reference": reference }),
            reference,
        })
    }
}
