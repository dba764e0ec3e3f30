//! Webhook channel adapter.
//!
//! Delivers the notification envelope to HTTP(S) targets with optional
//! HMAC signing, exponential-backoff retry for retryable failures, and
//! request coalescing for bulk sends sharing a destination URL.

mod payload;
mod signature;

pub use payload::{EnvelopeContext, batch_envelope, canonical_json, serialize, single_envelope};
pub use signature::sign;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tokio::sync::RwLock;

use crate::config::{ChannelSettings, WebhookSettings};
use crate::error::{NotifyError, NotifyResult};
use crate::external::client::HTTP_CLIENT;
use crate::models::{
    BaseEvent, DeliveryState, DeliveryStatus, NotificationChannel, NotificationContent,
    NotificationRecipient, NotificationResult, SendOptions,
};

use super::{ChannelAdapter, codes};

struct WebhookRuntime {
    settings: WebhookSettings,
}

struct DeliveryReceipt {
    status: u16,
    attempts: u32,
}

struct DeliveryFailure {
    code: String,
    message: String,
    attempts: u32,
}

/// Webhook adapter. Fire-and-forget from the provider's perspective:
/// no cancellation, and status reflects only the HTTP exchange.
pub struct WebhookAdapter {
    runtime: RwLock<Option<Arc<WebhookRuntime>>>,
    ready: AtomicBool,
}

impl WebhookAdapter {
    pub fn new() -> Self {
        Self {
            runtime: RwLock::new(None),
            ready: AtomicBool::new(false),
        }
    }

    async fn runtime(&self) -> Option<Arc<WebhookRuntime>> {
        self.runtime.read().await.clone()
    }

    /// Recipient's first webhook address, else the configured default.
    fn resolve_target(settings: &WebhookSettings, recipient: &NotificationRecipient) -> Option<String> {
        recipient
            .primary_address(NotificationChannel::Webhook)
            .map(String::from)
            .or_else(|| settings.default_url.clone())
    }

    /// Network errors and 5xx/429/408 responses may succeed on retry;
    /// every other status is terminal.
    fn is_retryable(status: reqwest::StatusCode) -> bool {
        status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
    }

    /// Sends one envelope with retry. The signature covers the canonical
    /// JSON bytes even when the wire format is form or XML.
    async fn deliver(
        &self,
        runtime: &WebhookRuntime,
        url: &str,
        notification_id: &str,
        envelope: &JsonValue,
        batch_id: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        let settings = &runtime.settings;
        let body = payload::serialize(settings.format, envelope);
        let signature_header = settings
            .signature
            .as_ref()
            .map(|sig| (sig.header.clone(), signature::sign(sig, &payload::canonical_json(envelope))));

        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let mut request = HTTP_CLIENT
                .request(settings.method.as_reqwest(), url)
                .timeout(Duration::from_secs(settings.timeout_seconds))
                .header("Content-Type", settings.format.content_type())
                .header("X-Notification-ID", notification_id)
                .body(body.clone());
            for (name, value) in &settings.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some((name, value)) = &signature_header {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(batch) = batch_id {
                request = request.header("X-Batch-ID", batch);
            }

            let outcome = request.send().await;

            let (retryable, code, message) = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(DeliveryReceipt {
                            status: status.as_u16(),
                            attempts,
                        });
                    }
                    (
                        Self::is_retryable(status),
                        codes::http_error(status.as_u16()),
                        format!("webhook target returned HTTP {status}"),
                    )
                }
                Err(e) => (true, codes::WEBHOOK_SEND_FAILED.to_string(), e.to_string()),
            };

            if retryable && attempts <= settings.max_retries {
                // base * 2^n for the n-th completed attempt (0-based).
                let delay = Duration::from_millis(
                    settings
                        .retry_base_ms
                        .saturating_mul(1u64 << (attempts - 1).min(16)),
                );
                tracing::debug!(
                    notification_id = %notification_id,
                    url = %url,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retryable webhook failure, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(DeliveryFailure {
                code,
                message,
                attempts,
            });
        }
    }

    fn success_result(
        notification_id: String,
        url: &str,
        receipt: DeliveryReceipt,
    ) -> NotificationResult {
        NotificationResult::ok(notification_id, None).with_details(json!({
            "url": url,
            "status": receipt.status,
            "attempts": receipt.attempts,
        }))
    }

    fn failure_result(
        notification_id: String,
        url: &str,
        failure: &DeliveryFailure,
    ) -> NotificationResult {
        NotificationResult::failed(notification_id, &failure.code, &failure.message).with_details(
            json!({
                "url": url,
                "attempts": failure.attempts,
            }),
        )
    }

    async fn send_single(
        &self,
        runtime: &WebhookRuntime,
        recipient: &NotificationRecipient,
        content: &NotificationContent,
        event: Option<&BaseEvent>,
        options: &SendOptions,
        notification_id: String,
    ) -> NotificationResult {
        let Some(url) = Self::resolve_target(&runtime.settings, recipient) else {
            return NotificationResult::failed(
                notification_id,
                codes::WEBHOOK_URL_MISSING,
                format!(
                    "recipient '{}' has no webhook URL and no default is configured",
                    recipient.id
                ),
            );
        };

        let ctx = EnvelopeContext {
            notification_id: &notification_id,
            content,
            event,
            tracking: options.tracking.as_ref(),
        };
        let envelope = single_envelope(&ctx, recipient);

        match self
            .deliver(runtime, &url, &notification_id, &envelope, None)
            .await
        {
            Ok(receipt) => Self::success_result(notification_id, &url, receipt),
            Err(failure) => {
                tracing::warn!(
                    notification_id = %notification_id,
                    url = %url,
                    code = %failure.code,
                    attempts = failure.attempts,
                    "webhook delivery failed"
                );
                Self::failure_result(notification_id, &url, &failure)
            }
        }
    }
}

impl Default for WebhookAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelAdapter for WebhookAdapter {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Webhook
    }

    async fn initialize(&self, settings: &ChannelSettings) -> NotifyResult<()> {
        let ChannelSettings::Webhook(webhook_settings) = settings else {
            return Err(NotifyError::validation(
                "channel",
                "webhook adapter requires a webhook configuration block",
            ));
        };
        settings
            .validate()
            .map_err(|e| NotifyError::validation("config", e.to_string()))?;

        tracing::info!(
            format = ?webhook_settings.format,
            signed = webhook_settings.signature.is_some(),
            "webhook adapter initialized"
        );

        *self.runtime.write().await = Some(Arc::new(WebhookRuntime {
            settings: webhook_settings.clone(),
        }));
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn send(
        &self,
        recipient: &NotificationRecipient,
        content: &NotificationContent,
        event: Option<&BaseEvent>,
        options: &SendOptions,
    ) -> NotificationResult {
        let notification_id = options.notification_id_or_new();

        let Some(runtime) = self.runtime().await else {
            return NotificationResult::failed(
                notification_id,
                codes::CHANNEL_NOT_READY,
                "webhook adapter is not initialized",
            );
        };

        self.send_single(&runtime, recipient, content, event, options, notification_id)
            .await
    }

    async fn send_bulk(
        &self,
        recipients: &[NotificationRecipient],
        content: &NotificationContent,
        event: Option<&BaseEvent>,
        options: &SendOptions,
    ) -> Vec<NotificationResult> {
        let Some(runtime) = self.runtime().await else {
            return recipients
                .iter()
                .map(|_| {
                    NotificationResult::failed(
                        options.notification_id_or_new(),
                        codes::CHANNEL_NOT_READY,
                        "webhook adapter is not initialized",
                    )
                })
                .collect();
        };

        let mut results: Vec<Option<NotificationResult>> = vec![None; recipients.len()];

        // Group recipient indexes by resolved target, preserving first-seen
        // order; unresolvable recipients fail without touching a group.
        let mut group_order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, recipient) in recipients.iter().enumerate() {
            match Self::resolve_target(&runtime.settings, recipient) {
                Some(url) => {
                    groups
                        .entry(url.clone())
                        .or_insert_with(|| {
                            group_order.push(url);
                            Vec::new()
                        })
                        .push(index);
                }
                None => {
                    results[index] = Some(NotificationResult::failed(
                        options.notification_id_or_new(),
                        codes::WEBHOOK_URL_MISSING,
                        format!(
                            "recipient '{}' has no webhook URL and no default is configured",
                            recipients[index].id
                        ),
                    ));
                }
            }
        }

        for url in group_order {
            let indexes = &groups[&url];

            if indexes.len() == 1 {
                let index = indexes[0];
                let result = self
                    .send_single(
                        &runtime,
                        &recipients[index],
                        content,
                        event,
                        options,
                        options.notification_id_or_new(),
                    )
                    .await;
                results[index] = Some(result);
                continue;
            }

            // Coalesced path: one HTTP request for the whole group, one
            // logical send attempt, and the single outcome expanded into
            // one result per group member.
            let notification_id = options.notification_id_or_new();
            let batch_id = uuid::Uuid::new_v4().to_string();
            let members: Vec<&NotificationRecipient> =
                indexes.iter().map(|&i| &recipients[i]).collect();

            let ctx = EnvelopeContext {
                notification_id: &notification_id,
                content,
                event,
                tracking: options.tracking.as_ref(),
            };
            let envelope = batch_envelope(&ctx, &members);

            tracing::debug!(
                url = %url,
                batch_id = %batch_id,
                batch_size = members.len(),
                "coalescing webhook recipients into one request"
            );

            let group_result = self
                .deliver(&runtime, &url, &notification_id, &envelope, Some(&batch_id))
                .await;

            for &index in indexes {
                results[index] = Some(match &group_result {
                    Ok(receipt) => NotificationResult::ok(notification_id.clone(), None)
                        .with_details(json!({
                            "url": url,
                            "status": receipt.status,
                            "attempts": receipt.attempts,
                            "batchId": batch_id,
                            "batchSize": members.len(),
                        })),
                    Err(failure) => {
                        NotificationResult::failed(
                            notification_id.clone(),
                            &failure.code,
                            &failure.message,
                        )
                        .with_details(json!({
                            "url": url,
                            "attempts": failure.attempts,
                            "batchId": batch_id,
                            "batchSize": members.len(),
                        }))
                    }
                });
            }
        }

        results
            .into_iter()
            .map(|r| r.expect("every recipient receives a result"))
            .collect()
    }

    async fn cancel(&self, notification_id: &str) -> bool {
        tracing::warn!(
            notification_id = %notification_id,
            "webhook cancellation is not supported; deliveries are fire-and-forget"
        );
        false
    }

    async fn get_status(&self, _notification_id: &str) -> DeliveryStatus {
        DeliveryStatus::inferred(
            DeliveryState::Delivered,
            "reflects only the HTTP exchange, not downstream processing by the receiver",
        )
    }
}
