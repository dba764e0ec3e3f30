//! SMS channel adapter.
//!
//! Provider-agnostic above the transport call: providers come out of the
//! [`SmsProviderRegistry`], destinations are normalized to E.164, bodies go
//! through prefix/length policy, and bulk dispatch is paced by the
//! dual-rate throttle.

mod memory;
mod phone;
mod provider;
mod throttle;
mod twilio;
mod vonage;

pub use memory::{MemorySmsProvider, StoredSms};
pub use provider::{OutboundSms, ProviderReceipt, SmsProvider, SmsProviderRegistry};
pub use throttle::DualRateThrottle;
pub use twilio::TwilioSmsProvider;
pub use vonage::VonageSmsProvider;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::RwLock;

use crate::config::{ChannelSettings, SmsSettings};
use crate::error::{NotifyError, NotifyResult};
use crate::models::{
    BaseEvent, DeliveryState, DeliveryStatus, NotificationChannel, NotificationContent,
    NotificationRecipient, NotificationResult, SendOptions,
};

use super::{ChannelAdapter, codes};

struct SmsRuntime {
    settings: SmsSettings,
    provider: Arc<dyn SmsProvider>,
}

/// SMS adapter. Constructed unconfigured; [`ChannelAdapter::initialize`]
/// selects the provider and makes it ready.
pub struct SmsAdapter {
    registry: Arc<SmsProviderRegistry>,
    runtime: RwLock<Option<Arc<SmsRuntime>>>,
    ready: AtomicBool,
    /// notification id -> provider reference, for status lookups.
    references: DashMap<String, String>,
}

impl SmsAdapter {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SmsProviderRegistry::with_builtins()))
    }

    /// Adapter backed by a caller-supplied provider registry.
    pub fn with_registry(registry: Arc<SmsProviderRegistry>) -> Self {
        Self {
            registry,
            runtime: RwLock::new(None),
            ready: AtomicBool::new(false),
            references: DashMap::new(),
        }
    }

    async fn runtime(&self) -> Option<Arc<SmsRuntime>> {
        self.runtime.read().await.clone()
    }

    /// Applies tracking-URL rewriting, the configured prefix, and the
    /// length ceiling.
    fn compose_body(
        settings: &SmsSettings,
        content: &NotificationContent,
        notification_id: &str,
    ) -> String {
        let mut body = content.body.clone();

        if let Some(base) = &settings.tracking_base_url
            && let Some(action) = content.actions.first()
        {
            let short_url = format!("{}/{}", base.trim_end_matches('/'), notification_id);
            if body.contains(&action.url) {
                body = body.replace(&action.url, &short_url);
            } else {
                body.push(' ');
                body.push_str(&short_url);
            }
        }

        let mut composed = match &settings.message_prefix {
            Some(prefix) => format!("{prefix}{body}"),
            None => body,
        };

        if composed.chars().count() > settings.max_length {
            composed = composed
                .chars()
                .take(settings.max_length.saturating_sub(1))
                .collect::<String>()
                + "…";
        }

        composed
    }

    fn status_callback(settings: &SmsSettings, notification_id: &str) -> Option<String> {
        settings.status_callback_url.as_ref().map(|url| {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}notification_id={notification_id}")
        })
    }

    /// Precondition checks and message composition; everything short of
    /// the provider call. Err carries a ready-made failed result.
    fn prepare(
        runtime: &SmsRuntime,
        recipient: &NotificationRecipient,
        content: &NotificationContent,
        notification_id: &str,
    ) -> Result<OutboundSms, NotificationResult> {
        let Some(raw_number) = recipient.primary_address(NotificationChannel::Sms) else {
            return Err(NotificationResult::failed(
                notification_id,
                codes::PHONE_NUMBER_MISSING,
                format!("recipient '{}' has no phone number", recipient.id),
            ));
        };

        let Some(to) = phone::normalize(raw_number, runtime.settings.default_country_code.as_deref())
        else {
            return Err(NotificationResult::failed(
                notification_id,
                codes::SMS_SEND_FAILED,
                format!("phone number '{raw_number}' could not be normalized"),
            ));
        };

        Ok(OutboundSms {
            to,
            from: runtime.settings.from_number.clone(),
            body: Self::compose_body(&runtime.settings, content, notification_id),
            status_callback: Self::status_callback(&runtime.settings, notification_id),
        })
    }

    async fn dispatch(
        &self,
        runtime: &SmsRuntime,
        message: &OutboundSms,
        notification_id: String,
    ) -> NotificationResult {
        match runtime.provider.send_message(message).await {
            Ok(receipt) => {
                self.references
                    .insert(notification_id.clone(), receipt.reference.clone());
                tracing::debug!(
                    notification_id = %notification_id,
                    provider = runtime.provider.id(),
                    reference = %receipt.reference,
                    "SMS accepted by provider"
                );
                NotificationResult::ok(notification_id, None).with_details(json!({
                    "provider": runtime.provider.id(),
                    "reference": receipt.reference,
                }))
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification_id,
                    provider = runtime.provider.id(),
                    error = %e,
                    "SMS send failed"
                );
                NotificationResult::failed(notification_id, codes::SMS_SEND_FAILED, e.to_string())
            }
        }
    }
}

impl Default for SmsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelAdapter for SmsAdapter {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Sms
    }

    async fn initialize(&self, settings: &ChannelSettings) -> NotifyResult<()> {
        let ChannelSettings::Sms(sms_settings) = settings else {
            return Err(NotifyError::validation(
                "channel",
                "SMS adapter requires an SMS configuration block",
            ));
        };
        settings
            .validate()
            .map_err(|e| NotifyError::validation("config", e.to_string()))?;

        if sms_settings.auto_split {
            tracing::warn!(
                "auto_split is enabled but message splitting is not implemented; \
                 long messages are truncated"
            );
        }

        let provider = self.registry.create(sms_settings)?;
        tracing::info!(provider = provider.id(), "SMS adapter initialized");

        *self.runtime.write().await = Some(Arc::new(SmsRuntime {
            settings: sms_settings.clone(),
            provider,
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
        _event: Option<&BaseEvent>,
        options: &SendOptions,
    ) -> NotificationResult {
        let notification_id = options.notification_id_or_new();

        let Some(runtime) = self.runtime().await else {
            return NotificationResult::failed(
                notification_id,
                codes::CHANNEL_NOT_READY,
                "SMS adapter is not initialized",
            );
        };

        match Self::prepare(&runtime, recipient, content, &notification_id) {
            Ok(message) => self.dispatch(&runtime, &message, notification_id).await,
            Err(failed) => failed,
        }
    }

    async fn send_bulk(
        &self,
        recipients: &[NotificationRecipient],
        content: &NotificationContent,
        _event: Option<&BaseEvent>,
        options: &SendOptions,
    ) -> Vec<NotificationResult> {
        let Some(runtime) = self.runtime().await else {
            return recipients
                .iter()
                .map(|_| {
                    NotificationResult::failed(
                        options.notification_id_or_new(),
                        codes::CHANNEL_NOT_READY,
                        "SMS adapter is not initialized",
                    )
                })
                .collect();
        };

        let mut throttle = DualRateThrottle::new(
            Duration::from_millis(runtime.settings.send_interval_ms),
            runtime.settings.max_per_minute,
        );

        let mut results = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let notification_id = options.notification_id_or_new();
            match Self::prepare(&runtime, recipient, content, &notification_id) {
                // Precondition failures consume no provider quota.
                Err(failed) => results.push(failed),
                Ok(message) => {
                    throttle.acquire().await;
                    results.push(self.dispatch(&runtime, &message, notification_id).await);
                }
            }
        }
        results
    }

    async fn cancel(&self, notification_id: &str) -> bool {
        tracing::warn!(
            notification_id = %notification_id,
            "SMS cancellation is not supported; messages already handed to the provider"
        );
        false
    }

    async fn get_status(&self, notification_id: &str) -> DeliveryStatus {
        let Some(runtime) = self.runtime().await else {
            return DeliveryStatus::inferred(DeliveryState::Unknown, "SMS adapter is not initialized");
        };

        let Some(reference) = self.references.get(notification_id).map(|r| r.clone()) else {
            return DeliveryStatus::inferred(
                DeliveryState::Sent,
                "no provider reference recorded for this notification id",
            );
        };

        match runtime.provider.fetch_status(&reference).await {
            Ok(Some(state)) => DeliveryStatus::confirmed(
                state,
                json!({
                    "provider": runtime.provider.id(),
                    "reference": reference,
                }),
            ),
            Ok(None) => DeliveryStatus::inferred(
                DeliveryState::Sent,
                "provider does not support status lookup",
            ),
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification_id,
                    error = %e,
                    "SMS status lookup failed"
                );
                DeliveryStatus::inferred(DeliveryState::Sent, "provider status lookup failed")
            }
        }
    }
}
