//! SMS provider abstraction.
//!
//! The adapter is provider-agnostic above the transport call; providers are
//! selected through a registration map keyed by identifier, so adding one
//! never grows a match in the adapter itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::config::SmsSettings;
use crate::error::{NotifyError, NotifyResult};
use crate::models::{DeliveryState, NotificationChannel};

use super::memory::MemorySmsProvider;
use super::twilio::TwilioSmsProvider;
use super::vonage::VonageSmsProvider;

/// A single message handed to a provider, destination already normalized.
#[derive(Debug, Clone)]
pub struct OutboundSms {
    /// Destination in E.164 form.
    pub to: String,
    /// Sender number.
    pub from: String,
    /// Composed body, prefix applied and length policy enforced.
    pub body: String,
    /// Delivery-receipt callback, notification id already embedded.
    pub status_callback: Option<String>,
}

/// Provider acknowledgment for an accepted message.
#[derive(Debug, Clone)]
pub struct ProviderReceipt {
    /// Provider-scoped message reference (SID, message-id, ...).
    pub reference: String,
    /// Raw provider response for result details.
    pub raw: JsonValue,
}

/// Transport for one SMS provider.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Registry identifier ("twilio", "vonage", "memory").
    fn id(&self) -> &'static str;

    /// Hands one message to the provider. An `Ok` receipt means the
    /// provider accepted the message, not that it was delivered.
    async fn send_message(&self, message: &OutboundSms) -> NotifyResult<ProviderReceipt>;

    /// Queries delivery state for a previously returned reference.
    /// Providers without a status API return `Ok(None)`.
    async fn fetch_status(&self, _reference: &str) -> NotifyResult<Option<DeliveryState>> {
        Ok(None)
    }
}

type ProviderFactory = Box<dyn Fn(&SmsSettings) -> NotifyResult<Arc<dyn SmsProvider>> + Send + Sync>;

/// Registry mapping provider identifiers to constructors.
pub struct SmsProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl SmsProviderRegistry {
    /// An empty registry. Most callers want [`SmsProviderRegistry::with_builtins`].
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in providers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("twilio", |settings| {
            Ok(Arc::new(TwilioSmsProvider::new(settings)) as Arc<dyn SmsProvider>)
        });
        registry.register("vonage", |settings| {
            Ok(Arc::new(VonageSmsProvider::new(settings)) as Arc<dyn SmsProvider>)
        });
        registry.register("memory", |_settings| {
            Ok(Arc::new(MemorySmsProvider::new()) as Arc<dyn SmsProvider>)
        });
        registry
    }

    /// Registers (or replaces) a provider constructor.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&SmsSettings) -> NotifyResult<Arc<dyn SmsProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
        self
    }

    /// Constructs the provider named in the settings.
    pub fn create(&self, settings: &SmsSettings) -> NotifyResult<Arc<dyn SmsProvider>> {
        let factory = self.factories.get(&settings.provider).ok_or_else(|| {
            NotifyError::UnsupportedProvider {
                channel: NotificationChannel::Sms,
                provider: settings.provider.clone(),
            }
        })?;
        factory(settings)
    }
}

impl Default for SmsProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
