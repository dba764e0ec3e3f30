//! Configuration settings structures for courier-rs
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables. Channel configuration is a tagged
//! union: each channel family carries only the fields its providers need,
//! and every struct validates eagerly at load time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::error::ConfigError;
use crate::logger::LoggerConfig;
use crate::models::NotificationChannel;

// ============================================================================
// Default value functions
// ============================================================================

fn default_initialization_timeout_ms() -> u64 {
    30_000
}

fn default_initialization_max_retries() -> u32 {
    2
}

fn default_initialization_retry_base_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_sms_max_length() -> usize {
    160
}

fn default_send_interval_ms() -> u64 {
    100
}

fn default_max_per_minute() -> u32 {
    60
}

fn default_webhook_timeout_seconds() -> u64 {
    30
}

fn default_webhook_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_signature_header() -> String {
    "X-Signature".to_string()
}

// ============================================================================
// Root configuration
// ============================================================================

/// Root configuration document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub logger: LoggerConfig,
    pub factory: FactorySettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.factory.validate()
    }
}

// ============================================================================
// Factory configuration
// ============================================================================

/// Configuration consumed by [`crate::factory::AdapterFactory`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FactorySettings {
    /// Channels the factory will attempt to bring up.
    pub enabled_channels: Vec<NotificationChannel>,

    /// Per-channel configuration blocks, keyed by channel.
    #[serde(default)]
    pub channels: HashMap<NotificationChannel, ChannelSettings>,

    /// Upper bound for a single adapter initialization attempt.
    #[serde(default = "default_initialization_timeout_ms")]
    pub initialization_timeout_ms: u64,

    /// Retries after the first failed initialization attempt.
    #[serde(default = "default_initialization_max_retries")]
    pub initialization_max_retries: u32,

    /// Base delay for exponential backoff between initialization attempts.
    #[serde(default = "default_initialization_retry_base_ms")]
    pub initialization_retry_base_ms: u64,

    /// Re-initialize unready adapters on demand and from the health loop.
    #[serde(default = "default_true")]
    pub auto_recovery: bool,

    /// Health check cadence; the loop only runs when auto-recovery is on
    /// and an interval is set.
    #[serde(default)]
    pub health_check_interval_ms: Option<u64>,
}

impl FactorySettings {
    /// Validates factory-level fields and every configured channel block.
    ///
    /// A channel block whose variant does not match its map key (e.g. an
    /// SMS block under the webhook slot) is rejected here rather than at
    /// first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_channels.is_empty() {
            return Err(ConfigError::validation(
                "enabled_channels",
                "at least one channel must be enabled",
            ));
        }
        if self.initialization_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "initialization_timeout_ms",
                "must be greater than zero",
            ));
        }
        if let Some(interval) = self.health_check_interval_ms
            && interval == 0
        {
            return Err(ConfigError::validation(
                "health_check_interval_ms",
                "must be greater than zero when set",
            ));
        }
        for (channel, settings) in &self.channels {
            if settings.channel() != *channel {
                return Err(ConfigError::ValidationError {
                    field: format!("channels.{channel}"),
                    message: format!(
                        "config block is for channel '{}', expected '{}'",
                        settings.channel(),
                        channel
                    ),
                });
            }
            settings.validate()?;
        }
        Ok(())
    }

    /// The configuration block for a channel, if present.
    pub fn channel_settings(&self, channel: NotificationChannel) -> Option<&ChannelSettings> {
        self.channels.get(&channel)
    }
}

// ============================================================================
// Channel configuration (tagged union)
// ============================================================================

/// Per-channel configuration, one variant per channel family.
///
/// Immutable once handed to an adapter's `initialize`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelSettings {
    Sms(SmsSettings),
    Webhook(WebhookSettings),
}

impl ChannelSettings {
    /// The channel this block configures.
    pub fn channel(&self) -> NotificationChannel {
        match self {
            ChannelSettings::Sms(_) => NotificationChannel::Sms,
            ChannelSettings::Webhook(_) => NotificationChannel::Webhook,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ChannelSettings::Sms(settings) => {
                Validate::validate(settings)?;
                settings.validate_cross_fields()
            }
            ChannelSettings::Webhook(settings) => {
                Validate::validate(settings)?;
                Ok(())
            }
        }
    }
}

// ============================================================================
// SMS configuration
// ============================================================================

/// SMS channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SmsSettings {
    /// Provider identifier: "twilio", "vonage", or "memory".
    #[validate(length(min = 1, message = "provider must not be empty"))]
    pub provider: String,

    /// Provider account identifier (account SID / API key).
    #[validate(length(min = 1, message = "account_id must not be empty"))]
    pub account_id: String,

    /// Provider secret (auth token / API secret).
    #[validate(length(min = 1, message = "auth_token must not be empty"))]
    pub auth_token: String,

    /// Sender number in E.164 format.
    #[validate(length(min = 4, message = "from_number is too short"))]
    pub from_number: String,

    /// Fixed prefix prepended to every message body.
    #[serde(default)]
    pub message_prefix: Option<String>,

    /// Hard ceiling on composed message length.
    #[serde(default = "default_sms_max_length")]
    #[validate(range(min = 10, message = "max_length must be at least 10"))]
    pub max_length: usize,

    /// Accepted but currently only gates the truncation branch; long
    /// messages are never split into multiple provider sends.
    #[serde(default)]
    pub auto_split: bool,

    /// Pacing delay between consecutive sends in a bulk dispatch.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    /// Hard cap on sends per 60-second window during bulk dispatch.
    #[serde(default = "default_max_per_minute")]
    #[validate(range(min = 1, message = "max_per_minute must be at least 1"))]
    pub max_per_minute: u32,

    /// Base URL for short tracking links substituted into action URLs.
    #[serde(default)]
    #[validate(url(message = "tracking_base_url must be a valid URL"))]
    pub tracking_base_url: Option<String>,

    /// Callback URL handed to providers that support delivery receipts.
    #[serde(default)]
    #[validate(url(message = "status_callback_url must be a valid URL"))]
    pub status_callback_url: Option<String>,

    /// Country calling code prepended to bare national numbers ("1", "44").
    #[serde(default)]
    pub default_country_code: Option<String>,
}

impl SmsSettings {
    fn validate_cross_fields(&self) -> Result<(), ConfigError> {
        if self.send_interval_ms == 0 {
            return Err(ConfigError::validation(
                "send_interval_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Webhook configuration
// ============================================================================

/// HTTP method used for webhook deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebhookMethod {
    #[default]
    Post,
    Put,
    Patch,
}

impl WebhookMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            WebhookMethod::Post => reqwest::Method::POST,
            WebhookMethod::Put => reqwest::Method::PUT,
            WebhookMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Wire format for webhook payloads. One format per adapter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    Form,
    Xml,
}

impl PayloadFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "application/json",
            PayloadFormat::Form => "application/x-www-form-urlencoded",
            PayloadFormat::Xml => "application/xml",
        }
    }
}

/// HMAC digest used for webhook payload signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    #[default]
    Sha256,
    Sha512,
    Md5,
}

/// Outbound signing configuration.
///
/// The signature always covers the canonical JSON serialization of the
/// payload, regardless of the configured wire format.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SignatureSettings {
    #[validate(length(min = 8, message = "secret must be at least 8 bytes"))]
    pub secret: String,

    #[serde(default = "default_signature_header")]
    #[validate(length(min = 1, message = "header must not be empty"))]
    pub header: String,

    #[serde(default)]
    pub algorithm: SignatureAlgorithm,
}

/// Webhook channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct WebhookSettings {
    /// Fallback target when a recipient has no webhook address.
    #[serde(default)]
    #[validate(url(message = "default_url must be a valid URL"))]
    pub default_url: Option<String>,

    #[serde(default)]
    pub method: WebhookMethod,

    #[serde(default)]
    pub format: PayloadFormat,

    /// Static headers attached to every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_webhook_timeout_seconds")]
    #[validate(range(min = 1, message = "timeout_seconds must be at least 1"))]
    pub timeout_seconds: u64,

    /// Retries after the first attempt; only retryable failures
    /// (network errors, 5xx, 429, 408) consume them.
    #[serde(default = "default_webhook_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default)]
    #[validate(nested)]
    pub signature: Option<SignatureSettings>,
}
