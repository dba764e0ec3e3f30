//! Notification data model.
//!
//! This module provides the channel-agnostic types exchanged with channel
//! adapters: recipients, content, triggering events, and delivery results.

use std::collections::HashMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// Enums
// ============================================================================

/// Supported notification transports.
///
/// Identifies both the configuration slot and the adapter implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    Webhook,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Push => "push",
            NotificationChannel::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering format of the notification body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Text,
    Html,
    Markdown,
}

/// Adapter-level view of where a delivery stands.
///
/// `Sent` means the provider acknowledged the hand-off; `Delivered` means
/// the provider reported end-user delivery. Adapters without a status API
/// report an inferred state annotated in [`DeliveryStatus::details`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Scheduled,
    Sent,
    Delivered,
    Failed,
    Unknown,
}

// ============================================================================
// Recipient
// ============================================================================

/// The addressed target of a notification.
///
/// A recipient may hold zero or more addresses per channel; lacking an
/// address for the requested channel is a recoverable per-recipient error,
/// reported in the result rather than raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecipient {
    pub id: String,
    /// Recipient category as defined by the calling layer ("user",
    /// "service", ...). Opaque to adapters.
    pub kind: String,
    #[serde(default)]
    pub addresses: HashMap<NotificationChannel, Vec<String>>,
}

impl NotificationRecipient {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            addresses: HashMap::new(),
        }
    }

    /// Adds an address for the given channel, builder-style.
    pub fn with_address(mut self, channel: NotificationChannel, address: impl Into<String>) -> Self {
        self.addresses.entry(channel).or_default().push(address.into());
        self
    }

    /// First configured address for the channel, if any.
    pub fn primary_address(&self, channel: NotificationChannel) -> Option<&str> {
        self.addresses
            .get(&channel)
            .and_then(|list| list.first())
            .map(String::as_str)
    }

    /// All configured addresses for the channel.
    pub fn channel_addresses(&self, channel: NotificationChannel) -> &[String] {
        self.addresses.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// Content
// ============================================================================

/// A link the notification offers to the recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAction {
    pub label: String,
    pub url: String,
}

/// Attachment payload, binary or textual.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentData {
    Text(String),
    Binary(Vec<u8>),
}

impl AttachmentData {
    pub fn len(&self) -> usize {
        match self {
            AttachmentData::Text(s) => s.len(),
            AttachmentData::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Attachment carried alongside the notification.
///
/// Channel adapters that cannot transport binary content (webhook payload
/// signing, SMS) expose only the metadata: filename, content type, size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: AttachmentData,
}

/// Channel-agnostic message payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub format: ContentFormat,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub attachments: Vec<NotificationAttachment>,
    #[serde(default)]
    pub resource_urls: Vec<String>,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            format: ContentFormat::Text,
            actions: Vec::new(),
            attachments: Vec::new(),
            resource_urls: Vec::new(),
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.actions.push(NotificationAction {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

// ============================================================================
// Event
// ============================================================================

/// The domain event that triggered the notification, when there is one.
///
/// Adapters may embed event metadata in the outbound payload but must work
/// identically when it is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseEvent {
    pub id: String,
    pub code: String,
    pub kind: String,
    pub source: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub data: JsonValue,
}

// ============================================================================
// Result / status
// ============================================================================

/// Outcome of one delivery attempt, one per recipient.
///
/// `success == true` means the adapter obtained a provider-level
/// acknowledgment (message reference, HTTP 2xx); it does not imply final
/// delivery to the end user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub notification_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
    pub timestamp: Timestamp,
}

impl NotificationResult {
    /// Successful delivery acknowledgment.
    pub fn ok(notification_id: impl Into<String>, details: Option<JsonValue>) -> Self {
        Self {
            success: true,
            notification_id: notification_id.into(),
            error_code: None,
            error_message: None,
            details,
            timestamp: Timestamp::now(),
        }
    }

    /// Failed delivery with a stable error code.
    pub fn failed(
        notification_id: impl Into<String>,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            notification_id: notification_id.into(),
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
            details: None,
            timestamp: Timestamp::now(),
        }
    }

    /// Attaches provider-specific details, builder-style.
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

/// Best-effort status lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub state: DeliveryState,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub details: JsonValue,
}

impl DeliveryStatus {
    pub fn confirmed(state: DeliveryState, details: JsonValue) -> Self {
        Self {
            state,
            timestamp: Timestamp::now(),
            details,
        }
    }

    /// Status assumed rather than confirmed by the provider.
    pub fn inferred(state: DeliveryState, note: &str) -> Self {
        Self {
            state,
            timestamp: Timestamp::now(),
            details: serde_json::json!({ "inferred": true, "note": note }),
        }
    }
}

// ============================================================================
// Send options
// ============================================================================

/// Caller-supplied per-send options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendOptions {
    /// Caller-assigned notification id. Generated by the adapter when
    /// absent; stable across internal retries of the same attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    /// Opaque tracking metadata forwarded in outbound payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<JsonValue>,
}

impl SendOptions {
    /// Resolves the effective notification id: caller-supplied or a fresh
    /// UUID for this logical attempt.
    pub fn notification_id_or_new(&self) -> String {
        self.notification_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_address_picks_first() {
        let recipient = NotificationRecipient::new("u1", "user")
            .with_address(NotificationChannel::Sms, "+15551230001")
            .with_address(NotificationChannel::Sms, "+15551230002");

        assert_eq!(
            recipient.primary_address(NotificationChannel::Sms),
            Some("+15551230001")
        );
    }

    #[test]
    fn test_primary_address_missing_channel() {
        let recipient = NotificationRecipient::new("u1", "user");
        assert_eq!(recipient.primary_address(NotificationChannel::Webhook), None);
        assert!(recipient.channel_addresses(NotificationChannel::Sms).is_empty());
    }

    #[test]
    fn test_result_constructors() {
        let ok = NotificationResult::ok("n-1", None);
        assert!(ok.success);
        assert!(ok.error_code.is_none());

        let failed = NotificationResult::failed("n-2", "SMS_SEND_FAILED", "provider rejected");
        assert!(!failed.success);
        assert_eq!(failed.error_code.as_deref(), Some("SMS_SEND_FAILED"));
        assert_eq!(failed.error_message.as_deref(), Some("provider rejected"));
    }

    #[test]
    fn test_send_options_generates_unique_ids() {
        let options = SendOptions::default();
        assert_ne!(options.notification_id_or_new(), options.notification_id_or_new());

        let pinned = SendOptions {
            notification_id: Some("fixed".into()),
            tracking: None,
        };
        assert_eq!(pinned.notification_id_or_new(), "fixed");
    }

    #[test]
    fn test_attachment_data_len() {
        assert_eq!(AttachmentData::Text("abc".into()).len(), 3);
        assert_eq!(AttachmentData::Binary(vec![0u8; 16]).len(), 16);
    }

    #[test]
    fn test_channel_serde_lowercase() {
        let json = serde_json::to_string(&NotificationChannel::Webhook).unwrap();
        assert_eq!(json, "\"webhook\"");
        let back: NotificationChannel = serde_json::from_str("\"sms\"").unwrap();
        assert_eq!(back, NotificationChannel::Sms);
    }
}
