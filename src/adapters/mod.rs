//! Channel adapters.
//!
//! Every transport implements [`ChannelAdapter`]; the factory owns adapter
//! construction and lifecycle, adapters own everything channel-specific.

pub mod sms;
pub mod webhook;

use async_trait::async_trait;

use crate::config::ChannelSettings;
use crate::error::NotifyResult;
use crate::models::{
    BaseEvent, DeliveryStatus, NotificationChannel, NotificationContent, NotificationRecipient,
    NotificationResult, SendOptions,
};

pub use sms::SmsAdapter;
pub use webhook::WebhookAdapter;

/// Stable error codes carried in failed [`NotificationResult`]s.
pub mod codes {
    /// Recipient has no phone number for the SMS channel.
    pub const PHONE_NUMBER_MISSING: &str = "PHONE_NUMBER_MISSING";
    /// SMS provider rejected or failed the send.
    pub const SMS_SEND_FAILED: &str = "SMS_SEND_FAILED";
    /// Recipient has no webhook URL and no default is configured.
    pub const WEBHOOK_URL_MISSING: &str = "WEBHOOK_URL_MISSING";
    /// Webhook delivery failed without an HTTP status (network error).
    pub const WEBHOOK_SEND_FAILED: &str = "WEBHOOK_SEND_FAILED";
    /// Adapter asked to send before a successful initialize.
    pub const CHANNEL_NOT_READY: &str = "CHANNEL_NOT_READY";

    /// Code for a terminal or exhausted HTTP failure, e.g. `HTTP_ERROR_404`.
    pub fn http_error(status: u16) -> String {
        format!("HTTP_ERROR_{status}")
    }
}

/// Uniform contract implemented per channel.
///
/// `send`/`send_bulk` never raise: every provider, network, or precondition
/// failure is converted into a failed [`NotificationResult`] with a stable
/// error code from [`codes`]. Exactly one result is produced per recipient,
/// regardless of internal retries.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> NotificationChannel;

    /// Establishes provider clients and credentials.
    ///
    /// Safe to call again after a failure; the adapter stays not-ready
    /// until a call completes successfully.
    async fn initialize(&self, settings: &ChannelSettings) -> NotifyResult<()>;

    /// Cheap local readiness check; does not probe the remote provider.
    fn is_ready(&self) -> bool;

    /// Delivers to the recipient's primary address for this channel.
    async fn send(
        &self,
        recipient: &NotificationRecipient,
        content: &NotificationContent,
        event: Option<&BaseEvent>,
        options: &SendOptions,
    ) -> NotificationResult;

    /// Delivers to many recipients, honoring channel batching/rate rules.
    /// Returns one result per input recipient, in input order.
    async fn send_bulk(
        &self,
        recipients: &[NotificationRecipient],
        content: &NotificationContent,
        event: Option<&BaseEvent>,
        options: &SendOptions,
    ) -> Vec<NotificationResult>;

    /// Best-effort cancellation. Channels without cancellable semantics
    /// return `false` unconditionally and log a warning.
    async fn cancel(&self, notification_id: &str) -> bool;

    /// Best-effort status lookup; an inferred fallback is annotated in
    /// the status details when the provider offers no query API.
    async fn get_status(&self, notification_id: &str) -> DeliveryStatus;
}
