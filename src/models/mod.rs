//! Data model for the notification delivery subsystem.
//!
//! These types form the contract between callers and channel adapters:
//! callers hand over a recipient and content, adapters hand back one
//! [`NotificationResult`] per recipient.

mod notification;

pub use notification::{
    AttachmentData, BaseEvent, ContentFormat, DeliveryState, DeliveryStatus, NotificationAction,
    NotificationAttachment, NotificationChannel, NotificationContent, NotificationRecipient,
    NotificationResult, SendOptions,
};
