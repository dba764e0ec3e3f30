//! courier-rs
//!
//! Multi-channel notification delivery: SMS and webhook channel adapters
//! behind a factory that owns initialization, readiness, and recovery.
//!
//! Callers hand the factory a [`config::FactorySettings`], fetch an adapter
//! with [`factory::AdapterFactory::get_adapter`], and send through the
//! [`adapters::ChannelAdapter`] contract. Every delivery resolves to one
//! [`models::NotificationResult`] per recipient; adapters never raise past
//! their boundary.

pub mod adapters;
pub mod config;
pub mod error;
pub mod external;
pub mod factory;
pub mod logger;
pub mod models;

pub use adapters::{ChannelAdapter, SmsAdapter, WebhookAdapter};
pub use config::{ChannelSettings, ConfigError, ConfigLoader, FactorySettings, Settings};
pub use error::{NotifyError, NotifyResult};
pub use factory::{AdapterFactory, ChannelState};
pub use models::{
    BaseEvent, NotificationChannel, NotificationContent, NotificationRecipient,
    NotificationResult, SendOptions,
};
