//! Configuration loading and validation.

mod error;
mod loader;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    ChannelSettings, FactorySettings, PayloadFormat, Settings, SignatureAlgorithm,
    SignatureSettings, SmsSettings, WebhookMethod, WebhookSettings,
};
