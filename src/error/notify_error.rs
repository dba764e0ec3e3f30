use thiserror::Error;

use crate::models::NotificationChannel;

/// Error type for the notification subsystem.
///
/// Only the factory surface (`initialize`, `get_adapter`) and adapter
/// `initialize` return these; `send`/`send_bulk` convert every failure into
/// a [`crate::models::NotificationResult`] instead.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// No configuration block exists for an enabled channel
    #[error("Missing configuration for channel: {channel}")]
    ChannelConfigMissing { channel: NotificationChannel },

    /// Channel has no adapter implementation
    #[error("Unsupported channel: {channel}")]
    UnsupportedChannel { channel: NotificationChannel },

    /// Provider identifier not present in the provider registry
    #[error("Unsupported provider '{provider}' for channel {channel}")]
    UnsupportedProvider {
        channel: NotificationChannel,
        provider: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Adapter exists but is not ready and could not be recovered
    #[error("Channel not ready: {channel}")]
    ChannelNotReady { channel: NotificationChannel },

    /// Adapter initialization did not settle within the configured timeout
    #[error("Initialization of channel {channel} timed out after {timeout_ms}ms")]
    InitializationTimeout {
        channel: NotificationChannel,
        timeout_ms: u64,
    },

    /// Factory initialize() called while a previous call is still running
    #[error("Factory initialization already in progress")]
    AlreadyInitializing,

    /// Every enabled channel failed to initialize
    #[error("No notification channels could be initialized")]
    NoChannelsReady,

    /// Provider rejected or failed a transport call
    #[error("Provider '{provider}' call failed: {message}")]
    Provider { provider: String, message: String },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl NotifyError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        NotifyError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        NotifyError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for NotifyError {
    fn from(error: anyhow::Error) -> Self {
        NotifyError::Internal { source: error }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(error: reqwest::Error) -> Self {
        NotifyError::Internal {
            source: anyhow::Error::from(error),
        }
    }
}

/// Type alias for Result with NotifyError to simplify function signatures
pub type NotifyResult<T> = Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_channel() {
        let err = NotifyError::ChannelNotReady {
            channel: NotificationChannel::Sms,
        };
        assert_eq!(err.to_string(), "Channel not ready: sms");
    }

    #[test]
    fn test_validation_helper() {
        let err = NotifyError::validation("max_length", "must be at least 10");
        assert!(err.to_string().contains("max_length"));
        assert!(err.to_string().contains("must be at least 10"));
    }
}
