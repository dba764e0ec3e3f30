//! Vonage (Nexmo) SMS provider.
//!
//! JSON POST to the legacy SMS API; a response message with status "0"
//! means accepted. No status-query API is exposed for this endpoint, so
//! `fetch_status` stays at the inferred default.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::config::SmsSettings;
use crate::error::{NotifyError, NotifyResult};
use crate::external::client::HTTP_CLIENT;

use super::provider::{OutboundSms, ProviderReceipt, SmsProvider};

const API_URL: &str = "https://rest.nexmo.com/sms/json";

#[derive(Debug, Deserialize)]
struct SmsResponse {
    messages: Vec<SmsResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct SmsResponseMessage {
    status: String,
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

pub struct VonageSmsProvider {
    api_key: String,
    api_secret: String,
    api_url: String,
}

impl VonageSmsProvider {
    pub fn new(settings: &SmsSettings) -> Self {
        Self {
            api_key: settings.account_id.clone(),
            api_secret: settings.auth_token.clone(),
            api_url: API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl SmsProvider for VonageSmsProvider {
    fn id(&self) -> &'static str {
        "vonage"
    }

    async fn send_message(&self, message: &OutboundSms) -> NotifyResult<ProviderReceipt> {
        let mut body = json!({
            "api_key": self.api_key,
            "api_secret": self.api_secret,
            "to": message.to.trim_start_matches('+'),
            "from": message.from,
            "text": message.body,
        });
        if let Some(callback) = &message.status_callback {
            body["callback"] = json!(callback);
        }

        let response = HTTP_CLIENT
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::provider("vonage", e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(NotifyError::provider("vonage", format!("HTTP {status}")));
        }

        let parsed: SmsResponse = serde_json::from_str(&text)
            .map_err(|e| NotifyError::provider("vonage", format!("unparseable response: {e}")))?;

        let first = parsed
            .messages
            .into_iter()
            .next()
            .ok_or_else(|| NotifyError::provider("vonage", "empty messages array"))?;

        if first.status != "0" {
            let detail = first
                .error_text
                .unwrap_or_else(|| format!("status {}", first.status));
            return Err(NotifyError::provider("vonage", detail));
        }

        let reference = first
            .message_id
            .ok_or_else(|| NotifyError::provider("vonage", "accepted message without message-id"))?;

        let raw = serde_json::from_str(&text).unwrap_or(JsonValue::Null);
        Ok(ProviderReceipt { reference, raw })
    }
}
