//! Twilio SMS provider.
//!
//! Sends through the Messages API with form-encoded bodies and basic auth,
//! and implements delivery-status lookup by message SID.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::config::SmsSettings;
use crate::error::{NotifyError, NotifyResult};
use crate::external::client::HTTP_CLIENT;
use crate::models::DeliveryState;

use super::provider::{OutboundSms, ProviderReceipt, SmsProvider};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Message resource as returned by the Messages API.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    status: Option<String>,
}

pub struct TwilioSmsProvider {
    account_sid: String,
    auth_token: String,
    /// Base URL override, used by tests to target a local server.
    base_url: String,
}

impl TwilioSmsProvider {
    pub fn new(settings: &SmsSettings) -> Self {
        Self {
            account_sid: settings.account_id.clone(),
            auth_token: settings.auth_token.clone(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }

    fn message_url(&self, sid: &str) -> String {
        format!(
            "{}/Accounts/{}/Messages/{}.json",
            self.base_url, self.account_sid, sid
        )
    }

    /// Maps the provider status vocabulary onto [`DeliveryState`].
    fn map_status(status: &str) -> DeliveryState {
        match status {
            "queued" | "accepted" | "scheduled" => DeliveryState::Scheduled,
            "sending" | "sent" => DeliveryState::Sent,
            "delivered" | "read" => DeliveryState::Delivered,
            "failed" | "undelivered" | "canceled" => DeliveryState::Failed,
            _ => DeliveryState::Unknown,
        }
    }
}

#[async_trait]
impl SmsProvider for TwilioSmsProvider {
    fn id(&self) -> &'static str {
        "twilio"
    }

    async fn send_message(&self, message: &OutboundSms) -> NotifyResult<ProviderReceipt> {
        let mut form: HashMap<&str, &str> = HashMap::new();
        form.insert("To", &message.to);
        form.insert("From", &message.from);
        form.insert("Body", &message.body);
        if let Some(callback) = &message.status_callback {
            form.insert("StatusCallback", callback);
        }

        let response = HTTP_CLIENT
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| NotifyError::provider("twilio", e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            // Error payloads carry a numeric code and message.
            let detail = serde_json::from_str::<JsonValue>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(NotifyError::provider("twilio", detail));
        }

        let resource: MessageResource = serde_json::from_str(&body)
            .map_err(|e| NotifyError::provider("twilio", format!("unparseable response: {e}")))?;

        let raw = serde_json::from_str(&body).unwrap_or(JsonValue::Null);
        Ok(ProviderReceipt {
            reference: resource.sid,
            raw,
        })
    }

    async fn fetch_status(&self, reference: &str) -> NotifyResult<Option<DeliveryState>> {
        let response = HTTP_CLIENT
            .get(self.message_url(reference))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| NotifyError::provider("twilio", e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::provider(
                "twilio",
                format!("status lookup failed: HTTP {}", response.status()),
            ));
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| NotifyError::provider("twilio", format!("unparseable response: {e}")))?;

        Ok(resource.status.as_deref().map(Self::map_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    fn settings() -> SmsSettings {
        SmsSettings {
            provider: "twilio".into(),
            account_id: "AC123".into(),
            auth_token: "token".into(),
            from_number: "+15550001111".into(),
            message_prefix: None,
            max_length: 160,
            auto_split: false,
            send_interval_ms: 100,
            max_per_minute: 60,
            tracking_base_url: None,
            status_callback_url: None,
            default_country_code: None,
        }
    }

    async fn spawn_api(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(TwilioSmsProvider::map_status("queued"), DeliveryState::Scheduled);
        assert_eq!(TwilioSmsProvider::map_status("sending"), DeliveryState::Sent);
        assert_eq!(TwilioSmsProvider::map_status("sent"), DeliveryState::Sent);
        assert_eq!(TwilioSmsProvider::map_status("delivered"), DeliveryState::Delivered);
        assert_eq!(TwilioSmsProvider::map_status("undelivered"), DeliveryState::Failed);
        assert_eq!(TwilioSmsProvider::map_status("mystery"), DeliveryState::Unknown);
    }

    #[test]
    fn test_urls_embed_account() {
        let provider = TwilioSmsProvider::new(&settings());
        assert_eq!(
            provider.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(
            provider.message_url("SM1"),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages/SM1.json"
        );
    }

    fn outbound() -> OutboundSms {
        OutboundSms {
            to: "+15551230001".into(),
            from: "+15550001111".into(),
            body: "ping".into(),
            status_callback: None,
        }
    }

    #[tokio::test]
    async fn test_send_and_fetch_status_roundtrip() {
        let app = Router::new()
            .route(
                "/Accounts/AC123/Messages.json",
                post(|| async { Json(serde_json::json!({ "sid": "SM42", "status": "queued" })) }),
            )
            .route(
                "/Accounts/AC123/Messages/SM42.json",
                get(|| async { Json(serde_json::json!({ "sid": "SM42", "status": "delivered" })) }),
            );
        let base = spawn_api(app).await;

        let provider = TwilioSmsProvider::new(&settings()).with_base_url(base);
        let receipt = provider.send_message(&outbound()).await.unwrap();
        assert_eq!(receipt.reference, "SM42");
        assert_eq!(receipt.raw["status"], "queued");

        let state = provider.fetch_status("SM42").await.unwrap();
        assert_eq!(state, Some(DeliveryState::Delivered));
    }

    #[tokio::test]
    async fn test_rejection_surfaces_provider_message() {
        let app = Router::new().route(
            "/Accounts/AC123/Messages.json",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "code": 21211, "message": "Invalid 'To' number" })),
                )
            }),
        );
        let base = spawn_api(app).await;

        let provider = TwilioSmsProvider::new(&settings()).with_base_url(base);
        let err = provider.send_message(&outbound()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid 'To' number"));
    }
}
