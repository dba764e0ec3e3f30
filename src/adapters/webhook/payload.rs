//! Webhook payload envelope and wire formats.
//!
//! The envelope is built once as JSON (serde_json's map keeps keys
//! sorted, so the canonical bytes used for signing are deterministic)
//! and then rendered as JSON, form-encoded, or minimal XML per the
//! adapter configuration.

use jiff::Timestamp;
use serde_json::{Value as JsonValue, json};

use crate::config::PayloadFormat;
use crate::models::{BaseEvent, NotificationContent, NotificationRecipient};

/// Per-send inputs shared by single and batch envelopes.
pub struct EnvelopeContext<'a> {
    pub notification_id: &'a str,
    pub content: &'a NotificationContent,
    pub event: Option<&'a BaseEvent>,
    pub tracking: Option<&'a JsonValue>,
}

fn recipient_block(recipient: &NotificationRecipient) -> JsonValue {
    json!({
        "id": recipient.id,
        "type": recipient.kind,
    })
}

fn base_envelope(ctx: &EnvelopeContext<'_>) -> JsonValue {
    let content = ctx.content;
    let mut envelope = json!({
        "notification": {
            "id": ctx.notification_id,
            "timestamp": Timestamp::now().to_string(),
            "title": content.title,
            "body": content.body,
            "format": content.format,
        },
    });

    if let Some(event) = ctx.event {
        envelope["event"] = json!({
            "id": event.id,
            "code": event.code,
            "type": event.kind,
            "source": event.source,
            "timestamp": event.timestamp.to_string(),
            "data": event.data,
        });
    }

    if let Some(tracking) = ctx.tracking {
        envelope["tracking"] = tracking.clone();
    }

    // Metadata only: binary attachment content never enters the payload.
    if !content.attachments.is_empty() {
        envelope["attachments"] = JsonValue::Array(
            content
                .attachments
                .iter()
                .map(|a| {
                    json!({
                        "filename": a.filename,
                        "contentType": a.content_type,
                        "size": a.data.len(),
                    })
                })
                .collect(),
        );
    }

    if !content.resource_urls.is_empty() {
        envelope["resourceUrls"] = json!(content.resource_urls);
    }

    envelope
}

/// Envelope for a single-recipient delivery.
pub fn single_envelope(ctx: &EnvelopeContext<'_>, recipient: &NotificationRecipient) -> JsonValue {
    let mut envelope = base_envelope(ctx);
    envelope["recipient"] = recipient_block(recipient);
    envelope
}

/// Envelope for a coalesced multi-recipient delivery.
pub fn batch_envelope(
    ctx: &EnvelopeContext<'_>,
    recipients: &[&NotificationRecipient],
) -> JsonValue {
    let mut envelope = base_envelope(ctx);
    envelope["batch"] = json!(true);
    envelope["batchSize"] = json!(recipients.len());
    envelope["recipients"] = JsonValue::Array(
        recipients.iter().map(|r| recipient_block(r)).collect(),
    );
    envelope
}

/// Canonical JSON bytes of the envelope; the signing input.
pub fn canonical_json(envelope: &JsonValue) -> Vec<u8> {
    serde_json::to_vec(envelope).unwrap_or_default()
}

/// Renders the envelope in the configured wire format.
pub fn serialize(format: PayloadFormat, envelope: &JsonValue) -> String {
    match format {
        PayloadFormat::Json => serde_json::to_string(envelope).unwrap_or_default(),
        PayloadFormat::Form => to_form(envelope),
        PayloadFormat::Xml => to_xml(envelope),
    }
}

// ============================================================================
// Form encoding
// ============================================================================

/// Flattens nested structure into `parent[child]` keys, arrays by index.
fn flatten(value: &JsonValue, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                let nested = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}[{key}]")
                };
                flatten(child, &nested, out);
            }
        }
        JsonValue::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(child, &format!("{prefix}[{index}]"), out);
            }
        }
        JsonValue::Null => out.push((prefix.to_string(), String::new())),
        JsonValue::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        JsonValue::Number(n) => out.push((prefix.to_string(), n.to_string())),
        JsonValue::String(s) => out.push((prefix.to_string(), s.clone())),
    }
}

fn to_form(envelope: &JsonValue) -> String {
    let mut pairs = Vec::new();
    flatten(envelope, "", &mut pairs);

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

// ============================================================================
// XML encoding
// ============================================================================

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Recursive tag-per-key serialization; array elements become `<item>`.
fn write_xml(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                out.push('<');
                out.push_str(key);
                out.push('>');
                write_xml(child, out);
                out.push_str("</");
                out.push_str(key);
                out.push('>');
            }
        }
        JsonValue::Array(items) => {
            for child in items {
                out.push_str("<item>");
                write_xml(child, out);
                out.push_str("</item>");
            }
        }
        JsonValue::Null => {}
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Number(n) => out.push_str(&n.to_string()),
        JsonValue::String(s) => out.push_str(&escape_xml(s)),
    }
}

fn to_xml(envelope: &JsonValue) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><payload>");
    write_xml(envelope, &mut out);
    out.push_str("</payload>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentData, NotificationAttachment, NotificationChannel};

    fn recipient() -> NotificationRecipient {
        NotificationRecipient::new("u1", "user")
            .with_address(NotificationChannel::Webhook, "https://hooks.example.com/u1")
    }

    fn context<'a>(content: &'a NotificationContent) -> EnvelopeContext<'a> {
        EnvelopeContext {
            notification_id: "n-1",
            content,
            event: None,
            tracking: None,
        }
    }

    #[test]
    fn test_single_envelope_shape() {
        let content = NotificationContent::new("Title", "Body");
        let envelope = single_envelope(&context(&content), &recipient());

        assert_eq!(envelope["notification"]["id"], "n-1");
        assert_eq!(envelope["notification"]["title"], "Title");
        assert_eq!(envelope["recipient"]["id"], "u1");
        assert_eq!(envelope["recipient"]["type"], "user");
        assert!(envelope.get("event").is_none());
        assert!(envelope.get("batch").is_none());
    }

    #[test]
    fn test_batch_envelope_markers() {
        let content = NotificationContent::new("Title", "Body");
        let r1 = recipient();
        let r2 = NotificationRecipient::new("u2", "user");
        let envelope = batch_envelope(&context(&content), &[&r1, &r2]);

        assert_eq!(envelope["batch"], true);
        assert_eq!(envelope["batchSize"], 2);
        assert_eq!(envelope["recipients"].as_array().unwrap().len(), 2);
        assert!(envelope.get("recipient").is_none());
    }

    #[test]
    fn test_attachments_metadata_only() {
        let mut content = NotificationContent::new("Title", "Body");
        content.attachments.push(NotificationAttachment {
            filename: "report.pdf".into(),
            content_type: "application/pdf".into(),
            data: AttachmentData::Binary(vec![0u8; 2048]),
        });

        let envelope = single_envelope(&context(&content), &recipient());
        let attachment = &envelope["attachments"][0];
        assert_eq!(attachment["filename"], "report.pdf");
        assert_eq!(attachment["contentType"], "application/pdf");
        assert_eq!(attachment["size"], 2048);
        // The raw bytes must not appear anywhere in the payload.
        assert!(attachment.get("data").is_none());
        assert!(attachment.get("content").is_none());
    }

    #[test]
    fn test_event_block_included_when_present() {
        let content = NotificationContent::new("Title", "Body");
        let event = BaseEvent {
            id: "evt-1".into(),
            code: "USER_LOCKED".into(),
            kind: "security".into(),
            source: "iam".into(),
            timestamp: Timestamp::UNIX_EPOCH,
            data: json!({"attempts": 5}),
        };
        let ctx = EnvelopeContext {
            notification_id: "n-1",
            content: &content,
            event: Some(&event),
            tracking: None,
        };
        let envelope = single_envelope(&ctx, &recipient());

        assert_eq!(envelope["event"]["code"], "USER_LOCKED");
        assert_eq!(envelope["event"]["type"], "security");
        assert_eq!(envelope["event"]["data"]["attempts"], 5);
    }

    #[test]
    fn test_form_flattening_convention() {
        let value = json!({
            "notification": { "id": "n-1", "title": "Hi" },
            "recipients": [ { "id": "u1" }, { "id": "u2" } ],
            "batch": true,
        });

        let mut pairs = Vec::new();
        flatten(&value, "", &mut pairs);

        assert!(pairs.contains(&("notification[id]".to_string(), "n-1".to_string())));
        assert!(pairs.contains(&("notification[title]".to_string(), "Hi".to_string())));
        assert!(pairs.contains(&("recipients[0][id]".to_string(), "u1".to_string())));
        assert!(pairs.contains(&("recipients[1][id]".to_string(), "u2".to_string())));
        assert!(pairs.contains(&("batch".to_string(), "true".to_string())));
    }

    #[test]
    fn test_form_encoding_percent_escapes() {
        let value = json!({ "notification": { "body": "a b&c" } });
        let encoded = serialize(PayloadFormat::Form, &value);
        assert_eq!(encoded, "notification%5Bbody%5D=a+b%26c");
    }

    #[test]
    fn test_xml_escaping_and_structure() {
        let value = json!({
            "notification": { "body": "a < b & \"c\"" },
            "recipients": [ { "id": "u1" } ],
        });
        let xml = serialize(PayloadFormat::Xml, &value);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><payload>"));
        assert!(xml.contains("<notification><body>a &lt; b &amp; &quot;c&quot;</body></notification>"));
        assert!(xml.contains("<recipients><item><id>u1</id></item></recipients>"));
        assert!(xml.ends_with("</payload>"));
    }

    #[test]
    fn test_canonical_json_is_key_sorted() {
        // serde_json maps are BTree-backed: insertion order does not leak
        // into the canonical bytes the signature covers.
        let a = json!({ "b": 1, "a": 2 });
        assert_eq!(String::from_utf8(canonical_json(&a)).unwrap(), r#"{"a":2,"b":1}"#);
    }
}
