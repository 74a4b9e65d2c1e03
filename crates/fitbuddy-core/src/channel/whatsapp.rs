use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::config::WhatsAppConfig;
use crate::error::GatewayError;
use crate::types::{Button, NormalizedEvent};
use crate::util::http::client;

use super::MessagingGateway;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

// ====== WhatsApp Cloud API Webhook Types ======

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookChange {
    pub value: Option<WebhookValue>,
}

/// The interesting part of a change: either messages or delivery statuses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookValue {
    pub messages: Option<Vec<WebhookMessage>>,
    pub statuses: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookMessage {
    pub from: Option<String>,
    #[serde(rename = "type", default)]
    pub msg_type: String,
    pub text: Option<TextBody>,
    pub interactive: Option<InteractiveReply>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InteractiveReply {
    pub button_reply: Option<ButtonReply>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonReply {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Parse a webhook POST body into the envelope shape.
pub fn parse_webhook(body: &str) -> Result<WebhookEvent, serde_json::Error> {
    serde_json::from_str(body)
}

/// Map a parsed webhook envelope to canonical events.
///
/// Status-only callbacks and entries with no message yield nothing. A message
/// with an unrecognized shape still yields `Unsupported` when a sender can be
/// extracted, so the state machine can acknowledge it instead of going quiet.
pub fn normalize(event: &WebhookEvent) -> Vec<NormalizedEvent> {
    let mut out = Vec::new();
    for entry in &event.entry {
        for change in &entry.changes {
            let Some(value) = &change.value else { continue };
            if value.statuses.is_some() && value.messages.is_none() {
                debug!("Status-only webhook change, ignoring");
                continue;
            }
            let Some(messages) = &value.messages else { continue };
            for message in messages {
                let Some(from) = message.from.as_deref().filter(|f| !f.is_empty()) else {
                    continue;
                };
                out.push(normalize_message(from, message));
            }
        }
    }
    out
}

fn normalize_message(from: &str, message: &WebhookMessage) -> NormalizedEvent {
    match message.msg_type.as_str() {
        "text" => match &message.text {
            Some(text) => NormalizedEvent::text(from, text.body.trim()),
            None => NormalizedEvent::unsupported(from),
        },
        "interactive" => {
            let reply = message
                .interactive
                .as_ref()
                .and_then(|i| i.button_reply.as_ref());
            match reply {
                Some(button) => NormalizedEvent::button(from, &button.id),
                None => NormalizedEvent::unsupported(from),
            }
        }
        _ => NormalizedEvent::unsupported(from),
    }
}

// ====== Gateway Implementation ======

/// WhatsApp Cloud API gateway (Graph API `/{phone_number_id}/messages`).
pub struct WhatsAppGateway {
    config: WhatsAppConfig,
}

impl WhatsAppGateway {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self { config }
    }

    fn messages_url(&self) -> String {
        format!("{GRAPH_API_BASE}/{}/messages", self.config.phone_number_id)
    }

    async fn post(&self, payload: serde_json::Value) -> Result<(), GatewayError> {
        let response = client()
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("WhatsApp API error {}: {}", status, body);
            return Err(GatewayError::Api {
                status,
                message: body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for WhatsAppGateway {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), GatewayError> {
        self.post(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }))
        .await
    }

    async fn send_image(
        &self,
        to: &str,
        media_url: &str,
        caption: &str,
    ) -> Result<(), GatewayError> {
        self.post(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "image",
            "image": { "link": media_url, "caption": caption },
        }))
        .await
    }

    async fn send_buttons(
        &self,
        to: &str,
        body: &str,
        buttons: &[Button],
    ) -> Result<(), GatewayError> {
        let buttons: Vec<serde_json::Value> = buttons
            .iter()
            .map(|b| {
                json!({
                    "type": "reply",
                    "reply": { "id": b.id, "title": b.label },
                })
            })
            .collect();

        self.post(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": { "buttons": buttons },
            },
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;

    #[test]
    fn test_normalize_text_message() {
        let body = r#"{
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "value": {
                        "messaging_product": "whatsapp",
                        "messages": [{
                            "from": "15551234567",
                            "type": "text",
                            "text": { "body": "  hello  " }
                        }]
                    }
                }]
            }]
        }"#;

        let events = normalize(&parse_webhook(body).unwrap());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, "15551234567");
        assert_eq!(
            events[0].kind,
            EventKind::Text {
                body: "hello".into()
            }
        );
    }

    #[test]
    fn test_normalize_button_reply() {
        let body = r#"{
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": "15551234567",
                            "type": "interactive",
                            "interactive": {
                                "type": "button_reply",
                                "button_reply": { "id": "lang_es", "title": "Español" }
                            }
                        }]
                    }
                }]
            }]
        }"#;

        let events = normalize(&parse_webhook(body).unwrap());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::ButtonChoice {
                id: "lang_es".into()
            }
        );
    }

    #[test]
    fn test_normalize_status_only_callback() {
        let body = r#"{
            "entry": [{
                "changes": [{
                    "value": {
                        "statuses": [{ "id": "wamid.X", "status": "delivered" }]
                    }
                }]
            }]
        }"#;

        let events = normalize(&parse_webhook(body).unwrap());
        assert!(events.is_empty());
    }

    #[test]
    fn test_normalize_unknown_message_type() {
        let body = r#"{
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{ "from": "15551234567", "type": "audio" }]
                    }
                }]
            }]
        }"#;

        let events = normalize(&parse_webhook(body).unwrap());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Unsupported);
    }

    #[test]
    fn test_normalize_empty_and_malformed_entries() {
        let events = normalize(&parse_webhook(r#"{"entry": []}"#).unwrap());
        assert!(events.is_empty());

        // Interactive message missing its button_reply still normalizes.
        let body = r#"{
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": "15551234567",
                            "type": "interactive",
                            "interactive": {}
                        }]
                    }
                }]
            }]
        }"#;
        let events = normalize(&parse_webhook(body).unwrap());
        assert_eq!(events[0].kind, EventKind::Unsupported);
    }

    #[test]
    fn test_parse_webhook_rejects_invalid_json() {
        assert!(parse_webhook("not json").is_err());
    }
}
