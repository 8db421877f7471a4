use serde::Deserialize;

use concierge_core::types::Channel;

use crate::channel::ChannelAdapter;
use crate::error::{ChannelError, Result};
use crate::types::{AgentReply, ChannelMessage};

#[derive(Debug, Deserialize)]
struct WebChatRequest {
    conv_id: String,
    text: String,
    #[serde(default)]
    #[allow(dead_code)]
    tenant_key: Option<String>,
}

pub struct WebAdapter;

impl ChannelAdapter for WebAdapter {
    fn name(&self) -> &str {
        "web"
    }

    /// Web chat is reached through the gateway's own request auth, not a
    /// per-channel shared secret (§4.10).
    fn validate(&self, _raw_body: &[u8], _signature: Option<&str>) -> bool {
        true
    }

    fn parse_incoming(&self, raw_body: &[u8]) -> Result<Option<ChannelMessage>> {
        let req: WebChatRequest =
            serde_json::from_slice(raw_body).map_err(|e| ChannelError::Malformed(e.to_string()))?;
        if req.text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(ChannelMessage {
            channel: Channel::Web,
            conversation_id: req.conv_id,
            user_text: req.text,
            metadata: serde_json::Value::Null,
        }))
    }

    fn format_response(&self, reply: &AgentReply) -> String {
        serde_json::json!({
            "text": reply.text,
            "state": reply.state,
            "conv_id": reply.conversation_id,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_conv_id_and_text() {
        let adapter = WebAdapter;
        let body = br#"{"conv_id":"c1","text":"Bonjour","tenant_key":"acme"}"#;
        let msg = adapter.parse_incoming(body).unwrap().unwrap();
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.channel, Channel::Web);
    }

    #[test]
    fn blank_text_is_ignored() {
        let adapter = WebAdapter;
        let body = br#"{"conv_id":"c1","text":"   "}"#;
        assert!(adapter.parse_incoming(body).unwrap().is_none());
    }

    #[test]
    fn format_response_carries_state_and_conv_id() {
        let adapter = WebAdapter;
        let reply = AgentReply { text: "Bonjour".to_string(), state: "QUALIF_NAME".to_string(), conversation_id: "c1".to_string() };
        let doc = adapter.format_response(&reply);
        assert!(doc.contains("QUALIF_NAME"));
        assert!(doc.contains("c1"));
    }
}
