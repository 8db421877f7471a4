use serde::Deserialize;

use concierge_core::types::Channel;

use crate::channel::ChannelAdapter;
use crate::error::{ChannelError, Result};
use crate::types::{AgentReply, ChannelMessage};

/// Telephony-bridge webhook payload. The bridge posts one event per turn;
/// only `speech` events carry an utterance worth forwarding to the FSM.
#[derive(Debug, Deserialize)]
struct VoiceEvent {
    call_id: String,
    event: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    caller: Option<String>,
    /// The DID the caller dialed — this is what ties the call to a tenant
    /// (§4.1), not the caller's own number.
    #[serde(default)]
    to: Option<String>,
}

pub struct VoiceAdapter;

impl ChannelAdapter for VoiceAdapter {
    fn name(&self) -> &str {
        "voice"
    }

    /// The telephony bridge is a trusted internal peer — no shared-secret
    /// signature scheme is defined for this channel (§4.10, §6).
    fn validate(&self, _raw_body: &[u8], _signature: Option<&str>) -> bool {
        true
    }

    fn parse_incoming(&self, raw_body: &[u8]) -> Result<Option<ChannelMessage>> {
        let event: VoiceEvent =
            serde_json::from_slice(raw_body).map_err(|e| ChannelError::Malformed(e.to_string()))?;
        if event.event != "speech" || event.text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(ChannelMessage {
            channel: Channel::Voice,
            conversation_id: event.call_id,
            user_text: event.text,
            metadata: serde_json::json!({ "caller": event.caller, "to": event.to }),
        }))
    }

    fn format_response(&self, reply: &AgentReply) -> String {
        if reply.text.trim().is_empty() {
            return r#"{"results":[]}"#.to_string();
        }
        serde_json::json!({
            "results": [{ "type": "say", "text": reply.text }]
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_event_parses_into_channel_message() {
        let adapter = VoiceAdapter;
        let body = br#"{"call_id":"c1","event":"speech","text":"Bonjour","caller":"+33612345678"}"#;
        let msg = adapter.parse_incoming(body).unwrap().unwrap();
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.user_text, "Bonjour");
        assert_eq!(msg.channel, Channel::Voice);
    }

    #[test]
    fn status_event_is_ignored() {
        let adapter = VoiceAdapter;
        let body = br#"{"call_id":"c1","event":"status"}"#;
        assert!(adapter.parse_incoming(body).unwrap().is_none());
    }

    #[test]
    fn empty_reply_yields_empty_results() {
        let adapter = VoiceAdapter;
        let reply = AgentReply { text: String::new(), state: "START".to_string(), conversation_id: "c1".to_string() };
        assert_eq!(adapter.format_response(&reply), r#"{"results":[]}"#);
    }

    #[test]
    fn non_empty_reply_formats_as_say() {
        let adapter = VoiceAdapter;
        let reply = AgentReply { text: "Bonjour".to_string(), state: "START".to_string(), conversation_id: "c1".to_string() };
        let doc = adapter.format_response(&reply);
        assert!(doc.contains(r#""type":"say""#));
        assert!(doc.contains("Bonjour"));
    }
}
