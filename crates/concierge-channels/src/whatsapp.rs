use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use concierge_core::types::Channel;

use crate::channel::ChannelAdapter;
use crate::error::{ChannelError, Result};
use crate::types::{AgentReply, ChannelMessage};

type HmacSha1 = Hmac<Sha1>;

pub struct WhatsappAdapter {
    /// Full public webhook URL this adapter is mounted at — the signature
    /// covers `url + sorted form params`, not the URL path alone.
    pub webhook_url: String,
    pub shared_secret: String,
}

impl WhatsappAdapter {
    pub fn new(webhook_url: impl Into<String>, shared_secret: impl Into<String>) -> Self {
        Self { webhook_url: webhook_url.into(), shared_secret: shared_secret.into() }
    }
}

impl ChannelAdapter for WhatsappAdapter {
    fn name(&self) -> &str {
        "whatsapp"
    }

    /// HMAC-SHA1 over `url` concatenated with form params sorted
    /// lexicographically by key, each appended as `key + value` (no
    /// separators) — the messaging gateway's own signing scheme. Compared
    /// with the supplied base64 signature in constant time (§4.10).
    fn validate(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        let Some(signature) = signature else { return false };
        let Ok(provided) = BASE64.decode(signature) else { return false };
        let params = parse_form_body(raw_body);

        let mut sorted = params.clone();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut payload = self.webhook_url.clone();
        for (k, v) in &sorted {
            payload.push_str(k);
            payload.push_str(v);
        }

        let Ok(mut mac) = HmacSha1::new_from_slice(self.shared_secret.as_bytes()) else { return false };
        mac.update(payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        expected.len() == provided.len() && bool::from(expected.as_slice().ct_eq(&provided))
    }

    fn parse_incoming(&self, raw_body: &[u8]) -> Result<Option<ChannelMessage>> {
        let params = parse_form_body(raw_body);
        let from = params
            .iter()
            .find(|(k, _)| k == "From")
            .map(|(_, v)| v.clone())
            .ok_or_else(|| ChannelError::Malformed("missing From field".to_string()))?;
        let body = params
            .iter()
            .find(|(k, _)| k == "Body")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        if body.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(ChannelMessage {
            channel: Channel::Whatsapp,
            conversation_id: from.clone(),
            user_text: body,
            metadata: serde_json::json!({ "from": from }),
        }))
    }

    fn format_response(&self, reply: &AgentReply) -> String {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Start(BytesStart::new("Response"))).ok();
        writer.write_event(Event::Start(BytesStart::new("Message"))).ok();
        writer.write_event(Event::Text(BytesText::new(&reply.text))).ok();
        writer.write_event(Event::End(BytesEnd::new("Message"))).ok();
        writer.write_event(Event::End(BytesEnd::new("Response"))).ok();
        String::from_utf8(writer.into_inner()).unwrap_or_default()
    }
}

/// Minimal `application/x-www-form-urlencoded` parser: splits on `&`, then
/// `=`, percent-decodes each side, and maps `+` to a literal space.
fn parse_form_body(raw_body: &[u8]) -> Vec<(String, String)> {
    let body = String::from_utf8_lossy(raw_body);
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
