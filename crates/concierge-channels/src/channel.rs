use crate::error::Result;
use crate::types::{AgentReply, ChannelMessage};

/// Common interface implemented by every channel adapter (voice, WhatsApp, web).
///
/// Every operation is pure and request-scoped: no connection state, no
/// background tasks. A webhook handler owns exactly one call to each of
/// these per inbound HTTP request (§4.10).
pub trait ChannelAdapter: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"voice"`).
    fn name(&self) -> &str;

    /// Verify the request before it is trusted. Where the channel has no
    /// signature scheme (web chat behind the gateway's own auth) this always
    /// returns `true`; `raw_body` must be the exact bytes as received, before
    /// any JSON/form parsing, since the signature covers the raw wire bytes.
    fn validate(&self, raw_body: &[u8], signature: Option<&str>) -> bool;

    /// Parse a raw inbound request into a normalized message. Returns `Ok(None)`
    /// for events this channel does not forward to the FSM (e.g. a telephony
    /// status callback with no user utterance).
    fn parse_incoming(&self, raw_body: &[u8]) -> Result<Option<ChannelMessage>>;

    /// Render an agent reply into this channel's wire document.
    fn format_response(&self, reply: &AgentReply) -> String;
}
