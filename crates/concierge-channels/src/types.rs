use serde::{Deserialize, Serialize};

use concierge_core::types::Channel;

/// A normalized inbound message, independent of which wire format it arrived
/// in (§4.10). The tenant id is attached downstream, not here — a channel
/// adapter has no tenant-resolution logic of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: Channel,
    pub conversation_id: String,
    pub user_text: String,
    pub metadata: serde_json::Value,
}

/// The reply produced by the FSM for one turn, handed to `format_response`.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    pub state: String,
    pub conversation_id: String,
}
