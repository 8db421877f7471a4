//! `concierge-channels` — channel adapters (C10): voice, WhatsApp and web
//! chat each implement `parse_incoming`/`format_response`/`validate` as pure,
//! request-scoped operations (§4.10).

pub mod channel;
pub mod error;
pub mod manager;
pub mod types;
pub mod voice;
pub mod web;
pub mod whatsapp;

pub use channel::ChannelAdapter;
pub use error::{ChannelError, Result};
pub use manager::ChannelManager;
pub use types::{AgentReply, ChannelMessage};
pub use voice::VoiceAdapter;
pub use web::WebAdapter;
pub use whatsapp::WhatsappAdapter;
