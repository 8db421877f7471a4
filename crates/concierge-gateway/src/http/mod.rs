pub mod admin;
pub mod chat;
pub mod health;
pub mod payment_webhook;
pub mod voice_webhook;
pub mod whatsapp_webhook;
