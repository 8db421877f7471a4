//! Turn orchestration shared by every channel webhook: resolve the tenant,
//! load or resume the session, run one FSM turn, persist the result.
//!
//! Voice calls are journaled under the per-call advisory lock (§4.4);
//! WhatsApp and web chat use the plain session cache — the call lock is
//! scoped to voice alone.

use chrono::Utc;

use concierge_channels::{AgentReply, ChannelMessage};
use concierge_core::types::Channel;
use concierge_core::ConciergeError;
use concierge_fsm::FsmEngine;
use concierge_journal::journal;
use concierge_sessions::Session;

use crate::app::AppState;

/// Runs one turn for a non-voice channel message: session-cache only, no
/// call lock, no journal (§4.4 scopes the call lock to the voice webhook).
pub async fn run_web_turn(state: &AppState, msg: ChannelMessage) -> concierge_core::Result<AgentReply> {
    debug_assert_ne!(msg.channel, Channel::Voice);
    run_web_turn_for_tenant(state, msg, None).await
}

/// Same as [`run_web_turn`] but with the tenant already resolved (web chat
/// resolves by API key before parsing the body).
pub async fn run_web_turn_for_tenant(
    state: &AppState,
    msg: ChannelMessage,
    tenant_id: Option<concierge_core::types::TenantId>,
) -> concierge_core::Result<AgentReply> {
    let tenant_id = match tenant_id {
        Some(t) => t,
        None => state.tenants.resolve_by_inbound_number(msg.channel, &msg.conversation_id)?,
    };
    let tenant = state.get_tenant(tenant_id)?;
    let provider = state.booking_provider_for(&tenant)?;

    let mut session = state.sessions.get_or_create(tenant_id, &msg.conversation_id, msg.channel)?;

    let engine = FsmEngine::new(provider.as_ref());
    let outcome = engine.handle_turn(&mut session, &msg.user_text).await;

    session.state = outcome.state.to_string();
    session.touch(Utc::now().to_rfc3339());
    state.sessions.save(&session)?;

    Ok(AgentReply {
        text: outcome.reply,
        state: outcome.state.to_string(),
        conversation_id: msg.conversation_id,
    })
}

/// Runs one turn for a voice call: acquires the per-call lock, resumes the
/// session from the latest checkpoint (never replaying `call_messages`),
/// runs the FSM, then appends the turn and a fresh checkpoint before
/// committing the lock (§4.3, §4.4).
pub async fn run_voice_turn(state: &AppState, msg: ChannelMessage) -> concierge_core::Result<AgentReply> {
    debug_assert_eq!(msg.channel, Channel::Voice);

    let tenant_id = state
        .tenants
        .resolve_by_inbound_number(Channel::Voice, dialed_number(&msg))?;
    let tenant = state.get_tenant(tenant_id)?;
    let provider = state.booking_provider_for(&tenant)?;

    let call_id = msg.conversation_id.clone();
    let now = Utc::now().to_rfc3339();
    let guard = state.call_lock.acquire(tenant_id.get(), &call_id, &now)?;
    let conn = guard.connection();

    let mut session = match journal::load_latest_checkpoint(conn, tenant_id.get(), &call_id)? {
        Some((_, state_json)) => serde_json::from_str::<Session>(&state_json)?,
        None => Session::new(&call_id, tenant_id, Channel::Voice, now.clone()),
    };

    let engine = FsmEngine::new(provider.as_ref());
    let outcome = engine.handle_turn(&mut session, &msg.user_text).await;
    session.state = outcome.state.to_string();
    session.touch(now.clone());

    journal::append_message(conn, tenant_id.get(), &call_id, concierge_journal::types::Role::User, &msg.user_text, &now)?;
    let reply_seq = journal::append_message(
        conn,
        tenant_id.get(),
        &call_id,
        concierge_journal::types::Role::Agent,
        &outcome.reply,
        &now,
    )?;
    let checkpoint = serde_json::to_string(&session).map_err(ConciergeError::Serialization)?;
    journal::write_checkpoint(conn, tenant_id.get(), &call_id, reply_seq, &checkpoint, &now)?;
    journal::set_last_state(conn, tenant_id.get(), &call_id, &session.state, &now)?;
    if outcome.state.is_terminal() {
        journal::mark_ended(conn, tenant_id.get(), &call_id, &now)?;
    }

    guard.commit()?;

    // Voice sessions only cache in `SessionStore`, they never write through
    // to the durable web_sessions table (§4.2) — kept in sync so a
    // mid-call status query can read it back without touching the journal.
    state.sessions.save(&session)?;

    Ok(AgentReply {
        text: outcome.reply,
        state: outcome.state.to_string(),
        conversation_id: call_id,
    })
}

fn dialed_number(msg: &ChannelMessage) -> &str {
    msg.metadata
        .get("to")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(&msg.conversation_id)
}
