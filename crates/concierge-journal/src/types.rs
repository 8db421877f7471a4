use serde::{Deserialize, Serialize};

/// Who produced a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// `(tenant_id, call_id, seq, role, text, ts)` — §3 DATA MODEL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub tenant_id: i64,
    pub call_id: String,
    pub seq: i64,
    pub role: Role,
    pub text: String,
    pub ts: String,
}

/// `(tenant_id, call_id, seq, state_json)` — §3 DATA MODEL. `seq` matches
/// the journal sequence at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub tenant_id: i64,
    pub call_id: String,
    pub seq: i64,
    pub state_json: String,
}

/// Lifecycle status of a call-session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Active,
    Ended,
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Active => write!(f, "active"),
            CallStatus::Ended => write!(f, "ended"),
        }
    }
}

/// `(tenant_id, call_id, status, last_state, last_seq, updated_at)` — §3
/// DATA MODEL. Primary key `(tenant_id, call_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSessionRow {
    pub tenant_id: i64,
    pub call_id: String,
    pub status: CallStatus,
    pub last_state: String,
    pub last_seq: i64,
    pub updated_at: String,
}
