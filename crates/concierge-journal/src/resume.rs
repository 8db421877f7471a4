//! Resume protocol (§4.3): on a new webhook for a call absent from the
//! in-memory cache, rebuild the session from the latest checkpoint rather
//! than replaying messages. The snapshot is authoritative.

use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::journal::JournalStore;

/// Outcome of attempting to resume a call from the journal.
pub enum Resumed<T> {
    /// No prior checkpoint — this is a new call.
    Fresh,
    /// Rebuilt `T` from the most recent checkpoint at the given seq.
    FromCheckpoint { seq: i64, state: T },
}

/// Attempts to resume `(tenant_id, call_id)` by loading its latest
/// checkpoint and deserializing it as `T`. Never replays `call_messages`.
pub fn resume<T: DeserializeOwned>(
    store: &JournalStore,
    tenant_id: i64,
    call_id: &str,
) -> Result<Resumed<T>> {
    match store.load_latest_checkpoint(tenant_id, call_id)? {
        None => Ok(Resumed::Fresh),
        Some((seq, state_json)) => {
            let state: T = serde_json::from_str(&state_json)?;
            Ok(Resumed::FromCheckpoint { seq, state })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        state: String,
    }

    fn store() -> JournalStore {
        JournalStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn fresh_call_has_no_checkpoint() {
        let store = store();
        let resumed: Resumed<Dummy> = resume(&store, 1, "call-1").unwrap();
        assert!(matches!(resumed, Resumed::Fresh));
    }

    #[test]
    fn resumes_from_latest_checkpoint_without_replaying_messages() {
        let store = store();
        let seq = store
            .append_message_or_degrade(1, "call-1", crate::types::Role::User, "hi", "t0")
            .unwrap();
        let state = Dummy {
            state: "QUALIF_NAME".to_string(),
        };
        store.write_checkpoint_or_degrade(1, "call-1", seq, &serde_json::to_string(&state).unwrap(), "t0");

        let resumed: Resumed<Dummy> = resume(&store, 1, "call-1").unwrap();
        match resumed {
            Resumed::FromCheckpoint { seq: loaded_seq, state: loaded } => {
                assert_eq!(loaded_seq, seq);
                assert_eq!(loaded, state);
            }
            Resumed::Fresh => panic!("expected a checkpoint"),
        }
    }
}
