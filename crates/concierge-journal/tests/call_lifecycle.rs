//! Exercises the journal, checkpoint, and call-lock machinery together the
//! way `concierge-gateway`'s voice pipeline drives them across several
//! webhook deliveries for the same call.

use std::sync::Arc;
use std::thread;

use rusqlite::Connection;

use concierge_journal::journal::{
    append_message, ensure_call_session, get_call_session, load_latest_checkpoint, mark_ended,
    set_last_state, write_checkpoint,
};
use concierge_journal::types::{CallStatus, Role};
use concierge_journal::CallLock;

fn journal_db(path: &std::path::Path) -> Connection {
    let conn = Connection::open(path).unwrap();
    concierge_journal::db::init_db(&conn).unwrap();
    conn
}

/// Simulates three successive webhook deliveries for one call: each
/// acquires the lock, resumes from the latest checkpoint, appends a turn,
/// writes a fresh checkpoint, then commits — mirroring
/// `concierge-gateway::pipeline::run_voice_turn`.
#[test]
fn three_turns_checkpoint_and_resume_correctly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.db");
    journal_db(&path);
    let lock = CallLock::new(&path);

    for (turn_text, expected_state) in [
        ("Bonjour", "QUALIF_NAME"),
        ("Martin Dupont", "QUALIF_MOTIF"),
        ("un détartrage", "QUALIF_PREF"),
    ] {
        let guard = lock.acquire(1, "call-1", "t0").unwrap();
        let conn = guard.connection();

        let resumed_state = load_latest_checkpoint(conn, 1, "call-1").unwrap();

        ensure_call_session(conn, 1, "call-1", "t0").unwrap();
        append_message(conn, 1, "call-1", Role::User, turn_text, "t0").unwrap();
        let seq = append_message(conn, 1, "call-1", Role::Agent, "reply", "t0").unwrap();
        write_checkpoint(
            conn,
            1,
            "call-1",
            seq,
            &serde_json::json!({ "state": expected_state }).to_string(),
            "t0",
        )
        .unwrap();
        set_last_state(conn, 1, "call-1", expected_state, "t0").unwrap();
        guard.commit().unwrap();

        // Resumed checkpoint from the *previous* iteration, if any, must
        // never be the state just written in this same iteration.
        if let Some((_, state_json)) = resumed_state {
            assert_ne!(state_json, serde_json::json!({ "state": expected_state }).to_string());
        }
    }

    let conn = Connection::open(&path).unwrap();
    let (seq, state_json) = load_latest_checkpoint(&conn, 1, "call-1").unwrap().unwrap();
    assert_eq!(seq, 6); // 3 turns x (user + agent) messages
    assert_eq!(state_json, serde_json::json!({ "state": "QUALIF_PREF" }).to_string());

    let row = get_call_session(&conn, 1, "call-1").unwrap().unwrap();
    assert_eq!(row.last_state, "QUALIF_PREF");
    assert_eq!(row.status, CallStatus::Active);
}

#[test]
fn mark_ended_on_terminal_turn_flips_call_session_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.db");
    journal_db(&path);
    let lock = CallLock::new(&path);

    let guard = lock.acquire(1, "call-1", "t0").unwrap();
    let conn = guard.connection();
    append_message(conn, 1, "call-1", Role::User, "oui", "t0").unwrap();
    let seq = append_message(conn, 1, "call-1", Role::Agent, "Confirmé", "t0").unwrap();
    write_checkpoint(conn, 1, "call-1", seq, "{\"state\":\"CONFIRMED\"}", "t0").unwrap();
    set_last_state(conn, 1, "call-1", "CONFIRMED", "t0").unwrap();
    mark_ended(conn, 1, "call-1", "t0").unwrap();
    guard.commit().unwrap();

    let conn = Connection::open(&path).unwrap();
    let row = get_call_session(&conn, 1, "call-1").unwrap().unwrap();
    assert_eq!(row.status, CallStatus::Ended);
}

/// Two different calls on the same tenant never contend for the same lock
/// row — both can be held concurrently.
#[test]
fn distinct_calls_do_not_share_a_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.db");
    journal_db(&path);
    let lock = CallLock::new(&path);

    let guard_a = lock.acquire(1, "call-a", "t0").unwrap();
    let guard_b = lock.acquire(1, "call-b", "t0").unwrap();
    guard_a.commit().unwrap();
    guard_b.commit().unwrap();
}

/// A second webhook for the same call blocks until the first commits —
/// verified across real OS threads rather than just sequential acquire
/// calls, since that is the actual concurrency shape in production.
#[test]
fn concurrent_webhooks_for_the_same_call_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.db");
    journal_db(&path);
    let lock = Arc::new(CallLock::new(&path));

    let first_guard = lock.acquire(1, "call-1", "t0").unwrap();

    let lock2 = lock.clone();
    let handle = thread::spawn(move || lock2.acquire(1, "call-1", "t1"));

    // The second acquisition must still be blocked while the first guard
    // is alive; give the spawned thread a moment to actually attempt it.
    thread::sleep(std::time::Duration::from_millis(200));
    first_guard.commit().unwrap();

    let second_guard = handle.join().unwrap().unwrap();
    second_guard.commit().unwrap();
}
