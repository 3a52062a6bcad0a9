//! Integration tests for the crash-and-relaunch flow
//!
//! Each "launch" opens its own database connection, so nothing carries over
//! except what was written to disk.

use super::common::fixtures::{experience, props, TestStore};
use recovery_props::{
    ErrorEvent, ErrorRecovery, HandlerChain, HandlerError, KeyValueStore, RecoveryError,
    RecoveryPropsStore, StorageError,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Props set before an uncaught error are recovered on the next launch
#[test]
fn test_props_survive_crash_and_relaunch() {
    let fixture = TestStore::new();
    let saved = props(json!({"route": "/compose", "draft": {"to": "bob", "body": "hi"}}));

    {
        let recovery =
            Arc::new(ErrorRecovery::new(fixture.reopen(), experience("@alice/mail")).unwrap());
        assert!(recovery.recovered_props().is_none());

        recovery.set_recovery_props(&saved).unwrap();
        let chain = recovery.handler_chain();
        assert_eq!(chain.dispatch(&ErrorEvent::new("render failed", true)), 0);
    }

    let relaunched = ErrorRecovery::new(fixture.reopen(), experience("@alice/mail")).unwrap();
    assert_eq!(relaunched.recovered_props(), Some(&saved));

    // Consumed on the previous launch
    let again = ErrorRecovery::new(fixture.reopen(), experience("@alice/mail")).unwrap();
    assert!(again.recovered_props().is_none());
}

/// No error, no snapshot: setting props alone never touches storage
#[test]
fn test_clean_exit_leaves_nothing_behind() {
    let fixture = TestStore::new();
    {
        let recovery = ErrorRecovery::new(fixture.reopen(), experience("@alice/mail")).unwrap();
        recovery
            .set_recovery_props(&props(json!({"route": "/inbox"})))
            .unwrap();
    }

    assert!(fixture.reopen().list().unwrap().is_empty());
}

/// Experiences hosted in the same process do not see each other's snapshots
#[test]
fn test_experiences_hosted_together_are_isolated() {
    let fixture = TestStore::new();
    let store = fixture.reopen();

    let alice = ErrorRecovery::new(store.clone(), experience("@alice/mail")).unwrap();
    let bob = ErrorRecovery::new(store.clone(), experience("@bob/chess")).unwrap();
    alice
        .persist_recovery_props(&props(json!({"owner": "alice"})))
        .unwrap();
    bob.persist_recovery_props(&props(json!({"owner": "bob", "move": 12})))
        .unwrap();

    let alice_next = ErrorRecovery::new(fixture.reopen(), experience("@alice/mail")).unwrap();
    assert_eq!(
        alice_next.recovered_props(),
        Some(&props(json!({"owner": "alice"})))
    );

    // Bob's snapshot is still waiting
    let remaining = fixture.reopen().list().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].experience_id, "@bob/chess");
}

/// The handler after the snapshot receives the same event, even when the snapshot fails
#[test]
fn test_original_handler_runs_after_failed_snapshot() {
    #[derive(Clone)]
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn put(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::LockPoisoned)
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    let recovery = Arc::new(ErrorRecovery::new(BrokenStore, experience("@alice/mail")).unwrap());
    recovery
        .set_recovery_props(&props(json!({"route": "/inbox"})))
        .unwrap();

    let snapshot_err = recovery.save_recovery_props().unwrap_err();
    assert!(matches!(
        snapshot_err,
        RecoveryError::Storage(StorageError::LockPoisoned)
    ));

    let received: Arc<Mutex<Vec<ErrorEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let mut chain = recovery.handler_chain();
    {
        let received = received.clone();
        chain.push("original", move |event| -> Result<(), HandlerError> {
            received.lock().unwrap().push(event.clone());
            Ok(())
        });
    }

    let event = ErrorEvent::new("boom", true);
    assert_eq!(chain.dispatch(&event), 1);
    assert_eq!(*received.lock().unwrap(), vec![event]);
}

/// Reported (non-fatal) errors also snapshot
#[test]
fn test_reported_error_snapshots() {
    let fixture = TestStore::new();
    let store: RecoveryPropsStore = fixture.reopen();
    let recovery = Arc::new(ErrorRecovery::new(store.clone(), experience("@alice/mail")).unwrap());
    recovery
        .set_recovery_props(&props(json!({"route": "/settings"})))
        .unwrap();

    let chain: HandlerChain = recovery.handler_chain();
    let err = std::io::Error::new(std::io::ErrorKind::Other, "network down");
    assert_eq!(chain.report_error(&err, false), 0);

    assert_eq!(
        store.get("@alice/mail").unwrap(),
        Some(r#"{"route":"/settings"}"#.to_string())
    );
}
