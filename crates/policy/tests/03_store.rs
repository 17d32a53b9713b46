use std::path::PathBuf;

use policy::store::{ModelStore, StoreError};
use policy::{Policy, PolicyNetwork};

fn scratch_store(tag: &str) -> ModelStore {
    let root: PathBuf =
        std::env::temp_dir().join(format!("policy-store-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    ModelStore::new(root)
}

#[test]
fn save_then_load_round_trips_predictions() {
    fastrand::seed(21);
    let store = scratch_store("roundtrip");
    let net = PolicyNetwork::new(9, 4, 0.002);
    store.save(&net, "agent-v1").unwrap();

    let loaded = store.load("agent-v1", 9, 4, 0.002).unwrap();
    let mut state = vec![0.0; 9];
    state[3] = 1.0;
    let original = net.predict(&state);
    let restored = loaded.predict(&state);
    for (a, b) in original.iter().zip(&restored) {
        assert!((a - b).abs() < 1e-6, "prediction drifted: {a} vs {b}");
    }
    let _ = std::fs::remove_dir_all(store.root());
}

#[test]
fn missing_key_is_not_found() {
    let store = scratch_store("missing");
    let err = store.load("nothing-here", 9, 4, 0.002).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)), "got {err}");
}

#[test]
fn dimension_mismatch_is_rejected() {
    fastrand::seed(22);
    let store = scratch_store("mismatch");
    let net = PolicyNetwork::new(9, 4, 0.002);
    store.save(&net, "small-grid").unwrap();

    let err = store.load("small-grid", 25, 4, 0.002).unwrap_err();
    assert!(matches!(err, StoreError::Incompatible { saved_in: 9, want_in: 25, .. }), "got {err}");
    let _ = std::fs::remove_dir_all(store.root());
}

#[test]
fn corrupt_snapshot_is_reported() {
    let store = scratch_store("corrupt");
    std::fs::create_dir_all(store.root()).unwrap();
    std::fs::write(store.root().join("broken.json"), "not json").unwrap();
    let err = store.load("broken", 9, 4, 0.002).unwrap_err();
    assert!(matches!(err, StoreError::Format(_)), "got {err}");
    let _ = std::fs::remove_dir_all(store.root());
}
