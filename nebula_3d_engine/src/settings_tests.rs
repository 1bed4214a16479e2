use super::*;

#[test]
fn test_watcher_sees_live_updates() {
    let store = SettingsStore::default();
    let watcher = store.watch(|s| s.shadow_resolution);
    assert_eq!(watcher.get(), 2048);

    store.update(|s| s.shadow_resolution = 4096);
    assert_eq!(watcher.get(), 4096);
}

#[test]
fn test_clones_share_state() {
    let store = SettingsStore::default();
    let clone = store.clone();
    clone.update(|s| s.num_frames_in_flight = 2);
    assert_eq!(store.get(|s| s.num_frames_in_flight), 2);
}

#[test]
fn test_cascade_splits_written_back() {
    // The engine writes cascade splits in response to camera changes;
    // watchers over the vector see the new values
    let store = SettingsStore::default();
    let watcher = store.watch(|s| s.directional_light_cascade_splits.clone());
    assert!(watcher.get().is_empty());
    store.update(|s| s.directional_light_cascade_splits = vec![5.0, 20.0, 60.0, 100.0]);
    assert_eq!(watcher.get().len(), 4);
}
