//! Behaviour of source snapshotting at the binary boundary.

use std::fs;

use tempfile::TempDir;

use simrelay::snapshot::snapshot_sources;

#[test]
fn missing_binary_yields_empty_set() {
    let tmp = TempDir::new().unwrap();
    let sources = snapshot_sources(&tmp.path().join("not-built-yet.elf")).unwrap();
    assert!(sources.is_empty());
}

#[test]
fn unparsable_binary_is_a_snapshot_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("garbage.elf");
    fs::write(&path, b"this is not an object file").unwrap();

    let err = snapshot_sources(&path).unwrap_err();
    assert_eq!(err.phase(), "snapshot");
}
