//! Saving key subtrees to files and loading them back.

use regkey::{ErrorKind, MemoryTransport, Registry, TextList, ValueData};
use std::fs;
use tempfile::tempdir;

fn populated_registry() -> Registry {
    let registry = Registry::new(MemoryTransport::new());
    let app = registry.create_path(r"HKCU\Software\App").unwrap();
    app.set("name", "demo").unwrap();
    app.set("size", ValueData::DwordBigEndian(0xCAFE)).unwrap();
    let plugins = app.child("Plugins").unwrap();
    plugins.set("enabled", ValueData::MultiString(TextList::from_iter(["a", "b"]))).unwrap();
    plugins.child("Empty").unwrap();
    registry
}

#[test]
fn test_save_then_load_under_machine_root() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.rkey");

    let source = populated_registry();
    source.open_path(r"HKCU\Software\App").unwrap().save(&path).unwrap();
    assert!(fs::metadata(&path).unwrap().len() > 8);

    let target = Registry::new(MemoryTransport::new());
    let loaded = target.local_machine().load("Imported", &path).unwrap();
    assert_eq!(loaded.path(true), r"HKLM\Imported");
    assert_eq!(loaded.get("name").unwrap(), ValueData::String("demo".into()));
    assert_eq!(loaded.get("size").unwrap(), ValueData::DwordBigEndian(0xCAFE));

    let plugins = loaded.open("Plugins").unwrap();
    assert_eq!(
        plugins.get("enabled").unwrap(),
        ValueData::MultiString(TextList::from_iter(["a", "b"]))
    );
    assert!(plugins.contains("Empty"));
    assert_eq!(loaded.children().len().unwrap(), 1);
}

#[test]
fn test_save_refuses_to_overwrite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exists.rkey");
    fs::write(&path, b"keep me").unwrap();

    let registry = populated_registry();
    let err = registry.open_path(r"HKCU\Software").unwrap().save(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert_eq!(fs::read(&path).unwrap(), b"keep me");
}

#[test]
fn test_load_only_under_machine_or_users() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.rkey");
    let registry = populated_registry();
    registry.open_path(r"HKCU\Software\App").unwrap().save(&path).unwrap();

    assert!(registry.current_user().load("Elsewhere", &path).is_err());
    let nested = registry.create_path(r"HKLM\Software").unwrap();
    assert!(nested.load("Elsewhere", &path).is_err());

    let loaded = registry.users().load("Copy", &path).unwrap();
    assert_eq!(loaded.get("name").unwrap().as_str(), Some("demo"));

    // Same name again is rejected
    assert!(registry.users().load("Copy", &path).is_err());
}

#[test]
fn test_load_rejects_bad_files() {
    let dir = tempdir().unwrap();
    let registry = Registry::new(MemoryTransport::new());

    let short = dir.path().join("short.rkey");
    fs::write(&short, b"RK").unwrap();
    assert!(registry.local_machine().load("Short", &short).is_err());

    let garbage = dir.path().join("garbage.rkey");
    fs::write(&garbage, b"NOTAKEYFILE-----").unwrap();
    assert!(registry.local_machine().load("Garbage", &garbage).is_err());

    let missing = dir.path().join("missing.rkey");
    assert!(registry.local_machine().load("Missing", &missing).is_err());

    assert!(!registry.local_machine().contains("Garbage"));
}
