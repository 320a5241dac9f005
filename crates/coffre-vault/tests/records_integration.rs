#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Save / load / migrate flows through a file-backed store.

use coffre_crypto_core::{KeyEpoch, KeyMaterial};
use coffre_vault::{
    migrate_record, open_record, reseal_record, seal_record, JsonFileStore, KeyRing, LockReason,
    MemoryStore, Migration, RecordDraft, RecordStore, RevealedSecret, UserIdentity,
};
use tempfile::TempDir;

fn alice() -> UserIdentity {
    UserIdentity::new("6a1f0c3e", "alice@example.com")
}

#[test]
fn save_and_reload_through_json_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let keys = KeyRing::for_identity(&alice()).unwrap();

    {
        let store = JsonFileStore::new(&path);
        let draft = RecordDraft::new("Mail", "alice", "Tr0ub4dor&3").with_website("mail.example");
        store
            .insert(seal_record("6a1f0c3e", &draft, &keys).unwrap())
            .unwrap();
    }

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("Tr0ub4dor&3"), "plaintext must never reach storage");
    assert!(raw.contains("Mail"), "metadata stays searchable");

    let store = JsonFileStore::new(&path);
    let records = store.list("6a1f0c3e").unwrap();
    assert_eq!(records.len(), 1);

    let opened = open_record(&records[0], &keys);
    assert_eq!(opened.secret.expose(), Some("Tr0ub4dor&3"));
    assert_eq!(opened.website.as_deref(), Some("mail.example"));
}

#[test]
fn update_keeps_record_identity() {
    let store = MemoryStore::new();
    let keys = KeyRing::for_identity(&alice()).unwrap();

    let original = seal_record("6a1f0c3e", &RecordDraft::new("Bank", "alice", "old"), &keys).unwrap();
    store.insert(original.clone()).unwrap();

    let edited = reseal_record(&original, &RecordDraft::new("Bank", "alice2", "new"), &keys).unwrap();
    store.update(edited).unwrap();

    let loaded = store.get("6a1f0c3e", &original.id).unwrap();
    assert_eq!(loaded.created_at, original.created_at);
    assert_eq!(loaded.username, "alice2");
    assert_eq!(open_record(&loaded, &keys).secret.expose(), Some("new"));
}

#[test]
fn email_change_then_migration() {
    let store = MemoryStore::new();
    let mut keys = KeyRing::for_identity(&alice()).unwrap();

    for title in ["a", "b", "c"] {
        let draft = RecordDraft::new(title, "alice", format!("secret-{title}"));
        store
            .insert(seal_record("6a1f0c3e", &draft, &keys).unwrap())
            .unwrap();
    }

    let renamed = UserIdentity::new("6a1f0c3e", "alice@new.example");
    keys.rotate(renamed.key_material().unwrap()).unwrap();

    // Old records still open through the historical material.
    for record in store.list("6a1f0c3e").unwrap() {
        assert!(!open_record(&record, &keys).secret.is_locked());
    }

    let mut migrated = 0;
    for record in store.list("6a1f0c3e").unwrap() {
        if let Migration::Migrated(updated) = migrate_record(&record, &keys).unwrap() {
            store.update(updated).unwrap();
            migrated += 1;
        }
    }
    assert_eq!(migrated, 3);

    // After migration, the new material alone opens everything.
    let fresh = KeyRing::at_epoch(KeyEpoch(1), renamed.key_material().unwrap());
    for record in store.list("6a1f0c3e").unwrap() {
        assert_eq!(record.key_epoch(), Some(KeyEpoch(1)));
        let opened = open_record(&record, &fresh);
        assert_eq!(
            opened.secret.expose(),
            Some(format!("secret-{}", opened.title).as_str())
        );
    }
}

#[test]
fn dropping_old_material_locks_instead_of_emptying() {
    let keys = KeyRing::for_identity(&alice()).unwrap();
    let record = seal_record("6a1f0c3e", &RecordDraft::new("t", "u", "s"), &keys).unwrap();

    let stranded = KeyRing::at_epoch(
        KeyEpoch(1),
        KeyMaterial::new("6a1f0c3e-alice@new.example").unwrap(),
    );
    let opened = open_record(&record, &stranded);

    assert!(matches!(
        opened.secret,
        RevealedSecret::Locked(LockReason::UnknownKeyEpoch(KeyEpoch(0)))
    ));
    assert_eq!(opened.secret.expose(), None);
}

#[test]
fn owners_are_isolated() {
    let store = MemoryStore::new();
    let alice_keys = KeyRing::for_identity(&alice()).unwrap();
    let record = seal_record("6a1f0c3e", &RecordDraft::new("t", "u", "s"), &alice_keys).unwrap();
    store.insert(record.clone()).unwrap();

    assert!(store.get("91bd22aa", &record.id).is_err());
    assert!(store.list("91bd22aa").unwrap().is_empty());
    assert!(store.delete("91bd22aa", &record.id).is_err());
    assert!(store.get("6a1f0c3e", &record.id).is_ok());
}
