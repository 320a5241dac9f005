//! `coffre-vault`: record handling and strength analysis for COFFRE.
//!
//! Seals records and documents with identity-derived key material, opens
//! them again, stores them through a [`RecordStore`], and scores secrets
//! locally and against a k-anonymous breach range API.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod config;
pub mod error;
pub mod identity;

pub mod documents;
pub mod records;
pub mod store;

pub mod breach;
pub mod strength;

pub mod analyzer;

pub mod health;

pub use analyzer::StrengthAnalyzer;
pub use breach::{
    parse_range_body, range_query_key, BreachChecker, HashPrefix, LookupError, PwnedRangeClient,
    RangeQuery, RangeSource, DEFAULT_ENDPOINT,
};
pub use config::{BreachConfig, VaultConfig};
pub use documents::{
    migrate_document, open_document, seal_document, DocumentDraft, StoredDocument,
    DEFAULT_MEDIA_TYPE, MAX_DOCUMENT_BYTES,
};
pub use error::VaultError;
pub use health::{analyze_vault_health, HealthReport, RecordRef, ReusedGroup, StaleRecord};
pub use identity::{KeyRing, UserIdentity};
pub use records::{
    migrate_record, open_record, reseal_record, seal_record, unix_millis, LockReason, Migration,
    OpenedRecord, RecordDraft, RevealedSecret, StoredRecord,
};
pub use store::{JsonFileStore, MemoryStore, RecordStore, Row};
pub use strength::{
    evaluate, evaluate_with_breach, BreachStatus, StrengthClass, StrengthIssue, StrengthReport,
};
