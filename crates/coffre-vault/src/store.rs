//! Storage collaborator: where sealed rows live.
//!
//! Stores only ever see sealed rows ([`StoredRecord`], [`StoredDocument`])
//! whose secret parts are envelopes. Every lookup is scoped by owner id; a
//! row owned by someone else is reported as not found.

use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::documents::StoredDocument;
use crate::error::VaultError;
use crate::records::StoredRecord;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A sealed, owner-scoped row.
pub trait Row: Clone + Send + Sync + Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    fn owner_id(&self) -> &str;
    /// Milliseconds since the Unix epoch; lists are ordered by it.
    fn created_at(&self) -> u64;
}

impl Row for StoredRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn created_at(&self) -> u64 {
        self.created_at
    }
}

impl Row for StoredDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn created_at(&self) -> u64 {
        self.created_at
    }
}

/// Row storage for sealed records (and, with `T = StoredDocument`, documents).
pub trait RecordStore<T: Row = StoredRecord>: Send + Sync {
    /// Add a new row.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Storage`] if a row with the same id exists.
    fn insert(&self, row: T) -> Result<(), VaultError>;

    /// Replace an existing row with the same owner and id.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::RecordNotFound`] if there is nothing to replace.
    fn update(&self, row: T) -> Result<(), VaultError>;

    /// Fetch one row.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::RecordNotFound`] if `owner_id` has no row `id`.
    fn get(&self, owner_id: &str, id: &str) -> Result<T, VaultError>;

    /// All rows of `owner_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Storage`] if the backend cannot be read.
    fn list(&self, owner_id: &str) -> Result<Vec<T>, VaultError>;

    /// Remove one row.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::RecordNotFound`] if `owner_id` has no row `id`.
    fn delete(&self, owner_id: &str, id: &str) -> Result<(), VaultError>;
}

// ---------------------------------------------------------------------------
// Shared row logic
// ---------------------------------------------------------------------------

type Rows<T> = HashMap<String, T>;

fn insert_row<T: Row>(rows: &mut Rows<T>, row: T) -> Result<(), VaultError> {
    if rows.contains_key(row.id()) {
        return Err(VaultError::Storage(format!(
            "record {} already exists",
            row.id()
        )));
    }
    rows.insert(row.id().to_owned(), row);
    Ok(())
}

fn update_row<T: Row>(rows: &mut Rows<T>, row: T) -> Result<(), VaultError> {
    match rows.get_mut(row.id()) {
        Some(existing) if existing.owner_id() == row.owner_id() => {
            *existing = row;
            Ok(())
        }
        _ => Err(VaultError::RecordNotFound(row.id().to_owned())),
    }
}

fn get_row<T: Row>(rows: &Rows<T>, owner_id: &str, id: &str) -> Result<T, VaultError> {
    rows.get(id)
        .filter(|r| r.owner_id() == owner_id)
        .cloned()
        .ok_or_else(|| VaultError::RecordNotFound(id.to_owned()))
}

fn list_rows<T: Row>(rows: &Rows<T>, owner_id: &str) -> Vec<T> {
    let mut listed: Vec<T> = rows
        .values()
        .filter(|r| r.owner_id() == owner_id)
        .cloned()
        .collect();
    listed.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    listed
}

fn delete_row<T: Row>(rows: &mut Rows<T>, owner_id: &str, id: &str) -> Result<(), VaultError> {
    if rows.get(id).is_some_and(|r| r.owner_id() == owner_id) {
        rows.remove(id);
        Ok(())
    } else {
        Err(VaultError::RecordNotFound(id.to_owned()))
    }
}

fn poisoned<E>(_: E) -> VaultError {
    VaultError::Storage("store lock poisoned".into())
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store, for tests and embedding.
#[derive(Debug)]
pub struct MemoryStore<T = StoredRecord> {
    rows: Mutex<Rows<T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }
}

impl MemoryStore {
    /// Empty record store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Row> RecordStore<T> for MemoryStore<T> {
    fn insert(&self, row: T) -> Result<(), VaultError> {
        insert_row(&mut *self.rows.lock().map_err(poisoned)?, row)
    }

    fn update(&self, row: T) -> Result<(), VaultError> {
        update_row(&mut *self.rows.lock().map_err(poisoned)?, row)
    }

    fn get(&self, owner_id: &str, id: &str) -> Result<T, VaultError> {
        get_row(&*self.rows.lock().map_err(poisoned)?, owner_id, id)
    }

    fn list(&self, owner_id: &str) -> Result<Vec<T>, VaultError> {
        Ok(list_rows(&*self.rows.lock().map_err(poisoned)?, owner_id))
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<(), VaultError> {
        delete_row(&mut *self.rows.lock().map_err(poisoned)?, owner_id, id)
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile<T> {
    version: u32,
    records: Vec<T>,
}

/// Single-file JSON store.
///
/// Every mutation rewrites the whole file through a `.tmp` sibling and a
/// rename, with owner-only permissions on Unix. A missing file is an empty
/// store; a corrupt file is an error, never silently replaced.
#[derive(Debug)]
pub struct JsonFileStore<T = StoredRecord> {
    path: PathBuf,
    guard: Mutex<()>,
    rows: PhantomData<fn() -> T>,
}

impl JsonFileStore {
    /// Record store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::at(path)
    }
}

impl<T: Row> JsonFileStore<T> {
    /// Store of `T` rows backed by `path`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
            rows: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Rows<T>, VaultError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Rows::new()),
            Err(e) => return Err(e.into()),
        };
        let file: StoreFile<T> = serde_json::from_str(&contents).map_err(|e| {
            VaultError::Storage(format!("{} is not a store file: {e}", self.path.display()))
        })?;
        if file.version != STORE_FORMAT_VERSION {
            return Err(VaultError::Storage(format!(
                "unsupported store file version {}",
                file.version
            )));
        }
        Ok(file
            .records
            .into_iter()
            .map(|r| (r.id().to_owned(), r))
            .collect())
    }

    fn save(&self, rows: &Rows<T>) -> Result<(), VaultError> {
        let mut ordered: Vec<&T> = rows.values().collect();
        ordered.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            records: ordered,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| VaultError::Storage(format!("failed to serialize rows: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        write_owner_only(&tmp, json.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate<F>(&self, f: F) -> Result<(), VaultError>
    where
        F: FnOnce(&mut Rows<T>) -> Result<(), VaultError>,
    {
        let _guard = self.guard.lock().map_err(poisoned)?;
        let mut rows = self.load()?;
        f(&mut rows)?;
        self.save(&rows)
    }

    fn read<R>(&self, f: impl FnOnce(&Rows<T>) -> Result<R, VaultError>) -> Result<R, VaultError> {
        let _guard = self.guard.lock().map_err(poisoned)?;
        f(&self.load()?)
    }
}

impl<T: Row> RecordStore<T> for JsonFileStore<T> {
    fn insert(&self, row: T) -> Result<(), VaultError> {
        self.mutate(|rows| insert_row(rows, row))
    }

    fn update(&self, row: T) -> Result<(), VaultError> {
        self.mutate(|rows| update_row(rows, row))
    }

    fn get(&self, owner_id: &str, id: &str) -> Result<T, VaultError> {
        self.read(|rows| get_row(rows, owner_id, id))
    }

    fn list(&self, owner_id: &str) -> Result<Vec<T>, VaultError> {
        self.read(|rows| Ok(list_rows(rows, owner_id)))
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<(), VaultError> {
        self.mutate(|rows| delete_row(rows, owner_id, id))
    }
}

/// Write `bytes` to `path`, restricted to the owner on Unix.
pub(crate) fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
