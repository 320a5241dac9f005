//! Per-invocation state: data directory, configuration and identity.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context as _};
use coffre_crypto_core::KeyEpoch;
use coffre_vault::{
    JsonFileStore, KeyRing, StoredDocument, StrengthAnalyzer, UserIdentity, VaultConfig,
};

use crate::GlobalArgs;

const RECORDS_FILE: &str = "records.json";
const DOCUMENTS_FILE: &str = "documents.json";

pub struct Context {
    pub data_dir: PathBuf,
    pub config: VaultConfig,
    pub identity: Option<UserIdentity>,
    pub epoch: KeyEpoch,
    pub json: bool,
}

impl Context {
    /// Resolve the data directory, load configuration and collect the identity.
    pub fn from_args(args: &GlobalArgs) -> anyhow::Result<Self> {
        let data_dir = match &args.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .context("no platform data directory; pass --data-dir")?
                .join("coffre"),
        };
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = VaultConfig::load(&data_dir);
        config.validate()?;

        let identity = match (&args.user_id, &args.email) {
            (Some(user_id), Some(email)) => Some(UserIdentity::new(user_id, email)),
            _ => None,
        };

        tracing::debug!(data_dir = %data_dir.display(), epoch = args.epoch, "context ready");

        Ok(Self {
            data_dir,
            config,
            identity,
            epoch: KeyEpoch(args.epoch),
            json: args.json,
        })
    }

    /// The signed-in identity, required by every command that touches secrets.
    pub fn identity(&self) -> anyhow::Result<&UserIdentity> {
        match &self.identity {
            Some(identity) => Ok(identity),
            None => bail!(
                "no signed-in identity: pass --user-id and --email \
                 (or set COFFRE_USER_ID and COFFRE_EMAIL)"
            ),
        }
    }

    pub fn owner_id(&self) -> anyhow::Result<&str> {
        Ok(self.identity()?.user_id.trim())
    }

    /// Key ring holding the current identity material at the configured epoch.
    pub fn keys(&self) -> anyhow::Result<KeyRing> {
        let material = self.identity()?.key_material()?;
        Ok(KeyRing::at_epoch(self.epoch, material))
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::new(self.records_path())
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join(RECORDS_FILE)
    }

    /// Sealed documents live in their own file next to the records.
    pub fn documents(&self) -> JsonFileStore<StoredDocument> {
        JsonFileStore::at(self.documents_path())
    }

    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join(DOCUMENTS_FILE)
    }

    /// Analyzer per configuration, or offline when `offline` is set.
    pub fn analyzer(&self, offline: bool) -> anyhow::Result<StrengthAnalyzer> {
        if offline {
            return Ok(StrengthAnalyzer::offline());
        }
        Ok(StrengthAnalyzer::from_config(&self.config.breach)?)
    }
}

#[cfg(test)]
impl Context {
    /// Context rooted at `data_dir` with breach lookups disabled.
    pub fn for_tests(data_dir: &std::path::Path, identity: Option<UserIdentity>) -> Self {
        let mut config = VaultConfig::default();
        config.breach.enabled = false;
        Self {
            data_dir: data_dir.to_path_buf(),
            config,
            identity,
            epoch: KeyEpoch::INITIAL,
            json: false,
        }
    }
}
