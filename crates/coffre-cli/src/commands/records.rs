//! Record commands: add, edit, list, show, delete and key-epoch migration.

use std::io::Write;

use anyhow::{bail, Context as _};
use clap::Args;
use coffre_crypto_core::{generate, KeyEpoch};
use coffre_vault::{
    migrate_document, migrate_record, open_record, reseal_record, seal_record, KeyRing,
    Migration, RecordDraft, RecordStore, RevealedSecret, Row, StoredDocument, StoredRecord,
    StrengthClass, StrengthReport, UserIdentity, VaultError,
};
use secrecy::{ExposeSecret, SecretString};

use crate::commands::analyze::breach_label;
use crate::context::Context;
use crate::prompt;

const MILLIS_PER_DAY: u64 = 86_400_000;

/// Options for `coffre add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Record title.
    #[arg(long)]
    pub title: String,

    /// Account name on the target site.
    #[arg(long, default_value = "")]
    pub username: String,

    /// Site URL.
    #[arg(long)]
    pub website: Option<String>,

    /// Generate the secret from the configured generator instead of prompting.
    #[arg(long)]
    pub generate: bool,

    /// Skip the breach lookup.
    #[arg(long)]
    pub offline: bool,
}

/// Options for `coffre edit`.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Record id.
    pub id: String,

    /// New title.
    #[arg(long)]
    pub title: Option<String>,

    /// New account name.
    #[arg(long)]
    pub username: Option<String>,

    /// New site URL; an empty value clears it.
    #[arg(long)]
    pub website: Option<String>,

    /// Prompt for a replacement secret.
    #[arg(long)]
    pub new_secret: bool,

    /// Replace the secret with a generated one.
    #[arg(long, conflicts_with = "new_secret")]
    pub generate: bool,

    /// Skip the breach lookup.
    #[arg(long)]
    pub offline: bool,
}

/// Options for `coffre migrate`.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Email the older records were sealed with.
    #[arg(long)]
    pub from_email: String,

    /// Epoch the older records were sealed under (default: current - 1).
    #[arg(long)]
    pub from_epoch: Option<u32>,
}

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

pub async fn add(ctx: &Context, args: &AddArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let secret = if args.generate {
        SecretString::from(generate(&ctx.config.generator)?)
    } else {
        prompt::read_secret("Secret: ")?
    };
    add_secret(ctx, args, secret, out).await
}

/// Score, seal and store `secret`. Weak or compromised secrets are stored
/// anyway, with a warning.
pub async fn add_secret(
    ctx: &Context,
    args: &AddArgs,
    secret: SecretString,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if args.title.trim().is_empty() {
        bail!("--title must not be blank");
    }
    let keys = ctx.keys()?;
    let owner_id = ctx.owner_id()?;

    let report = ctx
        .analyzer(args.offline)?
        .analyze(secret.expose_secret())
        .await;

    let draft = RecordDraft {
        title: args.title.clone(),
        username: args.username.clone(),
        secret,
        website: args.website.clone(),
    };
    let record = seal_record(owner_id, &draft, &keys)?;
    let id = record.id.clone();
    ctx.store().insert(record)?;
    tracing::info!(record_id = %id, class = report.class.as_str(), "record added");

    if ctx.json {
        let value = serde_json::json!({ "id": id, "strength": report });
        writeln!(out, "{value}")?;
        return Ok(());
    }

    writeln!(out, "added {id}")?;
    warn_if_weak(&report, out)
}

// ---------------------------------------------------------------------------
// edit
// ---------------------------------------------------------------------------

pub async fn edit(ctx: &Context, args: &EditArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let secret = if args.generate {
        Some(SecretString::from(generate(&ctx.config.generator)?))
    } else if args.new_secret {
        Some(prompt::read_secret("New secret: ")?)
    } else {
        None
    };
    edit_with(ctx, args, secret, out).await
}

/// Apply `args` to an existing record and re-seal it, keeping its id and
/// creation time. Without `new_secret` the current secret is carried over,
/// which requires that it still opens.
pub async fn edit_with(
    ctx: &Context,
    args: &EditArgs,
    new_secret: Option<SecretString>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if args.title.is_none()
        && args.username.is_none()
        && args.website.is_none()
        && new_secret.is_none()
    {
        bail!("nothing to change: pass --title, --username, --website, --new-secret or --generate");
    }
    let keys = ctx.keys()?;
    let store = ctx.store();
    let stored = store.get(ctx.owner_id()?, &args.id)?;

    let report = match &new_secret {
        Some(secret) => Some(
            ctx.analyzer(args.offline)?
                .analyze(secret.expose_secret())
                .await,
        ),
        None => None,
    };
    let secret = match new_secret {
        Some(secret) => secret,
        None => match open_record(&stored, &keys).secret {
            RevealedSecret::Revealed(secret) => secret,
            RevealedSecret::Locked(reason) => bail!(
                "record {} is locked ({reason}); pass --new-secret or --generate to replace it",
                args.id
            ),
        },
    };

    let title = args.title.clone().unwrap_or_else(|| stored.title.clone());
    if title.trim().is_empty() {
        bail!("--title must not be blank");
    }
    let draft = RecordDraft {
        title,
        username: args
            .username
            .clone()
            .unwrap_or_else(|| stored.username.clone()),
        secret,
        website: args.website.clone().or_else(|| stored.website.clone()),
    };
    let updated = reseal_record(&stored, &draft, &keys)?;
    store.update(updated)?;
    tracing::info!(record_id = %args.id, secret_changed = report.is_some(), "record edited");

    if ctx.json {
        let value = serde_json::json!({ "id": args.id, "strength": report });
        writeln!(out, "{value}")?;
        return Ok(());
    }

    writeln!(out, "updated {}", args.id)?;
    match &report {
        Some(report) => warn_if_weak(report, out),
        None => Ok(()),
    }
}

fn warn_if_weak(report: &StrengthReport, out: &mut dyn Write) -> anyhow::Result<()> {
    if report.class == StrengthClass::Weak || report.is_compromised() {
        writeln!(
            out,
            "warning: secret is {} ({}/100), breach: {}",
            report.class.as_str(),
            report.score,
            breach_label(report.breach)
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list / show / delete
// ---------------------------------------------------------------------------

pub fn list(ctx: &Context, out: &mut dyn Write) -> anyhow::Result<()> {
    let records = ctx.store().list(ctx.owner_id()?)?;

    if ctx.json {
        let rows: Vec<serde_json::Value> = records.iter().map(summary_json).collect();
        writeln!(out, "{}", serde_json::Value::Array(rows))?;
        return Ok(());
    }

    if records.is_empty() {
        writeln!(out, "no records")?;
    }
    for record in &records {
        writeln!(
            out,
            "{}  {}  {}  {}  {}",
            record.id,
            format_date(record.created_at),
            record.title,
            record.username,
            record.website.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

pub fn show(ctx: &Context, id: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let keys = ctx.keys()?;
    let stored = ctx.store().get(ctx.owner_id()?, id)?;
    let opened = open_record(&stored, &keys);

    let (secret, locked) = match &opened.secret {
        RevealedSecret::Revealed(secret) => (Some(secret.expose_secret()), None),
        RevealedSecret::Locked(reason) => (None, Some(reason.to_string())),
    };

    if ctx.json {
        let mut value = summary_json(&stored);
        value["secret"] = serde_json::json!(secret);
        value["locked"] = serde_json::json!(locked);
        writeln!(out, "{value}")?;
        return Ok(());
    }

    writeln!(out, "id:       {}", opened.id)?;
    writeln!(out, "title:    {}", opened.title)?;
    writeln!(out, "username: {}", opened.username)?;
    writeln!(out, "website:  {}", opened.website.as_deref().unwrap_or("-"))?;
    writeln!(out, "created:  {}", format_date(opened.created_at))?;
    match (secret, locked) {
        (Some(secret), _) => writeln!(out, "secret:   {secret}")?,
        (None, reason) => writeln!(
            out,
            "secret:   <locked: {}>",
            reason.as_deref().unwrap_or("unknown")
        )?,
    }
    Ok(())
}

pub fn delete(ctx: &Context, id: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    ctx.store().delete(ctx.owner_id()?, id)?;
    tracing::info!(record_id = %id, "record deleted");
    writeln!(out, "deleted {id}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// migrate
// ---------------------------------------------------------------------------

/// Re-seal every record and document from `--from-epoch` under the current
/// identity.
///
/// Rows that cannot be opened with either key are left untouched and counted
/// as skipped.
pub fn migrate(ctx: &Context, args: &MigrateArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let identity = ctx.identity()?;
    let mut keys = ctx.keys()?;

    let from_epoch = match args.from_epoch {
        Some(epoch) => KeyEpoch(epoch),
        None => ctx
            .epoch
            .0
            .checked_sub(1)
            .map(KeyEpoch)
            .context("current epoch is 0; nothing older to migrate from")?,
    };
    let previous = UserIdentity::new(identity.user_id.clone(), args.from_email.clone());
    keys.insert_historical(from_epoch, previous.key_material()?)?;

    let owner_id = ctx.owner_id()?;
    let mut tally = MigrationTally::default();
    migrate_rows::<StoredRecord>(&ctx.store(), owner_id, &keys, migrate_record, &mut tally)?;
    migrate_rows::<StoredDocument>(
        &ctx.documents(),
        owner_id,
        &keys,
        migrate_document,
        &mut tally,
    )?;
    let MigrationTally {
        migrated,
        current,
        skipped,
    } = tally;

    if ctx.json {
        let value = serde_json::json!({
            "migrated": migrated,
            "current": current,
            "skipped": skipped,
        });
        writeln!(out, "{value}")?;
    } else {
        writeln!(
            out,
            "migrated {migrated}, already current {current}, skipped {skipped}"
        )?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct MigrationTally {
    migrated: usize,
    current: usize,
    skipped: usize,
}

fn migrate_rows<T: Row>(
    store: &dyn RecordStore<T>,
    owner_id: &str,
    keys: &KeyRing,
    migrate_one: fn(&T, &KeyRing) -> Result<Migration<T>, VaultError>,
    tally: &mut MigrationTally,
) -> anyhow::Result<()> {
    for row in store.list(owner_id)? {
        match migrate_one(&row, keys) {
            Ok(Migration::Migrated(resealed)) => {
                store.update(resealed)?;
                tally.migrated = tally.migrated.saturating_add(1);
            }
            Ok(Migration::Current) => tally.current = tally.current.saturating_add(1),
            Err(VaultError::UnknownKeyEpoch(epoch)) => {
                tracing::warn!(row_id = %row.id(), %epoch, "no key for row epoch");
                tally.skipped = tally.skipped.saturating_add(1);
            }
            Err(e) => {
                tracing::warn!(row_id = %row.id(), error = %e, "row could not be migrated");
                tally.skipped = tally.skipped.saturating_add(1);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn summary_json(record: &StoredRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "title": record.title,
        "username": record.username,
        "website": record.website,
        "createdAt": record.created_at,
        "keyEpoch": record.key_epoch(),
    })
}

/// `YYYY-MM-DD` (UTC) for a Unix timestamp in milliseconds.
#[allow(clippy::arithmetic_side_effects)]
pub(crate) fn format_date(millis: u64) -> String {
    let days = i64::try_from(millis / MILLIS_PER_DAY).unwrap_or(0);
    // Civil-from-days over 400-year eras.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    format!("{year:04}-{month:02}-{day:02}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
