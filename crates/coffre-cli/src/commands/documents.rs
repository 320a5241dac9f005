//! Document commands: add, list, get and delete sealed files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use clap::Subcommand;
use coffre_vault::{
    open_document, seal_document, DocumentDraft, RecordStore, StoredDocument, DEFAULT_MEDIA_TYPE,
    MAX_DOCUMENT_BYTES,
};

use crate::commands::records::format_date;
use crate::context::Context;

/// `coffre doc ...`
#[derive(Subcommand, Debug)]
pub enum DocCommand {
    /// Seal a file into the vault.
    Add {
        /// File to read.
        path: PathBuf,

        /// Name to store (default: the file name).
        #[arg(long)]
        name: Option<String>,

        /// Media type (default: guessed from the extension).
        #[arg(long)]
        media_type: Option<String>,
    },
    /// List documents (no contents).
    List,
    /// Decrypt one document.
    Get {
        /// Document id.
        id: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete one document.
    Delete {
        /// Document id.
        id: String,
    },
}

pub fn run(ctx: &Context, command: DocCommand, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        DocCommand::Add {
            path,
            name,
            media_type,
        } => add(ctx, &path, name, media_type, out),
        DocCommand::List => list(ctx, out),
        DocCommand::Get { id, output } => get(ctx, &id, output.as_deref(), out),
        DocCommand::Delete { id } => delete(ctx, &id, out),
    }
}

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

fn add(
    ctx: &Context,
    path: &Path,
    name: Option<String>,
    media_type: Option<String>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let keys = ctx.keys()?;
    let owner_id = ctx.owner_id()?;

    let len = fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    if len > u64::try_from(MAX_DOCUMENT_BYTES).unwrap_or(u64::MAX) {
        bail!(
            "{} is {len} bytes, the limit is {MAX_DOCUMENT_BYTES}",
            path.display()
        );
    }
    let content = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name; pass --name", path.display()))?,
    };
    let media_type = media_type.unwrap_or_else(|| guess_media_type(path).to_owned());

    let document = seal_document(owner_id, &DocumentDraft::new(name, media_type, content), &keys)?;
    let id = document.id.clone();
    let size = document.size;
    ctx.documents().insert(document)?;
    tracing::info!(document_id = %id, size, "document added");

    if ctx.json {
        writeln!(out, "{}", serde_json::json!({ "id": id, "size": size }))?;
    } else {
        writeln!(out, "added {id}")?;
    }
    Ok(())
}

/// Media type for the common upload kinds, by extension.
fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => DEFAULT_MEDIA_TYPE,
    }
}

// ---------------------------------------------------------------------------
// list / get / delete
// ---------------------------------------------------------------------------

fn list(ctx: &Context, out: &mut dyn Write) -> anyhow::Result<()> {
    let documents = ctx.documents().list(ctx.owner_id()?)?;

    if ctx.json {
        let rows: Vec<serde_json::Value> = documents.iter().map(summary_json).collect();
        writeln!(out, "{}", serde_json::Value::Array(rows))?;
        return Ok(());
    }

    if documents.is_empty() {
        writeln!(out, "no documents")?;
    }
    for doc in &documents {
        writeln!(
            out,
            "{}  {}  {:>9}  {}  {}",
            doc.id,
            format_date(doc.created_at),
            doc.size,
            doc.media_type,
            doc.name
        )?;
    }
    Ok(())
}

fn get(ctx: &Context, id: &str, output: Option<&Path>, out: &mut dyn Write) -> anyhow::Result<()> {
    let keys = ctx.keys()?;
    let stored = ctx.documents().get(ctx.owner_id()?, id)?;
    let bytes = open_document(&stored, &keys)
        .with_context(|| format!("document {id} could not be opened"))?;

    match output {
        Some(path) => {
            fs::write(path, bytes.as_slice())
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(document_id = %id, path = %path.display(), "document written");
            writeln!(out, "wrote {} bytes to {}", bytes.len(), path.display())?;
        }
        None => out.write_all(&bytes)?,
    }
    Ok(())
}

fn delete(ctx: &Context, id: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    ctx.documents().delete(ctx.owner_id()?, id)?;
    tracing::info!(document_id = %id, "document deleted");
    writeln!(out, "deleted {id}")?;
    Ok(())
}

fn summary_json(doc: &StoredDocument) -> serde_json::Value {
    serde_json::json!({
        "id": doc.id,
        "name": doc.name,
        "mediaType": doc.media_type,
        "size": doc.size,
        "createdAt": doc.created_at,
        "keyEpoch": doc.key_epoch(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
