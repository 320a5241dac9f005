//! `coffre`: command-line client for the COFFRE credential vault.
//!
//! Seals secrets with key material derived from the signed-in identity,
//! keeps them in a local JSON record file, and scores them locally and
//! against the Pwned Passwords range API.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

mod commands;
mod context;
mod prompt;

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::context::Context;

/// COFFRE - client-side encrypted credential vault.
#[derive(Parser, Debug)]
#[command(name = "coffre", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Directory holding config.json, records.json and documents.json.
    #[arg(long, env = "COFFRE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Authenticated user id.
    #[arg(long, env = "COFFRE_USER_ID", global = true)]
    user_id: Option<String>,

    /// Verified email of the authenticated user.
    #[arg(long, env = "COFFRE_EMAIL", global = true)]
    email: Option<String>,

    /// Key epoch of the current identity material.
    #[arg(long, env = "COFFRE_KEY_EPOCH", default_value_t = 0, global = true)]
    epoch: u32,

    /// Default log level when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a random secret.
    Generate(commands::generate::GenerateArgs),
    /// Score a secret and check it against the breach corpus.
    Analyze(commands::analyze::AnalyzeArgs),
    /// Encrypt a secret into an envelope.
    Encrypt,
    /// Decrypt an envelope.
    Decrypt {
        /// The envelope (`salt:payload`).
        envelope: String,
    },
    /// Store a new record.
    Add(commands::records::AddArgs),
    /// Change a record's metadata or secret.
    Edit(commands::records::EditArgs),
    /// List records (no secrets).
    List,
    /// Show one record, including its secret.
    Show {
        /// Record id.
        id: String,
    },
    /// Delete one record.
    Delete {
        /// Record id.
        id: String,
    },
    /// Summarize weak, compromised, stale, reused and locked records.
    Health(commands::health::HealthArgs),
    /// Re-seal records and documents from an older key epoch under the current one.
    Migrate(commands::records::MigrateArgs),
    /// Sealed documents.
    #[command(subcommand)]
    Doc(commands::documents::DocCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global.log_level);

    if let Err(e) = coffre_crypto_core::disable_core_dumps() {
        tracing::warn!(error = %e, "could not disable core dumps");
    }

    let ctx = Context::from_args(&cli.global)?;
    let mut out = std::io::stdout().lock();
    run(&ctx, cli.command, &mut out).await?;
    out.flush()?;
    Ok(())
}

async fn run(ctx: &Context, command: Commands, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Commands::Generate(args) => commands::generate::run(ctx, &args, out),
        Commands::Analyze(args) => {
            let secret = prompt::read_secret("Secret to analyze: ")?;
            commands::analyze::run(ctx, &args, &secret, out).await
        }
        Commands::Encrypt => {
            let secret = prompt::read_secret("Secret to encrypt: ")?;
            commands::cipher::encrypt(ctx, &secret, out)
        }
        Commands::Decrypt { envelope } => commands::cipher::decrypt(ctx, &envelope, out),
        Commands::Add(args) => commands::records::add(ctx, &args, out).await,
        Commands::Edit(args) => commands::records::edit(ctx, &args, out).await,
        Commands::List => commands::records::list(ctx, out),
        Commands::Show { id } => commands::records::show(ctx, &id, out),
        Commands::Delete { id } => commands::records::delete(ctx, &id, out),
        Commands::Health(args) => commands::health::run(ctx, &args, out).await,
        Commands::Migrate(args) => commands::records::migrate(ctx, &args, out),
        Commands::Doc(command) => commands::documents::run(ctx, command, out),
    }
}

/// Initializes the tracing subscriber on stderr.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("coffre={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
