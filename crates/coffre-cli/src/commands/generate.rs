use std::io::Write;

use anyhow::bail;
use clap::Args;
use coffre_crypto_core::{generate, CoveragePolicy, GeneratorConfig};
use zeroize::Zeroize;

use crate::context::Context;

/// Most secrets one `generate` call prints.
pub const MAX_COUNT: usize = 100;

/// Options for `coffre generate`. Unset options fall back to config.json.
#[allow(clippy::struct_excessive_bools)]
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of characters.
    #[arg(short, long)]
    pub length: Option<usize>,

    /// Leave out A-Z.
    #[arg(long)]
    pub no_uppercase: bool,

    /// Leave out a-z.
    #[arg(long)]
    pub no_lowercase: bool,

    /// Leave out 0-9.
    #[arg(long)]
    pub no_digits: bool,

    /// Leave out symbols.
    #[arg(long)]
    pub no_symbols: bool,

    /// Include at least one character of every enabled class.
    #[arg(long)]
    pub guaranteed: bool,

    /// How many secrets to print (1 to 100).
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,
}

impl GenerateArgs {
    /// Apply the flags on top of the configured generator settings.
    pub fn apply(&self, base: &GeneratorConfig) -> GeneratorConfig {
        GeneratorConfig {
            length: self.length.unwrap_or(base.length),
            uppercase: base.uppercase && !self.no_uppercase,
            lowercase: base.lowercase && !self.no_lowercase,
            digits: base.digits && !self.no_digits,
            symbols: base.symbols && !self.no_symbols,
            policy: if self.guaranteed {
                CoveragePolicy::GuaranteedCoverage
            } else {
                base.policy
            },
        }
    }
}

pub fn run(ctx: &Context, args: &GenerateArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    if !(1..=MAX_COUNT).contains(&args.count) {
        bail!("--count must be between 1 and {MAX_COUNT}, got {}", args.count);
    }
    let config = args.apply(&ctx.config.generator);
    config.validate()?;

    let mut secrets = Vec::new();
    for _ in 0..args.count {
        secrets.push(generate(&config)?);
    }
    tracing::debug!(count = args.count, length = config.length, "generated secrets");

    let result = if ctx.json {
        let value = serde_json::json!({
            "secrets": secrets,
            "entropyBits": config.entropy_bits(),
        });
        writeln!(out, "{value}")
    } else {
        secrets.iter().try_for_each(|s| writeln!(out, "{s}"))
    };
    secrets.iter_mut().for_each(Zeroize::zeroize);
    Ok(result?)
}
