use std::io::Write;

use anyhow::Context as _;
use coffre_crypto_core::{open, seal, Envelope};
use secrecy::{ExposeSecret, SecretString};

use crate::context::Context;

/// Seal `secret` under the current key epoch and print the envelope.
pub fn encrypt(ctx: &Context, secret: &SecretString, out: &mut dyn Write) -> anyhow::Result<()> {
    let keys = ctx.keys()?;
    let envelope = seal(secret.expose_secret(), keys.current(), keys.current_epoch())?;
    writeln!(out, "{envelope}")?;
    Ok(())
}

/// Open `encoded` and print the plaintext.
pub fn decrypt(ctx: &Context, encoded: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let keys = ctx.keys()?;
    let envelope = Envelope::parse(encoded.trim())?;
    let material = keys.material(envelope.epoch()).with_context(|| {
        format!(
            "envelope was sealed under key epoch {}; pass --epoch {}",
            envelope.epoch(),
            envelope.epoch()
        )
    })?;
    let plaintext = open(&envelope, material)?;
    writeln!(out, "{}", plaintext.expose_secret())?;
    Ok(())
}
