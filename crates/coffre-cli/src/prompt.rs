//! Secret acquisition via `COFFRE_SECRET`, a TTY prompt, or one stdin line.

use std::io::{BufRead, IsTerminal};

use anyhow::Context as _;
use secrecy::SecretString;
use zeroize::Zeroize;

/// Environment variable consulted before prompting.
pub const SECRET_ENV_VAR: &str = "COFFRE_SECRET";

/// Read one secret.
///
/// Priority:
/// 1. `COFFRE_SECRET` (non-empty)
/// 2. Hidden TTY prompt via `rpassword`
/// 3. First line of stdin (for pipes)
pub fn read_secret(label: &str) -> anyhow::Result<SecretString> {
    if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
        if !secret.is_empty() {
            return Ok(SecretString::from(secret));
        }
    }

    if std::io::stdin().is_terminal() {
        let secret = rpassword::prompt_password(label).context("failed to read secret")?;
        return Ok(SecretString::from(secret));
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read secret from stdin")?;
    let secret = strip_line_ending(&line).to_owned();
    line.zeroize();
    Ok(SecretString::from(secret))
}

/// Drop one trailing `\n` or `\r\n`, keeping every other character.
fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map_or(line, |l| l.strip_suffix('\r').unwrap_or(l))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_the_line_ending() {
        assert_eq!(strip_line_ending("secret\n"), "secret");
        assert_eq!(strip_line_ending("secret\r\n"), "secret");
        assert_eq!(strip_line_ending("  spaced  \n"), "  spaced  ");
        assert_eq!(strip_line_ending("no newline"), "no newline");
        assert_eq!(strip_line_ending("\n"), "");
    }
}
