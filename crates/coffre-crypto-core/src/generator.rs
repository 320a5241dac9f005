//! Random secret generation.
//!
//! Every draw comes from `OsRng`. The alphabet is the union of the enabled
//! [`CharClass`]es; [`CoveragePolicy`] decides whether each enabled class is
//! guaranteed to appear.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default secret length.
pub const DEFAULT_LENGTH: usize = 16;

/// Longest secret [`generate`] agrees to produce.
pub const MAX_LENGTH: usize = 1024;

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{}|;:',.<>?/~";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A character class the generator can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Uppercase,
    Lowercase,
    Digit,
    Symbol,
}

impl CharClass {
    /// All classes, in alphabet order.
    pub const ALL: [Self; 4] = [Self::Uppercase, Self::Lowercase, Self::Digit, Self::Symbol];

    /// The characters of this class.
    #[must_use]
    pub const fn charset(self) -> &'static str {
        match self {
            Self::Uppercase => UPPERCASE,
            Self::Lowercase => LOWERCASE,
            Self::Digit => DIGITS,
            Self::Symbol => SYMBOLS,
        }
    }

    /// Returns `true` if `c` belongs to this class.
    #[must_use]
    pub fn contains(self, c: char) -> bool {
        self.charset().contains(c)
    }
}

/// Whether generated secrets must contain every enabled class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoveragePolicy {
    /// Independent uniform draws from the union; coverage is likely, not certain.
    #[default]
    Uniform,
    /// One character from each enabled class, the rest uniform, then shuffled.
    GuaranteedCoverage,
}

/// Generator input.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    /// Number of characters to produce.
    pub length: usize,
    /// Include `A-Z`.
    pub uppercase: bool,
    /// Include `a-z`.
    pub lowercase: bool,
    /// Include `0-9`.
    pub digits: bool,
    /// Include the symbol set.
    pub symbols: bool,
    pub policy: CoveragePolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
            policy: CoveragePolicy::Uniform,
        }
    }
}

impl GeneratorConfig {
    /// Enabled classes, in [`CharClass::ALL`] order.
    #[must_use]
    pub fn enabled_classes(&self) -> Vec<CharClass> {
        CharClass::ALL
            .into_iter()
            .filter(|class| match class {
                CharClass::Uppercase => self.uppercase,
                CharClass::Lowercase => self.lowercase,
                CharClass::Digit => self.digits,
                CharClass::Symbol => self.symbols,
            })
            .collect()
    }

    /// Union of the enabled classes.
    #[must_use]
    pub fn alphabet(&self) -> Vec<char> {
        self.enabled_classes()
            .into_iter()
            .flat_map(|class| class.charset().chars())
            .collect()
    }

    /// Check that this configuration can produce a secret.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Configuration`] if:
    /// - no class is enabled
    /// - `length` is zero or above [`MAX_LENGTH`]
    /// - [`CoveragePolicy::GuaranteedCoverage`] is requested with fewer
    ///   positions than enabled classes
    pub fn validate(&self) -> Result<(), CryptoError> {
        let classes = self.enabled_classes().len();
        if classes == 0 {
            return Err(CryptoError::Configuration(
                "at least one character class must be enabled".into(),
            ));
        }
        if !(1..=MAX_LENGTH).contains(&self.length) {
            return Err(CryptoError::Configuration(format!(
                "length must be between 1 and {MAX_LENGTH}, got {}",
                self.length
            )));
        }
        if self.policy == CoveragePolicy::GuaranteedCoverage && self.length < classes {
            return Err(CryptoError::Configuration(format!(
                "length ({}) must be at least {classes} to include every enabled class",
                self.length
            )));
        }
        Ok(())
    }

    /// Entropy of a uniformly drawn secret: `length * log2(|alphabet|)`.
    ///
    /// Returns `0.0` when no class is enabled.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn entropy_bits(&self) -> f64 {
        let size = self.alphabet().len();
        if size == 0 {
            return 0.0;
        }
        self.length as f64 * (size as f64).log2()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate a secret according to `config`.
///
/// # Errors
///
/// Returns [`CryptoError::Configuration`] if `config` fails
/// [`GeneratorConfig::validate`].
pub fn generate(config: &GeneratorConfig) -> Result<String, CryptoError> {
    config.validate()?;

    let alphabet = config.alphabet();
    let mut rng = OsRng;

    let mut chars: Vec<char> = Vec::with_capacity(config.length);
    if config.policy == CoveragePolicy::GuaranteedCoverage {
        for class in config.enabled_classes() {
            let set: Vec<char> = class.charset().chars().collect();
            chars.push(set[rng.gen_range(0..set.len())]);
        }
    }
    while chars.len() < config.length {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }

    if config.policy == CoveragePolicy::GuaranteedCoverage {
        // Fisher-Yates, so the mandatory characters are not always up front.
        chars.shuffle(&mut rng);
    }

    Ok(chars.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
