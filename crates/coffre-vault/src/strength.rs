//! Local password strength scoring.
//!
//! Start at 100 and subtract one penalty per [`StrengthIssue`]. The score is
//! derived from the issue list only, so a report can always be explained.

use serde::{Deserialize, Serialize};

/// Candidates shorter than this (in chars) are `too-short`.
pub const MIN_LENGTH: usize = 8;

/// Case-insensitive substrings that mark a candidate as a common pattern.
const COMMON_WORDS: &[&str] = &[
    "password", "admin", "qwerty", "letmein", "welcome", "iloveyou",
];

/// Case-insensitive prefix that marks a candidate as a common pattern.
const COMMON_PREFIX: &str = "123";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Strength tier derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrengthClass {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl StrengthClass {
    /// `< 50` weak, `< 70` moderate, `< 90` strong, otherwise very strong.
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            0..=49 => Self::Weak,
            50..=69 => Self::Moderate,
            70..=89 => Self::Strong,
            _ => Self::VeryStrong,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::VeryStrong => "very-strong",
        }
    }
}

/// One reason a candidate lost points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrengthIssue {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSymbol,
    CommonPattern,
    Compromised,
}

impl StrengthIssue {
    /// Points subtracted from 100.
    #[must_use]
    pub const fn penalty(self) -> u32 {
        match self {
            Self::TooShort => 30,
            Self::MissingUppercase
            | Self::MissingLowercase
            | Self::MissingDigit
            | Self::MissingSymbol => 10,
            Self::CommonPattern => 20,
            Self::Compromised => 50,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TooShort => "too-short",
            Self::MissingUppercase => "missing-uppercase",
            Self::MissingLowercase => "missing-lowercase",
            Self::MissingDigit => "missing-digit",
            Self::MissingSymbol => "missing-symbol",
            Self::CommonPattern => "common-pattern",
            Self::Compromised => "compromised",
        }
    }
}

/// Outcome of the remote breach lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum BreachStatus {
    /// Lookup disabled or not attempted.
    NotChecked,
    /// The service answered and the candidate is not in the corpus.
    Clear,
    /// The candidate appears in the corpus.
    Compromised { occurrences: u64 },
    /// The lookup failed, timed out or was cancelled.
    Undetermined,
}

impl BreachStatus {
    #[must_use]
    pub const fn is_compromised(self) -> bool {
        matches!(self, Self::Compromised { .. })
    }
}

/// Score, tier, issues and breach status for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthReport {
    pub score: u32,
    pub class: StrengthClass,
    pub issues: Vec<StrengthIssue>,
    pub breach: BreachStatus,
}

impl StrengthReport {
    #[must_use]
    pub const fn is_compromised(&self) -> bool {
        self.breach.is_compromised()
    }

    #[must_use]
    pub fn has_issue(&self, issue: StrengthIssue) -> bool {
        self.issues.contains(&issue)
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score `candidate` without a breach lookup.
#[must_use]
pub fn evaluate(candidate: &str) -> StrengthReport {
    evaluate_with_breach(candidate, BreachStatus::NotChecked)
}

/// Score `candidate`, folding in an already determined breach status.
///
/// Only [`BreachStatus::Compromised`] affects the score.
#[must_use]
pub fn evaluate_with_breach(candidate: &str, breach: BreachStatus) -> StrengthReport {
    let mut issues = Vec::new();

    if candidate.chars().count() < MIN_LENGTH {
        issues.push(StrengthIssue::TooShort);
    }
    if !candidate.chars().any(|c| c.is_ascii_uppercase()) {
        issues.push(StrengthIssue::MissingUppercase);
    }
    if !candidate.chars().any(|c| c.is_ascii_lowercase()) {
        issues.push(StrengthIssue::MissingLowercase);
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        issues.push(StrengthIssue::MissingDigit);
    }
    if !candidate.chars().any(|c| !c.is_ascii_alphanumeric()) {
        issues.push(StrengthIssue::MissingSymbol);
    }
    if matches_common_pattern(candidate) {
        issues.push(StrengthIssue::CommonPattern);
    }
    if breach.is_compromised() {
        issues.push(StrengthIssue::Compromised);
    }

    let score = score_for(&issues);
    StrengthReport {
        score,
        class: StrengthClass::from_score(score),
        issues,
        breach,
    }
}

/// `100` minus the penalties of `issues`, never below zero.
#[must_use]
pub fn score_for(issues: &[StrengthIssue]) -> u32 {
    issues
        .iter()
        .map(|issue| issue.penalty())
        .fold(100, u32::saturating_sub)
}

fn matches_common_pattern(candidate: &str) -> bool {
    let lowered = candidate.to_lowercase();
    lowered.starts_with(COMMON_PREFIX) || COMMON_WORDS.iter().any(|w| lowered.contains(w))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
