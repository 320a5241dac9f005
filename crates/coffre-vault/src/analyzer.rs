//! Strength analyzer: local scoring plus the optional breach lookup.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::breach::{BreachChecker, PwnedRangeClient, RangeSource};
use crate::config::BreachConfig;
use crate::error::VaultError;
use crate::strength::{evaluate, evaluate_with_breach, BreachStatus, StrengthReport};

/// Scores candidates; folds in a breach lookup when one is configured.
#[derive(Debug, Clone, Default)]
pub struct StrengthAnalyzer {
    checker: Option<BreachChecker>,
}

impl StrengthAnalyzer {
    /// Build from configuration. A disabled lookup yields an offline analyzer.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: &BreachConfig) -> Result<Self, VaultError> {
        if !config.enabled {
            return Ok(Self::offline());
        }
        let client = PwnedRangeClient::new(config)?;
        Ok(Self::with_source(Arc::new(client), config.timeout()))
    }

    /// Analyzer backed by an arbitrary [`RangeSource`].
    #[must_use]
    pub fn with_source(source: Arc<dyn RangeSource>, timeout: Duration) -> Self {
        Self {
            checker: Some(BreachChecker::new(source, timeout)),
        }
    }

    /// Analyzer that never performs a lookup.
    #[must_use]
    pub const fn offline() -> Self {
        Self { checker: None }
    }

    #[must_use]
    pub const fn checks_breaches(&self) -> bool {
        self.checker.is_some()
    }

    /// Local score only; the report carries [`BreachStatus::NotChecked`].
    #[must_use]
    pub fn evaluate(&self, candidate: &str) -> StrengthReport {
        evaluate(candidate)
    }

    /// Local score plus breach lookup.
    ///
    /// Always returns a report. An empty candidate is not looked up.
    pub async fn analyze(&self, candidate: &str) -> StrengthReport {
        self.analyze_with_cancel(candidate, &CancellationToken::new())
            .await
    }

    /// As [`Self::analyze`], abandoning the lookup when `cancel` fires.
    pub async fn analyze_with_cancel(
        &self,
        candidate: &str,
        cancel: &CancellationToken,
    ) -> StrengthReport {
        let breach = match &self.checker {
            Some(checker) if !candidate.is_empty() => checker.check(candidate, cancel).await,
            _ => BreachStatus::NotChecked,
        };
        evaluate_with_breach(candidate, breach)
    }
}
