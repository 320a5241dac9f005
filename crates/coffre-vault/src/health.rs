//! Vault health report.
//!
//! Opens every record, scores its secret and aggregates the results. The
//! report carries record ids and titles only, never secrets.

use std::collections::HashMap;

use serde::Serialize;

use crate::analyzer::StrengthAnalyzer;
use crate::identity::KeyRing;
use crate::records::{open_record, StoredRecord};
use crate::strength::StrengthClass;

const MILLIS_PER_DAY: u64 = 86_400_000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A record reference (id + title).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub id: String,
    pub title: String,
}

/// A record older than the staleness threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleRecord {
    pub id: String,
    pub title: String,
    pub age_days: u64,
}

/// Records sharing the same secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReusedGroup {
    pub records: Vec<RecordRef>,
}

/// Aggregate health of one owner's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Records examined, including locked ones.
    pub total: usize,
    /// Secrets classified `weak`.
    pub weak: Vec<RecordRef>,
    /// Secrets found in the breach corpus.
    pub compromised: Vec<RecordRef>,
    /// Records older than the staleness threshold.
    pub stale: Vec<StaleRecord>,
    /// Groups of two or more records with identical secrets.
    pub reused_groups: Vec<ReusedGroup>,
    /// Records whose secret could not be opened.
    pub locked: Vec<RecordRef>,
    /// Share of opened records that are not weak, 0–100.
    pub score: u32,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Build a [`HealthReport`] for `records`.
///
/// `now_ms` is the reference time for staleness; a record is stale when it
/// is older than `stale_after_days` days, compared in milliseconds. The score is
/// `round((opened - weak) / opened * 100)`, or 100 when nothing could be opened.
#[allow(clippy::arithmetic_side_effects)]
pub async fn analyze_vault_health(
    records: &[StoredRecord],
    keys: &KeyRing,
    analyzer: &StrengthAnalyzer,
    stale_after_days: u32,
    now_ms: u64,
) -> HealthReport {
    let mut weak = Vec::new();
    let mut compromised = Vec::new();
    let mut stale = Vec::new();
    let mut locked = Vec::new();
    let mut digests: Vec<([u8; 32], RecordRef)> = Vec::new();
    let stale_cutoff_ms = u64::from(stale_after_days).saturating_mul(MILLIS_PER_DAY);

    for stored in records {
        let reference = RecordRef {
            id: stored.id.clone(),
            title: stored.title.clone(),
        };

        let age_ms = now_ms.saturating_sub(stored.created_at);
        if age_ms > stale_cutoff_ms {
            stale.push(StaleRecord {
                id: stored.id.clone(),
                title: stored.title.clone(),
                age_days: age_ms / MILLIS_PER_DAY,
            });
        }

        let opened = open_record(stored, keys);
        let Some(secret) = opened.secret.expose() else {
            locked.push(reference);
            continue;
        };

        let report = analyzer.analyze(secret).await;
        if report.class == StrengthClass::Weak {
            weak.push(reference.clone());
        }
        if report.is_compromised() {
            compromised.push(reference.clone());
        }
        digests.push((blake3::hash(secret.as_bytes()).into(), reference));
    }

    let opened = records.len() - locked.len();
    let score = if opened == 0 {
        100
    } else {
        let healthy = opened - weak.len();
        u32::try_from((healthy * 100 + opened / 2) / opened).unwrap_or(100)
    };

    tracing::debug!(
        total = records.len(),
        weak = weak.len(),
        compromised = compromised.len(),
        locked = locked.len(),
        score,
        "vault health analyzed"
    );

    HealthReport {
        total: records.len(),
        weak,
        compromised,
        stale,
        reused_groups: find_reused_groups(digests),
        locked,
        score,
    }
}

/// Group records by secret digest, keeping groups of two or more.
///
/// Groups are ordered by their first member's position in the input.
fn find_reused_groups(digests: Vec<([u8; 32], RecordRef)>) -> Vec<ReusedGroup> {
    let mut order: Vec<[u8; 32]> = Vec::new();
    let mut groups: HashMap<[u8; 32], Vec<RecordRef>> = HashMap::new();

    for (digest, reference) in digests {
        let members = groups.entry(digest).or_default();
        if members.is_empty() {
            order.push(digest);
        }
        members.push(reference);
    }

    order
        .into_iter()
        .filter_map(|digest| groups.remove(&digest))
        .filter(|records| records.len() >= 2)
        .map(|records| ReusedGroup { records })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{seal_record, RecordDraft};
    use coffre_crypto_core::KeyMaterial;

    const DAY: u64 = MILLIS_PER_DAY;

    fn keys() -> KeyRing {
        KeyRing::new(KeyMaterial::new("42-alice@example.com").unwrap())
    }

    fn sealed(keys: &KeyRing, title: &str, secret: &str, created_at: u64) -> StoredRecord {
        let mut record = seal_record("42", &RecordDraft::new(title, "alice", secret), keys).unwrap();
        record.created_at = created_at;
        record
    }

    #[tokio::test]
    async fn empty_vault_scores_100() {
        let report =
            analyze_vault_health(&[], &keys(), &StrengthAnalyzer::offline(), 90, 0).await;
        assert_eq!(report.total, 0);
        assert_eq!(report.score, 100);
    }

    #[tokio::test]
    async fn counts_weak_stale_and_reused() {
        let keys = keys();
        let now = 1_000 * DAY;
        let records = vec![
            sealed(&keys, "strong", "Xk9#mPv2$Lq7!Rt4", now),
            sealed(&keys, "weak", "abc", now - 10 * DAY),
            sealed(&keys, "old", "Yz8@nQw3%Ma6^Su5", now - 91 * DAY),
            sealed(&keys, "copy", "Xk9#mPv2$Lq7!Rt4", now - 90 * DAY),
        ];

        let report =
            analyze_vault_health(&records, &keys, &StrengthAnalyzer::offline(), 90, now).await;

        assert_eq!(report.total, 4);
        assert_eq!(report.weak.len(), 1);
        assert_eq!(report.weak[0].title, "weak");
        assert!(report.compromised.is_empty());

        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].title, "old");
        assert_eq!(report.stale[0].age_days, 91);

        assert_eq!(report.reused_groups.len(), 1);
        let titles: Vec<&str> = report.reused_groups[0]
            .records
            .iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(titles, vec!["strong", "copy"]);

        // 3 of 4 opened records are not weak.
        assert_eq!(report.score, 75);
    }

    #[tokio::test]
    async fn staleness_is_compared_to_the_millisecond() {
        let keys = keys();
        let now = 1_000 * DAY;
        let records = vec![
            sealed(&keys, "exact", "Xk9#mPv2$Lq7!Rt4", now - 90 * DAY),
            sealed(&keys, "one-ms-over", "Xk9#mPv2$Lq7!Rt4", now - 90 * DAY - 1),
            sealed(&keys, "half-day-over", "Xk9#mPv2$Lq7!Rt4", now - 90 * DAY - DAY / 2),
        ];

        let report =
            analyze_vault_health(&records, &keys, &StrengthAnalyzer::offline(), 90, now).await;

        let titles: Vec<&str> = report.stale.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["one-ms-over", "half-day-over"]);
        assert!(report.stale.iter().all(|r| r.age_days == 90));
    }

    #[tokio::test]
    async fn locked_records_are_reported_not_scored() {
        let keys = keys();
        let other = KeyRing::new(KeyMaterial::new("99-mallory@example.com").unwrap());
        let records = vec![
            sealed(&keys, "mine", "Xk9#mPv2$Lq7!Rt4", 0),
            sealed(&other, "foreign", "abc", 0),
        ];

        let report =
            analyze_vault_health(&records, &keys, &StrengthAnalyzer::offline(), 90, 0).await;

        assert_eq!(report.total, 2);
        assert_eq!(report.locked.len(), 1);
        assert_eq!(report.locked[0].title, "foreign");
        assert!(report.weak.is_empty());
        assert_eq!(report.score, 100);
    }

    #[tokio::test]
    async fn score_rounds_to_nearest() {
        let keys = keys();
        let records = vec![
            sealed(&keys, "a", "Xk9#mPv2$Lq7!Rt4", 0),
            sealed(&keys, "b", "Yz8@nQw3%Ma6^Su5", 0),
            sealed(&keys, "c", "abc", 0),
        ];
        let report =
            analyze_vault_health(&records, &keys, &StrengthAnalyzer::offline(), 90, 0).await;
        // 2 / 3 = 66.67
        assert_eq!(report.score, 67);
    }

    #[test]
    fn report_does_not_serialize_secrets() {
        let report = HealthReport {
            total: 1,
            weak: vec![RecordRef {
                id: "1".into(),
                title: "t".into(),
            }],
            compromised: Vec::new(),
            stale: Vec::new(),
            reused_groups: Vec::new(),
            locked: Vec::new(),
            score: 0,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["reusedGroups"], serde_json::json!([]));
        assert_eq!(json["weak"][0]["title"], "t");
    }
}
