use std::io::Write;

use clap::Args;
use coffre_vault::{analyze_vault_health, unix_millis, HealthReport, RecordRef, RecordStore};

use crate::context::Context;

/// Options for `coffre health`.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Skip breach lookups.
    #[arg(long)]
    pub offline: bool,
}

pub async fn run(ctx: &Context, args: &HealthArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let keys = ctx.keys()?;
    let records = ctx.store().list(ctx.owner_id()?)?;
    let analyzer = ctx.analyzer(args.offline)?;

    let report = analyze_vault_health(
        &records,
        &keys,
        &analyzer,
        ctx.config.stale_after_days,
        unix_millis(),
    )
    .await;

    if ctx.json {
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
        return Ok(());
    }
    write_summary(&report, out)
}

fn write_summary(report: &HealthReport, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "score: {}/100 ({} records)", report.score, report.total)?;
    write_refs(out, "weak", &report.weak)?;
    write_refs(out, "compromised", &report.compromised)?;

    writeln!(out, "stale: {}", report.stale.len())?;
    for record in &report.stale {
        writeln!(out, "  - {} ({}, {} days)", record.title, record.id, record.age_days)?;
    }

    writeln!(out, "reused: {}", report.reused_groups.len())?;
    for group in &report.reused_groups {
        let titles: Vec<&str> = group.records.iter().map(|r| r.title.as_str()).collect();
        writeln!(out, "  - {}", titles.join(", "))?;
    }

    write_refs(out, "locked", &report.locked)
}

fn write_refs(out: &mut dyn Write, label: &str, refs: &[RecordRef]) -> anyhow::Result<()> {
    writeln!(out, "{label}: {}", refs.len())?;
    for r in refs {
        writeln!(out, "  - {} ({})", r.title, r.id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::records::{add_secret, AddArgs};
    use crate::commands::test_support::{context, output};
    use secrecy::SecretString;

    async fn add(ctx: &crate::context::Context, title: &str, secret: &str) {
        let args = AddArgs {
            title: title.into(),
            username: String::new(),
            website: None,
            generate: false,
            offline: true,
        };
        add_secret(ctx, &args, SecretString::from(secret), &mut Vec::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn summary_counts_weak_and_reused() {
        let (_dir, ctx) = context();
        add(&ctx, "Mail", "Xk9#mPv2$Lq7!Rt4").await;
        add(&ctx, "Forum", "Xk9#mPv2$Lq7!Rt4").await;
        add(&ctx, "Router", "admin").await;
        add(&ctx, "Bank", "Ab3$efghijkl").await;

        let mut buf = Vec::new();
        run(&ctx, &HealthArgs { offline: true }, &mut buf).await.unwrap();
        let text = output(buf);

        assert!(text.starts_with("score: 75/100 (4 records)"));
        assert!(text.contains("weak: 1\n  - Router"));
        assert!(text.contains("reused: 1\n"));
        assert!(text.contains("stale: 0"));
        assert!(text.contains("locked: 0"));
        assert!(!text.contains("Xk9#"));
    }

    #[tokio::test]
    async fn empty_vault_scores_full_marks_as_json() {
        let (_dir, mut ctx) = context();
        ctx.json = true;
        let mut buf = Vec::new();
        run(&ctx, &HealthArgs { offline: true }, &mut buf).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(output(buf).trim()).unwrap();
        assert_eq!(value["score"], 100);
        assert_eq!(value["total"], 0);
        assert!(value["reusedGroups"].as_array().unwrap().is_empty());
    }
}
