use std::io::Write;

use clap::Args;
use coffre_vault::{BreachStatus, StrengthReport};
use secrecy::{ExposeSecret, SecretString};

use crate::context::Context;

/// Options for `coffre analyze`.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Skip the breach lookup.
    #[arg(long)]
    pub offline: bool,
}

pub async fn run(
    ctx: &Context,
    args: &AnalyzeArgs,
    secret: &SecretString,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let analyzer = ctx.analyzer(args.offline)?;
    let report = analyzer.analyze(secret.expose_secret()).await;
    write_report(ctx.json, &report, out)
}

/// Render a strength report as JSON or as three human-readable lines.
pub fn write_report(
    json: bool,
    report: &StrengthReport,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(report)?)?;
        return Ok(());
    }

    writeln!(out, "strength: {} ({}/100)", report.class.as_str(), report.score)?;
    writeln!(out, "breach:   {}", breach_label(report.breach))?;
    if !report.issues.is_empty() {
        let issues: Vec<&str> = report.issues.iter().map(|i| i.as_str()).collect();
        writeln!(out, "issues:   {}", issues.join(", "))?;
    }
    Ok(())
}

pub fn breach_label(status: BreachStatus) -> String {
    match status {
        BreachStatus::NotChecked => "not checked".into(),
        BreachStatus::Clear => "clear".into(),
        BreachStatus::Compromised { occurrences } => {
            format!("compromised ({occurrences} occurrences)")
        }
        BreachStatus::Undetermined => "undetermined (lookup failed)".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, output};

    #[tokio::test]
    async fn offline_report_lists_issues() {
        let (_dir, ctx) = context();
        let mut buf = Vec::new();
        let secret = SecretString::from("admin");
        run(&ctx, &AnalyzeArgs { offline: true }, &secret, &mut buf)
            .await
            .unwrap();

        let text = output(buf);
        assert!(text.contains("strength: weak"));
        assert!(text.contains("breach:   not checked"));
        assert!(text.contains("common-pattern"));
        assert!(!text.contains("admin"));
    }

    #[tokio::test]
    async fn json_report_is_parseable() {
        let (_dir, mut ctx) = context();
        ctx.json = true;
        let mut buf = Vec::new();
        let secret = SecretString::from("Tr0ub4dor&3xyz!");
        run(&ctx, &AnalyzeArgs { offline: true }, &secret, &mut buf)
            .await
            .unwrap();

        let report: StrengthReport = serde_json::from_str(output(buf).trim()).unwrap();
        assert_eq!(report.score, 100);
        assert_eq!(report.breach, BreachStatus::NotChecked);
    }

    #[test]
    fn breach_labels() {
        assert_eq!(
            breach_label(BreachStatus::Compromised { occurrences: 7 }),
            "compromised (7 occurrences)"
        );
        assert_eq!(breach_label(BreachStatus::Clear), "clear");
    }
}
