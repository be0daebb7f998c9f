//! Markdown report generator.
//!
//! Produces a single self-contained document suitable for pasting into a
//! learner's feedback thread or a pull request comment.

use std::path::Path;

use anyhow::{Context, Result};

use adaptest_core::coverage::{DomainResult, DomainTag};
use adaptest_core::report::DiagnosticReport;

/// Escape characters that would break a markdown table cell.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn tag_badge(tag: DomainTag) -> &'static str {
    match tag {
        DomainTag::StudyRequired => "🔴 study required",
        DomainTag::PracticeRecommended => "🟡 practice",
        DomainTag::Maintain => "🟢 maintain",
    }
}

fn format_duration_ms(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m {:02}s", ms / 60_000, (ms % 60_000) / 1000)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

/// Generate a markdown document from a diagnostic report.
pub fn generate_markdown(report: &DiagnosticReport) -> String {
    let mut md = String::new();

    md.push_str("# Diagnostic report\n\n");
    md.push_str(&format!(
        "Learner: **{}** | Session: `{}` | Type: {} | {}\n\n",
        cell(&report.user_id),
        report.session_id,
        report.session_type,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    // Summary
    md.push_str("## Summary\n\n");
    md.push_str("| Score | θ | SE | Correct | Accuracy | Avg response | Stopped by |\n");
    md.push_str("|-------|---|----|---------|----------|--------------|------------|\n");
    md.push_str(&format!(
        "| {:.1} | {:+.2} | {:.2} | {}/{} | {:.1}% | {} | {} |\n\n",
        report.final_score,
        report.ability.theta,
        report.ability.se,
        report.correct,
        report.questions_answered,
        report.accuracy * 100.0,
        format_duration_ms(report.avg_response_time_ms),
        report
            .stop_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string()),
    ));

    // Readiness
    md.push_str("## Readiness\n\n");
    md.push_str(&format!(
        "**{}** (score {:.1}): {}\n\n",
        report.readiness.level.to_string().to_uppercase(),
        report.readiness.score,
        report.readiness.message
    ));
    if !report.readiness.critical_gaps.is_empty() {
        md.push_str(&format!(
            "> Critical domains below their minimum coverage: {}\n\n",
            report.readiness.critical_gaps.join(", ")
        ));
    }

    // Domains
    if !report.domain_results.is_empty() {
        md.push_str("## Domains\n\n");
        md.push_str(&domain_table(&report.domain_results));
        md.push('\n');
    }

    // Recommendations
    md.push_str("## Recommendations\n\n");
    if report.recommendations.is_empty() {
        md.push_str("No domains need extra work. Keep practising at the current pace.\n");
    } else {
        for rec in &report.recommendations {
            md.push_str(&format!(
                "- **[{}]** {}: {}\n",
                rec.priority,
                cell(&rec.domain),
                rec.message
            ));
        }
    }

    md
}

fn domain_table(results: &[DomainResult]) -> String {
    let mut table = String::new();
    table.push_str("| Domain | Weight | Answered | Accuracy | Sub-θ | Status |\n");
    table.push_str("|--------|--------|----------|----------|-------|--------|\n");
    for d in results {
        let name = if d.is_critical {
            format!("{} ⚑", cell(&d.name))
        } else {
            cell(&d.name)
        };
        let accuracy = if d.answered == 0 {
            "-".to_string()
        } else {
            format!("{:.1}%", d.accuracy * 100.0)
        };
        table.push_str(&format!(
            "| {} | {:.0}% | {} | {} | {:+.2} | {} |\n",
            name,
            d.weight,
            d.answered,
            accuracy,
            d.sub_ability,
            tag_badge(d.tag)
        ));
    }
    table
}

/// Write a markdown report to a file.
pub fn write_markdown_report(report: &DiagnosticReport, path: &Path) -> Result<()> {
    let md = generate_markdown(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, md)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(())
}
