//! The `adaptest compare` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::report::DiagnosticReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_decline: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&threshold),
        "threshold must be between 0.0 and 1.0"
    );

    let baseline = DiagnosticReport::load_json(&baseline_path)?;
    let current = DiagnosticReport::load_json(&current_path)?;
    if baseline.user_id != current.user_id {
        tracing::warn!(
            baseline = %baseline.user_id,
            current = %current.user_id,
            "comparing reports from different learners"
        );
    }

    let progress = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", progress.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&progress)?);
        }
        _ => {
            println!(
                "Progress: θ {:+.2}, score {:+.1}, readiness {} -> {}",
                progress.theta_delta,
                progress.score_delta,
                progress.baseline_level,
                progress.current_level
            );
            println!(
                "{} gains, {} declines, {} unchanged",
                progress.gains.len(),
                progress.declines.len(),
                progress.unchanged
            );

            if !progress.declines.is_empty() {
                println!("\nDeclines:");
                for d in &progress.declines {
                    println!(
                        "  {} {:.1}% -> {:.1}% ({:+.1}%)",
                        d.domain,
                        d.baseline_accuracy * 100.0,
                        d.current_accuracy * 100.0,
                        d.delta * 100.0
                    );
                }
            }

            if !progress.gains.is_empty() {
                println!("\nGains:");
                for g in &progress.gains {
                    println!(
                        "  {} {:.1}% -> {:.1}% (+{:.1}%)",
                        g.domain,
                        g.baseline_accuracy * 100.0,
                        g.current_accuracy * 100.0,
                        g.delta * 100.0
                    );
                }
            }

            if progress.new_domains > 0 {
                println!("\n{} new domain(s)", progress.new_domains);
            }
            if progress.dropped_domains > 0 {
                println!("{} dropped domain(s)", progress.dropped_domains);
            }
        }
    }

    if fail_on_decline && progress.has_declines() {
        std::process::exit(1);
    }

    Ok(())
}
