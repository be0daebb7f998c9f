//! The `adaptest report` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use adaptest_core::report::DiagnosticReport;
use adaptest_report::{generate_markdown, write_markdown_report};

pub fn execute(input: PathBuf, format: String, output: Option<PathBuf>) -> Result<()> {
    let report = DiagnosticReport::load_json(&input)?;

    match (format.as_str(), output) {
        ("markdown" | "md", Some(path)) => {
            write_markdown_report(&report, &path)?;
            eprintln!("Markdown report: {}", path.display());
        }
        ("markdown" | "md", None) => {
            print!("{}", generate_markdown(&report));
        }
        ("json", Some(path)) => {
            report.save_json(&path)?;
            eprintln!("JSON report: {}", path.display());
        }
        ("json", None) => {
            let json =
                serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            println!("{json}");
        }
        (other, _) => anyhow::bail!("unknown format: {other} (expected markdown or json)"),
    }

    Ok(())
}
