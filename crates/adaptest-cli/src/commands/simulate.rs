//! The `adaptest simulate` command.
//!
//! Drives simulated examinees with known true ability through adaptive
//! sessions and reports how well the engine recovers them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use adaptest_core::config::load_config_from;
use adaptest_core::model::{Item, SessionType, StopReason};
use adaptest_core::parser::load_banks;
use adaptest_core::report::DiagnosticReport;
use adaptest_core::{DiagnosticEngine, NextStep};
use adaptest_report::write_markdown_report;
use adaptest_store::MemoryStore;

/// Simulated response latency bounds, in milliseconds.
const RESPONSE_TIME_MS: std::ops::RangeInclusive<u64> = 2_000..=45_000;

pub struct SimulateArgs {
    pub bank: PathBuf,
    pub thetas: String,
    pub replications: usize,
    pub seed: u64,
    pub parallelism: usize,
    pub session_type: String,
    pub output: Option<PathBuf>,
    pub format: String,
    pub config: Option<PathBuf>,
}

/// One simulated examinee.
#[derive(Debug, Clone)]
pub struct Examinee {
    pub user_id: String,
    pub true_theta: f64,
    pub seed: u64,
}

/// What the engine concluded about one examinee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub user_id: String,
    pub true_theta: f64,
    pub estimated_theta: f64,
    pub se: f64,
    pub questions_answered: u32,
    pub stop_reason: Option<StopReason>,
    pub readiness: String,
    pub final_score: f64,
}

/// Recovery statistics for one true ability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub true_theta: f64,
    pub examinees: usize,
    pub mean_estimate: f64,
    pub bias: f64,
    pub rmse: f64,
    pub mean_se: f64,
    pub mean_length: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SimulationSummary {
    bank: String,
    session_type: String,
    seed: u64,
    recovery: Vec<RecoveryStats>,
    outcomes: Vec<SimulationOutcome>,
}

fn parse_thetas(raw: &str) -> Result<Vec<f64>> {
    let thetas = raw
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("invalid theta value: '{}'", s.trim()))
        })
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(
        thetas.iter().all(|t| t.is_finite()),
        "theta values must be finite"
    );
    Ok(thetas)
}

/// Examinees for every (θ, replication) pair, each with its own seed.
pub fn build_examinees(thetas: &[f64], replications: usize, seed: u64) -> Vec<Examinee> {
    thetas
        .iter()
        .enumerate()
        .flat_map(|(t, &theta)| {
            (0..replications).map(move |r| (t, theta, r))
        })
        .enumerate()
        .map(|(i, (t, theta, r))| Examinee {
            user_id: format!("sim-{t}-{r}"),
            true_theta: theta,
            seed: seed.wrapping_add(i as u64),
        })
        .collect()
}

/// Any unkeyed option; the engine only cares that it is not the key.
fn distractor(item: &Item, rng: &mut impl Rng) -> usize {
    if item.option_count < 2 {
        return item.correct_option + 1;
    }
    let offset = rng.random_range(1..item.option_count);
    (item.correct_option + offset) % item.option_count
}

/// Run one examinee through a full session and return the final report.
pub fn run_examinee(
    engine: &DiagnosticEngine,
    examinee: &Examinee,
    session_type: SessionType,
) -> Result<DiagnosticReport> {
    let mut rng = Pcg64::seed_from_u64(examinee.seed);
    let started = engine.start_session(&examinee.user_id, session_type, None)?;

    let mut next = started.first_item;
    while let Some(item) = next {
        let p = item.probability_correct(examinee.true_theta);
        let answer = if rng.random::<f64>() < p {
            item.correct_option
        } else {
            distractor(&item, &mut rng)
        };
        let response_time_ms = rng.random_range(RESPONSE_TIME_MS);

        let outcome =
            engine.submit_answer(started.session_id, &item.id, answer, response_time_ms)?;
        next = match outcome.next {
            NextStep::Item { item } => Some(item),
            NextStep::Complete { .. } => None,
        };
    }

    Ok(engine.complete_session(started.session_id)?)
}

impl From<(&Examinee, &DiagnosticReport)> for SimulationOutcome {
    fn from((examinee, report): (&Examinee, &DiagnosticReport)) -> Self {
        Self {
            user_id: examinee.user_id.clone(),
            true_theta: examinee.true_theta,
            estimated_theta: report.ability.theta,
            se: report.ability.se,
            questions_answered: report.questions_answered,
            stop_reason: report.stop_reason,
            readiness: report.readiness.level.to_string(),
            final_score: report.final_score,
        }
    }
}

/// Bias, RMSE, and mean length per true θ, in ascending θ order.
pub fn summarize(outcomes: &[SimulationOutcome]) -> Vec<RecoveryStats> {
    let mut groups: BTreeMap<i64, Vec<&SimulationOutcome>> = BTreeMap::new();
    for o in outcomes {
        // Group on a fixed-point key so equal thetas land together.
        let key = (o.true_theta * 1_000.0).round() as i64;
        groups.entry(key).or_default().push(o);
    }

    groups
        .into_values()
        .map(|group| {
            let n = group.len() as f64;
            let true_theta = group[0].true_theta;
            let mean_estimate = group.iter().map(|o| o.estimated_theta).sum::<f64>() / n;
            let mse = group
                .iter()
                .map(|o| (o.estimated_theta - o.true_theta).powi(2))
                .sum::<f64>()
                / n;
            RecoveryStats {
                true_theta,
                examinees: group.len(),
                mean_estimate,
                bias: mean_estimate - true_theta,
                rmse: mse.sqrt(),
                mean_se: group.iter().map(|o| o.se).sum::<f64>() / n,
                mean_length: group
                    .iter()
                    .map(|o| o.questions_answered as f64)
                    .sum::<f64>()
                    / n,
            }
        })
        .collect()
}

pub async fn execute(args: SimulateArgs) -> Result<()> {
    anyhow::ensure!(args.parallelism >= 1, "parallelism must be at least 1");
    anyhow::ensure!(args.replications >= 1, "replications must be at least 1");
    anyhow::ensure!(
        matches!(args.format.as_str(), "json" | "markdown" | "md"),
        "unknown format: {} (expected json or markdown)",
        args.format
    );

    let config = load_config_from(args.config.as_deref())?;
    let session_type: SessionType = args
        .session_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let thetas = parse_thetas(&args.thetas)?;

    let banks = load_banks(&args.bank)?;
    let bank = banks
        .into_iter()
        .next()
        .with_context(|| format!("no item banks found under {}", args.bank.display()))?;

    // Each examinee gets its own store so exposure counts, and with them the
    // selector's tie-breaks, never depend on scheduling order.
    let bank = Arc::new(bank);
    let examinees = build_examinees(&thetas, args.replications, args.seed);

    eprintln!(
        "adaptest v{} — Simulating {} examinees on '{}' ({} items, {} session)",
        env!("CARGO_PKG_VERSION"),
        examinees.len(),
        bank.name,
        bank.items.len(),
        session_type
    );
    eprintln!();

    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(args.parallelism));
    let mut futures = FuturesUnordered::new();

    for examinee in examinees {
        let bank = Arc::clone(&bank);
        let config = config.clone();
        let semaphore = Arc::clone(&semaphore);
        let session_type = session_type.clone();

        futures.push(async move {
            let ctx = examinee.clone();
            let inner = async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                let report = tokio::task::spawn_blocking(move || {
                    let engine = MemoryStore::from_bank(&bank).engine(config);
                    run_examinee(&engine, &examinee, session_type)
                })
                .await
                .context("simulation task panicked")??;
                Ok::<_, anyhow::Error>(report)
            };
            (ctx, inner.await)
        });
    }

    let mut reports = Vec::new();
    let mut failed = 0usize;
    while let Some((examinee, result)) = futures.next().await {
        match result {
            Ok(report) => {
                tracing::debug!(
                    user = %examinee.user_id,
                    true_theta = examinee.true_theta,
                    theta = report.ability.theta,
                    answered = report.questions_answered,
                    "examinee finished"
                );
                reports.push((examinee, report));
            }
            Err(e) => {
                tracing::error!("simulation failed for {}: {e:#}", examinee.user_id);
                failed += 1;
            }
        }
    }
    reports.sort_by(|(a, _), (b, _)| a.seed.cmp(&b.seed));

    let outcomes: Vec<SimulationOutcome> = reports
        .iter()
        .map(|(examinee, report)| SimulationOutcome::from((examinee, report)))
        .collect();
    let recovery = summarize(&outcomes);

    eprintln!(
        "Complete: {}/{} sessions, {} failed ({:.1}s)",
        outcomes.len(),
        outcomes.len() + failed,
        failed,
        start.elapsed().as_secs_f64()
    );
    print_summary(&recovery);

    if let Some(output) = &args.output {
        std::fs::create_dir_all(output)
            .with_context(|| format!("failed to create {}", output.display()))?;

        let reports_dir = output.join("reports");
        for (examinee, report) in &reports {
            match args.format.as_str() {
                "json" => {
                    report.save_json(&reports_dir.join(format!("{}.json", examinee.user_id)))?
                }
                _ => write_markdown_report(
                    report,
                    &reports_dir.join(format!("{}.md", examinee.user_id)),
                )?,
            }
        }

        let summary = SimulationSummary {
            bank: bank.id.clone(),
            session_type: session_type.to_string(),
            seed: args.seed,
            recovery,
            outcomes,
        };
        let path = output.join("summary.json");
        let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Results saved to: {}", output.display());
    }

    anyhow::ensure!(failed == 0, "{failed} simulated session(s) failed");
    Ok(())
}

fn print_summary(recovery: &[RecoveryStats]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "True θ",
        "N",
        "Mean θ̂",
        "Bias",
        "RMSE",
        "Mean SE",
        "Mean length",
    ]);

    for r in recovery {
        table.add_row(vec![
            Cell::new(format!("{:+.2}", r.true_theta)),
            Cell::new(r.examinees),
            Cell::new(format!("{:+.3}", r.mean_estimate)),
            Cell::new(format!("{:+.3}", r.bias)),
            Cell::new(format!("{:.3}", r.rmse)),
            Cell::new(format!("{:.3}", r.mean_se)),
            Cell::new(format!("{:.1}", r.mean_length)),
        ]);
    }

    println!("{table}");
}
