//! adaptest CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Adaptive diagnostic testing engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run simulated examinees through adaptive sessions
    Simulate {
        /// Path to .toml item bank or directory
        #[arg(long)]
        bank: PathBuf,

        /// True abilities to simulate (comma-separated)
        #[arg(long, default_value = "-1.5,0,1.5")]
        thetas: String,

        /// Examinees per true ability
        #[arg(long, default_value = "10")]
        replications: usize,

        /// Base RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Max concurrent sessions
        #[arg(long, default_value = "4")]
        parallelism: usize,

        /// Session type: full, express, domain:CODE[,CODE...]
        #[arg(long, default_value = "full")]
        session_type: String,

        /// Output directory for per-examinee reports and the summary
        #[arg(long)]
        output: Option<PathBuf>,

        /// Per-examinee report format: json, markdown
        #[arg(long, default_value = "json")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Render a saved diagnostic report
    Report {
        /// Report JSON
        #[arg(long)]
        input: PathBuf,

        /// Output format: markdown, json
        #[arg(long, default_value = "markdown")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compare two attempts by the same learner
    Compare {
        /// Earlier report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Later report JSON
        #[arg(long)]
        current: PathBuf,

        /// Accuracy change that counts as a gain or decline
        #[arg(long, default_value = "0.1")]
        threshold: f64,

        /// Exit code 1 if any domain declined
        #[arg(long)]
        fail_on_decline: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate item bank TOML files
    Validate {
        /// Path to item bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Create starter config and example item bank
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("adaptest=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            bank,
            thetas,
            replications,
            seed,
            parallelism,
            session_type,
            output,
            format,
            config,
        } => {
            commands::simulate::execute(commands::simulate::SimulateArgs {
                bank,
                thetas,
                replications,
                seed,
                parallelism,
                session_type,
                output,
                format,
                config,
            })
            .await
        }
        Commands::Report {
            input,
            format,
            output,
        } => commands::report::execute(input, format, output),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_decline,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_decline, format),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
