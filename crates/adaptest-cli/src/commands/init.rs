//! The `adaptest init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    // Create adaptest.toml
    if Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG).context("failed to write adaptest.toml")?;
        println!("Created adaptest.toml");
    }

    // Create example item bank
    std::fs::create_dir_all("banks").context("failed to create banks/")?;
    let example_path = Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)
            .context("failed to write banks/example.toml")?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Tune session presets and thresholds in adaptest.toml");
    println!("  2. Run: adaptest validate --bank banks/example.toml");
    println!("  3. Run: adaptest simulate --bank banks/example.toml --thetas=-1,0,1");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

[estimator]
theta_min = -3.0
theta_max = 3.0
max_step = 1.0
se_floor = 0.05
prior_se = 1.0

[selector]
tie_epsilon = 1e-9
enforce_critical_coverage = true

[sessions.full]
min_questions = 20
max_questions = 50
target_se = 0.30

[sessions.express]
min_questions = 10
max_questions = 25
target_se = 0.45

[sessions.domain_scoped]
min_questions = 5
max_questions = 15
target_se = 0.50

[readiness]
ability_weight = 0.6
high = { min_theta = 1.5, min_accuracy = 0.8 }
medium = { min_theta = 0.5, min_accuracy = 0.6 }

[coverage]
study_below = 0.5
maintain_at = 0.75
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example Nursing Diagnostic"
description = "A small calibrated bank to get started"
default_guessing = 0.2
default_option_count = 4

[[domains]]
code = "PHARM"
name = "Pharmacology"
weight = 40
critical = true
min_coverage = 3

[[domains]]
code = "SAFE"
name = "Safety & Infection Control"
weight = 35
critical = true
min_coverage = 3

[[domains]]
code = "CARE"
name = "Basic Care & Comfort"
weight = 25
critical = false
min_coverage = 0

[[items]]
id = "pharm-001"
domain = "PHARM"
a = 1.4
b = -1.2
c = 0.2
correct = 0

[[items]]
id = "pharm-002"
domain = "PHARM"
a = 1.1
b = -0.4
c = 0.18
correct = 1

[[items]]
id = "pharm-003"
domain = "PHARM"
a = 1.7
b = 0.1
c = 0.22
correct = 2

[[items]]
id = "pharm-004"
domain = "PHARM"
a = 0.9
b = 0.6
c = 0.2
correct = 3

[[items]]
id = "pharm-005"
domain = "PHARM"
a = 1.3
b = 1.1
c = 0.15
correct = 0

[[items]]
id = "pharm-006"
domain = "PHARM"
a = 1.6
b = 1.8
c = 0.2
correct = 1

[[items]]
id = "safe-001"
domain = "SAFE"
a = 1.2
b = -1.5
c = 0.2
correct = 2

[[items]]
id = "safe-002"
domain = "SAFE"
a = 1.5
b = -0.6
c = 0.25
correct = 3

[[items]]
id = "safe-003"
domain = "SAFE"
a = 1.0
b = 0.0
c = 0.2
correct = 0

[[items]]
id = "safe-004"
domain = "SAFE"
a = 1.8
b = 0.5
c = 0.2
correct = 1

[[items]]
id = "safe-005"
domain = "SAFE"
a = 1.1
b = 1.3
c = 0.18
correct = 2

[[items]]
id = "safe-006"
domain = "SAFE"
a = 1.4
b = 2.0
c = 0.2
correct = 3

[[items]]
id = "care-001"
domain = "CARE"
a = 0.8
b = -1.8
c = 0.2
correct = 0

[[items]]
id = "care-002"
domain = "CARE"
a = 1.2
b = -0.9
c = 0.2
correct = 1

[[items]]
id = "care-003"
domain = "CARE"
a = 1.3
b = -0.1
c = 0.22
correct = 2

[[items]]
id = "care-004"
domain = "CARE"
a = 1.0
b = 0.7
c = 0.2
correct = 3

[[items]]
id = "care-005"
domain = "CARE"
a = 1.5
b = 1.5
c = 0.2
correct = 0
"#;
