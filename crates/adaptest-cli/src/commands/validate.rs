//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::parser::{load_banks, validate_item_bank};

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = load_banks(&bank_path)?;
    anyhow::ensure!(
        !banks.is_empty(),
        "no item banks found under {}",
        bank_path.display()
    );

    let mut total_warnings = 0;

    for bank in &banks {
        let critical = bank.domains.iter().filter(|d| d.is_critical).count();
        println!(
            "Item bank: {} ({} items, {} domains, {} critical)",
            bank.name,
            bank.items.len(),
            bank.domains.len(),
            critical
        );

        let warnings = validate_item_bank(bank);
        for w in &warnings {
            let prefix = w
                .subject
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All item banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
