//! TOML item bank parser.
//!
//! Loads calibrated item banks from TOML files and directories, and
//! validates them.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Domain, Item, ItemParameters};

/// A calibrated item bank with its blueprint.
#[derive(Debug, Clone)]
pub struct ItemBank {
    pub id: String,
    pub name: String,
    pub description: String,
    pub domains: Vec<Domain>,
    pub items: Vec<Item>,
}

/// Intermediate TOML structure for parsing item bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    domains: Vec<TomlDomain>,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    /// Guessing parameter for items that don't specify one.
    #[serde(default)]
    default_guessing: f64,
    #[serde(default = "default_option_count")]
    default_option_count: usize,
}

fn default_option_count() -> usize {
    4
}

#[derive(Debug, Deserialize)]
struct TomlDomain {
    code: String,
    #[serde(default)]
    name: String,
    weight: f64,
    #[serde(default)]
    critical: bool,
    #[serde(default)]
    min_coverage: u32,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    domain: String,
    /// Discrimination.
    a: f64,
    /// Difficulty.
    b: f64,
    /// Guessing.
    #[serde(default)]
    c: Option<f64>,
    correct: usize,
    #[serde(default)]
    options: Option<usize>,
    #[serde(default)]
    stem: Option<String>,
    #[serde(default)]
    choices: Vec<String>,
}

/// Parse a single TOML file into an [`ItemBank`].
pub fn parse_item_bank(path: &Path) -> Result<ItemBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank file: {}", path.display()))?;

    parse_item_bank_str(&content, path)
}

/// Parse a TOML string into an [`ItemBank`] (useful for testing).
pub fn parse_item_bank_str(content: &str, source_path: &Path) -> Result<ItemBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let header = parsed.bank;

    let domains = parsed
        .domains
        .into_iter()
        .map(|d| Domain {
            code: d.code,
            name: d.name,
            weight: d.weight,
            is_critical: d.critical,
            min_coverage: d.min_coverage,
        })
        .collect();

    let items = parsed
        .items
        .into_iter()
        .map(|i| {
            let option_count = i
                .options
                .unwrap_or(if i.choices.is_empty() {
                    header.default_option_count
                } else {
                    i.choices.len()
                });
            let content = match (i.stem, i.choices.is_empty()) {
                (None, true) => serde_json::Value::Null,
                (stem, _) => serde_json::json!({ "stem": stem, "choices": i.choices }),
            };
            Item {
                id: i.id,
                domain: i.domain,
                params: ItemParameters::new(i.a, i.b, i.c.unwrap_or(header.default_guessing)),
                correct_option: i.correct,
                option_count,
                content,
            }
        })
        .collect();

    Ok(ItemBank {
        id: header.id,
        name: header.name,
        description: header.description,
        domains,
        items,
    })
}

/// Recursively load all `.toml` item bank files from a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<ItemBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_item_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    banks.sort_by(|x, y| x.id.cmp(&y.id));
    Ok(banks)
}

/// Load a file or every bank under a directory.
pub fn load_banks(path: &Path) -> Result<Vec<ItemBank>> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        Ok(vec![parse_item_bank(path)?])
    }
}

/// A warning from item bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The item or domain the warning is about (if applicable).
    pub subject: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an item bank for common calibration and blueprint issues.
pub fn validate_item_bank(bank: &ItemBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Duplicate item IDs
    let mut seen_ids = HashSet::new();
    for item in &bank.items {
        if !seen_ids.insert(&item.id) {
            warnings.push(ValidationWarning {
                subject: Some(item.id.clone()),
                message: format!("duplicate item ID: {}", item.id),
            });
        }
    }

    // Duplicate domain codes
    let mut seen_codes = HashSet::new();
    for domain in &bank.domains {
        if !seen_codes.insert(&domain.code) {
            warnings.push(ValidationWarning {
                subject: Some(domain.code.clone()),
                message: format!("duplicate domain code: {}", domain.code),
            });
        }
    }

    // Out-of-range calibration
    for item in &bank.items {
        if let Err(e) = item.params.validate() {
            warnings.push(ValidationWarning {
                subject: Some(item.id.clone()),
                message: format!("invalid item parameters: {e}"),
            });
        }
    }

    // Keyed answer outside the option list
    for item in &bank.items {
        if item.correct_option >= item.option_count {
            warnings.push(ValidationWarning {
                subject: Some(item.id.clone()),
                message: format!(
                    "correct option {} is out of range for {} options",
                    item.correct_option, item.option_count
                ),
            });
        }
    }

    // Items pointing at unknown domains
    let known: HashSet<&str> = bank.domains.iter().map(|d| d.code.as_str()).collect();
    for item in &bank.items {
        if !known.contains(item.domain.as_str()) {
            warnings.push(ValidationWarning {
                subject: Some(item.id.clone()),
                message: format!("unknown domain: {}", item.domain),
            });
        }
    }

    // Blueprint weights
    if !bank.domains.is_empty() {
        let total: f64 = bank.domains.iter().map(|d| d.weight).sum();
        if (total - 100.0).abs() > 1e-6 {
            warnings.push(ValidationWarning {
                subject: None,
                message: format!("domain weights sum to {total}, expected 100"),
            });
        }
    }

    // Critical domains that can never reach their minimum
    let mut per_domain: HashMap<&str, u32> = HashMap::new();
    for item in &bank.items {
        *per_domain.entry(item.domain.as_str()).or_default() += 1;
    }
    for domain in bank.domains.iter().filter(|d| d.is_critical) {
        let available = per_domain.get(domain.code.as_str()).copied().unwrap_or(0);
        if available < domain.min_coverage {
            warnings.push(ValidationWarning {
                subject: Some(domain.code.clone()),
                message: format!(
                    "critical domain needs {} items but the bank has {available}",
                    domain.min_coverage
                ),
            });
        }
    }

    warnings
}
