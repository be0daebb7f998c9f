//! Engine configuration and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coverage::{CoverageThresholds, ReadinessThresholds};
use crate::estimator::EstimatorConfig;
use crate::model::{SessionConfig, SessionType};
use crate::selector::SelectorConfig;

/// Length/precision presets per session type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPresets {
    pub full: SessionConfig,
    pub express: SessionConfig,
    pub domain_scoped: SessionConfig,
}

impl Default for SessionPresets {
    fn default() -> Self {
        Self {
            full: SessionConfig::new(20, 50, 0.30),
            express: SessionConfig::new(10, 25, 0.45),
            domain_scoped: SessionConfig::new(5, 15, 0.50),
        }
    }
}

impl SessionPresets {
    pub fn for_type(&self, session_type: &SessionType) -> SessionConfig {
        match session_type {
            SessionType::Full => self.full,
            SessionType::Express => self.express,
            SessionType::DomainScoped { .. } => self.domain_scoped,
        }
    }
}

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptestConfig {
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub sessions: SessionPresets,
    #[serde(default)]
    pub readiness: ReadinessThresholds,
    #[serde(default)]
    pub coverage: CoverageThresholds,
}

impl AdaptestConfig {
    /// Basic sanity checks on loaded values.
    pub fn validate(&self) -> Result<()> {
        let e = &self.estimator;
        anyhow::ensure!(
            e.theta_min < e.theta_max,
            "estimator.theta_min must be below theta_max"
        );
        anyhow::ensure!(e.max_step > 0.0, "estimator.max_step must be positive");
        anyhow::ensure!(e.se_floor > 0.0, "estimator.se_floor must be positive");
        anyhow::ensure!(e.prior_se > 0.0, "estimator.prior_se must be positive");
        for (name, preset) in [
            ("full", &self.sessions.full),
            ("express", &self.sessions.express),
            ("domain_scoped", &self.sessions.domain_scoped),
        ] {
            anyhow::ensure!(
                preset.max_questions >= 1,
                "sessions.{name}.max_questions must be at least 1"
            );
            anyhow::ensure!(
                preset.min_questions <= preset.max_questions,
                "sessions.{name}.min_questions must not exceed max_questions"
            );
            anyhow::ensure!(
                preset.target_se > 0.0,
                "sessions.{name}.target_se must be positive"
            );
        }
        anyhow::ensure!(
            self.coverage.study_below <= self.coverage.maintain_at,
            "coverage.study_below must not exceed coverage.maintain_at"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.readiness.ability_weight),
            "readiness.ability_weight must be in [0, 1]"
        );
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment override: `ADAPTEST_TARGET_SE` replaces every preset's target SE.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("adaptest.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!("loading config from {}", path.display());
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    if let Ok(raw) = std::env::var("ADAPTEST_TARGET_SE") {
        let target: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("ADAPTEST_TARGET_SE is not a number: '{raw}'"))?;
        config.sessions.full.target_se = target;
        config.sessions.express.target_se = target;
        config.sessions.domain_scoped.target_se = target;
    }

    config.validate()?;
    Ok(config)
}

/// Parse a TOML string into a config, filling unspecified fields with defaults.
pub fn parse_config_str(content: &str) -> Result<AdaptestConfig> {
    let config: AdaptestConfig = toml::from_str(content)?;
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}
