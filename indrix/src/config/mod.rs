//! Configuration management for indrix
//!
//! Every field has a default, so a partial (or empty) TOML file is a valid configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use crate::analysis::AnalyzerConfig;
use crate::query::parser::DEFAULT_FIELD;
use crate::scoring::language_model::{LanguageModel, DEFAULT_LAMBDA, DEFAULT_MU};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub analysis: AnalyzerConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    #[default]
    Dirichlet,
    JelinekMercer,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub model: ModelKind,
    /// Dirichlet prior strength
    #[serde(default = "default_mu")]
    pub mu: f64,
    /// Jelinek-Mercer collection weight
    #[serde(default = "default_lambda")]
    pub lambda: f64,
}

fn default_mu() -> f64 {
    DEFAULT_MU
}

fn default_lambda() -> f64 {
    DEFAULT_LAMBDA
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            mu: default_mu(),
            lambda: default_lambda(),
        }
    }
}

impl ScoringConfig {
    pub fn language_model(&self) -> LanguageModel {
        match self.model {
            ModelKind::Dirichlet => LanguageModel::dirichlet_with_mu(self.mu),
            ModelKind::JelinekMercer => LanguageModel::jelinek_mercer_with_lambda(self.lambda),
        }
    }

    /// Override the model from a retrieval rule.
    ///
    /// Accepts the short form `dirichlet:2500` / `jm:0.5` and the keyed form
    /// `method:dirichlet,mu:2500` / `method:linear,lambda:0.5`. Method aliases are `dirichlet`,
    /// `dir`, `d` and `jelinek-mercer`, `jm`, `linear`. Without a parameter the current value is
    /// kept.
    pub fn apply_rule(&mut self, rule: &str) -> Result<()> {
        let rule = rule.trim().to_ascii_lowercase();
        let mut method = None;
        let mut parameter = None;
        for (position, item) in rule.split(',').enumerate() {
            let (key, value) = match item.split_once(':') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (item.trim(), None),
            };
            match (key, value) {
                ("method", Some(value)) => method = Some(value),
                ("mu" | "lambda", Some(value)) => parameter = Some((Some(key), value)),
                (_, value) if position == 0 => {
                    method = Some(key);
                    parameter = value.map(|value| (None, value));
                }
                _ => bail!("Invalid rule parameter {:?} in {:?}", item, rule),
            }
        }

        let Some(method) = method else {
            bail!("Rule {:?} names no method", rule);
        };
        let model = match method {
            "dirichlet" | "dir" | "d" => ModelKind::Dirichlet,
            "jelinek-mercer" | "jm" | "linear" => ModelKind::JelinekMercer,
            other => bail!("Unknown smoothing method {:?}", other),
        };

        if let Some((key, value)) = parameter {
            let value: f64 = value
                .parse()
                .with_context(|| format!("Invalid rule parameter value {:?}", value))?;
            match (model, key) {
                (ModelKind::Dirichlet, None | Some("mu")) => {
                    if !(value.is_finite() && value >= 0.0) {
                        bail!("mu must be a non-negative number, got {}", value);
                    }
                    self.mu = value;
                }
                (ModelKind::JelinekMercer, None | Some("lambda")) => {
                    if !(0.0..=1.0).contains(&value) {
                        bail!("lambda must lie in [0, 1], got {}", value);
                    }
                    self.lambda = value;
                }
                (_, Some(key)) => bail!("{} does not apply to {}", key, method),
            }
        }
        self.model = model;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Field for terms written without `.field`
    #[serde(default = "default_field")]
    pub default_field: String,
}

fn default_field() -> String {
    DEFAULT_FIELD.to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_field: default_field(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Log output format: "pretty" or "json"
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Load config from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Config::default()),
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}
