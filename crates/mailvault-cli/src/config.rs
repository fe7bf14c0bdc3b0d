use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub mailbox: MailboxConfig,
    pub classifier: Option<ClassifierConfig>,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("emails.sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MailboxConfig {
    pub snapshot_path: PathBuf,
    pub labels: Vec<String>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("mailbox.json"),
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: Option<String>,
}

/// Loads the YAML config. Without an explicit path a missing `config.yaml` means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    if explicit.is_none() && !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    parse_config(&expand_env_vars(&content))
        .with_context(|| format!("unable to parse config file {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<AppConfig> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Replaces every `${NAME}` with the value of environment variable `NAME`, or nothing.
pub fn expand_env_vars(content: &str) -> String {
    expand_with(content, |name| env::var(name).ok())
}

fn expand_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"\$\{(.+?)\}").expect("valid regex"));
    pattern
        .replace_all(content, |captures: &regex::Captures<'_>| {
            lookup(&captures[1]).unwrap_or_default()
        })
        .into_owned()
}
