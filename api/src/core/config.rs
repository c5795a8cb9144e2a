//! Layered service configuration: defaults < file < environment.
//!
//! The optional JSON file (`AUTOPILOT_CONFIG_FILE`, or `autopilot.json` in
//! the working directory) carries the service-level knobs. Credentials
//! (the webhook secret, host token, and LLM key) are environment-only and
//! never read from files.
//!
//! # Environment variables
//!
//! - `TRIGGER_MODE` = `pr` | `push` | `both` (default `both`)
//! - `TRIVIAL_CHANGE_FILTER_ENABLED` (default `true`)
//! - `TRIVIAL_MAX_LINES` (default `10`)
//! - `DOCS_ONLY_LIGHTWEIGHT` (default `false`)
//! - `POST_REVIEW_ON_PR` (default `true`)
//! - `POST_AS_ISSUE` (default `false`)
//! - `GROUP_AUTOMATION_UPDATES` (default `true`)
//! - `TASK_TIMEOUT_SECONDS` (default `600`)
//! - `DIFF_MAX_BYTES` (default `120000`)
//! - `REVIEW_CONTEXT_FILES` / `REVIEW_CONTEXT_LINES` (default `2` / `120`)
//! - `DEDUP_WINDOW_SECONDS` (default `600`)
//! - `HOST` / `PORT` (default `127.0.0.1` / `8080`)
//! - `WEBHOOK_SECRET` - required
//! - `HOST_API_BASE` (default `https://api.github.com`)
//! - `HOST_API_TOKEN` - required
//! - `HOST_REPO` = `owner/name` - required
//! - `SESSION_FILE` (default `code_data/sessions.json`)
//! - `LLM_*` - see the llm-gateway crate

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use automation::{AutomationSettings, TriggerMode};

/// Error enum for config load/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A value failed to parse or validate.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// Config file present but unreadable/unparsable.
    #[error("config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Full resolved service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub webhook_secret: String,
    pub host_api_base: String,
    pub host_api_token: String,
    pub host_repo: String,
    pub session_file: PathBuf,
    pub automation: AutomationSettings,
}

/// Optional file layer; every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub trigger_mode: Option<String>,
    pub trivial_change_filter_enabled: Option<bool>,
    pub trivial_max_lines: Option<usize>,
    pub docs_only_lightweight: Option<bool>,
    pub post_review_on_pr: Option<bool>,
    pub post_as_issue: Option<bool>,
    pub group_automation_updates: Option<bool>,
    pub task_timeout_seconds: Option<u64>,
    pub diff_max_bytes: Option<usize>,
    pub review_context_files: Option<usize>,
    pub review_context_lines: Option<usize>,
    pub dedup_window_seconds: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub host_api_base: Option<String>,
    pub host_repo: Option<String>,
    pub session_file: Option<PathBuf>,
}

impl AppConfig {
    /// Resolves the configuration from all three layers and validates it.
    pub fn load() -> Result<Self, ConfigError> {
        let file = load_file_layer()?;
        let mut cfg = Self::defaults();
        cfg.apply_file(&file)?;
        cfg.apply_env()?;
        cfg.validate()?;
        info!(
            host = %cfg.host,
            port = cfg.port,
            repo = %cfg.host_repo,
            trigger_mode = ?cfg.automation.trigger_mode,
            "configuration resolved"
        );
        Ok(cfg)
    }

    fn defaults() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            webhook_secret: String::new(),
            host_api_base: "https://api.github.com".to_string(),
            host_api_token: String::new(),
            host_repo: String::new(),
            session_file: PathBuf::from("code_data/sessions.json"),
            automation: AutomationSettings::default(),
        }
    }

    /// Applies the file layer over defaults.
    pub fn apply_file(&mut self, file: &FileConfig) -> Result<(), ConfigError> {
        if let Some(mode) = &file.trigger_mode {
            self.automation.trigger_mode =
                TriggerMode::from_str(mode).map_err(|reason| ConfigError::Invalid {
                    key: "trigger_mode",
                    reason,
                })?;
        }
        set_if(&mut self.automation.trivial_filter_enabled, file.trivial_change_filter_enabled);
        set_if(&mut self.automation.trivial_max_lines, file.trivial_max_lines);
        set_if(&mut self.automation.docs_only_lightweight, file.docs_only_lightweight);
        set_if(&mut self.automation.post_review_on_pr, file.post_review_on_pr);
        set_if(&mut self.automation.post_as_issue, file.post_as_issue);
        set_if(&mut self.automation.group_automation_updates, file.group_automation_updates);
        set_if(&mut self.automation.diff_max_bytes, file.diff_max_bytes);
        set_if(&mut self.automation.review_context_files, file.review_context_files);
        set_if(&mut self.automation.review_context_lines, file.review_context_lines);
        if let Some(secs) = file.task_timeout_seconds {
            self.automation.task_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.dedup_window_seconds {
            self.automation.dedup_window = Duration::from_secs(secs);
        }
        set_if(&mut self.host, file.host.clone());
        set_if(&mut self.port, file.port);
        set_if(&mut self.host_api_base, file.host_api_base.clone());
        set_if(&mut self.host_repo, file.host_repo.clone());
        set_if(&mut self.session_file, file.session_file.clone());
        Ok(())
    }

    /// Applies the environment layer on top.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(mode) = env_opt("TRIGGER_MODE") {
            self.automation.trigger_mode =
                TriggerMode::from_str(&mode).map_err(|reason| ConfigError::Invalid {
                    key: "TRIGGER_MODE",
                    reason,
                })?;
        }
        if let Some(v) = env_opt_bool("TRIVIAL_CHANGE_FILTER_ENABLED")? {
            self.automation.trivial_filter_enabled = v;
        }
        if let Some(v) = env_opt_parse::<usize>("TRIVIAL_MAX_LINES")? {
            self.automation.trivial_max_lines = v;
        }
        if let Some(v) = env_opt_bool("DOCS_ONLY_LIGHTWEIGHT")? {
            self.automation.docs_only_lightweight = v;
        }
        if let Some(v) = env_opt_bool("POST_REVIEW_ON_PR")? {
            self.automation.post_review_on_pr = v;
        }
        if let Some(v) = env_opt_bool("POST_AS_ISSUE")? {
            self.automation.post_as_issue = v;
        }
        if let Some(v) = env_opt_bool("GROUP_AUTOMATION_UPDATES")? {
            self.automation.group_automation_updates = v;
        }
        if let Some(v) = env_opt_parse::<u64>("TASK_TIMEOUT_SECONDS")? {
            self.automation.task_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_opt_parse::<usize>("DIFF_MAX_BYTES")? {
            self.automation.diff_max_bytes = v;
        }
        if let Some(v) = env_opt_parse::<usize>("REVIEW_CONTEXT_FILES")? {
            self.automation.review_context_files = v;
        }
        if let Some(v) = env_opt_parse::<usize>("REVIEW_CONTEXT_LINES")? {
            self.automation.review_context_lines = v;
        }
        if let Some(v) = env_opt_parse::<u64>("DEDUP_WINDOW_SECONDS")? {
            self.automation.dedup_window = Duration::from_secs(v);
        }
        if let Some(v) = env_opt("HOST") {
            self.host = v;
        }
        if let Some(v) = env_opt_parse::<u16>("PORT")? {
            self.port = v;
        }
        if let Some(v) = env_opt("WEBHOOK_SECRET") {
            self.webhook_secret = v;
        }
        if let Some(v) = env_opt("HOST_API_BASE") {
            self.host_api_base = v;
        }
        if let Some(v) = env_opt("HOST_API_TOKEN") {
            self.host_api_token = v;
        }
        if let Some(v) = env_opt("HOST_REPO") {
            self.host_repo = v;
        }
        if let Some(v) = env_opt("SESSION_FILE") {
            self.session_file = PathBuf::from(v);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_secret.trim().is_empty() {
            return Err(ConfigError::MissingVar("WEBHOOK_SECRET"));
        }
        if self.host_api_token.trim().is_empty() {
            return Err(ConfigError::MissingVar("HOST_API_TOKEN"));
        }
        if !self.host_repo.contains('/') {
            return Err(ConfigError::Invalid {
                key: "HOST_REPO",
                reason: format!("expected owner/name, got {:?}", self.host_repo),
            });
        }
        if self.automation.trivial_max_lines == 0 {
            return Err(ConfigError::Invalid {
                key: "TRIVIAL_MAX_LINES",
                reason: "expected at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn set_if<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn load_file_layer() -> Result<FileConfig, ConfigError> {
    let path = env_opt("AUTOPILOT_CONFIG_FILE")
        .map(PathBuf::from)
        .or_else(|| {
            let default = PathBuf::from("autopilot.json");
            default.exists().then_some(default)
        });
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn env_opt(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_opt_bool(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match env_opt(name) {
        None => Ok(None),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(ConfigError::Invalid {
                key: name,
                reason: format!("expected a boolean, got {other:?}"),
            }),
        },
    }
}

fn env_opt_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_opt(name) {
        None => Ok(None),
        Some(v) => v.parse::<T>().map(Some).map_err(|_| ConfigError::Invalid {
            key: name,
            reason: format!("could not parse {v:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_overrides_defaults() {
        let mut cfg = AppConfig::defaults();
        let file: FileConfig = serde_json::from_str(
            r#"{
                "trigger_mode": "pr",
                "trivial_max_lines": 25,
                "port": 9000,
                "docs_only_lightweight": true
            }"#,
        )
        .unwrap();
        cfg.apply_file(&file).unwrap();

        assert_eq!(cfg.automation.trigger_mode, TriggerMode::Pr);
        assert_eq!(cfg.automation.trivial_max_lines, 25);
        assert_eq!(cfg.port, 9000);
        assert!(cfg.automation.docs_only_lightweight);
        // Untouched keys keep their defaults.
        assert!(cfg.automation.post_review_on_pr);
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn bad_trigger_mode_in_file_is_rejected() {
        let mut cfg = AppConfig::defaults();
        let file = FileConfig {
            trigger_mode: Some("sometimes".into()),
            ..Default::default()
        };
        assert!(cfg.apply_file(&file).is_err());
    }

    #[test]
    fn validation_requires_secret_token_and_repo_shape() {
        let mut cfg = AppConfig::defaults();
        cfg.webhook_secret = "s".into();
        cfg.host_api_token = "t".into();
        cfg.host_repo = "not-a-repo".into();
        assert!(cfg.validate().is_err());

        cfg.host_repo = "owner/name".into();
        assert!(cfg.validate().is_ok());
    }
}
