//! Unified configuration for qstrack.
//!
//! Settings are read from `.qstrack/qstrack.toml` and layered
//! (file → environment → CLI):
//!
//! ```toml
//! [server]
//! base_url = "http://localhost:8080/api"
//! timeout_secs = 15
//! connect_timeout_secs = 5
//!
//! [scanner]
//! cooldown_ms = 1000
//! recent_limit = 10
//! history_days = 7
//!
//! [tasks]
//! completed_limit = 15
//!
//! [board]
//! poll_interval_secs = 30
//! preview_limit = 20
//! ```
//!
//! Environment overrides: `QSTRACK_BASE_URL`, `QSTRACK_TIMEOUT_SECS`,
//! `QSTRACK_TOKEN`, `QSTRACK_OPERATOR_ID`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::OperatorId;

pub const CONFIG_DIR: &str = ".qstrack";
pub const CONFIG_FILE: &str = "qstrack.toml";

pub const ENV_BASE_URL: &str = "QSTRACK_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "QSTRACK_TIMEOUT_SECS";
pub const ENV_TOKEN: &str = "QSTRACK_TOKEN";
pub const ENV_OPERATOR_ID: &str = "QSTRACK_OPERATOR_ID";

/// Part directory server connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Base URL including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// QR scanner behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerSection {
    /// Window during which a repeated payload is ignored
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Length of the recently-scanned list
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    /// How far back the recent list is seeded from the server scan log
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

fn default_cooldown_ms() -> u64 {
    1000
}

fn default_recent_limit() -> usize {
    10
}

fn default_history_days() -> u32 {
    7
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            recent_limit: default_recent_limit(),
            history_days: default_history_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksSection {
    /// Number of completed tasks shown in the task list
    #[serde(default = "default_completed_limit")]
    pub completed_limit: usize,
}

fn default_completed_limit() -> usize {
    15
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            completed_limit: default_completed_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSection {
    /// Polling period of the state board feed
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Parts listed per state column before eliding
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_preview_limit() -> usize {
    20
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            preview_limit: default_preview_limit(),
        }
    }
}

/// Contents of `qstrack.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QsToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub scanner: ScannerSection,
    #[serde(default)]
    pub tasks: TasksSection,
    #[serde(default)]
    pub board: BoardSection,
}

impl QsToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse qstrack.toml")
    }

    /// Load from `<config_dir>/qstrack.toml`, or defaults when absent.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize qstrack.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.server.base_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.server.timeout_secs = secs
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a number of seconds, got '{}'", ENV_TIMEOUT_SECS, secs))?;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let url = self.server.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            warnings.push(format!(
                "server.base_url '{}' should start with http:// or https://",
                self.server.base_url
            ));
        }
        if self.server.timeout_secs == 0 {
            warnings.push("server.timeout_secs is 0: requests would fail immediately".to_string());
        }
        if self.server.connect_timeout_secs > self.server.timeout_secs {
            warnings.push(format!(
                "server.connect_timeout_secs ({}) exceeds server.timeout_secs ({})",
                self.server.connect_timeout_secs, self.server.timeout_secs
            ));
        }
        if self.scanner.recent_limit == 0 {
            warnings.push("scanner.recent_limit is 0: scanned parts will not be listed".to_string());
        }
        if self.tasks.completed_limit == 0 {
            warnings.push("tasks.completed_limit is 0: completed tasks will not be listed".to_string());
        }
        if self.board.poll_interval_secs == 0 {
            warnings.push("board.poll_interval_secs is 0: the board would poll continuously".to_string());
        }

        warnings
    }
}

/// Configuration merged from `qstrack.toml`, the environment and the CLI.
#[derive(Debug, Clone)]
pub struct QsConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: QsToml,
    token: Option<String>,
    pub operator_id: Option<OperatorId>,
    pub verbose: bool,
    pub yes: bool,
}

impl QsConfig {
    /// Load file settings and process-environment overrides for `project_dir`.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        Self::with_env(project_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`QsConfig::new`] with an explicit environment lookup.
    pub fn with_env<F>(project_dir: PathBuf, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let mut toml = QsToml::load_or_default(&config_dir)?;
        toml.apply_env(&lookup)?;

        let token = lookup(ENV_TOKEN).filter(|t| !t.trim().is_empty());
        let operator_id = match lookup(ENV_OPERATOR_ID) {
            Some(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<OperatorId>().with_context(|| {
                format!("{} must be a numeric user id, got '{}'", ENV_OPERATOR_ID, raw)
            })?),
            _ => None,
        };

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            token,
            operator_id,
            verbose: false,
            yes: false,
        })
    }

    /// Apply CLI flags; each given flag wins over file and environment.
    pub fn with_cli_args(
        mut self,
        base_url: Option<String>,
        token: Option<String>,
        operator_id: Option<OperatorId>,
        verbose: bool,
        yes: bool,
    ) -> Self {
        if let Some(url) = base_url {
            self.toml.server.base_url = url;
        }
        if token.is_some() {
            self.token = token;
        }
        if operator_id.is_some() {
            self.operator_id = operator_id;
        }
        self.verbose = verbose;
        self.yes = yes;
        self
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn base_url(&self) -> &str {
        self.toml.server.base_url.trim_end_matches('/')
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.server.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.server.connect_timeout_secs)
    }

    pub fn scan_cooldown(&self) -> Duration {
        Duration::from_millis(self.toml.scanner.cooldown_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.toml.board.poll_interval_secs)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
