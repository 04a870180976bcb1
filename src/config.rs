//! Optional YAML configuration.
//!
//! Everything here can also come from the command line or the environment;
//! values given there win over the file. A typical `config.yaml`:
//!
//! ```yaml
//! pocket:
//!   consumer_key: "12345-abcdef"
//!   redirect_uri: "https://getpocket.com/developer/docs/v3/retrieve"
//! diffbot:
//!   token: "abc123"
//! scrape:
//!   user_agent: "Mozilla/5.0 ..."
//! filter:
//!   min_word_count: 100
//!   max_percent_diff: 300.0
//! ```

use crate::error::{PipelineError, Result};
use crate::filter::{DEFAULT_MAX_PERCENT_DIFF, DEFAULT_MIN_WORD_COUNT, PipelineConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument};

/// Browser User-Agent sent when scraping pages; some sites refuse
/// anything that does not look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_1) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/49.0.2623.112 Safari/537.36";

pub const DEFAULT_REDIRECT_URI: &str = "https://getpocket.com/developer/docs/v3/retrieve";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pocket: PocketConfig,
    #[serde(default)]
    pub diffbot: DiffbotConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub filter: FilterOverrides,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PocketConfig {
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

impl Default for PocketConfig {
    fn default() -> Self {
        Self {
            consumer_key: None,
            access_token: None,
            redirect_uri: default_redirect_uri(),
        }
    }
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiffbotConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// Threshold overrides applied on top of a pipeline preset.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterOverrides {
    #[serde(default = "default_min_word_count")]
    pub min_word_count: i64,
    #[serde(default = "default_max_percent_diff")]
    pub max_percent_diff: f64,
}

impl Default for FilterOverrides {
    fn default() -> Self {
        Self {
            min_word_count: default_min_word_count(),
            max_percent_diff: default_max_percent_diff(),
        }
    }
}

fn default_min_word_count() -> i64 {
    DEFAULT_MIN_WORD_COUNT
}
fn default_max_percent_diff() -> f64 {
    DEFAULT_MAX_PERCENT_DIFF
}

impl FilterOverrides {
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        config.min_word_count = self.min_word_count;
        config.max_percent_diff = self.max_percent_diff;
        config
    }
}

impl AppConfig {
    /// Load the config file, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw).map_err(|source| PipelineError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }
}
