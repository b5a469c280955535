//! Suite configuration
//!
//! Resolution order: defaults, then an optional TOML file, then environment
//! variables, then whatever the CLI passes explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};

pub const ENV_BASE_URL: &str = "COOP_BASE_URL";
pub const ENV_USERNAME: &str = "COOP_USERNAME";
pub const ENV_PASSWORD: &str = "COOP_PASSWORD";
pub const ENV_RUN_STATE: &str = "COOP_RUN_STATE";

/// Everything a suite run needs to know about its environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Deployment of the application under test
    pub base_url: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Directory holding the suite YAML files
    pub specs_dir: PathBuf,

    /// Directory holding extra mock scenarios (YAML)
    pub scenarios_dir: PathBuf,

    /// Files suites upload, exposed to them as `{{ config.assets_dir }}`
    pub assets_dir: PathBuf,

    pub output_dir: PathBuf,

    /// Browser context exported by the login stage
    pub storage_state_path: PathBuf,

    /// Fixtures handed between stages
    pub run_state_path: PathBuf,

    pub browser: Browser,

    pub headless: bool,

    pub viewport_width: u32,

    pub viewport_height: u32,

    /// Playwright default timeout for actions and expectations
    pub default_timeout_ms: u64,

    /// Port for the mock scenario server (0 = pick a free one)
    pub mock_port: u16,

    /// How long to wait for the application to answer before giving up
    pub reachability_timeout_secs: u64,

    /// Seed for sample data; a fresh one per run when absent
    pub seed: Option<u64>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            specs_dir: PathBuf::from("crates/e2e/specs"),
            scenarios_dir: PathBuf::from("crates/e2e/scenarios"),
            assets_dir: PathBuf::from("crates/e2e/fixtures"),
            output_dir: PathBuf::from("test-results"),
            storage_state_path: PathBuf::from("test-results/.auth/state.json"),
            run_state_path: PathBuf::from("test-results/run-state.json"),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1366,
            viewport_height: 768,
            default_timeout_ms: 30_000,
            mock_port: 0,
            reachability_timeout_secs: 30,
            seed: None,
        }
    }
}

impl SuiteConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Override fields from variables found by `lookup`; empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(user) = get(ENV_USERNAME) {
            self.username = Some(user);
        }
        if let Some(pass) = get(ENV_PASSWORD) {
            self.password = Some(pass);
        }
        if let Some(path) = get(ENV_RUN_STATE) {
            self.run_state_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(E2eError::InvalidConfig(format!(
                "base URL is empty; set {} or --base-url",
                ENV_BASE_URL
            )));
        }
        let parsed = Url::parse(url)
            .map_err(|e| E2eError::InvalidConfig(format!("base URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(E2eError::InvalidConfig(format!(
                "base URL must use http or https, got '{}'",
                url
            )));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(E2eError::InvalidConfig(format!("base URL '{}' has no host", url)));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(E2eError::InvalidConfig("viewport must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn playwright_config(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            base_url: self.base_url().to_string(),
            output_dir: self.output_dir.clone(),
            storage_state_path: self.storage_state_path.clone(),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            browser: self.browser,
            headless: self.headless,
            default_timeout_ms: self.default_timeout_ms,
            ..Default::default()
        }
    }

    /// Base URL without a trailing slash, so paths can be appended directly
    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}
