//! Error types for the acceptance runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npm i -D playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Suite spec parse error: {0}")]
    SpecParse(String),

    #[error("Unresolved placeholder '{placeholder}' in suite '{suite}'")]
    UnresolvedPlaceholder { suite: String, placeholder: String },

    #[error("Unknown mock scenario: {0}")]
    UnknownScenario(String),

    #[error("Application at {url} unreachable after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("Suite dependency cycle between: {0}")]
    DependencyCycle(String),

    #[error("Mock server error: {0}")]
    MockServer(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Common(#[from] coopsuite_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
