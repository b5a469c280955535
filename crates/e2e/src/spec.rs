//! Declarative YAML suite specification
//!
//! One file is one suite. Its tests share a single browser page and run in
//! order; a failed test skips the rest of the file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use coopsuite_common::FixtureKey;

use crate::error::{E2eError, E2eResult};
use crate::template::fixture_references;

/// A complete suite parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Unique name for this suite, also its stage name in the run state
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Fixtures an earlier stage must have produced
    #[serde(default)]
    pub requires: Vec<FixtureKey>,

    /// Fixtures this suite records for later stages
    #[serde(default)]
    pub produces: Vec<FixtureKey>,

    /// Seed the browser context from the saved login state
    #[serde(default = "default_true")]
    pub use_auth_state: bool,

    /// Export the browser context after the suite passes
    #[serde(default)]
    pub save_auth_state: bool,

    /// Mock scenarios routed for the whole suite
    #[serde(default)]
    pub mocks: Vec<String>,

    /// Viewport size for the browser
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Tests executed in order on one page
    pub tests: Vec<TestCase>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub steps: Vec<TestStep>,
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a path (relative to the base URL) or an absolute URL
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Click by ARIA role and accessible name
    ClickRole {
        role: String,
        name: String,
        #[serde(default)]
        exact: bool,
    },

    /// Fill an input field
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        clear_first: bool,
    },

    /// Select an option from a dropdown, by value or by visible label
    Select {
        selector: String,
        value: String,
        #[serde(default)]
        by_label: bool,
    },

    /// Check a checkbox
    Check {
        selector: String,
    },

    /// Uncheck a checkbox
    Uncheck {
        selector: String,
    },

    /// Press a key
    Press {
        selector: Option<String>,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        state: WaitState,
    },

    /// Expect visible text anywhere on the page
    ExpectText {
        text: String,
        #[serde(default)]
        exact: bool,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Read a value from the page into a fixture
    Capture {
        key: FixtureKey,
        selector: String,
        #[serde(default)]
        source: CaptureSource,
        /// Regex applied to the read value; group 1 (or the whole match) is kept
        #[serde(default)]
        pattern: Option<String>,
    },

    /// Record a resolved value (usually generated data) as a fixture
    Persist {
        key: FixtureKey,
        value: String,
    },

    /// Attach a file to a file input, or through the chooser a click opens
    Upload {
        selector: String,
        file: String,
        #[serde(default)]
        via_chooser: bool,
    },

    /// Click something that opens a new tab, check the tab, close it
    Popup {
        selector: String,
        #[serde(default)]
        url_contains: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// Where a capture reads its value from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    #[default]
    Text,
    /// Current value of an input
    Value,
    Attribute(String),
}

impl TestStep {
    /// Short label used in logs and results
    pub fn label(&self) -> String {
        match self {
            TestStep::Navigate { url, .. } => format!("navigate:{}", url),
            TestStep::Click { selector, .. } => format!("click:{}", selector),
            TestStep::ClickRole { role, name, .. } => format!("click_role:{}[{}]", role, name),
            TestStep::Fill { selector, .. } => format!("fill:{}", selector),
            TestStep::Select { selector, .. } => format!("select:{}", selector),
            TestStep::Check { selector } => format!("check:{}", selector),
            TestStep::Uncheck { selector } => format!("uncheck:{}", selector),
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::Wait { selector, .. } => format!("wait:{}", selector),
            TestStep::ExpectText { text, .. } => format!("expect_text:{}", truncate(text, 30)),
            TestStep::Assert { selector, .. } => format!("assert:{}", selector),
            TestStep::Capture { key, .. } => format!("capture:{}", key),
            TestStep::Persist { key, .. } => format!("persist:{}", key),
            TestStep::Upload { selector, .. } => format!("upload:{}", selector),
            TestStep::Popup { selector, .. } => format!("popup:{}", selector),
            TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
            TestStep::Log { message } => format!("log:{}", truncate(message, 30)),
        }
    }

    /// Fixture key written by this step, if any
    pub fn writes(&self) -> Option<FixtureKey> {
        match self {
            TestStep::Capture { key, .. } | TestStep::Persist { key, .. } => Some(*key),
            _ => None,
        }
    }

    /// Rebuild the step with every free-text field passed through `f`.
    ///
    /// Fixture keys, timeouts and flags are structural and left alone.
    pub fn map_text<F>(&self, f: &mut F) -> E2eResult<TestStep>
    where
        F: FnMut(&str) -> E2eResult<String>,
    {
        Ok(match self {
            TestStep::Navigate { url, wait_for_selector } => TestStep::Navigate {
                url: f(url)?,
                wait_for_selector: map_opt(wait_for_selector, f)?,
            },
            TestStep::Click { selector, timeout_ms } => TestStep::Click {
                selector: f(selector)?,
                timeout_ms: *timeout_ms,
            },
            TestStep::ClickRole { role, name, exact } => TestStep::ClickRole {
                role: role.clone(),
                name: f(name)?,
                exact: *exact,
            },
            TestStep::Fill { selector, value, clear_first } => TestStep::Fill {
                selector: f(selector)?,
                value: f(value)?,
                clear_first: *clear_first,
            },
            TestStep::Select { selector, value, by_label } => TestStep::Select {
                selector: f(selector)?,
                value: f(value)?,
                by_label: *by_label,
            },
            TestStep::Check { selector } => TestStep::Check { selector: f(selector)? },
            TestStep::Uncheck { selector } => TestStep::Uncheck { selector: f(selector)? },
            TestStep::Press { selector, key } => TestStep::Press {
                selector: map_opt(selector, f)?,
                key: key.clone(),
            },
            TestStep::Wait { selector, timeout_ms, state } => TestStep::Wait {
                selector: f(selector)?,
                timeout_ms: *timeout_ms,
                state: *state,
            },
            TestStep::ExpectText { text, exact } => TestStep::ExpectText {
                text: f(text)?,
                exact: *exact,
            },
            TestStep::Assert { selector, visible, enabled, text, text_contains, value, count } => {
                TestStep::Assert {
                    selector: f(selector)?,
                    visible: *visible,
                    enabled: *enabled,
                    text: map_opt(text, f)?,
                    text_contains: map_opt(text_contains, f)?,
                    value: map_opt(value, f)?,
                    count: *count,
                }
            }
            TestStep::Capture { key, selector, source, pattern } => TestStep::Capture {
                key: *key,
                selector: f(selector)?,
                source: source.clone(),
                pattern: pattern.clone(),
            },
            TestStep::Persist { key, value } => TestStep::Persist {
                key: *key,
                value: f(value)?,
            },
            TestStep::Upload { selector, file, via_chooser } => TestStep::Upload {
                selector: f(selector)?,
                file: f(file)?,
                via_chooser: *via_chooser,
            },
            TestStep::Popup { selector, url_contains, text } => TestStep::Popup {
                selector: f(selector)?,
                url_contains: map_opt(url_contains, f)?,
                text: map_opt(text, f)?,
            },
            TestStep::Sleep { ms } => TestStep::Sleep { ms: *ms },
            TestStep::Log { message } => TestStep::Log { message: f(message)? },
        })
    }
}

fn map_opt<F>(value: &Option<String>, f: &mut F) -> E2eResult<Option<String>>
where
    F: FnMut(&str) -> E2eResult<String>,
{
    value.as_deref().map(|s| f(s)).transpose()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

impl SuiteSpec {
    /// Parse a suite from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites from a directory, in file-name order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let mut specs = Vec::with_capacity(paths.len());
        let mut names = HashSet::new();
        for path in paths {
            let spec = Self::from_file(&path)?;
            if !names.insert(spec.name.clone()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate suite name '{}' in {}",
                    spec.name,
                    path.display()
                )));
            }
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter suites by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    pub fn steps(&self) -> impl Iterator<Item = &TestStep> {
        self.tests.iter().flat_map(|t| t.steps.iter())
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("suite name is empty".to_string()));
        }
        if self.tests.is_empty() {
            return Err(E2eError::SpecParse(format!("suite '{}' has no tests", self.name)));
        }

        let mut seen = HashSet::new();
        for test in &self.tests {
            if !seen.insert(test.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "suite '{}' has two tests named '{}'",
                    self.name, test.name
                )));
            }
        }

        for step in self.steps() {
            if let Some(key) = step.writes() {
                if !self.produces.contains(&key) {
                    return Err(E2eError::SpecParse(format!(
                        "suite '{}' writes '{}' but does not list it in produces",
                        self.name, key
                    )));
                }
            }
        }

        // Placeholders resolve before the first step runs, so a suite can
        // only read fixtures that earlier stages left in the run state.
        for step in self.steps() {
            step.map_text(&mut |text: &str| {
                for name in fixture_references(text) {
                    let key: FixtureKey = name.parse().map_err(|_| {
                        E2eError::SpecParse(format!(
                            "suite '{}' reads unknown fixture '{}'",
                            self.name, name
                        ))
                    })?;
                    if !self.requires.contains(&key) {
                        return Err(E2eError::SpecParse(format!(
                            "suite '{}' reads fixture '{}' without listing it in requires",
                            self.name, key
                        )));
                    }
                }
                Ok(text.to_string())
            })?;
        }

        if self.save_auth_state && self.use_auth_state {
            return Err(E2eError::SpecParse(format!(
                "suite '{}' both loads and saves the login state; set use_auth_state: false",
                self.name
            )));
        }

        Ok(())
    }
}
