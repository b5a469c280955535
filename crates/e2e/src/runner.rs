//! Main suite runner that orders stages, drives Playwright, and threads the
//! run state from one suite to the next

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use coopsuite_common::{DateContext, FixtureKey, FixtureSet, RunState, StorageState};

use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::mock::{MockServer, ScenarioCatalog};
use crate::playwright::{PlaywrightHandle, ScriptEvent, ScriptRequest, SuiteRun};
use crate::spec::{SuiteSpec, TestCase};
use crate::target::TargetApp;
use crate::template::{SuiteData, TemplateContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

/// Result of one test inside a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: Status,
    pub duration_ms: u64,
    pub step: Option<String>,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
}

/// Result of running a single suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub status: Status,
    pub duration_ms: u64,
    pub tests: Vec<TestResult>,
    /// Fixtures recorded by passing tests
    pub captured: Vec<FixtureKey>,
    pub error: Option<String>,
}

impl SuiteResult {
    fn skipped(spec: &SuiteSpec, reason: String) -> Self {
        Self {
            name: spec.name.clone(),
            status: Status::Skipped,
            duration_ms: 0,
            tests: spec
                .tests
                .iter()
                .map(|t| TestResult {
                    name: t.name.clone(),
                    status: Status::Skipped,
                    duration_ms: 0,
                    step: None,
                    error: None,
                    screenshot: None,
                })
                .collect(),
            captured: Vec::new(),
            error: Some(reason),
        }
    }

    fn errored(spec: &SuiteSpec, err: &E2eError) -> Self {
        Self {
            status: Status::Failed,
            ..Self::skipped(spec, err.to_string())
        }
    }

    fn count(&self, status: Status) -> usize {
        self.tests.iter().filter(|t| t.status == status).count()
    }
}

/// Result of running all selected suites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub run_id: Uuid,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<SuiteResult>,
}

impl TestSuiteResult {
    fn from_results(run_id: Uuid, results: Vec<SuiteResult>, duration_ms: u64) -> Self {
        let by = |s: Status| results.iter().filter(|r| r.status == s).count();
        let tests = |s: Status| results.iter().map(|r| r.count(s)).sum::<usize>();
        Self {
            run_id,
            total: results.len(),
            passed: by(Status::Passed),
            failed: by(Status::Failed),
            skipped: by(Status::Skipped),
            tests_passed: tests(Status::Passed),
            tests_failed: tests(Status::Failed),
            tests_skipped: tests(Status::Skipped),
            duration_ms,
            results,
        }
    }
}

/// Order suites so that every producer of a fixture runs before its consumers.
///
/// Ties keep file order. A required key that no selected suite produces is
/// left to the loaded run state and checked when the suite is about to run.
pub fn plan(specs: &[SuiteSpec]) -> E2eResult<Vec<&SuiteSpec>> {
    let mut producers: HashMap<FixtureKey, Vec<usize>> = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        for key in &spec.produces {
            producers.entry(*key).or_default().push(i);
        }
    }

    // deps[i] = suites that must finish before suite i
    let deps: Vec<BTreeSet<usize>> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            spec.requires
                .iter()
                .filter_map(|k| producers.get(k))
                .flatten()
                .copied()
                .filter(|&p| p != i)
                .collect()
        })
        .collect();

    let mut done = vec![false; specs.len()];
    let mut order = Vec::with_capacity(specs.len());
    while order.len() < specs.len() {
        let next = (0..specs.len())
            .find(|&i| !done[i] && deps[i].iter().all(|&d| done[d]));
        match next {
            Some(i) => {
                done[i] = true;
                order.push(&specs[i]);
            }
            None => {
                let stuck: Vec<_> = (0..specs.len())
                    .filter(|&i| !done[i])
                    .map(|i| specs[i].name.as_str())
                    .collect();
                return Err(E2eError::DependencyCycle(stuck.join(", ")));
            }
        }
    }

    Ok(order)
}

/// Turn the script's events into a suite result and record the captures of
/// passing tests.
pub fn evaluate(
    suite: &str,
    tests: &[TestCase],
    run: &SuiteRun,
    fixtures: &mut FixtureSet,
) -> SuiteResult {
    let mut results: Vec<Option<TestResult>> = vec![None; tests.len()];
    let index: HashMap<&str, usize> = tests
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.as_str(), i))
        .collect();
    let mut captures: Vec<(&str, FixtureKey, &str)> = Vec::new();

    for event in &run.events {
        let (test, result) = match event {
            ScriptEvent::TestPassed { test, duration_ms } => (
                test,
                TestResult {
                    name: test.clone(),
                    status: Status::Passed,
                    duration_ms: *duration_ms,
                    step: None,
                    error: None,
                    screenshot: None,
                },
            ),
            ScriptEvent::TestFailed { test, step, error, duration_ms, screenshot } => (
                test,
                TestResult {
                    name: test.clone(),
                    status: Status::Failed,
                    duration_ms: *duration_ms,
                    step: step.clone(),
                    error: Some(error.clone()),
                    screenshot: screenshot.clone(),
                },
            ),
            ScriptEvent::TestSkipped { test, reason } => (
                test,
                TestResult {
                    name: test.clone(),
                    status: Status::Skipped,
                    duration_ms: 0,
                    step: None,
                    error: Some(reason.clone()),
                    screenshot: None,
                },
            ),
            ScriptEvent::Capture { test, key, value } => {
                captures.push((test.as_str(), *key, value.as_str()));
                continue;
            }
            _ => continue,
        };
        match index.get(test.as_str()) {
            Some(&i) => results[i] = Some(result),
            None => warn!("Event for unknown test '{}' in suite {}", test, suite),
        }
    }

    // Tests the script never reported on: the first one takes the blame,
    // the rest cascade like any other serial failure
    let fatal = run.fatal().map(str::to_string).unwrap_or_else(|| {
        format!(
            "script exited {} before reporting; see {}",
            if run.exit_ok { "cleanly" } else { "with an error" },
            run.script_path.display()
        )
    });
    let mut blamed = results
        .iter()
        .any(|r| matches!(r, Some(TestResult { status: Status::Failed, .. })));
    let mut tests_out = Vec::with_capacity(tests.len());
    for (i, slot) in results.into_iter().enumerate() {
        let result = slot.unwrap_or_else(|| {
            let name = tests[i].name.clone();
            if blamed {
                TestResult {
                    name,
                    status: Status::Skipped,
                    duration_ms: 0,
                    step: None,
                    error: Some("previous test failed".to_string()),
                    screenshot: None,
                }
            } else {
                blamed = true;
                TestResult {
                    name,
                    status: Status::Failed,
                    duration_ms: 0,
                    step: None,
                    error: Some(fatal.clone()),
                    screenshot: None,
                }
            }
        });
        tests_out.push(result);
    }

    let passed: BTreeSet<&str> = tests_out
        .iter()
        .filter(|t| t.status == Status::Passed)
        .map(|t| t.name.as_str())
        .collect();
    let mut captured = Vec::new();
    for (test, key, value) in captures {
        if passed.contains(test) {
            fixtures.set(key, value);
            if !captured.contains(&key) {
                captured.push(key);
            }
        } else {
            debug!("Dropping capture {} from non-passing test '{}'", key, test);
        }
    }

    let any_failed = tests_out.iter().any(|t| t.status == Status::Failed);
    // A passing suite whose script still died (e.g. exporting the login state)
    let error = match run.fatal() {
        Some(fatal) if !any_failed => Some(fatal.to_string()),
        _ => None,
    };
    let status = if any_failed || error.is_some() {
        Status::Failed
    } else {
        Status::Passed
    };

    SuiteResult {
        name: suite.to_string(),
        status,
        duration_ms: run.duration_ms,
        tests: tests_out,
        captured,
        error,
    }
}

/// Main E2E suite runner
pub struct TestRunner {
    config: SuiteConfig,

    playwright: PlaywrightHandle,

    catalog: ScenarioCatalog,

    /// Fixtures and completed stages, persisted after every suite
    state: RunState,

    /// Calendar day all relative dates of this run are computed from
    dates: DateContext,

    rng: StdRng,

    target_checked: bool,
}

impl TestRunner {
    /// Create a runner, resuming the run state on disk unless `fresh` is set
    pub fn with_config(config: SuiteConfig, fresh: bool) -> E2eResult<Self> {
        config.validate()?;
        let playwright = PlaywrightHandle::new(config.playwright_config())?;
        Self::with_handle(config, playwright, fresh)
    }

    /// Create a runner around an existing Playwright handle
    pub fn with_handle(
        config: SuiteConfig,
        playwright: PlaywrightHandle,
        fresh: bool,
    ) -> E2eResult<Self> {
        let catalog = ScenarioCatalog::load(&config.scenarios_dir)?;
        let state = if fresh {
            info!("Starting a fresh run state");
            RunState::default()
        } else {
            RunState::load_or_default(&config.run_state_path)?
        };
        let rng = match config.seed {
            Some(seed) => {
                info!("Sample data seed: {}", seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            playwright,
            catalog,
            state,
            dates: DateContext::now(),
            rng,
            target_checked: false,
        })
    }

    /// Pin the calendar day relative dates are computed from
    pub fn with_dates(mut self, dates: DateContext) -> Self {
        self.dates = dates;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    async fn ensure_target(&mut self) -> E2eResult<()> {
        if self.target_checked {
            return Ok(());
        }
        let target = TargetApp::new(self.config.base_url())?;
        target
            .wait_until_reachable(Duration::from_secs(self.config.reachability_timeout_secs))
            .await?;
        self.target_checked = true;
        Ok(())
    }

    /// Run all suites in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let specs = SuiteSpec::load_all(&self.config.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run suites matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = SuiteSpec::load_all(&self.config.specs_dir)?;
        let filtered: Vec<SuiteSpec> = SuiteSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific suite by name, relying on the saved run state for its inputs
    pub async fn run_named(&mut self, name: &str) -> E2eResult<TestSuiteResult> {
        let specs = SuiteSpec::load_all(&self.config.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Suite not found: {}", name)))?;
        self.run_specs(std::slice::from_ref(&spec)).await
    }

    /// Run a list of suites in dependency order
    pub async fn run_specs(&mut self, specs: &[SuiteSpec]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let ordered = plan(specs)?;

        self.ensure_target().await?;

        info!("Running {} suite(s)...", ordered.len());

        let mut results = Vec::with_capacity(ordered.len());
        for spec in ordered {
            let result = self.run_suite(spec).await?;
            match result.status {
                Status::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                Status::Failed => error!(
                    "✗ {} - {} failed, {} skipped{}",
                    result.name,
                    result.count(Status::Failed),
                    result.count(Status::Skipped),
                    result
                        .error
                        .as_deref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                ),
                Status::Skipped => warn!(
                    "- {} skipped: {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown reason")
                ),
            }
            self.state.save(&self.config.run_state_path)?;
            results.push(result);
        }

        let summary = TestSuiteResult::from_results(
            self.state.run_id,
            results,
            start.elapsed().as_millis() as u64,
        );

        info!("");
        info!(
            "Suite Results: {} passed, {} failed, {} skipped ({} ms)",
            summary.passed, summary.failed, summary.skipped, summary.duration_ms
        );
        info!(
            "Test Results: {} passed, {} failed, {} skipped",
            summary.tests_passed, summary.tests_failed, summary.tests_skipped
        );

        Ok(summary)
    }

    /// Run a single suite.
    ///
    /// Problems local to the suite (unmet requirements, bad placeholders,
    /// unknown scenarios) become a failed or skipped result; only harness
    /// failures such as a missing `node` abort the run.
    pub async fn run_suite(&mut self, spec: &SuiteSpec) -> E2eResult<SuiteResult> {
        debug!("Preparing suite: {}", spec.name);

        let missing = self.state.fixtures.missing(&spec.requires);
        if !missing.is_empty() {
            let keys: Vec<_> = missing.iter().map(|k| k.as_str()).collect();
            return Ok(SuiteResult::skipped(
                spec,
                format!("missing fixtures from earlier stages: {}", keys.join(", ")),
            ));
        }

        if spec.use_auth_state {
            self.check_auth_state();
        }

        let data = SuiteData::generate_with(&mut self.rng);
        let ctx = TemplateContext {
            suite: &spec.name,
            data: &data,
            dates: &self.dates,
            config: &self.config,
            fixtures: &self.state.fixtures,
        };
        let tests = match ctx.resolve_suite(spec, &mut self.rng) {
            Ok(tests) => tests,
            Err(e) => return Ok(SuiteResult::errored(spec, &e)),
        };

        let scenarios = match spec
            .mocks
            .iter()
            .map(|name| self.catalog.get(name).cloned())
            .collect::<E2eResult<Vec<_>>>()
        {
            Ok(scenarios) => scenarios,
            Err(e) => return Ok(SuiteResult::errored(spec, &e)),
        };
        let mut mock_server = if scenarios.is_empty() {
            None
        } else {
            Some(MockServer::spawn(scenarios, self.config.mock_port).await?)
        };
        let routes = mock_server
            .as_ref()
            .map(|server| server.bindings())
            .unwrap_or_default();

        info!("Suite {} ({} test(s))", spec.name, tests.len());
        let run = self
            .playwright
            .run_suite(&ScriptRequest {
                suite: &spec.name,
                tests: &tests,
                viewport: spec.viewport,
                load_auth_state: spec.use_auth_state,
                save_auth_state: spec.save_auth_state,
                routes: &routes,
            })
            .await?;

        if let Some(server) = mock_server.as_mut() {
            let hits = server.hits().await;
            for name in &spec.mocks {
                if hits.get(name).copied().unwrap_or(0) == 0 {
                    warn!("Mock scenario '{}' was never requested by suite {}", name, spec.name);
                }
            }
            server.stop();
        }

        let result = evaluate(&spec.name, &tests, &run, &mut self.state.fixtures);

        if result.status == Status::Passed {
            for key in &spec.produces {
                if !result.captured.contains(key) {
                    warn!("Suite {} passed without recording '{}'", spec.name, key);
                }
            }
            self.state.mark_completed(&spec.name);
        }

        Ok(result)
    }

    fn check_auth_state(&self) {
        let path = &self.config.storage_state_path;
        if !StorageState::exists(path) {
            warn!("No saved login state at {}; run the login suite first", path.display());
            return;
        }
        match StorageState::load(path) {
            Ok(state) if state.is_authenticated(self.config.base_url()) => {}
            Ok(_) => warn!("Saved login state has no session for {}", self.config.base_url()),
            Err(e) => warn!("Unreadable login state {}: {}", path.display(), e),
        }
    }

    /// Write suite results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
