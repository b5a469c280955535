//! Playwright browser automation
//!
//! Each suite becomes one Node script: one browser context, one page, tests
//! in file order. The script reports back over stdout, one JSON event per
//! line behind [`EVENT_PREFIX`]; anything else it prints is passed through
//! to the debug log.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::{debug, error, info, warn};

use coopsuite_common::FixtureKey;

use crate::error::{E2eError, E2eResult};
use crate::mock::RouteBinding;
use crate::spec::{CaptureSource, TestCase, TestStep, Viewport};

/// Marks stdout lines that carry a [`ScriptEvent`]
pub const EVENT_PREFIX: &str = "@@coopsuite ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

/// What the generated script reports while it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    SuiteStarted {
        suite: String,
    },
    TestStarted {
        test: String,
    },
    TestPassed {
        test: String,
        duration_ms: u64,
    },
    TestFailed {
        test: String,
        #[serde(default)]
        step: Option<String>,
        error: String,
        duration_ms: u64,
        #[serde(default)]
        screenshot: Option<PathBuf>,
    },
    TestSkipped {
        test: String,
        reason: String,
    },
    Capture {
        test: String,
        key: FixtureKey,
        value: String,
    },
    AuthStateSaved {
        path: PathBuf,
    },
    Log {
        message: String,
    },
    /// The script died outside any test (launch failure, bad storage state)
    Fatal {
        error: String,
    },
}

/// Parse one stdout line; `None` when the line is not an event.
pub fn parse_event_line(line: &str) -> Option<E2eResult<ScriptEvent>> {
    line.trim_end()
        .strip_prefix(EVENT_PREFIX)
        .map(|json| serde_json::from_str(json).map_err(E2eError::from))
}

/// Everything the script for one suite needs
#[derive(Debug, Clone)]
pub struct ScriptRequest<'a> {
    pub suite: &'a str,
    pub tests: &'a [TestCase],
    pub viewport: Option<Viewport>,
    /// Seed the context from the storage-state file
    pub load_auth_state: bool,
    /// Export the context to the storage-state file when every test passed
    pub save_auth_state: bool,
    pub routes: &'a [RouteBinding],
}

/// Outcome of one script execution
#[derive(Debug, Clone)]
pub struct SuiteRun {
    pub events: Vec<ScriptEvent>,
    pub stderr: String,
    pub exit_ok: bool,
    pub duration_ms: u64,
    pub script_path: PathBuf,
}

impl SuiteRun {
    /// The fatal error, if the script died outside a test
    pub fn fatal(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            ScriptEvent::Fatal { error } => Some(error.as_str()),
            _ => None,
        })
    }
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,

    /// Directory relative paths in steps are resolved against
    work_dir: PathBuf,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        Self::unchecked(config)
    }

    /// Create a handle without probing for a Playwright install.
    ///
    /// Script generation does not need Node; only [`Self::run_suite`] does.
    pub fn unchecked(config: PlaywrightConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(config.scripts_dir())?;
        std::fs::create_dir_all(config.screenshots_dir())?;
        let work_dir = std::env::current_dir()?;
        Ok(Self { config, work_dir })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    fn absolute(&self, path: &str) -> String {
        let p = Path::new(path);
        if p.is_absolute() {
            path.to_string()
        } else {
            self.work_dir.join(p).to_string_lossy().to_string()
        }
    }

    /// Build the Node script for one suite
    pub fn build_script(&self, req: &ScriptRequest<'_>) -> String {
        let viewport = req.viewport.unwrap_or(Viewport {
            width: self.config.viewport_width,
            height: self.config.viewport_height,
        });
        let state_path = self.absolute(&self.config.storage_state_path.to_string_lossy());
        let mut script = String::new();

        // Header
        script.push_str(&format!(
            r#"// Generated by coopsuite for suite {suite_comment}
const {{ chromium, firefox, webkit, expect }} = require('@playwright/test');
const fs = require('fs');

const SUITE = {suite};
const TIMEOUT = {timeout};
const STATE_PATH = {state_path};
const emit = (event) => console.log({prefix} + JSON.stringify(event));
const message = (error) => String((error && error.message) || error);

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const contextOptions = {{
    baseURL: {base_url},
    viewport: {{ width: {width}, height: {height} }},
  }};
  if ({load_state} && fs.existsSync(STATE_PATH)) {{
    contextOptions.storageState = STATE_PATH;
  }}
  const context = await browser.newContext(contextOptions);
  context.setDefaultTimeout(TIMEOUT);
  const page = await context.newPage();
  emit({{ event: 'suite_started', suite: SUITE }});
"#,
            suite_comment = req.suite.replace('\n', " "),
            suite = js(req.suite),
            timeout = self.config.default_timeout_ms,
            state_path = js(&state_path),
            prefix = js(EVENT_PREFIX),
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            base_url = js(self.config.base_url.trim_end_matches('/')),
            width = viewport.width,
            height = viewport.height,
            load_state = req.load_auth_state,
        ));

        // Mock routes
        for route in req.routes {
            script.push_str(&route_to_js(route));
        }

        // Tests run serially; the first failure skips the rest
        script.push_str("\n  let failed = null;\n");
        for (i, test) in req.tests.iter().enumerate() {
            script.push_str(&self.test_to_js(req.suite, test, i));
        }

        // Footer
        script.push_str(&format!(
            r#"
  if (failed === null && {save_state}) {{
    fs.mkdirSync(require('path').dirname(STATE_PATH), {{ recursive: true }});
    await context.storageState({{ path: STATE_PATH }});
    emit({{ event: 'auth_state_saved', path: STATE_PATH }});
  }}
  await browser.close();
  process.exit(failed === null ? 0 : 1);
}})().catch((error) => {{
  emit({{ event: 'fatal', error: String((error && error.stack) || error) }});
  process.exit(2);
}});
"#,
            save_state = req.save_auth_state,
        ));

        script
    }

    fn test_to_js(&self, suite: &str, test: &TestCase, index: usize) -> String {
        let name = js(&test.name);
        let screenshot = self
            .absolute(&self.config.screenshots_dir().to_string_lossy())
            + &format!("/{}-{:02}.png", slug(suite), index + 1);

        let mut body = String::new();
        for (i, step) in test.steps.iter().enumerate() {
            body.push_str(&format!(
                "\n      // Step {}: {}\n      step = {};\n",
                i + 1,
                step.label().replace('\n', " "),
                js(&step.label())
            ));
            body.push_str(&self.step_to_js(step, &name));
            body.push('\n');
        }

        format!(
            r#"
  // Test {number}: {comment}
  if (failed === null) {{
    const started = Date.now();
    let step = null;
    emit({{ event: 'test_started', test: {name} }});
    try {{{body}
      emit({{ event: 'test_passed', test: {name}, duration_ms: Date.now() - started }});
    }} catch (error) {{
      failed = {name};
      const screenshot = {screenshot};
      const saved = await page.screenshot({{ path: screenshot, fullPage: true }}).then(() => true, () => false);
      emit({{
        event: 'test_failed',
        test: {name},
        step,
        error: message(error),
        duration_ms: Date.now() - started,
        screenshot: saved ? screenshot : null,
      }});
    }}
  }} else {{
    emit({{ event: 'test_skipped', test: {name}, reason: 'previous test failed: ' + failed }});
  }}
"#,
            number = index + 1,
            comment = test.name.replace('\n', " "),
            name = name,
            body = body,
            screenshot = js(&screenshot),
        )
    }

    /// Convert a step to JavaScript code
    fn step_to_js(&self, step: &TestStep, test_name: &str) -> String {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                let wait = wait_for_selector
                    .as_ref()
                    .map(|s| format!("\n      await page.locator({}).first().waitFor();", js(s)))
                    .unwrap_or_default();
                format!("      await page.goto({});{}", js(url), wait)
            }
            TestStep::Click { selector, timeout_ms } => {
                let timeout = timeout_ms
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "TIMEOUT".to_string());
                format!(
                    "      await page.locator({}).click({{ timeout: {} }});",
                    js(selector),
                    timeout
                )
            }
            TestStep::ClickRole { role, name, exact } => format!(
                "      await page.getByRole({}, {{ name: {}, exact: {} }}).click();",
                js(role),
                js(name),
                exact
            ),
            TestStep::Fill { selector, value, clear_first } => {
                let clear = if *clear_first {
                    format!("      await page.locator({}).clear();\n", js(selector))
                } else {
                    String::new()
                };
                format!(
                    "{}      await page.locator({}).fill({});",
                    clear,
                    js(selector),
                    js(value)
                )
            }
            TestStep::Select { selector, value, by_label } => {
                let option = if *by_label {
                    format!("{{ label: {} }}", js(value))
                } else {
                    js(value)
                };
                format!("      await page.locator({}).selectOption({});", js(selector), option)
            }
            TestStep::Check { selector } => {
                format!("      await page.locator({}).check();", js(selector))
            }
            TestStep::Uncheck { selector } => {
                format!("      await page.locator({}).uncheck();", js(selector))
            }
            TestStep::Press { selector, key } => match selector {
                Some(sel) => format!("      await page.locator({}).press({});", js(sel), js(key)),
                None => format!("      await page.keyboard.press({});", js(key)),
            },
            TestStep::Wait { selector, timeout_ms, state } => {
                let timeout = timeout_ms
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "TIMEOUT".to_string());
                format!(
                    "      await page.locator({}).first().waitFor({{ state: '{}', timeout: {} }});",
                    js(selector),
                    state.as_str(),
                    timeout
                )
            }
            TestStep::ExpectText { text, exact } => format!(
                "      await expect(page.getByText({}, {{ exact: {} }}).first()).toBeVisible({{ timeout: TIMEOUT }});",
                js(text),
                exact
            ),
            TestStep::Assert { selector, visible, enabled, text, text_contains, value, count } => {
                let target = format!("page.locator({})", js(selector));
                let mut assertions = Vec::new();

                if let Some(vis) = visible {
                    let matcher = if *vis { "toBeVisible" } else { "toBeHidden" };
                    assertions.push(format!(
                        "      await expect({}.first()).{}({{ timeout: TIMEOUT }});",
                        target, matcher
                    ));
                }
                if let Some(en) = enabled {
                    let matcher = if *en { "toBeEnabled" } else { "toBeDisabled" };
                    assertions.push(format!(
                        "      await expect({}.first()).{}({{ timeout: TIMEOUT }});",
                        target, matcher
                    ));
                }
                if let Some(t) = text {
                    assertions.push(format!(
                        "      await expect({}.first()).toHaveText({}, {{ timeout: TIMEOUT }});",
                        target,
                        js(t)
                    ));
                }
                if let Some(tc) = text_contains {
                    assertions.push(format!(
                        "      await expect({}.first()).toContainText({}, {{ timeout: TIMEOUT }});",
                        target,
                        js(tc)
                    ));
                }
                if let Some(v) = value {
                    assertions.push(format!(
                        "      await expect({}.first()).toHaveValue({}, {{ timeout: TIMEOUT }});",
                        target,
                        js(v)
                    ));
                }
                if let Some(c) = count {
                    assertions.push(format!(
                        "      await expect({}).toHaveCount({}, {{ timeout: TIMEOUT }});",
                        target, c
                    ));
                }

                assertions.join("\n")
            }
            TestStep::Capture { key, selector, source, pattern } => {
                let key_js = js(key.as_str());
                let read = match source {
                    CaptureSource::Text => "await el.innerText()".to_string(),
                    CaptureSource::Value => "await el.inputValue()".to_string(),
                    CaptureSource::Attribute(attr) => format!("await el.getAttribute({})", js(attr)),
                };
                let extract = pattern
                    .as_ref()
                    .map(|p| {
                        format!(
                            r#"
        const match = raw.match(new RegExp({pattern}));
        if (!match) throw new Error('capture ' + {key} + ': ' + {pattern} + ' did not match ' + JSON.stringify(raw));
        raw = (match[1] ?? match[0]).trim();"#,
                            pattern = js(p),
                            key = key_js
                        )
                    })
                    .unwrap_or_default();
                format!(
                    r#"      {{
        const el = page.locator({selector}).first();
        await el.waitFor();
        let raw = String(({read}) ?? '').trim();{extract}
        if (!raw) throw new Error('capture ' + {key} + ': empty value');
        emit({{ event: 'capture', test: {test}, key: {key}, value: raw }});
      }}"#,
                    selector = js(selector),
                    read = read,
                    extract = extract,
                    key = key_js,
                    test = test_name,
                )
            }
            TestStep::Persist { key, value } => format!(
                "      emit({{ event: 'capture', test: {}, key: {}, value: {} }});",
                test_name,
                js(key.as_str()),
                js(value)
            ),
            TestStep::Upload { selector, file, via_chooser } => {
                let file = js(&self.absolute(file));
                if *via_chooser {
                    format!(
                        r#"      {{
        const [chooser] = await Promise.all([
          page.waitForEvent('filechooser'),
          page.locator({}).click(),
        ]);
        await chooser.setFiles({});
      }}"#,
                        js(selector),
                        file
                    )
                } else {
                    format!("      await page.locator({}).setInputFiles({});", js(selector), file)
                }
            }
            TestStep::Popup { selector, url_contains, text } => {
                let url_check = url_contains
                    .as_ref()
                    .map(|u| {
                        format!(
                            "\n        if (!popup.url().includes({u})) throw new Error('popup url ' + popup.url() + ' does not contain ' + {u});",
                            u = js(u)
                        )
                    })
                    .unwrap_or_default();
                let text_check = text
                    .as_ref()
                    .map(|t| {
                        format!(
                            "\n        await expect(popup.getByText({}).first()).toBeVisible({{ timeout: TIMEOUT }});",
                            js(t)
                        )
                    })
                    .unwrap_or_default();
                format!(
                    r#"      {{
        const [popup] = await Promise.all([
          context.waitForEvent('page'),
          page.locator({selector}).click(),
        ]);
        await popup.waitForLoadState();{url_check}{text_check}
        await popup.close();
      }}"#,
                    selector = js(selector),
                    url_check = url_check,
                    text_check = text_check,
                )
            }
            TestStep::Sleep { ms } => format!("      await page.waitForTimeout({});", ms),
            TestStep::Log { message } => {
                format!("      emit({{ event: 'log', message: {} }});", js(message))
            }
        }
    }

    /// Write the script under the output directory and run it with Node.
    ///
    /// The script lives inside the project tree so `require` finds the
    /// project's `node_modules`.
    pub async fn run_suite(&self, req: &ScriptRequest<'_>) -> E2eResult<SuiteRun> {
        let script = self.build_script(req);
        let script_path = self
            .config
            .scripts_dir()
            .join(format!("{}.cjs", slug(req.suite)));
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script: {}", script_path.display());
        let start = Instant::now();

        let mut child = TokioCommand::new(&self.config.node_binary)
            .arg(&script_path)
            .current_dir(&self.work_dir)
            .env("NODE_PATH", self.work_dir.join("node_modules"))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!("failed to spawn {}: {}", self.config.node_binary, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("script stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| E2eError::Playwright("script stderr not captured".to_string()))?;

        // Node may print partial UTF-8 when it dies mid-write
        let stderr_task = tokio::spawn(async move {
            let mut bytes = Vec::new();
            if let Err(e) = BufReader::new(stderr).read_to_end(&mut bytes).await {
                debug!("Reading script stderr failed after {} bytes: {}", bytes.len(), e);
            }
            String::from_utf8_lossy(&bytes).into_owned()
        });

        let mut events = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_event_line(&line) {
                Some(Ok(event)) => {
                    log_event(&event);
                    events.push(event);
                }
                Some(Err(e)) => warn!("Unparseable event line ({}): {}", e, line),
                None => debug!("[node] {}", line),
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !stderr.trim().is_empty() {
            debug!("[node stderr] {}", stderr.trim());
        }

        Ok(SuiteRun {
            events,
            stderr,
            exit_ok: status.success(),
            duration_ms: start.elapsed().as_millis() as u64,
            script_path,
        })
    }
}

fn log_event(event: &ScriptEvent) {
    match event {
        ScriptEvent::SuiteStarted { suite } => debug!("Browser ready for suite {}", suite),
        ScriptEvent::TestStarted { test } => debug!("→ {}", test),
        ScriptEvent::TestPassed { test, duration_ms } => info!("  ✓ {} ({} ms)", test, duration_ms),
        ScriptEvent::TestFailed { test, step, error, .. } => error!(
            "  ✗ {} at {} - {}",
            test,
            step.as_deref().unwrap_or("setup"),
            error
        ),
        ScriptEvent::TestSkipped { test, reason } => warn!("  - {} skipped ({})", test, reason),
        ScriptEvent::Capture { key, value, .. } => debug!("  captured {} = {}", key, value),
        ScriptEvent::AuthStateSaved { path } => info!("Login state saved to {}", path.display()),
        ScriptEvent::Log { message } => info!("[TEST LOG] {}", message),
        ScriptEvent::Fatal { error } => error!("Script failed: {}", error),
    }
}

/// Mock routes are registered on the context so popups inherit them.
fn route_to_js(route: &RouteBinding) -> String {
    let method_guard = route
        .method
        .as_ref()
        .map(|m| {
            format!(
                "\n    if (route.request().method() !== {}) return route.fallback();",
                js(&m.to_ascii_uppercase())
            )
        })
        .unwrap_or_default();
    format!(
        r#"  await context.route({glob}, async (route) => {{{guard}
    const response = await route.fetch({{ url: {target} }});
    await route.fulfill({{ response }});
  }});
"#,
        glob = js(&route.url_glob),
        guard = method_guard,
        target = js(&route.target_url),
    )
}

/// JSON string encoding doubles as a safe JavaScript string literal.
fn js(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn slug(s: &str) -> String {
    let slug: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "suite".to_string()
    } else {
        slug
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub storage_state_path: PathBuf,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,
    pub default_timeout_ms: u64,
    pub node_binary: String,
}

impl PlaywrightConfig {
    pub fn scripts_dir(&self) -> PathBuf {
        self.output_dir.join("scripts")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4200".to_string(),
            output_dir: PathBuf::from("test-results"),
            storage_state_path: PathBuf::from("test-results/.auth/state.json"),
            viewport_width: 1366,
            viewport_height: 768,
            browser: Browser::Chromium,
            headless: true,
            default_timeout_ms: 30_000,
            node_binary: "node".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::WaitState;
    use test_case::test_case;

    fn handle(dir: &Path) -> PlaywrightHandle {
        PlaywrightHandle::unchecked(PlaywrightConfig {
            output_dir: dir.to_path_buf(),
            storage_state_path: dir.join(".auth/state.json"),
            ..Default::default()
        })
        .unwrap()
    }

    fn case(steps: Vec<TestStep>) -> Vec<TestCase> {
        vec![TestCase { name: "registrar socio".into(), steps }]
    }

    #[test]
    fn test_parse_event_lines() {
        let line = r#"@@coopsuite {"event":"capture","test":"t","key":"persona_id","value":"77"}"#;
        let event = parse_event_line(line).unwrap().unwrap();
        assert_eq!(
            event,
            ScriptEvent::Capture {
                test: "t".into(),
                key: FixtureKey::PersonaId,
                value: "77".into()
            }
        );

        assert!(parse_event_line("plain console output").is_none());
        assert!(parse_event_line("@@coopsuite {not json").unwrap().is_err());
    }

    #[test]
    fn test_failed_event_defaults() {
        let line = r#"@@coopsuite {"event":"test_failed","test":"t","error":"boom","duration_ms":5}"#;
        match parse_event_line(line).unwrap().unwrap() {
            ScriptEvent::TestFailed { step, screenshot, .. } => {
                assert!(step.is_none());
                assert!(screenshot.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_script_escapes_literals() {
        let dir = tempfile::tempdir().unwrap();
        let pw = handle(dir.path());
        let tests = case(vec![TestStep::Fill {
            selector: "input[name='nombre']".into(),
            value: "O'Neil \"Jr\"\n".into(),
            clear_first: true,
        }]);
        let script = pw.build_script(&ScriptRequest {
            suite: "registro",
            tests: &tests,
            viewport: None,
            load_auth_state: true,
            save_auth_state: false,
            routes: &[],
        });

        assert!(script.contains(r#"page.locator("input[name='nombre']").clear();"#));
        assert!(script.contains(r#".fill("O'Neil \"Jr\"\n");"#));
        assert!(script.contains("width: 1366, height: 768"));
        assert!(script.contains("if (true && fs.existsSync(STATE_PATH))"));
        assert!(script.contains("if (failed === null && false)"));
    }

    #[test]
    fn test_script_serial_structure() {
        let dir = tempfile::tempdir().unwrap();
        let pw = handle(dir.path());
        let tests = vec![
            TestCase {
                name: "uno".into(),
                steps: vec![TestStep::Navigate { url: "/personas".into(), wait_for_selector: None }],
            },
            TestCase {
                name: "dos".into(),
                steps: vec![TestStep::Wait {
                    selector: "#tabla".into(),
                    timeout_ms: None,
                    state: WaitState::Hidden,
                }],
            },
        ];
        let script = pw.build_script(&ScriptRequest {
            suite: "s",
            tests: &tests,
            viewport: Some(Viewport { width: 800, height: 600 }),
            load_auth_state: false,
            save_auth_state: true,
            routes: &[],
        });

        assert_eq!(script.matches("if (failed === null) {").count(), 2);
        assert_eq!(script.matches("event: 'test_skipped'").count(), 2);
        assert!(script.contains("await page.goto(\"/personas\");"));
        assert!(script.contains("waitFor({ state: 'hidden', timeout: TIMEOUT })"));
        assert!(script.contains("width: 800, height: 600"));
        assert!(script.contains("await context.storageState({ path: STATE_PATH });"));
    }

    #[test]
    fn test_capture_and_persist_emit_events() {
        let dir = tempfile::tempdir().unwrap();
        let pw = handle(dir.path());
        let tests = case(vec![
            TestStep::Capture {
                key: FixtureKey::SolicitudCredito,
                selector: ".alert-success".into(),
                source: CaptureSource::Text,
                pattern: Some(r"No\. (\d+)".into()),
            },
            TestStep::Persist { key: FixtureKey::PersonaCedula, value: "40212345678".into() },
        ]);
        let script = pw.build_script(&ScriptRequest {
            suite: "credito",
            tests: &tests,
            viewport: None,
            load_auth_state: true,
            save_auth_state: false,
            routes: &[],
        });

        assert!(script.contains(r#"new RegExp("No\\. (\\d+)")"#));
        assert!(script.contains(r#"key: "solicitud_credito", value: raw"#));
        assert!(script.contains(r#"key: "persona_cedula", value: "40212345678""#));
    }

    #[test]
    fn test_routes_and_popups() {
        let dir = tempfile::tempdir().unwrap();
        let pw = handle(dir.path());
        let routes = vec![RouteBinding {
            url_glob: "**/api/buro/**".into(),
            method: Some("post".into()),
            target_url: "http://127.0.0.1:9999/__mock/buro/0".into(),
        }];
        let tests = case(vec![TestStep::Popup {
            selector: "#imprimir".into(),
            url_contains: Some("reporte".into()),
            text: None,
        }]);
        let script = pw.build_script(&ScriptRequest {
            suite: "reportes",
            tests: &tests,
            viewport: None,
            load_auth_state: true,
            save_auth_state: false,
            routes: &routes,
        });

        assert!(script.contains(r#"await context.route("**/api/buro/**""#));
        assert!(script.contains(r#"route.request().method() !== "POST""#));
        assert!(script.contains("context.waitForEvent('page')"));
        assert!(script.contains(r#"popup.url().includes("reporte")"#));
    }

    #[test]
    fn test_upload_paths_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let pw = handle(dir.path());
        let js_code = pw.step_to_js(
            &TestStep::Upload {
                selector: "#documento".into(),
                file: "fixtures/cedula.png".into(),
                via_chooser: true,
            },
            "\"t\"",
        );
        assert!(js_code.contains("page.waitForEvent('filechooser')"));
        let cwd = std::env::current_dir().unwrap();
        assert!(js_code.contains(&*cwd.join("fixtures/cedula.png").to_string_lossy()));
    }

    #[test_case("chromium", Browser::Chromium)]
    #[test_case("Chrome", Browser::Chromium)]
    #[test_case("Firefox", Browser::Firefox)]
    #[test_case("safari", Browser::Webkit)]
    fn test_browser_from_str(input: &str, expected: Browser) {
        assert_eq!(input.parse::<Browser>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_browser_rejected() {
        assert!(matches!("lynx".parse::<Browser>(), Err(E2eError::InvalidConfig(_))));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Registro Persona (física)"), "registro-persona--f-sica");
        assert_eq!(slug("***"), "suite");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_suite_keeps_undecodable_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("node-stub.sh");
        std::fs::write(
            &stub,
            "#!/bin/sh\n\
             echo '@@coopsuite {\"event\":\"test_passed\",\"test\":\"t\",\"duration_ms\":1}'\n\
             printf 'Error: cann\\303 at page.goto\\n' >&2\n",
        )
        .unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let handle = PlaywrightHandle::unchecked(PlaywrightConfig {
            output_dir: dir.path().join("out"),
            storage_state_path: dir.path().join(".auth/state.json"),
            node_binary: stub.to_string_lossy().into_owned(),
            ..Default::default()
        })
        .unwrap();
        let tests = vec![TestCase { name: "t".into(), steps: vec![] }];
        let run = handle
            .run_suite(&ScriptRequest {
                suite: "s",
                tests: &tests,
                viewport: None,
                load_auth_state: false,
                save_auth_state: false,
                routes: &[],
            })
            .await
            .unwrap();

        assert!(run.exit_ok);
        assert_eq!(run.events.len(), 1);
        assert!(run.stderr.contains("cann\u{FFFD} at page.goto"), "{:?}", run.stderr);
    }
}
