//! Coopsuite E2E Test Framework
//!
//! Browser-level regression suites for the cooperative management web
//! application. The crate:
//! - Parses declarative YAML suites, one per business stage
//! - Resolves `{{ ns.key }}` placeholders against generated sample data,
//!   relative dates, configuration and fixtures of earlier stages
//! - Generates and runs one Playwright Node script per suite
//! - Serves typed mock scenarios for backend answers the test deployment
//!   cannot produce on demand
//! - Persists the cross-stage run state between suites and invocations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── plan(specs) -> stage order (producers first)         │
//! │    ├── TargetApp::wait_until_reachable()                    │
//! │    ├── TemplateContext::resolve_suite() -> [TestCase]       │
//! │    ├── MockServer::spawn(scenarios) -> [RouteBinding]       │
//! │    ├── PlaywrightHandle::run_suite() -> [ScriptEvent]       │
//! │    └── evaluate() -> SuiteResult + captured fixtures        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteSpec (YAML)                                           │
//! │    ├── name, tags, requires, produces, mocks                │
//! │    └── tests: [TestCase { name, steps: [TestStep] }]        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunState (JSON, coopsuite-common)                          │
//! │    └── typed fixtures + completed stages                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod playwright;
pub mod runner;
pub mod spec;
pub mod target;
pub mod template;

pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult};
pub use mock::{MockScenario, MockServer, ScenarioCatalog};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightHandle, ScriptEvent};
pub use runner::{plan, Status, SuiteResult, TestRunner, TestSuiteResult};
pub use spec::{SuiteSpec, TestCase, TestStep};
