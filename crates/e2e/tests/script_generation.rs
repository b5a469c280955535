//! Script generation tests for a complete shipped suite, with mocks bound

use std::path::Path;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;

use coopsuite_common::{DateContext, FixtureKey, FixtureSet};
use coopsuite_e2e::playwright::ScriptRequest;
use coopsuite_e2e::template::{SuiteData, TemplateContext};
use coopsuite_e2e::{MockServer, PlaywrightConfig, PlaywrightHandle, ScenarioCatalog, SuiteConfig, SuiteSpec};

#[tokio::test]
async fn loan_suite_script_routes_bureau_to_mock() {
    let spec = SuiteSpec::from_file(
        &Path::new(env!("CARGO_MANIFEST_DIR")).join("specs/05_solicitud_credito.yaml"),
    )
    .unwrap();

    let mut fixtures = FixtureSet::default();
    fixtures.set(FixtureKey::PersonaCedula, "40212345678");
    fixtures.set(FixtureKey::CuentaAhorros, "1002003");

    let config = SuiteConfig {
        base_url: "https://qa.coop.example.do/".into(),
        ..Default::default()
    };
    let dates = DateContext::fixed(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    let mut rng = StdRng::seed_from_u64(5);
    let data = SuiteData::generate_with(&mut rng);
    let tests = TemplateContext {
        suite: &spec.name,
        data: &data,
        dates: &dates,
        config: &config,
        fixtures: &fixtures,
    }
    .resolve_suite(&spec, &mut rng)
    .unwrap();

    let catalog = ScenarioCatalog::builtin().unwrap();
    let scenarios = spec
        .mocks
        .iter()
        .map(|n| catalog.get(n).unwrap().clone())
        .collect();
    let server = MockServer::spawn(scenarios, 0).await.unwrap();
    let routes = server.bindings();

    let out = tempfile::tempdir().unwrap();
    let pw = PlaywrightHandle::unchecked(PlaywrightConfig {
        output_dir: out.path().to_path_buf(),
        ..config.playwright_config()
    })
    .unwrap();
    let script = pw.build_script(&ScriptRequest {
        suite: &spec.name,
        tests: &tests,
        viewport: spec.viewport,
        load_auth_state: spec.use_auth_state,
        save_auth_state: spec.save_auth_state,
        routes: &routes,
    });

    assert!(script.contains("baseURL: \"https://qa.coop.example.do\""));
    assert!(script.contains("await context.route(\"**/api/buro-credito/**\""));
    assert!(script.contains(&format!("{}/__mock/credit_bureau_clean/0", server.base_url())));
    // Jan 31 + one month clamps to the end of February
    assert!(script.contains("\"29/02/2024\""));
    assert!(script.contains("\"31/01/2024\""));
    assert!(script.contains("\"40212345678\""));
    assert_eq!(script.matches("emit({ event: 'test_started'").count(), tests.len());
    assert!(out.path().join("scripts").is_dir());
}
