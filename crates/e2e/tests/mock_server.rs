//! Mock scenario server tests over real HTTP

use coopsuite_e2e::mock::{BureauReport, BureauStatus, LoanStage, LoanStatus};
use coopsuite_e2e::{MockServer, ScenarioCatalog};

async fn spawn(names: &[&str]) -> MockServer {
    let catalog = ScenarioCatalog::builtin().unwrap();
    let scenarios = names
        .iter()
        .map(|n| catalog.get(n).unwrap().clone())
        .collect();
    MockServer::spawn(scenarios, 0).await.unwrap()
}

#[tokio::test]
async fn serves_typed_bureau_report() {
    let server = spawn(&["credit_bureau_flagged"]).await;
    let bindings = server.bindings();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].url_glob, "**/api/buro-credito/**");
    assert_eq!(bindings[0].method.as_deref(), Some("GET"));

    let report: BureauReport = reqwest::get(&bindings[0].target_url)
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report.estado, BureauStatus::ConAlertas);
    assert_eq!(report, BureauReport::flagged());

    let hits = server.hits().await;
    assert_eq!(hits.get("credit_bureau_flagged"), Some(&1));
}

#[tokio::test]
async fn any_method_is_served() {
    let server = spawn(&["blacklist_hit", "loan_pending_committee"]).await;
    let client = reqwest::Client::new();

    let loan = server
        .bindings()
        .into_iter()
        .find(|b| b.target_url.contains("loan_pending_committee"))
        .unwrap();
    let status: LoanStatus = client
        .post(&loan.target_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.etapa, LoanStage::PendienteComite);

    let hits = server.hits().await;
    assert_eq!(hits.get("loan_pending_committee"), Some(&1));
    assert_eq!(hits.get("blacklist_hit"), None);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let server = spawn(&["credit_bureau_clean"]).await;
    let resp = reqwest::get(format!("{}/__mock/credit_bureau_clean/7", server.base_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let health = reqwest::get(format!("{}/__mock/health", server.base_url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(health, "ok");
}

#[tokio::test]
async fn stop_closes_the_listener() {
    let mut server = spawn(&["credit_bureau_clean"]).await;
    let url = format!("{}/__mock/health", server.base_url());
    assert!(reqwest::get(&url).await.is_ok());

    server.stop();
    // Graceful shutdown completes once in-flight connections drain
    let mut closed = false;
    for _ in 0..20 {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let client = reqwest::Client::builder().pool_max_idle_per_host(0).build().unwrap();
        if client.get(&url).send().await.is_err() {
            closed = true;
            break;
        }
    }
    assert!(closed);
}
