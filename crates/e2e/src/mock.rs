//! Mock scenarios for backend responses
//!
//! Some UI branches (a flagged credit-bureau report, a member on the
//! blacklist, a loan parked at committee) only appear for data the test
//! deployment rarely has. A suite names the scenarios it wants; the runner
//! serves their typed response bodies from a local axum server and the
//! generated script routes the matching application URLs to it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{oneshot, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// One intercepted application endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockRoute {
    /// Playwright URL glob, e.g. `**/api/buro-credito/**`
    pub url_glob: String,
    /// Only intercept this HTTP method (any when absent)
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default = "default_status")]
    pub status: u16,
    pub body: serde_json::Value,
}

fn default_status() -> u16 {
    200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub routes: Vec<MockRoute>,
}

/// Where the script should send an intercepted request
#[derive(Debug, Clone, PartialEq)]
pub struct RouteBinding {
    pub url_glob: String,
    pub method: Option<String>,
    pub target_url: String,
}

// ============================================================================
// Typed response fixtures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BureauStatus {
    SinAlertas,
    ConAlertas,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BureauDebt {
    pub entidad: String,
    pub balance: f64,
    pub dias_atraso: u32,
}

/// Credit bureau lookup the loan wizard performs on the applicant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BureauReport {
    pub estado: BureauStatus,
    pub puntuacion: u16,
    pub deudas: Vec<BureauDebt>,
}

impl BureauReport {
    pub fn clean() -> Self {
        Self {
            estado: BureauStatus::SinAlertas,
            puntuacion: 780,
            deudas: Vec::new(),
        }
    }

    pub fn flagged() -> Self {
        Self {
            estado: BureauStatus::ConAlertas,
            puntuacion: 410,
            deudas: vec![BureauDebt {
                entidad: "Banco Comercial".to_string(),
                balance: 185_000.0,
                dias_atraso: 120,
            }],
        }
    }
}

/// Stages a loan application moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStage {
    Solicitada,
    EnAnalisis,
    PendienteComite,
    Aprobada,
    Rechazada,
    Desembolsada,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStatus {
    pub etapa: LoanStage,
    pub comentario: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistCheck {
    pub encontrado: bool,
    pub motivo: Option<String>,
}

fn route<T: Serialize>(url_glob: &str, method: Option<&str>, body: &T) -> E2eResult<MockRoute> {
    Ok(MockRoute {
        url_glob: url_glob.to_string(),
        method: method.map(str::to_string),
        status: 200,
        body: serde_json::to_value(body)?,
    })
}

const BUREAU_GLOB: &str = "**/api/buro-credito/**";
const LOAN_STATUS_GLOB: &str = "**/api/solicitudes-credito/*/estado";
const BLACKLIST_GLOB: &str = "**/api/lista-negra/**";

/// Scenarios known to every run
pub fn builtin_scenarios() -> E2eResult<Vec<MockScenario>> {
    Ok(vec![
        MockScenario {
            name: "credit_bureau_clean".to_string(),
            description: "Applicant has no bureau alerts".to_string(),
            routes: vec![route(BUREAU_GLOB, Some("GET"), &BureauReport::clean())?],
        },
        MockScenario {
            name: "credit_bureau_flagged".to_string(),
            description: "Applicant has a delinquent debt at another institution".to_string(),
            routes: vec![route(BUREAU_GLOB, Some("GET"), &BureauReport::flagged())?],
        },
        MockScenario {
            name: "loan_pending_committee".to_string(),
            description: "Loan application waits for credit committee".to_string(),
            routes: vec![route(
                LOAN_STATUS_GLOB,
                Some("GET"),
                &LoanStatus {
                    etapa: LoanStage::PendienteComite,
                    comentario: Some("Monto excede la facultad del oficial".to_string()),
                },
            )?],
        },
        MockScenario {
            name: "blacklist_hit".to_string(),
            description: "Persona appears on the internal blacklist".to_string(),
            routes: vec![route(
                BLACKLIST_GLOB,
                None,
                &BlacklistCheck {
                    encontrado: true,
                    motivo: Some("Reportado por fraude".to_string()),
                },
            )?],
        },
    ])
}

/// Named scenarios available to suites
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: HashMap<String, MockScenario>,
}

impl ScenarioCatalog {
    pub fn builtin() -> E2eResult<Self> {
        let mut catalog = Self::default();
        for scenario in builtin_scenarios()? {
            catalog.insert(scenario);
        }
        Ok(catalog)
    }

    /// Builtins plus every YAML scenario under `dir`; files override builtins.
    pub fn load(dir: &Path) -> E2eResult<Self> {
        let mut catalog = Self::builtin()?;
        if !dir.is_dir() {
            return Ok(catalog);
        }

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let content = std::fs::read_to_string(entry.path())?;
            let scenario: MockScenario = serde_yaml::from_str(&content).map_err(|e| {
                E2eError::SpecParse(format!("{}: {}", entry.path().display(), e))
            })?;
            debug!("Loaded mock scenario '{}' from {}", scenario.name, entry.path().display());
            catalog.insert(scenario);
        }

        Ok(catalog)
    }

    pub fn insert(&mut self, scenario: MockScenario) {
        if self.scenarios.contains_key(&scenario.name) {
            debug!("Mock scenario '{}' overridden", scenario.name);
        }
        self.scenarios.insert(scenario.name.clone(), scenario);
    }

    pub fn get(&self, name: &str) -> E2eResult<&MockScenario> {
        self.scenarios
            .get(name)
            .ok_or_else(|| E2eError::UnknownScenario(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.scenarios.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// Server
// ============================================================================

struct MockState {
    scenarios: HashMap<String, MockScenario>,
    hits: RwLock<HashMap<String, usize>>,
}

/// Local HTTP server answering for the scenarios of one suite
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Bind on localhost (`port` 0 picks a free one) and start serving.
    pub async fn spawn(scenarios: Vec<MockScenario>, port: u16) -> E2eResult<Self> {
        let state = Arc::new(MockState {
            scenarios: scenarios.into_iter().map(|s| (s.name.clone(), s)).collect(),
            hits: RwLock::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/__mock/health", get(|| async { "ok" }))
            .route("/__mock/:scenario/:index", any(serve_route))
            .layer(TraceLayer::new_for_http())
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| E2eError::MockServer(format!("bind 127.0.0.1:{}: {}", port, e)))?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                warn!("Mock server stopped with error: {}", e);
            }
        });

        info!("Mock server listening on http://{}", addr);
        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Route bindings for every scenario this server holds
    pub fn bindings(&self) -> Vec<RouteBinding> {
        let mut names: Vec<_> = self.state.scenarios.keys().collect();
        names.sort_unstable();

        names
            .into_iter()
            .filter_map(|name| self.state.scenarios.get(name))
            .flat_map(|scenario| {
                scenario.routes.iter().enumerate().map(move |(i, r)| RouteBinding {
                    url_glob: r.url_glob.clone(),
                    method: r.method.clone(),
                    target_url: format!("{}/__mock/{}/{}", self.base_url(), scenario.name, i),
                })
            })
            .collect()
    }

    /// Requests served per scenario so far
    pub async fn hits(&self) -> HashMap<String, usize> {
        self.state.hits.read().await.clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
            debug!("Mock server on {} stopped", self.addr);
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve_route(
    State(state): State<Arc<MockState>>,
    UrlPath((scenario, index)): UrlPath<(String, usize)>,
    method: Method,
) -> Response {
    let Some(route) = state.scenarios.get(&scenario).and_then(|s| s.routes.get(index)) else {
        warn!("No mock route {}/{}", scenario, index);
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no mock route {}/{}", scenario, index) })),
        )
            .into_response();
    };

    debug!("Mock {} {}/{} -> {}", method, scenario, index, route.status);
    *state.hits.write().await.entry(scenario.clone()).or_insert(0) += 1;

    let status = StatusCode::from_u16(route.status).unwrap_or(StatusCode::OK);
    (status, Json(route.body.clone())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = ScenarioCatalog::builtin().unwrap();
        assert_eq!(
            catalog.names(),
            vec![
                "blacklist_hit",
                "credit_bureau_clean",
                "credit_bureau_flagged",
                "loan_pending_committee"
            ]
        );
        let flagged = catalog.get("credit_bureau_flagged").unwrap();
        assert_eq!(flagged.routes[0].body["estado"], "CON_ALERTAS");
        assert_eq!(flagged.routes[0].body["deudas"][0]["diasAtraso"], 120);
        assert!(matches!(catalog.get("nope"), Err(E2eError::UnknownScenario(_))));
    }

    #[test]
    fn test_yaml_scenarios_override_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("buro.yaml"),
            r#"
name: credit_bureau_clean
routes:
  - url_glob: "**/api/v2/buro/**"
    body: { estado: SIN_ALERTAS, puntuacion: 800, deudas: [] }
"#,
        )
        .unwrap();

        let catalog = ScenarioCatalog::load(dir.path()).unwrap();
        let clean = catalog.get("credit_bureau_clean").unwrap();
        assert_eq!(clean.routes[0].url_glob, "**/api/v2/buro/**");
        assert_eq!(clean.routes[0].status, 200);
        assert!(clean.routes[0].method.is_none());
        assert_eq!(catalog.names().len(), 4);
    }

    #[test]
    fn test_typed_bodies_round_trip() {
        let status = LoanStatus { etapa: LoanStage::PendienteComite, comentario: None };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["etapa"], "PENDIENTE_COMITE");
        let back: LoanStatus = serde_json::from_value(value).unwrap();
        assert_eq!(back, status);
    }
}
