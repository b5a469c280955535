//! Typed fixtures handed from one suite stage to the next
//!
//! A stage that registers a persona or opens an account records what it
//! created here; later stages declare which keys they need and read them
//! back. The set of keys is closed: adding a new hand-off means adding a
//! variant, not inventing a string.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Every value a stage can produce for a later stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKey {
    PersonaId,
    PersonaCedula,
    PersonaNombre,
    PersonaApellido,
    EmpresaRnc,
    EmpresaNombre,
    FirmanteCedula,
    CuentaAhorros,
    CuentaAportaciones,
    SolicitudCredito,
    ReciboCaja,
    TransferenciaReferencia,
}

impl FixtureKey {
    pub const ALL: [FixtureKey; 12] = [
        FixtureKey::PersonaId,
        FixtureKey::PersonaCedula,
        FixtureKey::PersonaNombre,
        FixtureKey::PersonaApellido,
        FixtureKey::EmpresaRnc,
        FixtureKey::EmpresaNombre,
        FixtureKey::FirmanteCedula,
        FixtureKey::CuentaAhorros,
        FixtureKey::CuentaAportaciones,
        FixtureKey::SolicitudCredito,
        FixtureKey::ReciboCaja,
        FixtureKey::TransferenciaReferencia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureKey::PersonaId => "persona_id",
            FixtureKey::PersonaCedula => "persona_cedula",
            FixtureKey::PersonaNombre => "persona_nombre",
            FixtureKey::PersonaApellido => "persona_apellido",
            FixtureKey::EmpresaRnc => "empresa_rnc",
            FixtureKey::EmpresaNombre => "empresa_nombre",
            FixtureKey::FirmanteCedula => "firmante_cedula",
            FixtureKey::CuentaAhorros => "cuenta_ahorros",
            FixtureKey::CuentaAportaciones => "cuenta_aportaciones",
            FixtureKey::SolicitudCredito => "solicitud_credito",
            FixtureKey::ReciboCaja => "recibo_caja",
            FixtureKey::TransferenciaReferencia => "transferencia_referencia",
        }
    }
}

impl fmt::Display for FixtureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FixtureKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FixtureKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownFixture(s.to_string()))
    }
}

/// The member registered by the persona stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaFixture {
    pub id: Option<String>,
    pub cedula: Option<String>,
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    /// Authorized signer added to the member's accounts
    pub firmante_cedula: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyFixture {
    pub rnc: Option<String>,
    pub nombre: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFixtures {
    pub ahorros: Option<String>,
    pub aportaciones: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanFixture {
    pub solicitud_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashierFixture {
    pub recibo: Option<String>,
    pub transferencia_referencia: Option<String>,
}

/// All fixtures produced so far in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSet {
    #[serde(default)]
    pub persona: PersonaFixture,
    #[serde(default)]
    pub empresa: CompanyFixture,
    #[serde(default)]
    pub cuentas: AccountFixtures,
    #[serde(default)]
    pub credito: LoanFixture,
    #[serde(default)]
    pub caja: CashierFixture,
}

impl FixtureSet {
    fn slot(&mut self, key: FixtureKey) -> &mut Option<String> {
        match key {
            FixtureKey::PersonaId => &mut self.persona.id,
            FixtureKey::PersonaCedula => &mut self.persona.cedula,
            FixtureKey::PersonaNombre => &mut self.persona.nombre,
            FixtureKey::PersonaApellido => &mut self.persona.apellido,
            FixtureKey::FirmanteCedula => &mut self.persona.firmante_cedula,
            FixtureKey::EmpresaRnc => &mut self.empresa.rnc,
            FixtureKey::EmpresaNombre => &mut self.empresa.nombre,
            FixtureKey::CuentaAhorros => &mut self.cuentas.ahorros,
            FixtureKey::CuentaAportaciones => &mut self.cuentas.aportaciones,
            FixtureKey::SolicitudCredito => &mut self.credito.solicitud_id,
            FixtureKey::ReciboCaja => &mut self.caja.recibo,
            FixtureKey::TransferenciaReferencia => &mut self.caja.transferencia_referencia,
        }
    }

    pub fn get(&self, key: FixtureKey) -> Option<&str> {
        let value = match key {
            FixtureKey::PersonaId => &self.persona.id,
            FixtureKey::PersonaCedula => &self.persona.cedula,
            FixtureKey::PersonaNombre => &self.persona.nombre,
            FixtureKey::PersonaApellido => &self.persona.apellido,
            FixtureKey::FirmanteCedula => &self.persona.firmante_cedula,
            FixtureKey::EmpresaRnc => &self.empresa.rnc,
            FixtureKey::EmpresaNombre => &self.empresa.nombre,
            FixtureKey::CuentaAhorros => &self.cuentas.ahorros,
            FixtureKey::CuentaAportaciones => &self.cuentas.aportaciones,
            FixtureKey::SolicitudCredito => &self.credito.solicitud_id,
            FixtureKey::ReciboCaja => &self.caja.recibo,
            FixtureKey::TransferenciaReferencia => &self.caja.transferencia_referencia,
        };
        value.as_deref()
    }

    /// Record a value. Whitespace around captured text is dropped and the
    /// last writer wins.
    pub fn set(&mut self, key: FixtureKey, value: impl Into<String>) {
        let value = value.into();
        *self.slot(key) = Some(value.trim().to_string());
    }

    pub fn require(&self, key: FixtureKey) -> Result<&str> {
        self.get(key).ok_or(Error::MissingFixture(key))
    }

    /// Keys from `keys` that have no value yet
    pub fn missing(&self, keys: &[FixtureKey]) -> Vec<FixtureKey> {
        keys.iter().copied().filter(|k| self.get(*k).is_none()).collect()
    }

    pub fn present(&self) -> BTreeSet<FixtureKey> {
        FixtureKey::ALL.into_iter().filter(|k| self.get(*k).is_some()).collect()
    }
}

/// State carried across suite stages and across separate harness invocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub fixtures: FixtureSet,
    #[serde(default)]
    pub completed_stages: Vec<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            fixtures: FixtureSet::default(),
            completed_stages: Vec::new(),
        }
    }
}

impl RunState {
    /// Load a previous run's state, or start a fresh one when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No run state at {}, starting fresh", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;
        info!(
            "Loaded run state {} ({} fixture(s), {} completed stage(s))",
            state.run_id,
            state.fixtures.present().len(),
            state.completed_stages.len()
        );
        Ok(state)
    }

    /// Write the state through a temp file in the same directory, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        std::io::Write::write_all(&mut tmp, json.as_bytes())?;
        tmp.persist(path).map_err(|e| Error::Persist {
            path: path.display().to_string(),
            reason: e.error.to_string(),
        })?;

        debug!("Run state written to {}", path.display());
        Ok(())
    }

    pub fn mark_completed(&mut self, stage: &str) {
        if !self.completed_stages.iter().any(|s| s == stage) {
            self.completed_stages.push(stage.to_string());
        }
    }

    pub fn is_completed(&self, stage: &str) -> bool {
        self.completed_stages.iter().any(|s| s == stage)
    }
}
