//! `{{ namespace.key }}` placeholders in suite files
//!
//! Resolution happens in Rust before a browser is launched, so a suite that
//! refers to a fixture nobody produced fails fast instead of typing an empty
//! string into the form.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Serialize;

use coopsuite_common::generators::{self, CompanySeed, PersonaSeed};
use coopsuite_common::{DateContext, FixtureKey, FixtureSet, Gender};

use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::spec::{SuiteSpec, TestCase};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([a-z_]+)\.([a-z0-9_]+)\s*\}\}").expect("placeholder regex is valid")
});

/// Keys named by `{{ fixture.key }}` placeholders in `text`
pub(crate) fn fixture_references(text: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter(|caps| caps.get(1).map(|m| m.as_str()) == Some("fixture"))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str()))
}

/// Longest `gen.digits_N` a suite may ask for
pub const MAX_GENERATED_DIGITS: usize = 64;

/// Sample data generated once per suite, so every step of a suite types
/// the same persona
#[derive(Debug, Clone, Serialize)]
pub struct SuiteData {
    pub persona: PersonaSeed,
    pub firmante: PersonaSeed,
    pub empresa: CompanySeed,
}

impl SuiteData {
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let gender = Gender::random_with(rng);
        let firmante_gender = Gender::random_with(rng);
        Self {
            persona: PersonaSeed::generate_with(rng, gender),
            firmante: PersonaSeed::generate_with(rng, firmante_gender),
            empresa: CompanySeed::generate_with(rng),
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let p = &self.persona;
        let f = &self.firmante;
        let e = &self.empresa;
        let value = match key {
            "cedula" => &p.cedula,
            "nombre" => &p.nombre,
            "apellido" => &p.apellido,
            "segundo_apellido" => &p.segundo_apellido,
            "telefono" => &p.telefono,
            "celular" => &p.celular,
            "email" => &p.email,
            "pasaporte" => &p.pasaporte,
            "nombre_completo" => return Some(p.full_name()),
            "genero" => return Some(p.gender.form_label().to_string()),
            "firmante_cedula" => &f.cedula,
            "firmante_nombre" => &f.nombre,
            "firmante_apellido" => &f.apellido,
            "firmante_genero" => return Some(f.gender.form_label().to_string()),
            "empresa_nombre" => &e.nombre,
            "empresa_rnc" => &e.rnc,
            "empresa_telefono" => &e.telefono,
            "empresa_email" => &e.email,
            _ => return None,
        };
        Some(value.clone())
    }
}

/// Everything placeholders can refer to while one suite is being prepared
pub struct TemplateContext<'a> {
    pub suite: &'a str,
    pub data: &'a SuiteData,
    pub dates: &'a DateContext,
    pub config: &'a SuiteConfig,
    pub fixtures: &'a FixtureSet,
}

impl<'a> TemplateContext<'a> {
    /// Replace every placeholder in `input`.
    ///
    /// `gen.digits_N` and `gen.letters` draw fresh values at each occurrence;
    /// all other `gen.*` values are fixed for the suite.
    pub fn resolve<R: Rng + ?Sized>(&self, input: &str, rng: &mut R) -> E2eResult<String> {
        if !input.contains("{{") && !input.contains("}}") {
            return Ok(input.to_string());
        }

        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(input) {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let between = &input[last..whole.start];
            self.reject_stray_braces(between)?;
            out.push_str(between);

            let namespace = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let key = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let value = self
                .lookup(namespace, key, rng)?
                .ok_or_else(|| self.unresolved(&format!("{}.{}", namespace, key)))?;
            out.push_str(&value);
            last = whole.end;
        }
        let tail = &input[last..];
        self.reject_stray_braces(tail)?;
        out.push_str(tail);

        Ok(out)
    }

    fn lookup<R: Rng + ?Sized>(
        &self,
        namespace: &str,
        key: &str,
        rng: &mut R,
    ) -> E2eResult<Option<String>> {
        let value = match namespace {
            "gen" => {
                if let Some(n) = key.strip_prefix("digits_") {
                    n.parse::<usize>()
                        .ok()
                        .filter(|n| (1..=MAX_GENERATED_DIGITS).contains(n))
                        .map(|n| generators::random_digits_with(rng, n))
                } else if key == "letters" {
                    Some(generators::random_letter_pair_with(rng))
                } else {
                    self.data.lookup(key)
                }
            }
            "date" => self.dates.display(key).transpose()?,
            "config" => match key {
                "base_url" => Some(self.config.base_url().to_string()),
                "username" => self.config.username.clone(),
                "password" => self.config.password.clone(),
                "assets_dir" => Some(self.config.assets_dir.to_string_lossy().into_owned()),
                _ => None,
            },
            "fixture" => key
                .parse::<FixtureKey>()
                .ok()
                .and_then(|k| self.fixtures.get(k))
                .map(str::to_string),
            _ => None,
        };
        Ok(value)
    }

    fn reject_stray_braces(&self, fragment: &str) -> E2eResult<()> {
        if fragment.contains("{{") || fragment.contains("}}") {
            return Err(self.unresolved(fragment.trim()));
        }
        Ok(())
    }

    fn unresolved(&self, placeholder: &str) -> E2eError {
        E2eError::UnresolvedPlaceholder {
            suite: self.suite.to_string(),
            placeholder: placeholder.to_string(),
        }
    }

    /// Resolve every test of `spec`, failing on the first bad placeholder.
    pub fn resolve_suite<R: Rng + ?Sized>(
        &self,
        spec: &SuiteSpec,
        rng: &mut R,
    ) -> E2eResult<Vec<TestCase>> {
        spec.tests
            .iter()
            .map(|test| -> E2eResult<TestCase> {
                let steps = test
                    .steps
                    .iter()
                    .map(|step| step.map_text(&mut |s: &str| self.resolve(s, rng)))
                    .collect::<E2eResult<Vec<_>>>()?;
                Ok(TestCase {
                    name: test.name.clone(),
                    steps,
                })
            })
            .collect()
    }
}
