//! Playwright storage-state documents
//!
//! The login stage exports the browser context to this file and every later
//! suite seeds its context from it, so only one stage ever types credentials.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Unix seconds, `-1` for session cookies
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

impl StorageState {
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Whether the saved context carries a session for `origin`.
    ///
    /// Any cookie counts, as does any local-storage entry under the origin;
    /// the application keeps its token in one or the other depending on
    /// the deployment.
    pub fn is_authenticated(&self, origin: &str) -> bool {
        let parsed = Url::parse(origin).ok();
        let host = parsed.as_ref().and_then(|u| u.host_str());
        let origin = origin.trim_end_matches('/');
        let has_cookie = self.cookies.iter().any(|c| {
            let domain = c.domain.trim_start_matches('.');
            host.map(|h| h == domain || h.ends_with(&format!(".{}", domain)))
                .unwrap_or(false)
        });
        has_cookie
            || self
                .origins
                .iter()
                .any(|o| o.origin.trim_end_matches('/') == origin && !o.local_storage.is_empty())
    }

    pub fn local_storage_value(&self, origin: &str, name: &str) -> Option<&str> {
        let origin = origin.trim_end_matches('/');
        self.origins
            .iter()
            .filter(|o| o.origin.trim_end_matches('/') == origin)
            .flat_map(|o| o.local_storage.iter())
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "cookies": [
        {
          "name": "session",
          "value": "abc",
          "domain": ".coop.example.do",
          "path": "/",
          "expires": -1,
          "httpOnly": true,
          "secure": true,
          "sameSite": "Lax"
        }
      ],
      "origins": [
        {
          "origin": "https://app.coop.example.do",
          "localStorage": [
            { "name": "token", "value": "eyJhbGciOi" }
          ]
        }
      ]
    }"#;

    #[test]
    fn test_parse_playwright_document() {
        let state: StorageState = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(state.cookies.len(), 1);
        assert!(state.cookies[0].http_only);
        assert_eq!(state.cookies[0].same_site.as_deref(), Some("Lax"));
        assert_eq!(
            state.local_storage_value("https://app.coop.example.do/", "token"),
            Some("eyJhbGciOi")
        );
        assert_eq!(state.local_storage_value("https://other.do", "token"), None);
    }

    #[test]
    fn test_is_authenticated() {
        let state: StorageState = serde_json::from_str(SAMPLE).unwrap();
        assert!(state.is_authenticated("https://app.coop.example.do"));
        assert!(!state.is_authenticated("http://localhost:3000"));

        let local_only = StorageState {
            cookies: vec![],
            origins: vec![OriginState {
                origin: "http://localhost:3000".into(),
                local_storage: vec![StorageEntry { name: "token".into(), value: "x".into() }],
            }],
        };
        assert!(local_only.is_authenticated("http://localhost:3000/"));
        assert!(!StorageState::default().is_authenticated("http://localhost:3000"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let state: StorageState = serde_json::from_str(SAMPLE).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"httpOnly\":true"));
        assert!(json.contains("\"localStorage\""));
    }

    #[test]
    fn test_cookie_match_uses_parsed_host() {
        let state: StorageState = serde_json::from_str(SAMPLE).unwrap();
        // userinfo and port are not part of the host
        assert!(state.is_authenticated("https://cajero@app.coop.example.do:8443/"));
        assert!(!state.is_authenticated("https://coop.example.do.evil.net"));
        assert!(!state.is_authenticated("not a url"));

        let ipv6 = StorageState {
            cookies: vec![Cookie {
                name: "session".into(),
                value: "abc".into(),
                domain: "[::1]".into(),
                path: "/".into(),
                expires: -1.0,
                http_only: false,
                secure: false,
                same_site: None,
            }],
            origins: vec![],
        };
        assert!(ipv6.is_authenticated("http://[::1]:4200"));
    }
}
