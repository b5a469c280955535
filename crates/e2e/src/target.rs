//! The application under test
//!
//! The suite never starts the application; it only checks that the
//! configured deployment answers before launching any browser.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handle to a deployment of the application
#[derive(Debug, Clone)]
pub struct TargetApp {
    base_url: String,
    client: reqwest::Client,
}

impl TargetApp {
    pub fn new(base_url: &str) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll the base URL until it answers with anything below 500.
    ///
    /// A login redirect or a 404 on `/` still proves the deployment is up.
    pub async fn wait_until_reachable(&self, timeout_duration: Duration) -> E2eResult<()> {
        let start = std::time::Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.client.get(&self.base_url).send().await {
                Ok(resp) if !resp.status().is_server_error() => {
                    info!("Application reachable at {} ({})", self.base_url, resp.status());
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Application returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to answer...", self.base_url);
                    }
                    // Connection refused is expected while a deployment restarts
                    if !e.is_connect() && !e.is_timeout() {
                        warn!("Reachability check error: {}", e);
                    }
                }
            }

            if start.elapsed() + POLL_INTERVAL >= timeout_duration {
                break;
            }
            sleep(POLL_INTERVAL).await;
        }

        Err(E2eError::TargetUnreachable {
            url: self.base_url.clone(),
            attempts,
        })
    }
}
