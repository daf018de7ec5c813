// Shared transport configuration for building reqwest::Client instances.
//
// The HTTPS client and tests construct clients through this module so
// timeout and User-Agent settings stay in one place.

use std::time::Duration;

use crate::error::Error;

/// Transport configuration for the HTTPS client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout. Default: 30 s.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: crate::USER_AGENT.to_string(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(Error::Http)
    }
}
