use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TermStoreError, TermStoreResult};

/// Connection settings for a [`crate::store::TermStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStoreConfig {
    /// Absolute URL of the site collection sessions are opened against.
    pub site_url: String,
    /// Web used for field lookups; defaults to `site_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    /// Upper bound on a single round trip. `None` leaves it to the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_trip_timeout_ms: Option<u64>,
}

impl TermStoreConfig {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            web_url: None,
            round_trip_timeout_ms: None,
        }
    }

    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = Some(web_url.into());
        self
    }

    pub fn with_round_trip_timeout(mut self, timeout: Duration) -> Self {
        self.round_trip_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn from_json_str(json: &str) -> TermStoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TermStoreResult<()> {
        if self.site_url.trim().is_empty() {
            return Err(TermStoreError::Config("site_url must not be empty".into()));
        }
        if self.round_trip_timeout_ms == Some(0) {
            return Err(TermStoreError::Config(
                "round_trip_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn web_url(&self) -> &str {
        self.web_url.as_deref().unwrap_or(&self.site_url)
    }

    pub fn round_trip_timeout(&self) -> Option<Duration> {
        self.round_trip_timeout_ms.map(Duration::from_millis)
    }
}
