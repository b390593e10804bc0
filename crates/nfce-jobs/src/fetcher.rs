//! Retrieval capability used by job tasks.

use async_trait::async_trait;
use nfce_core::{AccessKey, AppConfig, PortalConfig, Receipt};
use nfce_scraper::{CaptchaSolver, HttpTransport, ScrapeEngine, ScrapeError, Step};
use std::sync::Arc;

/// Retrieves one receipt, asking `solver` for every captcha.
#[async_trait]
pub trait InvoiceFetcher: Send + Sync {
    /// Fetch the receipt for `key`.
    async fn fetch(
        &self,
        key: &AccessKey,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Result<Receipt, ScrapeError>;
}

/// Fetcher running [`ScrapeEngine`] over a fresh HTTP session per call.
#[derive(Debug, Clone)]
pub struct PortalFetcher {
    portal: PortalConfig,
    max_captcha_attempts: u32,
}

impl PortalFetcher {
    /// Fetcher using the portal and scraping settings of `config`.
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            portal: config.portal.clone(),
            max_captcha_attempts: config.scraping.max_captcha_attempts,
        }
    }
}

#[async_trait]
impl InvoiceFetcher for PortalFetcher {
    async fn fetch(
        &self,
        key: &AccessKey,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Result<Receipt, ScrapeError> {
        let transport = HttpTransport::new(&self.portal)
            .map_err(|e| ScrapeError::transport(Step::LoadAccessKeyPage, e))?;

        let mut engine = ScrapeEngine::new(transport)
            .with_solver(solver)
            .with_max_captcha_attempts(self.max_captcha_attempts);

        let result = engine.fetch_by_access_key(key.as_str()).await?;
        Ok(result.receipt)
    }
}
