//! Article discovery and retrieval for helpsync.
//!
//! Two listing modes implement one [`ArticleSource`] capability, selected by
//! configuration: [`SitemapSource`] crawls the help-center sitemap XML, and
//! [`ApiSource`] pages the help-center REST API. Both fetch full article
//! content through the same REST endpoint, addressed by the numeric article
//! id embedded in the URL.

mod api;
mod sitemap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use helpsync_shared::{Article, ArticleRef, HelpsyncError, Result, RunParams, SourceMode};

pub use api::{ApiSource, HelpCenterClient};
pub use sitemap::SitemapSource;

// ---------------------------------------------------------------------------
// RecencyWindow
// ---------------------------------------------------------------------------

/// Lookback-window filter applied to every listing.
///
/// An item passes iff its last-modified timestamp falls within the window,
/// or forcing is enabled. Items with no timestamp only pass when forced.
#[derive(Debug, Clone, Copy)]
pub struct RecencyWindow {
    force: bool,
    cutoff: DateTime<Utc>,
}

impl RecencyWindow {
    /// Window covering the last `lookback_days` days from now.
    pub fn new(force: bool, lookback_days: i64) -> Self {
        Self::with_cutoff(force, Utc::now() - Duration::days(lookback_days))
    }

    /// Window with an explicit cutoff instant.
    pub fn with_cutoff(force: bool, cutoff: DateTime<Utc>) -> Self {
        Self { force, cutoff }
    }

    /// Whether an item with the given last-modified timestamp is included.
    pub fn includes(&self, last_modified: Option<DateTime<Utc>>) -> bool {
        if self.force {
            return true;
        }
        match last_modified {
            Some(ts) => ts >= self.cutoff,
            None => false,
        }
    }
}

impl From<&RunParams> for RecencyWindow {
    fn from(params: &RunParams) -> Self {
        Self::new(params.force, params.lookback_days)
    }
}

// ---------------------------------------------------------------------------
// ArticleSource
// ---------------------------------------------------------------------------

/// Capability interface for article discovery and content retrieval.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Produce the ordered, recency-filtered list of article references.
    /// Failures here are fatal for the run.
    async fn list(&self, window: &RecencyWindow) -> Result<Vec<ArticleRef>>;

    /// Fetch full content for one discovered article.
    async fn fetch(&self, article: &ArticleRef) -> Result<Article>;
}

/// Build the configured source implementation for one run.
pub fn build_source(
    params: &RunParams,
    config: &helpsync_shared::AppConfig,
) -> Result<Box<dyn ArticleSource>> {
    let base_url = config.source.base_url.clone().ok_or_else(|| {
        HelpsyncError::validation("source.base_url must be configured to fetch article content")
    })?;

    let client = HelpCenterClient::new(&base_url, &config.source.locale, config.source_token())?;

    match params.mode {
        SourceMode::Api => Ok(Box::new(ApiSource::new(client))),
        SourceMode::Sitemap => {
            let sitemap_url = params.sitemap_url.clone().ok_or_else(|| {
                HelpsyncError::validation("no sitemap URL resolved for sitemap mode")
            })?;
            Ok(Box::new(SitemapSource::new(
                sitemap_url,
                config.source.sitemap_filter.clone(),
                client,
            )?))
        }
    }
}

/// Shared helper: fetch content for a reference via the help-center API.
async fn fetch_via_api(client: &HelpCenterClient, article: &ArticleRef) -> Result<Article> {
    let id = article.id.ok_or_else(|| {
        HelpsyncError::Fetch(format!("no article id in URL {}", article.url))
    })?;
    client.fetch_article(id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_includes_recent_items() {
        let cutoff = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let window = RecencyWindow::with_cutoff(false, cutoff);

        let recent = Utc.with_ymd_and_hms(2026, 8, 15, 12, 0, 0).unwrap();
        let stale = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();

        assert!(window.includes(Some(recent)));
        assert!(window.includes(Some(cutoff)));
        assert!(!window.includes(Some(stale)));
    }

    #[test]
    fn force_bypasses_the_window() {
        let cutoff = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let window = RecencyWindow::with_cutoff(true, cutoff);

        let stale = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(window.includes(Some(stale)));
        assert!(window.includes(None));
    }

    #[test]
    fn missing_timestamp_is_excluded_unless_forced() {
        let cutoff = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        assert!(!RecencyWindow::with_cutoff(false, cutoff).includes(None));
    }
}
