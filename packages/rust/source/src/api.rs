//! Help-center REST API client and API-based article listing.
//!
//! The help-center API exposes sections and articles as paged JSON
//! collections (`next_page` links). API mode lists every article across
//! every section, then filters by the recency window on `edited_at`.
//! Both listing modes use [`HelpCenterClient::fetch_article`] for content.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use helpsync_shared::{Article, ArticleRef, HelpsyncError, Result};

use crate::{ArticleSource, RecencyWindow, fetch_via_api};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("helpsync/", env!("CARGO_PKG_VERSION"));

/// Timeout for individual API requests.
const REQUEST_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// HelpCenterClient
// ---------------------------------------------------------------------------

/// Thin client for the help-center REST API.
#[derive(Clone)]
pub struct HelpCenterClient {
    http: reqwest::Client,
    api_root: Url,
    locale: String,
}

impl HelpCenterClient {
    /// Create a client for the help center at `base_url`.
    ///
    /// `token`, when present, is sent as a Basic authorization header on
    /// every request. Public help centers work without one.
    pub fn new(base_url: &str, locale: &str, token: Option<String>) -> Result<Self> {
        let api_root = Url::parse(&format!(
            "{}/api/v2/help_center/",
            base_url.trim_end_matches('/')
        ))
        .map_err(|e| {
            HelpsyncError::validation(format!("invalid help-center base URL {base_url:?}: {e}"))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|e| HelpsyncError::validation(format!("invalid source token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| HelpsyncError::Listing(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_root,
            locale: locale.to_string(),
        })
    }

    /// Fetch one article's title and body by numeric id.
    #[instrument(skip(self))]
    pub async fn fetch_article(&self, id: u64) -> Result<Article> {
        let url = self
            .api_root
            .join(&format!("{}/articles/{id}.json", self.locale))
            .map_err(|e| HelpsyncError::Fetch(format!("article {id}: bad URL: {e}")))?;

        let envelope: ArticleEnvelope = self
            .get_json(&url)
            .await
            .map_err(HelpsyncError::Fetch)?;

        Ok(envelope.article)
    }

    /// List all sections, following `next_page` links.
    pub async fn list_sections(&self) -> Result<Vec<Section>> {
        let first = self
            .api_root
            .join("sections.json")
            .map_err(|e| HelpsyncError::Listing(format!("sections URL: {e}")))?;

        let mut sections = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: SectionsPage = self.get_json(&url).await.map_err(HelpsyncError::Listing)?;
            sections.extend(page.sections);
            next = parse_next_page(page.next_page.as_deref())?;
        }

        Ok(sections)
    }

    /// List all articles in one section, following `next_page` links.
    pub async fn list_section_articles(&self, section_id: u64) -> Result<Vec<ApiArticle>> {
        let first = self
            .api_root
            .join(&format!(
                "{}/sections/{section_id}/articles.json",
                self.locale
            ))
            .map_err(|e| HelpsyncError::Listing(format!("articles URL: {e}")))?;

        let mut articles = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: ArticlesPage = self.get_json(&url).await.map_err(HelpsyncError::Listing)?;
            articles.extend(page.articles);
            next = parse_next_page(page.next_page.as_deref())?;
        }

        Ok(articles)
    }

    /// GET a URL and deserialize its JSON body. Returns a plain message so
    /// callers can classify the failure (listing vs. per-item fetch).
    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> std::result::Result<T, String> {
        let response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| format!("{url}: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{url}: HTTP {status}"));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| format!("{url}: invalid JSON: {e}"))
    }
}

fn parse_next_page(next: Option<&str>) -> Result<Option<Url>> {
    match next {
        None => Ok(None),
        Some(raw) => Url::parse(raw)
            .map(Some)
            .map_err(|e| HelpsyncError::Listing(format!("bad next_page link {raw:?}: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArticleEnvelope {
    article: Article,
}

/// A help-center section (container of articles).
#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct SectionsPage {
    sections: Vec<Section>,
    #[serde(default)]
    next_page: Option<String>,
}

/// An article record from the listing API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiArticle {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiArticle {
    /// Timestamp used for recency filtering: edit time, falling back to
    /// the general update time.
    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.edited_at.or(self.updated_at)
    }
}

#[derive(Debug, Deserialize)]
struct ArticlesPage {
    articles: Vec<ApiArticle>,
    #[serde(default)]
    next_page: Option<String>,
}

// ---------------------------------------------------------------------------
// ApiSource
// ---------------------------------------------------------------------------

/// Article source that lists via the help-center REST API.
pub struct ApiSource {
    helpcenter: HelpCenterClient,
}

impl ApiSource {
    pub fn new(helpcenter: HelpCenterClient) -> Self {
        Self { helpcenter }
    }
}

#[async_trait]
impl ArticleSource for ApiSource {
    #[instrument(skip_all)]
    async fn list(&self, window: &RecencyWindow) -> Result<Vec<ArticleRef>> {
        let sections = self.helpcenter.list_sections().await?;
        debug!(sections = sections.len(), "sections listed");

        let mut refs = Vec::new();
        let mut total = 0usize;

        for section in &sections {
            let articles = self.helpcenter.list_section_articles(section.id).await?;
            total += articles.len();

            refs.extend(
                articles
                    .into_iter()
                    .filter(|a| window.includes(a.last_modified()))
                    .map(|a| ArticleRef {
                        url: a.html_url.clone(),
                        id: Some(a.id),
                        title: a.title.clone(),
                        last_modified: a.last_modified(),
                    }),
            );
        }

        info!(total, matched = refs.len(), "API listing complete");
        Ok(refs)
    }

    async fn fetch(&self, article: &ArticleRef) -> Result<Article> {
        fetch_via_api(&self.helpcenter, article).await
    }
}
