//! Sitemap-based article listing.
//!
//! Fetches the help-center sitemap XML, keeps entries whose URL contains the
//! configured path fragment (articles, not category or section pages), and
//! applies the recency window to each entry's `<lastmod>` timestamp. Nested
//! sitemap references are skipped; only flat `<urlset>` entries are listed.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use helpsync_shared::{Article, ArticleRef, HelpsyncError, Result};

use crate::api::HelpCenterClient;
use crate::{ArticleSource, RecencyWindow, fetch_via_api};

/// User-Agent string for sitemap requests.
const USER_AGENT: &str = concat!("helpsync/", env!("CARGO_PKG_VERSION"));

/// Timeout for the sitemap fetch.
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Matches the numeric article id segment in help-center URLs
/// (`.../articles/360012345-some-title`).
static ARTICLE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)-").expect("article id regex"));

/// Extract the numeric article id from a help-center article URL.
pub(crate) fn extract_article_id(url: &str) -> Option<u64> {
    ARTICLE_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// SitemapSource
// ---------------------------------------------------------------------------

/// Article source that lists URLs from the help-center sitemap.
pub struct SitemapSource {
    http: reqwest::Client,
    sitemap_url: Url,
    path_filter: String,
    helpcenter: HelpCenterClient,
}

impl SitemapSource {
    /// Create a sitemap source for the given sitemap URL and path filter.
    pub fn new(
        sitemap_url: String,
        path_filter: String,
        helpcenter: HelpCenterClient,
    ) -> Result<Self> {
        let sitemap_url = Url::parse(&sitemap_url).map_err(|e| {
            HelpsyncError::validation(format!("invalid sitemap URL {sitemap_url:?}: {e}"))
        })?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| HelpsyncError::Listing(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            sitemap_url,
            path_filter,
            helpcenter,
        })
    }
}

#[async_trait]
impl ArticleSource for SitemapSource {
    #[instrument(skip_all, fields(sitemap = %self.sitemap_url))]
    async fn list(&self, window: &RecencyWindow) -> Result<Vec<ArticleRef>> {
        let response = self
            .http
            .get(self.sitemap_url.as_str())
            .send()
            .await
            .map_err(|e| HelpsyncError::Listing(format!("{}: {e}", self.sitemap_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HelpsyncError::Listing(format!(
                "{}: HTTP {status}",
                self.sitemap_url
            )));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| HelpsyncError::Listing(format!("{}: body read failed: {e}", self.sitemap_url)))?;

        let entries = parse_sitemap(&xml)?;
        let total = entries.len();

        let refs: Vec<ArticleRef> = entries
            .into_iter()
            .filter(|entry| {
                !entry.loc.ends_with(".xml")
                    && entry.loc.contains(&self.path_filter)
                    && window.includes(entry.lastmod)
            })
            .filter_map(|entry| {
                let Some(id) = extract_article_id(&entry.loc) else {
                    // Category or landing pages that slipped the path filter.
                    debug!(url = %entry.loc, "no article id in URL, skipping");
                    return None;
                };
                Some(ArticleRef {
                    id: Some(id),
                    title: None,
                    last_modified: entry.lastmod,
                    url: entry.loc,
                })
            })
            .collect();

        info!(total, matched = refs.len(), "sitemap listing complete");
        Ok(refs)
    }

    async fn fetch(&self, article: &ArticleRef) -> Result<Article> {
        fetch_via_api(&self.helpcenter, article).await
    }
}

// ---------------------------------------------------------------------------
// Sitemap XML parsing
// ---------------------------------------------------------------------------

/// One `<url>` entry from a sitemap.
#[derive(Debug, Clone, Default, PartialEq)]
struct SitemapEntry {
    loc: String,
    lastmod: Option<DateTime<Utc>>,
}

/// Parse a flat `<urlset>` sitemap into its entries.
fn parse_sitemap(xml: &str) -> Result<Vec<SitemapEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<SitemapEntry> = None;
    let mut field: Option<Field> = None;

    #[derive(PartialEq)]
    enum Field {
        Loc,
        Lastmod,
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"url" => current = Some(SitemapEntry::default()),
                b"loc" => field = Some(Field::Loc),
                b"lastmod" => field = Some(Field::Lastmod),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                let text = t
                    .unescape()
                    .map_err(|e| HelpsyncError::Listing(format!("sitemap text decode: {e}")))?;
                match field {
                    Some(Field::Loc) => entry.loc = text.trim().to_string(),
                    Some(Field::Lastmod) => {
                        entry.lastmod = parse_lastmod(text.trim());
                        if entry.lastmod.is_none() {
                            warn!(lastmod = %text, "unparseable lastmod, entry treated as undated");
                        }
                    }
                    None => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => {
                    if let Some(entry) = current.take() {
                        if !entry.loc.is_empty() {
                            entries.push(entry);
                        }
                    }
                }
                b"loc" | b"lastmod" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(HelpsyncError::Listing(format!("malformed sitemap XML: {e}")));
            }
        }
    }

    Ok(entries)
}

/// Parse a sitemap `<lastmod>` value: RFC 3339 or a bare date.
fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
