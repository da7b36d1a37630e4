//! Knowledge-base document upload client.
//!
//! [`DocumentSink`] is the seam the pipeline uploads through; [`KbClient`]
//! is the HTTP implementation targeting the knowledge-base ingestion API
//! (multipart file POST). Dry-run mode performs everything except the
//! actual request, which makes end-to-end rehearsals cheap.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, instrument};
use url::Url;

use helpsync_shared::{Credentials, HelpsyncError, Result};

/// User-Agent string for upload requests.
const USER_AGENT: &str = concat!("helpsync/", env!("CARGO_PKG_VERSION"));

/// Timeout for one upload request.
const UPLOAD_TIMEOUT_SECS: u64 = 30;

/// Client identifier sent with every upload.
const CLIENT_KEY: &str = "helpsync";

// ---------------------------------------------------------------------------
// DocumentSink
// ---------------------------------------------------------------------------

/// Destination for staged documents.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Upload one document. A returned error is recorded as a per-item
    /// failure by the caller; it must not panic.
    async fn upload(&self, filename: &str, content: Vec<u8>, credentials: &Credentials)
    -> Result<()>;
}

// ---------------------------------------------------------------------------
// KbClient
// ---------------------------------------------------------------------------

/// HTTP implementation of [`DocumentSink`] for the KB ingestion API.
#[derive(Clone)]
pub struct KbClient {
    http: reqwest::Client,
    base_url: Url,
    max_chunk_size: u32,
    overwrite: bool,
    dry_run: bool,
}

impl KbClient {
    /// Create a client for the ingestion API at `base_url`.
    pub fn new(base_url: &str, max_chunk_size: u32, overwrite: bool, dry_run: bool) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            HelpsyncError::validation(format!("invalid upload base URL {base_url:?}: {e}"))
        })?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| HelpsyncError::Upload(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            max_chunk_size,
            overwrite,
            dry_run,
        })
    }

    fn document_endpoint(&self, project_id: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!(
                "v3/projects/{project_id}/knowledge-base/documents/file"
            ))
            .map_err(|e| HelpsyncError::Upload(format!("bad endpoint URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("overwrite", if self.overwrite { "true" } else { "false" })
            .append_pair("maxChunkSize", &self.max_chunk_size.to_string());

        Ok(url)
    }
}

#[async_trait]
impl DocumentSink for KbClient {
    #[instrument(skip(self, content, credentials), fields(filename = %filename))]
    async fn upload(
        &self,
        filename: &str,
        content: Vec<u8>,
        credentials: &Credentials,
    ) -> Result<()> {
        if self.dry_run {
            info!(bytes = content.len(), "dry run, skipping upload request");
            return Ok(());
        }

        let url = self.document_endpoint(&credentials.project_id)?;
        let form = Form::new().part(
            "file",
            Part::bytes(content)
                .file_name(filename.to_string())
                .mime_str("text/plain")
                .map_err(|e| HelpsyncError::Upload(format!("{filename}: {e}")))?,
        );

        let response = self
            .http
            .post(url)
            .header("clientkey", CLIENT_KEY)
            .header(reqwest::header::AUTHORIZATION, &credentials.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| HelpsyncError::Upload(format!("{filename}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(HelpsyncError::Upload(format!(
                "{filename}: HTTP {status}: {snippet}"
            )));
        }

        debug!("document accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> Credentials {
        Credentials {
            api_key: "test-api-key".into(),
            project_id: "proj-1".into(),
        }
    }

    #[tokio::test]
    async fn upload_posts_multipart_with_auth() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/projects/proj-1/knowledge-base/documents/file"))
            .and(query_param("overwrite", "true"))
            .and(query_param("maxChunkSize", "1500"))
            .and(header("authorization", "test-api-key"))
            .and(header("clientkey", "helpsync"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = KbClient::new(&server.uri(), 1500, true, false).unwrap();
        client
            .upload("article.txt", b"Title\n\nBody".to_vec(), &creds())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_upload_is_an_upload_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = KbClient::new(&server.uri(), 1500, true, false).unwrap();
        let err = client
            .upload("article.txt", b"x".to_vec(), &creds())
            .await
            .unwrap_err();

        match err {
            HelpsyncError::Upload(msg) => {
                assert!(msg.contains("article.txt"));
                assert!(msg.contains("502"));
            }
            other => panic!("expected Upload error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dry_run_sends_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = KbClient::new(&server.uri(), 1500, true, true).unwrap();
        client
            .upload("article.txt", b"x".to_vec(), &creds())
            .await
            .unwrap();
    }
}
