//! Source documents and the retrieval layer
//!
//! A `SourceDocument` owns the raw markup of one page. Every extraction pass
//! re-parses that markup, so documents are shared read-only between passes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::{Error, Result};

/// Statuses that, without an origin `Server` header, come from the fetching
/// infrastructure rather than the scraped site.
const INFRASTRUCTURE_STATUSES: [u16; 5] = [530, 503, 502, 403, 400];

/// URL reported for documents loaded from literal markup.
pub const MARKUP_URL: &str = "http://example.com";

/// One retrieved (or synthesized) HTML document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    url: String,
    status: u16,
    server: Option<String>,
    body: Arc<str>,
}

impl SourceDocument {
    /// Build a document from literal HTML without touching the network.
    pub fn from_markup(html: impl Into<String>) -> Self {
        Self {
            url: MARKUP_URL.to_string(),
            status: 200,
            server: None,
            body: Arc::from(html.into()),
        }
    }

    /// Fetch a document over HTTP (async).
    pub async fn fetch(url: &str, config: &FetchConfig) -> Result<Self> {
        let parsed = parse_locator(url)?;
        debug!(%url, "fetching document");

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .build()
            .map_err(Error::fetch_failed)?;

        let mut request = client.get(parsed);
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(Error::fetch_failed)?;
        let status = response.status().as_u16();
        let server = response
            .headers()
            .get(reqwest::header::SERVER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        check_status(url, status, server.as_deref())?;

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(Error::fetch_failed)?;

        Ok(Self {
            url: final_url,
            status,
            server,
            body: Arc::from(body),
        })
    }

    /// Fetch a document using ureq (simple blocking HTTP)
    pub fn fetch_blocking(url: &str, config: &FetchConfig) -> Result<Self> {
        parse_locator(url)?;
        debug!(%url, "fetching document (blocking)");

        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(config.timeout()))
                .user_agent(config.user_agent.as_str())
                .max_redirects(config.max_redirects)
                .http_status_as_error(false)
                .build(),
        );

        let mut request = agent.get(url);
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.call().map_err(Error::fetch_failed)?;
        let status = response.status().as_u16();
        let server = response
            .headers()
            .get("server")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        check_status(url, status, server.as_deref())?;

        let body = response
            .into_body()
            .read_to_string()
            .map_err(Error::fetch_failed)?;

        Ok(Self {
            url: url.to_string(),
            status,
            server,
            body: Arc::from(body),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Value of the `Server` response header, if any.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

fn parse_locator(url: &str) -> Result<url::Url> {
    url::Url::parse(url).map_err(|e| Error::fetch_failed(format!("{url}: {e}")))
}

/// True when a response status was produced by the fetching edge (a worker
/// preview or proxy) instead of the target site.
pub fn is_infrastructure_failure(status: u16, server: Option<&str>) -> bool {
    INFRASTRUCTURE_STATUSES.contains(&status)
        && server.map_or(true, |s| s.eq_ignore_ascii_case("cloudflare"))
}

fn check_status(url: &str, status: u16, server: Option<&str>) -> Result<()> {
    if is_infrastructure_failure(status, server) {
        warn!(%url, status, server = ?server, "rejecting infrastructure failure response");
        return Err(Error::fetch_failed(format!(
            "Status {status} requesting {url}"
        )));
    }
    Ok(())
}
