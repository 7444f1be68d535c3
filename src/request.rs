//! JSON request/response surface
//!
//! A request names a source (URL or literal HTML) and either one operation
//! (immediate mode, bare result) or a list of operations (batch mode, result
//! list in submission order).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FetchConfig;
use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::operation::{Extracted, ExtractorKind, Operation, TextOptions};
use crate::session::{run_pass, BatchSession, ImmediateSession};

/// Request body for a scrape.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequest {
    /// Page to fetch. Ignored when `html` is present.
    #[serde(default)]
    pub url: Option<String>,
    /// Literal markup to extract from.
    #[serde(default)]
    pub html: Option<String>,
    pub operations: Operations,
}

/// One operation or an ordered list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Operations {
    Batch(Vec<OperationSpec>),
    Single(OperationSpec),
}

/// Operation as written in a request. Validated by `into_operation`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationSpec {
    #[serde(default)]
    pub selector: Option<String>,
    /// Extractor name: `html`, `text` or `attribute`.
    #[serde(default, alias = "type")]
    pub extractor: Option<String>,
    /// Attribute name, required by the `attribute` extractor.
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub options: TextOptions,
}

impl OperationSpec {
    pub fn into_operation(self) -> Result<Operation> {
        let extractor = self
            .extractor
            .ok_or_else(|| Error::InvalidOperation("missing extractor".to_string()))?;
        let kind: ExtractorKind = extractor.parse()?;
        let selector = self
            .selector
            .ok_or_else(|| Error::InvalidOperation(format!("{kind} operation is missing a selector")))?;

        match kind {
            ExtractorKind::Html => Ok(Operation::html(selector)),
            ExtractorKind::Text => Ok(Operation::text(selector, self.options)),
            ExtractorKind::Attribute => {
                let attribute = self.attribute.ok_or_else(|| {
                    Error::InvalidOperation(format!(
                        "attribute operation on {selector:?} is missing an attribute name"
                    ))
                })?;
                Ok(Operation::attribute(selector, attribute))
            }
        }
    }
}

/// Response body: a bare result or a list aligned with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScrapeResponse {
    Single(Extracted),
    Batch(Vec<Extracted>),
}

impl ScrapeResponse {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

enum Plan {
    Single(Operation),
    Batch(Vec<Operation>),
}

enum Source<'a> {
    Markup(&'a str),
    Url(&'a str),
}

impl ScrapeRequest {
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    fn source(&self) -> Result<Source<'_>> {
        match (&self.html, &self.url) {
            (Some(html), _) => Ok(Source::Markup(html)),
            (None, Some(url)) => Ok(Source::Url(url)),
            (None, None) => Err(Error::InvalidOperation(
                "request needs either `url` or `html`".to_string(),
            )),
        }
    }

    fn plan(&self) -> Result<Plan> {
        match &self.operations {
            Operations::Single(spec) => spec.clone().into_operation().map(Plan::Single),
            Operations::Batch(specs) => specs
                .iter()
                .cloned()
                .map(OperationSpec::into_operation)
                .collect::<Result<Vec<_>>>()
                .map(Plan::Batch),
        }
    }
}

/// Handle a request, fetching asynchronously when it names a URL.
///
/// Every pass runs on the blocking pool, single operations included. Dropping
/// the future abandons passes still running rather than interrupting them.
pub async fn scrape(request: &ScrapeRequest, config: &FetchConfig) -> Result<ScrapeResponse> {
    let plan = request.plan()?;
    let document = match request.source()? {
        Source::Markup(html) => SourceDocument::from_markup(html),
        Source::Url(url) => SourceDocument::fetch(url, config).await?,
    };

    match plan {
        Plan::Single(operation) => {
            debug!(kind = %operation.kind(), "single operation request");
            run_pass(Arc::new(document), operation)
                .await
                .map(ScrapeResponse::Single)
        }
        Plan::Batch(operations) => {
            let batch = operations
                .into_iter()
                .fold(BatchSession::new(document), BatchSession::push);
            batch.finish().await.map(ScrapeResponse::Batch)
        }
    }
}

/// Blocking variant of [`scrape`]. Must not be called from inside an async runtime.
pub fn scrape_blocking(request: &ScrapeRequest, config: &FetchConfig) -> Result<ScrapeResponse> {
    let plan = request.plan()?;
    let document = match request.source()? {
        Source::Markup(html) => SourceDocument::from_markup(html),
        Source::Url(url) => SourceDocument::fetch_blocking(url, config)?,
    };

    match plan {
        Plan::Single(operation) => ImmediateSession::new(document)
            .run(&operation)
            .map(ScrapeResponse::Single),
        Plan::Batch(operations) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let batch = operations
                .into_iter()
                .fold(BatchSession::new(document), BatchSession::push);
            runtime.block_on(batch.finish()).map(ScrapeResponse::Batch)
        }
    }
}
