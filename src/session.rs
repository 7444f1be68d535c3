//! Operation coordination
//!
//! `ImmediateSession` runs each operation as soon as it is requested.
//! `BatchSession` queues operations and runs them together, one independent
//! pass each, returning results in submission order.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::config::FetchConfig;
use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::extractors::{extract_attribute, extract_html, extract_text};
use crate::operation::{Extracted, Operation, TextOptions, TextOutput};

/// Runs every operation immediately against one document.
#[derive(Debug, Clone)]
pub struct ImmediateSession {
    document: Arc<SourceDocument>,
}

impl ImmediateSession {
    pub fn new(document: SourceDocument) -> Self {
        Self {
            document: Arc::new(document),
        }
    }

    /// Session over literal HTML, without network access.
    pub fn from_markup(html: impl Into<String>) -> Self {
        Self::new(SourceDocument::from_markup(html))
    }

    /// Session over a fetched page.
    pub async fn fetch(url: &str, config: &FetchConfig) -> Result<Self> {
        SourceDocument::fetch(url, config).await.map(Self::new)
    }

    pub fn document(&self) -> &SourceDocument {
        &self.document
    }

    pub fn html(&self, selector: &str) -> Result<String> {
        extract_html(&self.document, selector)
    }

    pub fn text(&self, selector: &str, options: TextOptions) -> Result<TextOutput> {
        extract_text(&self.document, selector, options)
    }

    pub fn attribute(&self, selector: &str, attribute: &str) -> Result<String> {
        extract_attribute(&self.document, selector, attribute)
    }

    pub fn run(&self, operation: &Operation) -> Result<Extracted> {
        operation.execute(&self.document)
    }

    /// Start a batch over the same document.
    pub fn chain(&self) -> BatchSession {
        BatchSession {
            document: Arc::clone(&self.document),
            pending: Vec::new(),
        }
    }
}

/// Queues operations and runs them as concurrent, independent passes.
#[derive(Debug, Clone)]
#[must_use = "a batch does nothing until `finish` is awaited"]
pub struct BatchSession {
    document: Arc<SourceDocument>,
    pending: Vec<Operation>,
}

impl BatchSession {
    pub fn new(document: SourceDocument) -> Self {
        ImmediateSession::new(document).chain()
    }

    pub fn html(self, selector: impl Into<String>) -> Self {
        self.push(Operation::html(selector))
    }

    pub fn text(self, selector: impl Into<String>, options: TextOptions) -> Self {
        self.push(Operation::text(selector, options))
    }

    pub fn attribute(self, selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.push(Operation::attribute(selector, attribute))
    }

    pub fn push(mut self, operation: Operation) -> Self {
        self.pending.push(operation);
        self
    }

    pub fn pending(&self) -> &[Operation] {
        &self.pending
    }

    /// Run all queued operations and return their results in submission
    /// order. The first failing operation fails the whole batch.
    ///
    /// Dropping the returned future stops waiting for the passes, but a pass
    /// already running on the blocking pool finishes and its result is
    /// discarded.
    pub async fn finish(self) -> Result<Vec<Extracted>> {
        debug!(operations = self.pending.len(), "running batch");

        let passes = self
            .pending
            .into_iter()
            .map(|operation| run_pass(Arc::clone(&self.document), operation));

        try_join_all(passes).await
    }
}

/// Run one operation on the blocking pool, off the async executor.
pub(crate) async fn run_pass(
    document: Arc<SourceDocument>,
    operation: Operation,
) -> Result<Extracted> {
    tokio::task::spawn_blocking(move || operation.execute(&document))
        .await
        .map_err(|e| Error::Task(format!("spawn_blocking join: {e}")))?
}
