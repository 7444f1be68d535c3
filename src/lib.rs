//! Selector-scoped HTML extraction
//!
//! Extracts from one HTML document, driven by CSS selectors:
//! - HTML fragments (outer HTML of matched elements, always balanced)
//! - Text (visible-text normalized, or whitespace preserving)
//! - Attribute values (first match wins)
//!
//! Each extraction is one pass over the document's event stream. Several
//! extractions can be batched and run concurrently over the same document.
//!
//! ```rust
//! use stream_scraper::{ImmediateSession, TextOptions};
//!
//! let session = ImmediateSession::from_markup("<h1>Example Domain</h1><p>More info</p>");
//! assert_eq!(session.html("h1")?, "<h1>Example Domain</h1>");
//! assert_eq!(session.text("p", TextOptions::default())?.as_joined(), Some("More info"));
//! # Ok::<(), stream_scraper::Error>(())
//! ```

mod error;

pub mod config;
pub mod document;
pub mod extractors;
pub mod ffi;
pub mod operation;
pub mod request;
pub mod rewriter;
pub mod session;

pub use config::FetchConfig;
pub use document::SourceDocument;
pub use error::{Error, Result};
pub use operation::{Extracted, ExtractorKind, Operation, TextOptions, TextOutput, TextSections};
pub use request::{scrape, scrape_blocking, ScrapeRequest, ScrapeResponse};
pub use session::{BatchSession, ImmediateSession};
