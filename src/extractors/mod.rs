//! Extraction engines
//!
//! Each module pairs a capture state (fed by `Rewriter` events) with an
//! `extract_*` function that runs one pass over a document.

mod attribute_extractor;
mod html_extractor;
mod text_extractor;

pub use attribute_extractor::*;
pub use html_extractor::*;
pub use text_extractor::*;
