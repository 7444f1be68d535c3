//! Text aggregation per matched element
//!
//! Each comma-separated part of a selector gets its own accumulator. Text is
//! collected per text node, grouped by matched element, and (unless
//! whitespace is preserved) normalized to "visible text".

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::operation::{TextOptions, TextOutput, TextSections};
use crate::rewriter::{ContentHandler, Element, ElementScope, Rewriter, TextChunk};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Unit {
    /// A matched element opened.
    Boundary,
    /// A completed text node.
    Text(String),
}

/// Text state for one sub-selector during one pass.
#[derive(Debug, Default)]
pub struct TextAccumulator {
    preserve_whitespace: bool,
    pending_text: String,
    units: Vec<Unit>,
}

impl TextAccumulator {
    pub fn new(options: TextOptions) -> Self {
        Self {
            preserve_whitespace: options.preserve_whitespace,
            ..Self::default()
        }
    }

    /// Reduce recorded units to one segment per matched element.
    pub fn finish(self) -> Vec<String> {
        let settle = |text: &str| {
            if self.preserve_whitespace {
                text.to_string()
            } else {
                clean_text(text)
            }
        };
        let mut segments = Vec::new();
        let mut current = String::new();

        for unit in &self.units {
            match unit {
                Unit::Boundary => {
                    if !current.is_empty() {
                        segments.push(settle(&current));
                        current.clear();
                    }
                }
                Unit::Text(text) => current.push_str(text),
            }
        }

        let last = settle(&current);
        if !last.is_empty() {
            segments.push(last);
        }
        segments
    }
}

impl ContentHandler for TextAccumulator {
    fn element_open(&mut self, _element: &Element) {
        self.units.push(Unit::Boundary);
        self.pending_text.clear();
    }

    fn text(&mut self, chunk: &TextChunk<'_>) {
        self.pending_text.push_str(chunk.as_str());
        if chunk.last_in_text_node() {
            if self.preserve_whitespace {
                self.pending_text.push('\n');
            }
            self.units
                .push(Unit::Text(std::mem::take(&mut self.pending_text)));
        }
    }
}

/// Trim and collapse every whitespace run to a single space.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a selector list into trimmed sub-selectors. Empty and repeated
/// parts are dropped, first occurrence wins.
pub fn split_selectors(selector: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = Vec::new();
    for part in selector.split(',').map(str::trim) {
        if !part.is_empty() && !parts.contains(&part) {
            parts.push(part);
        }
    }
    parts
}

/// Extract text for `selector`.
///
/// A single selector yields its segments joined without a separator; a
/// comma-separated list yields the segments of each part, keyed by part.
pub fn extract_text(
    document: &SourceDocument,
    selector: &str,
    options: TextOptions,
) -> Result<TextOutput> {
    let selectors = split_selectors(selector);
    if selectors.is_empty() {
        return Err(Error::Selector {
            selector: selector.to_string(),
            reason: "empty selector list".to_string(),
        });
    }

    let accumulators: Vec<Rc<RefCell<TextAccumulator>>> = selectors
        .iter()
        .map(|_| Rc::new(RefCell::new(TextAccumulator::new(options))))
        .collect();

    let mut rewriter = Rewriter::new();
    for (sel, acc) in selectors.iter().zip(&accumulators) {
        rewriter.on(sel, ElementScope::Matched, acc)?;
    }
    rewriter.run(document)?;

    let mut sections: Vec<(String, Vec<String>)> = selectors
        .iter()
        .zip(&accumulators)
        .map(|(sel, acc)| (sel.to_string(), acc.take().finish()))
        .collect();
    debug!(selector, parts = sections.len(), "text extraction finished");

    if sections.len() == 1 {
        if let Some((_, segments)) = sections.pop() {
            return Ok(TextOutput::Joined(segments.concat()));
        }
    }
    Ok(TextOutput::Sections(TextSections::from(sections)))
}
