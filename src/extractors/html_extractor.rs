//! HTML fragment capture
//!
//! Rebuilds the markup of every outermost element matching a selector. Tags
//! left open when the pass ends are closed innermost first, so the fragment
//! is always balanced.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::document::SourceDocument;
use crate::error::Result;
use crate::rewriter::{ContentHandler, Element, ElementScope, Rewriter, TextChunk};

/// Capture state for one HTML extraction pass.
#[derive(Debug, Default)]
pub struct HtmlCapture {
    html: String,
    capturing: bool,
    depth: usize,
    open_tags: Vec<String>,
}

impl HtmlCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Close any frames still open and return the fragment.
    pub fn finish(mut self) -> String {
        while let Some(tag) = self.open_tags.pop() {
            self.html.push_str("</");
            self.html.push_str(&tag);
            self.html.push('>');
        }
        self.html
    }
}

impl ContentHandler for HtmlCapture {
    fn element_open(&mut self, element: &Element) {
        if !self.capturing {
            self.capturing = true;
            self.depth = 0;
        }

        let tag = element.tag_name();
        self.html.push('<');
        self.html.push_str(tag);
        for (name, value) in element.attributes() {
            self.html.push(' ');
            self.html.push_str(name);
            self.html.push_str("=\"");
            // Single-quoted source values may contain `"`.
            self.html.push_str(&value.replace('"', "&quot;"));
            self.html.push('"');
        }

        if element.is_self_closing() {
            self.html.push_str("/>");
        } else {
            self.html.push('>');
            self.open_tags.push(tag.to_string());
            self.depth += 1;
        }
    }

    fn text(&mut self, chunk: &TextChunk<'_>) {
        if self.capturing {
            self.html.push_str(chunk.as_str());
        }
    }

    fn comment(&mut self, text: &str) {
        if self.capturing {
            self.html.push_str("<!--");
            self.html.push_str(text);
            self.html.push_str("-->");
        }
    }

    fn element_close(&mut self, tag_name: &str) {
        if !self.capturing {
            return;
        }
        // A close for a tag that was never opened here would unbalance the
        // fragment; one for an outer frame closes the frames above it first.
        let Some(index) = self.open_tags.iter().rposition(|tag| tag == tag_name) else {
            return;
        };
        for tag in self.open_tags.drain(index..).rev() {
            self.html.push_str("</");
            self.html.push_str(&tag);
            self.html.push('>');
            self.depth -= 1;
        }
        if self.depth == 0 {
            self.capturing = false;
        }
    }
}

/// Extract the outer HTML of every outermost element matching `selector`,
/// concatenated in document order. No match yields an empty string.
pub fn extract_html(document: &SourceDocument, selector: &str) -> Result<String> {
    let capture = Rc::new(RefCell::new(HtmlCapture::new()));
    let mut rewriter = Rewriter::new();
    rewriter.on(selector, ElementScope::Subtree, &capture)?;
    rewriter.run(document)?;

    let html = capture.take().finish();
    debug!(selector, bytes = html.len(), "html extraction finished");
    Ok(html)
}
