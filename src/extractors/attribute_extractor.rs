//! First-match attribute lookup

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::document::SourceDocument;
use crate::error::Result;
use crate::rewriter::{ContentHandler, Element, ElementScope, Rewriter};

/// Records the named attribute of the first matched element only.
#[derive(Debug, Default)]
pub struct AttributeCapture {
    name: String,
    value: Option<String>,
}

impl AttributeCapture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn finish(self) -> String {
        self.value.unwrap_or_default()
    }
}

impl ContentHandler for AttributeCapture {
    fn element_open(&mut self, element: &Element) {
        if self.value.is_none() {
            let value = element.get_attribute(&self.name).unwrap_or_default();
            self.value = Some(value.to_string());
        }
    }
}

/// Value of `attribute` on the first element matching `selector`.
///
/// Later matches are ignored. A missing element or attribute yields `""`.
pub fn extract_attribute(
    document: &SourceDocument,
    selector: &str,
    attribute: &str,
) -> Result<String> {
    let capture = Rc::new(RefCell::new(AttributeCapture::new(attribute)));
    let mut rewriter = Rewriter::new();
    rewriter.on(selector, ElementScope::Matched, &capture)?;
    rewriter.run(document)?;

    let value = capture.take().finish();
    debug!(selector, attribute, found = !value.is_empty(), "attribute extraction finished");
    Ok(value)
}
