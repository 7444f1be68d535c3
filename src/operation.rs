//! Extraction operations and their results

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::extractors::{extract_attribute, extract_html, extract_text};

/// Which extractor an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Html,
    Text,
    Attribute,
}

impl ExtractorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Text => "text",
            Self::Attribute => "attribute",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "html" => Ok(Self::Html),
            "text" => Ok(Self::Text),
            "attribute" => Ok(Self::Attribute),
            other => Err(Error::InvalidOperation(format!(
                "Unknown operation extractor: {other}"
            ))),
        }
    }
}

/// Options for text extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    /// Keep source whitespace and end every text node with a newline.
    #[serde(default, alias = "spaced")]
    pub preserve_whitespace: bool,
}

impl TextOptions {
    pub fn preserving() -> Self {
        Self {
            preserve_whitespace: true,
        }
    }
}

/// One extraction request against a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Html {
        selector: String,
    },
    Text {
        selector: String,
        options: TextOptions,
    },
    Attribute {
        selector: String,
        attribute: String,
    },
}

impl Operation {
    pub fn html(selector: impl Into<String>) -> Self {
        Self::Html {
            selector: selector.into(),
        }
    }

    pub fn text(selector: impl Into<String>, options: TextOptions) -> Self {
        Self::Text {
            selector: selector.into(),
            options,
        }
    }

    pub fn attribute(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Attribute {
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }

    pub fn kind(&self) -> ExtractorKind {
        match self {
            Self::Html { .. } => ExtractorKind::Html,
            Self::Text { .. } => ExtractorKind::Text,
            Self::Attribute { .. } => ExtractorKind::Attribute,
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Self::Html { selector }
            | Self::Text { selector, .. }
            | Self::Attribute { selector, .. } => selector,
        }
    }

    /// Run this operation as one pass over `document`.
    pub fn execute(&self, document: &SourceDocument) -> Result<Extracted> {
        tracing::debug!(kind = %self.kind(), selector = self.selector(), "executing operation");
        match self {
            Self::Html { selector } => extract_html(document, selector).map(Extracted::Html),
            Self::Text { selector, options } => {
                extract_text(document, selector, *options).map(Extracted::Text)
            }
            Self::Attribute {
                selector,
                attribute,
            } => extract_attribute(document, selector, attribute).map(Extracted::Attribute),
        }
    }
}

/// Result of a text extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TextOutput {
    /// One selector: its segments joined without a separator.
    Joined(String),
    /// Several selectors: segments per selector.
    Sections(TextSections),
}

impl TextOutput {
    pub fn as_joined(&self) -> Option<&str> {
        match self {
            Self::Joined(text) => Some(text.as_str()),
            Self::Sections(_) => None,
        }
    }
}

/// Text segments keyed by sub-selector, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSections(Vec<(String, Vec<String>)>);

impl TextSections {
    pub fn get(&self, selector: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(sel, _)| sel == selector)
            .map(|(_, segments)| segments.as_slice())
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(sel, _)| sel.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(sel, segments)| (sel.as_str(), segments.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, Vec<String>)>> for TextSections {
    fn from(sections: Vec<(String, Vec<String>)>) -> Self {
        Self(sections)
    }
}

impl Serialize for TextSections {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (selector, segments) in self.iter() {
            map.serialize_entry(selector, segments)?;
        }
        map.end()
    }
}

/// Output of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Extracted {
    Html(String),
    Text(TextOutput),
    Attribute(String),
}

impl Extracted {
    /// The result as a plain string, unless it is a multi-selector text result.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Html(s) | Self::Attribute(s) => Some(s.as_str()),
            Self::Text(text) => text.as_joined(),
        }
    }
}
