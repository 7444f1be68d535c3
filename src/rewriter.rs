//! Selector-scoped event dispatch
//!
//! `Rewriter` streams one document through `lol_html` and reports
//! element-open, text, comment and element-close events to every registered
//! handler whose selector is in scope. No tree is built: handlers see the
//! token stream as written, chunked text included.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lol_html::html_content::{Comment, Element as HtmlElement, EndTag, TextChunk as HtmlText};
use lol_html::{
    DocumentContentHandlers, ElementContentHandlers, HandlerResult, HtmlRewriter, Selector,
    Settings,
};
use tracing::debug;

use crate::document::SourceDocument;
use crate::error::{Error, Result};

/// Bytes handed to the tokenizer per write.
const CHUNK_SIZE: usize = 8 * 1024;

/// Which element events a registration receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementScope {
    /// Only elements the selector matches.
    Matched,
    /// Matched elements and every element nested inside one.
    Subtree,
}

/// An element start tag as reported to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag_name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
}

impl Element {
    pub fn new(
        tag_name: impl Into<String>,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    ) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes,
            self_closing,
        }
    }

    fn from_tag(element: &HtmlElement<'_, '_>, self_closing: bool) -> Self {
        let attributes = element
            .attributes()
            .iter()
            .map(|attr| (attr.name(), attr.value()))
            .collect();
        Self::new(element.tag_name(), attributes, self_closing)
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// True when the element has no content and no end tag.
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Attributes in source order, values as written.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// A piece of a text node. One text node may arrive as several chunks.
#[derive(Debug, Clone, Copy)]
pub struct TextChunk<'a> {
    text: &'a str,
    last_in_text_node: bool,
}

impl<'a> TextChunk<'a> {
    pub fn new(text: &'a str, last_in_text_node: bool) -> Self {
        Self {
            text,
            last_in_text_node,
        }
    }

    /// Source text, entities left as written.
    pub fn as_str(&self) -> &'a str {
        self.text
    }

    pub fn last_in_text_node(&self) -> bool {
        self.last_in_text_node
    }
}

/// Callbacks for one registered selector. All methods default to no-ops.
pub trait ContentHandler {
    fn element_open(&mut self, _element: &Element) {}
    fn text(&mut self, _chunk: &TextChunk<'_>) {}
    fn comment(&mut self, _text: &str) {}
    fn element_close(&mut self, _tag_name: &str) {}
}

/// Per-registration state shared with the tokenizer callbacks.
struct Slot {
    handler: Rc<RefCell<dyn ContentHandler>>,
    /// Matched elements currently open.
    active: Cell<usize>,
    /// Element sequence number last delivered as a nested element.
    nested_at: Cell<Option<u64>>,
}

impl Slot {
    fn open(&self, element: &Element) {
        self.handler.borrow_mut().element_open(element);
    }

    fn close(&self, tag_name: &str) {
        self.handler.borrow_mut().element_close(tag_name);
    }

    fn in_scope(&self) -> bool {
        self.active.get() > 0
    }
}

struct Registration {
    selector: Selector,
    scope: ElementScope,
    slot: Rc<Slot>,
}

/// Dispatches document events to selector-scoped handlers for one pass.
#[derive(Default)]
pub struct Rewriter {
    registrations: Vec<Registration>,
}

impl Rewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for elements matching `selector`.
    ///
    /// The handler stays shared with the caller, who reads its state once
    /// [`Rewriter::run`] returns.
    pub fn on<H>(
        &mut self,
        selector: &str,
        scope: ElementScope,
        handler: &Rc<RefCell<H>>,
    ) -> Result<()>
    where
        H: ContentHandler + 'static,
    {
        let handler: Rc<RefCell<dyn ContentHandler>> = handler.clone();
        self.registrations.push(Registration {
            selector: parse_selector(selector)?,
            scope,
            slot: Rc::new(Slot {
                handler,
                active: Cell::new(0),
                nested_at: Cell::new(None),
            }),
        });
        Ok(())
    }

    /// Stream `document` through the tokenizer once.
    pub fn run(self, document: &SourceDocument) -> Result<()> {
        debug!(
            registrations = self.registrations.len(),
            bytes = document.body().len(),
            "starting pass"
        );
        if self.registrations.is_empty() {
            return Ok(());
        }

        let seen = Rc::new(Cell::new(0u64));
        let slots: Vec<Rc<Slot>> = self
            .registrations
            .iter()
            .map(|reg| Rc::clone(&reg.slot))
            .collect();

        // Handlers run in registration order for each element, so the
        // counter always ticks before any registration looks at it.
        let mut element_content_handlers = vec![(
            Cow::Owned(parse_selector("*")?),
            count_elements(&seen),
        )];
        for reg in self.registrations {
            if reg.scope == ElementScope::Subtree {
                element_content_handlers.push((
                    Cow::Owned(parse_selector("*")?),
                    nested_elements(&reg.slot, &seen),
                ));
            }
            element_content_handlers.push((
                Cow::Owned(reg.selector),
                matched_elements(&reg.slot, &seen),
            ));
        }

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers,
                document_content_handlers: vec![document_events(slots)],
                ..Settings::new()
            },
            |_: &[u8]| {},
        );
        for chunk in document.body().as_bytes().chunks(CHUNK_SIZE) {
            rewriter.write(chunk).map_err(rewrite_failed)?;
        }
        rewriter.end().map_err(rewrite_failed)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    selector.parse().map_err(|e| Error::Selector {
        selector: selector.to_string(),
        reason: format!("{e}"),
    })
}

fn rewrite_failed(e: impl std::fmt::Display) -> Error {
    Error::Rewrite(e.to_string())
}

fn count_elements(seen: &Rc<Cell<u64>>) -> ElementContentHandlers<'static> {
    let seen = Rc::clone(seen);
    ElementContentHandlers::default().element(
        move |_: &mut HtmlElement<'_, '_>| -> HandlerResult {
            seen.set(seen.get() + 1);
            Ok(())
        },
    )
}

/// Elements inside an open match, for `ElementScope::Subtree`.
fn nested_elements(slot: &Rc<Slot>, seen: &Rc<Cell<u64>>) -> ElementContentHandlers<'static> {
    let slot = Rc::clone(slot);
    let seen = Rc::clone(seen);
    ElementContentHandlers::default().element(
        move |el: &mut HtmlElement<'_, '_>| -> HandlerResult {
            if !slot.in_scope() {
                return Ok(());
            }
            slot.nested_at.set(Some(seen.get()));
            let self_closing = el.end_tag_handlers().is_none();
            slot.open(&Element::from_tag(el, self_closing));

            if let Some(handlers) = el.end_tag_handlers() {
                let slot = Rc::clone(&slot);
                handlers.push(Box::new(move |end: &mut EndTag<'_>| -> HandlerResult {
                    slot.close(&end.name());
                    Ok(())
                }));
            }
            Ok(())
        },
    )
}

fn matched_elements(slot: &Rc<Slot>, seen: &Rc<Cell<u64>>) -> ElementContentHandlers<'static> {
    let slot = Rc::clone(slot);
    let seen = Rc::clone(seen);
    ElementContentHandlers::default().element(
        move |el: &mut HtmlElement<'_, '_>| -> HandlerResult {
            // Already reported as part of an enclosing match.
            let delivered = slot.nested_at.get() != Some(seen.get());
            let self_closing = el.end_tag_handlers().is_none();
            if delivered {
                slot.open(&Element::from_tag(el, self_closing));
            }

            if let Some(handlers) = el.end_tag_handlers() {
                slot.active.set(slot.active.get() + 1);
                let slot = Rc::clone(&slot);
                handlers.push(Box::new(move |end: &mut EndTag<'_>| -> HandlerResult {
                    if delivered {
                        slot.close(&end.name());
                    }
                    slot.active.set(slot.active.get().saturating_sub(1));
                    Ok(())
                }));
            }
            Ok(())
        },
    )
}

fn document_events(slots: Vec<Rc<Slot>>) -> DocumentContentHandlers<'static> {
    let comment_slots = slots.clone();
    DocumentContentHandlers::default()
        .text(move |chunk: &mut HtmlText<'_>| -> HandlerResult {
            let event = TextChunk::new(chunk.as_str(), chunk.last_in_text_node());
            for slot in slots.iter().filter(|slot| slot.in_scope()) {
                slot.handler.borrow_mut().text(&event);
            }
            Ok(())
        })
        .comments(move |comment: &mut Comment<'_>| -> HandlerResult {
            let text = comment.text();
            for slot in comment_slots.iter().filter(|slot| slot.in_scope()) {
                slot.handler.borrow_mut().comment(&text);
            }
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Records events, joining the chunks of each text node.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        pending: String,
    }

    impl ContentHandler for Recorder {
        fn element_open(&mut self, element: &Element) {
            let suffix = if element.is_self_closing() { "/" } else { "" };
            self.events.push(format!("open {}{suffix}", element.tag_name()));
        }

        fn text(&mut self, chunk: &TextChunk<'_>) {
            self.pending.push_str(chunk.as_str());
            if chunk.last_in_text_node() && !self.pending.is_empty() {
                self.events.push(format!("text {}", std::mem::take(&mut self.pending)));
            }
        }

        fn comment(&mut self, text: &str) {
            self.events.push(format!("comment {text}"));
        }

        fn element_close(&mut self, tag_name: &str) {
            self.events.push(format!("close {tag_name}"));
        }
    }

    fn record(html: &str, selector: &str, scope: ElementScope) -> Vec<String> {
        let doc = SourceDocument::from_markup(html);
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut rewriter = Rewriter::new();
        rewriter.on(selector, scope, &recorder).unwrap();
        rewriter.run(&doc).unwrap();
        recorder.take().events
    }

    #[test]
    fn test_matched_scope_skips_nested_elements() {
        let events = record("<div>a<p>b</p></div>", "div", ElementScope::Matched);
        assert_eq!(events, vec!["open div", "text a", "text b", "close div"]);
    }

    #[test]
    fn test_subtree_scope_reports_nested_elements() {
        let events = record("<div>a<p>b</p><br></div>", "div", ElementScope::Subtree);
        assert_eq!(
            events,
            vec!["open div", "text a", "open p", "text b", "close p", "open br/", "close div"]
        );
    }

    #[test]
    fn test_nested_match_reported_once() {
        let events = record("<div><div>x</div></div>", "div", ElementScope::Subtree);
        assert_eq!(
            events,
            vec!["open div", "open div", "text x", "close div", "close div"]
        );
    }

    #[test]
    fn test_comments_only_inside_matches() {
        let events = record(
            "<!--outside--><span><!--inside--></span>",
            "span",
            ElementScope::Matched,
        );
        assert_eq!(events, vec!["open span", "comment inside", "close span"]);
    }

    #[test]
    fn test_text_is_reported_as_written() {
        let events = record(
            "<p>a &amp; b&nbsp;&#39;c&#39;</p><style>p > a { color: red }</style>",
            "p, style",
            ElementScope::Matched,
        );
        assert_eq!(
            events,
            vec![
                "open p",
                "text a &amp; b&nbsp;&#39;c&#39;",
                "close p",
                "open style",
                "text p > a { color: red }",
                "close style"
            ]
        );
    }

    #[test]
    fn test_no_tags_are_inserted() {
        let events = record("<table><tr><td>x</td></tr></table>", "table", ElementScope::Subtree);
        assert_eq!(
            events,
            vec![
                "open table",
                "open tr",
                "open td",
                "text x",
                "close td",
                "close tr",
                "close table"
            ]
        );
    }

    #[test]
    fn test_unclosed_element_gets_no_close_event() {
        let events = record("<div><span>x", "div", ElementScope::Subtree);
        assert_eq!(events, vec!["open div", "open span", "text x"]);
    }

    #[test]
    fn test_text_split_across_writes() {
        let long = "y".repeat(CHUNK_SIZE * 2);
        let events = record(&format!("<p>{long}</p>"), "p", ElementScope::Matched);
        assert_eq!(events, vec!["open p".to_string(), format!("text {long}"), "close p".to_string()]);
    }

    #[test]
    fn test_no_match_no_events() {
        assert!(record("<p>x</p>", "#missing", ElementScope::Subtree).is_empty());
    }

    #[test]
    fn test_invalid_selector() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut rewriter = Rewriter::new();
        let err = rewriter.on("a[", ElementScope::Matched, &recorder).unwrap_err();
        assert!(matches!(err, Error::Selector { .. }));
    }

    #[test]
    fn test_multiple_registrations_are_independent() {
        let doc = SourceDocument::from_markup("<h1>t</h1><p>x</p>");
        let first = Rc::new(RefCell::new(Recorder::default()));
        let second = Rc::new(RefCell::new(Recorder::default()));
        let mut rewriter = Rewriter::new();
        rewriter.on("h1", ElementScope::Matched, &first).unwrap();
        rewriter.on("p", ElementScope::Matched, &second).unwrap();
        rewriter.run(&doc).unwrap();
        assert_eq!(first.take().events, vec!["open h1", "text t", "close h1"]);
        assert_eq!(second.take().events, vec!["open p", "text x", "close p"]);
    }

    #[test]
    fn test_attributes_in_source_order() {
        #[derive(Default)]
        struct Attrs(Vec<(String, String)>);
        impl ContentHandler for Attrs {
            fn element_open(&mut self, element: &Element) {
                self.0.extend(
                    element
                        .attributes()
                        .map(|(n, v)| (n.to_string(), v.to_string())),
                );
            }
        }

        let doc = SourceDocument::from_markup(r#"<a rel="noopener" href="/x" class="c">x</a>"#);
        let attrs = Rc::new(RefCell::new(Attrs::default()));
        let mut rewriter = Rewriter::new();
        rewriter.on("a", ElementScope::Matched, &attrs).unwrap();
        rewriter.run(&doc).unwrap();
        let names: Vec<String> = attrs.take().0.into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["rel", "href", "class"]);
    }

    #[test]
    fn test_get_attribute_ignores_case() {
        let element = Element::new("a", vec![("href".to_string(), "/x".to_string())], false);
        assert_eq!(element.get_attribute("HREF"), Some("/x"));
        assert_eq!(element.get_attribute("title"), None);
    }
}
