//! Namespace-resolving event adapter
//!
//! [`EventAdapter`] sits on top of the [`Tokenizer`]. It re-reads the spans
//! the tokenizer reports, keeps one frame per open element, and turns
//! prefixed names into [`QName`]s using nearest-enclosing-scope lookup.
//! Consumers implement [`ElementHandler`] and only ever see resolved names
//! and values.

use indexmap::IndexMap;

use crate::error::Result;
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName, XML_NAMESPACE};
use crate::reader::CharSource;
use crate::tokenizer::{TokenHandler, Tokenizer};

/// Resolved attributes of a start tag, in document order, without `xmlns` declarations
pub type Attributes = IndexMap<QName, String>;

/// Receiver of namespace-resolved element events
///
/// Every callback defaults to "continue"; `Ok(false)` stops the scan.
#[allow(unused_variables)]
pub trait ElementHandler {
    /// Called before the first element
    fn start_document(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// Called after the input is exhausted
    fn end_document(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// A start tag with every name resolved
    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<bool> {
        Ok(true)
    }

    /// The end of an element (also raised for `/>`)
    fn end_element(&mut self, name: &QName) -> Result<bool> {
        Ok(true)
    }
}

/// Attribute exactly as written in the start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    /// Prefix without the colon, empty if none
    pub prefix: String,
    /// Local name
    pub local_name: String,
    /// Value, entity references left as written
    pub value: String,
}

impl RawAttribute {
    /// Whether this attribute is an `xmlns` or `xmlns:X` declaration
    pub fn is_namespace_declaration(&self) -> bool {
        (self.prefix.is_empty() && self.local_name == "xmlns") || self.prefix == "xmlns"
    }
}

/// One open element
///
/// Frames are kept in a vector indexed by depth and reused when an element
/// at the same depth opens again.
#[derive(Debug, Default)]
struct Frame {
    prefix: String,
    local_name: String,
    /// Filled in when the start tag closes
    name: Option<QName>,
    /// Bindings declared on this element; empty if it declared none
    bindings: NamespaceContext,
    attributes: Vec<RawAttribute>,
}

impl Frame {
    fn clear(&mut self) {
        self.prefix.clear();
        self.local_name.clear();
        self.name = None;
        self.bindings.clear();
        self.attributes.clear();
    }
}

/// Look up `prefix` from the innermost frame outwards
fn lookup_prefix<'f>(frames: &'f [Frame], prefix: &str) -> Option<&'f str> {
    if prefix == "xml" {
        return Some(XML_NAMESPACE);
    }
    frames
        .iter()
        .rev()
        .find_map(|frame| frame.bindings.lookup(prefix))
        .filter(|ns| !ns.is_empty())
}

fn read_into(src: &mut dyn CharSource, buf: &mut String, len: usize) -> Result<()> {
    buf.clear();
    buf.reserve(len);
    for _ in 0..len {
        match src.read_char()? {
            Some(c) => buf.push(c),
            None => break,
        }
    }
    Ok(())
}

/// Adapter from tokenizer spans to resolved element events
pub struct EventAdapter<H> {
    handler: H,
    frames: Vec<Frame>,
    depth: usize,
    limits: Limits,
    resolved: Attributes,
}

impl<H: ElementHandler> EventAdapter<H> {
    /// Wrap a handler with default limits
    pub fn new(handler: H) -> Self {
        Self::with_limits(handler, Limits::default())
    }

    /// Wrap a handler with explicit limits
    pub fn with_limits(handler: H, limits: Limits) -> Self {
        Self {
            handler,
            frames: Vec::new(),
            depth: 0,
            limits,
            resolved: Attributes::new(),
        }
    }

    /// Tokenize `src` and feed the resolved events to the handler
    ///
    /// Returns `Ok(false)` if the handler stopped the scan.
    pub fn parse(&mut self, src: &mut dyn CharSource) -> Result<bool> {
        self.depth = 0;
        let tokenizer = Tokenizer::with_limits(&self.limits);
        tokenizer.tokenize(src, self)
    }

    /// The wrapped handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The wrapped handler, mutably
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Unwrap the handler
    pub fn into_inner(self) -> H {
        self.handler
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Attributes of the innermost open element as written, declarations included
    pub fn raw_attributes(&self) -> &[RawAttribute] {
        match self.depth {
            0 => &[],
            d => &self.frames[d - 1].attributes,
        }
    }

    /// Resolve a prefix against the currently open elements
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        lookup_prefix(&self.frames[..self.depth], prefix)
    }
}

impl<H: ElementHandler> TokenHandler for EventAdapter<H> {
    fn start_document(&mut self) -> Result<bool> {
        self.handler.start_document()
    }

    fn end_document(&mut self) -> Result<bool> {
        self.handler.end_document()
    }

    fn start_element(
        &mut self,
        src: &mut dyn CharSource,
        prefix_len: usize,
        local_len: usize,
    ) -> Result<bool> {
        self.limits.check_xml_depth(self.depth + 1)?;
        if self.depth == self.frames.len() {
            self.frames.push(Frame::default());
        }
        let frame = &mut self.frames[self.depth];
        frame.clear();
        self.depth += 1;

        if prefix_len > 0 {
            read_into(src, &mut frame.prefix, prefix_len)?;
            frame.prefix.pop(); // ':'
        }
        read_into(src, &mut frame.local_name, local_len)?;
        Ok(true)
    }

    fn attribute(
        &mut self,
        src: &mut dyn CharSource,
        prefix_len: usize,
        local_len: usize,
        skip_len: usize,
        value_len: usize,
    ) -> Result<bool> {
        if self.depth == 0 {
            return Ok(true);
        }
        let frame = &mut self.frames[self.depth - 1];
        self.limits.check_attributes(frame.attributes.len() + 1)?;

        let mut attribute = RawAttribute {
            prefix: String::new(),
            local_name: String::new(),
            value: String::new(),
        };
        if prefix_len > 0 {
            read_into(src, &mut attribute.prefix, prefix_len)?;
            attribute.prefix.pop();
        }
        read_into(src, &mut attribute.local_name, local_len)?;
        src.skip(skip_len)?;
        read_into(src, &mut attribute.value, value_len)?;

        if attribute.prefix.is_empty() && attribute.local_name == "xmlns" {
            frame.bindings.set_default_namespace(attribute.value.as_str());
        } else if attribute.prefix == "xmlns" {
            frame
                .bindings
                .add_prefix(attribute.local_name.as_str(), attribute.value.as_str());
        }
        frame.attributes.push(attribute);
        Ok(true)
    }

    fn close_start_tag(&mut self) -> Result<bool> {
        if self.depth == 0 {
            return Ok(true);
        }
        let current = self.depth - 1;
        let open = &self.frames[..self.depth];

        let frame = &open[current];
        let name = QName::new(
            lookup_prefix(open, &frame.prefix),
            frame.local_name.as_str(),
        );

        self.resolved.clear();
        for attribute in frame
            .attributes
            .iter()
            .filter(|a| !a.is_namespace_declaration())
        {
            let namespace = if attribute.prefix.is_empty() {
                None
            } else {
                lookup_prefix(open, &attribute.prefix)
            };
            self.resolved.insert(
                QName::new(namespace, attribute.local_name.as_str()),
                attribute.value.clone(),
            );
        }

        let frame = &mut self.frames[current];
        let name = frame.name.insert(name);
        self.handler.start_element(name, &self.resolved)
    }

    fn end_element(&mut self) -> Result<bool> {
        if self.depth == 0 {
            return Ok(true);
        }
        self.depth -= 1;
        let frame = &self.frames[self.depth];
        match &frame.name {
            Some(name) => self.handler.end_element(name),
            None => self
                .handler
                .end_element(&QName::local(frame.local_name.as_str())),
        }
    }
}
