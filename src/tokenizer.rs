//! Streaming XML tokenizer
//!
//! The tokenizer walks a [`CharSource`] once and reports structural
//! boundaries to a [`TokenHandler`]. Events carry *lengths*, never strings:
//! the scanner marks the start of a construct, counts ahead to find the
//! lengths, rewinds to the mark and hands the source to the callback
//! positioned at the first character of the span. After the callback it
//! rewinds once more and skips exactly the counted characters, so a callback
//! may read as much or as little of the span as it needs.
//!
//! This is not a validating parser. Character data, entity references and
//! CDATA sections are skipped. Input that ends inside markup is reported as
//! [`Error::Malformed`](crate::Error::Malformed) with the offset of the
//! construct that was left open.

use crate::error::{ParseError, Result};
use crate::limits::{Limits, DEFAULT_MAX_REWIND};
use crate::reader::CharSource;

/// Receiver of tokenizer events
///
/// Every callback defaults to "continue". Returning `Ok(false)` stops the
/// scan immediately. Span callbacks receive the source positioned at the
/// first character of the span.
#[allow(unused_variables)]
pub trait TokenHandler {
    /// Called once before any other event
    fn start_document(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// Called once when the input is exhausted
    fn end_document(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// `<!--` ... `-->`; `len` covers the text between the delimiters
    fn comment(&mut self, src: &mut dyn CharSource, len: usize) -> Result<bool> {
        Ok(true)
    }

    /// `<!DOCTYPE` ... `>`; `len` covers everything between `<!` and the final `>`
    fn doctype(&mut self, src: &mut dyn CharSource, len: usize) -> Result<bool> {
        Ok(true)
    }

    /// `<?name`; `name_len` covers the target name
    fn start_declaration(&mut self, src: &mut dyn CharSource, name_len: usize) -> Result<bool> {
        Ok(true)
    }

    /// `?>`
    fn end_declaration(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// `<prefix:local`; `prefix_len` includes the colon and is 0 without a prefix
    fn start_element(
        &mut self,
        src: &mut dyn CharSource,
        prefix_len: usize,
        local_len: usize,
    ) -> Result<bool> {
        Ok(true)
    }

    /// The `>` (or the `/>`) that closes a start tag
    fn close_start_tag(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// `</name>`, or immediately after `close_start_tag` for `/>`
    fn end_element(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// `prefix:local = "value"`
    ///
    /// The span starts at the attribute name. `skip_len` counts the
    /// characters between the local name and the value, opening quote
    /// included; `value_len` excludes both quotes.
    fn attribute(
        &mut self,
        src: &mut dyn CharSource,
        prefix_len: usize,
        local_len: usize,
        skip_len: usize,
        value_len: usize,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// Scanner state between two reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Character data between tags
    Outside,
    /// After the element name, reading attributes
    StartTag,
    /// Counting a quoted attribute value
    AttributeValue {
        prefix_len: usize,
        local_len: usize,
        skip_len: usize,
        quote: char,
    },
    /// After `<!`
    CommentOrDoctype,
    /// After `<?`
    Declaration,
}

enum Step {
    Next(State),
    Stop,
    Eof,
}

/// XML structure scanner
#[derive(Debug, Clone)]
pub struct Tokenizer {
    max_rewind: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            max_rewind: DEFAULT_MAX_REWIND,
        }
    }
}

impl Tokenizer {
    /// Create a tokenizer with the default rewind distance
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tokenizer that marks with `limits.max_rewind`
    pub fn with_limits(limits: &Limits) -> Self {
        Self {
            max_rewind: limits.max_rewind,
        }
    }

    /// Scan `src` to the end, reporting to `handler`
    ///
    /// Returns `Ok(true)` if the whole input was scanned and `Ok(false)` if a
    /// callback stopped the scan.
    pub fn tokenize<H: TokenHandler + ?Sized>(
        &self,
        src: &mut dyn CharSource,
        handler: &mut H,
    ) -> Result<bool> {
        let mut scan = Scan {
            src,
            handler,
            max_rewind: self.max_rewind,
            markup_start: 0,
        };
        scan.run()
    }
}

struct Scan<'a, H: ?Sized> {
    src: &'a mut dyn CharSource,
    handler: &'a mut H,
    max_rewind: usize,
    /// Offset of the `<` that opened the current construct
    markup_start: u64,
}

impl<H: TokenHandler + ?Sized> Scan<'_, H> {
    fn run(&mut self) -> Result<bool> {
        if !self.handler.start_document()? {
            return Ok(false);
        }

        let mut state = State::Outside;
        loop {
            let step = match state {
                State::Outside => self.outside()?,
                State::StartTag => self.start_tag()?,
                State::AttributeValue {
                    prefix_len,
                    local_len,
                    skip_len,
                    quote,
                } => self.attribute_value(prefix_len, local_len, skip_len, quote)?,
                State::CommentOrDoctype => self.comment_or_doctype()?,
                State::Declaration => self.declaration()?,
            };

            match step {
                Step::Next(next) => state = next,
                Step::Stop => return Ok(false),
                Step::Eof => break,
            }
        }

        self.handler.end_document()
    }

    fn malformed(&self, message: &str) -> crate::error::Error {
        ParseError::new(message).at(self.markup_start).into()
    }

    fn next_in_markup(&mut self, message: &str) -> Result<char> {
        match self.src.read_char()? {
            Some(c) => Ok(c),
            None => Err(self.malformed(message)),
        }
    }

    /// Rewind to the mark, run `callback` on the span, then step over it
    fn emit<F>(&mut self, total: usize, callback: F) -> Result<bool>
    where
        F: FnOnce(&mut H, &mut dyn CharSource) -> Result<bool>,
    {
        self.src.reset()?;
        let go = callback(self.handler, self.src)?;
        self.src.reset()?;
        self.src.skip(total)?;
        Ok(go)
    }

    fn flow(go: bool, next: State) -> Step {
        if go {
            Step::Next(next)
        } else {
            Step::Stop
        }
    }

    fn outside(&mut self) -> Result<Step> {
        loop {
            match self.src.read_char()? {
                None => return Ok(Step::Eof),
                Some('<') => break,
                Some(_) => {}
            }
        }
        self.markup_start = self.src.position() - 1;

        self.src.mark(self.max_rewind);
        match self.next_in_markup("unterminated markup")? {
            '!' => Ok(Step::Next(State::CommentOrDoctype)),
            '?' => Ok(Step::Next(State::Declaration)),
            '/' => {
                while self.next_in_markup("unterminated end tag")? != '>' {}
                let go = self.handler.end_element()?;
                Ok(Self::flow(go, State::Outside))
            }
            _ => {
                self.src.reset()?;
                self.element_name()
            }
        }
    }

    fn element_name(&mut self) -> Result<Step> {
        let mut count = 0;
        let mut colon = None;
        loop {
            match self.next_in_markup("unterminated start tag")? {
                c if c.is_whitespace() || c == '/' || c == '>' => break,
                ':' if colon.is_none() => {
                    colon = Some(count);
                    count += 1;
                }
                _ => count += 1,
            }
        }

        let prefix_len = colon.map_or(0, |i| i + 1);
        let local_len = count - prefix_len;
        let go = self.emit(count, |h, src| h.start_element(src, prefix_len, local_len))?;
        Ok(Self::flow(go, State::StartTag))
    }

    fn start_tag(&mut self) -> Result<Step> {
        loop {
            self.src.mark(self.max_rewind);
            match self.next_in_markup("unterminated start tag")? {
                c if c.is_whitespace() => {}
                '>' => {
                    let go = self.handler.close_start_tag()?;
                    return Ok(Self::flow(go, State::Outside));
                }
                '/' => {
                    if self.next_in_markup("unterminated start tag")? != '>' {
                        return Err(self.malformed("expected '>' after '/' in start tag"));
                    }
                    if !self.handler.close_start_tag()? {
                        return Ok(Step::Stop);
                    }
                    let go = self.handler.end_element()?;
                    return Ok(Self::flow(go, State::Outside));
                }
                _ => {
                    self.src.reset()?;
                    return self.attribute_name();
                }
            }
        }
    }

    fn attribute_name(&mut self) -> Result<Step> {
        let mut count = 0;
        let mut colon = None;
        let terminator = loop {
            match self.next_in_markup("unterminated start tag")? {
                c if c == '=' || c == '>' || c == '/' || c.is_whitespace() => break c,
                ':' if colon.is_none() => {
                    colon = Some(count);
                    count += 1;
                }
                _ => count += 1,
            }
        };

        let mut skip_len = 1;
        let mut seen_eq = terminator == '=';
        if terminator == '>' || terminator == '/' {
            return Err(self.malformed("attribute without value"));
        }

        let quote = loop {
            let c = self.next_in_markup("unterminated start tag")?;
            skip_len += 1;
            match c {
                c if c.is_whitespace() => {}
                '=' if !seen_eq => seen_eq = true,
                '"' | '\'' if seen_eq => break c,
                _ => return Err(self.malformed("attribute without quoted value")),
            }
        };

        let prefix_len = colon.map_or(0, |i| i + 1);
        Ok(Step::Next(State::AttributeValue {
            prefix_len,
            local_len: count - prefix_len,
            skip_len,
            quote,
        }))
    }

    fn attribute_value(
        &mut self,
        prefix_len: usize,
        local_len: usize,
        skip_len: usize,
        quote: char,
    ) -> Result<Step> {
        let mut value_len = 0;
        while self.next_in_markup("unbalanced quote in attribute value")? != quote {
            value_len += 1;
        }

        let total = prefix_len + local_len + skip_len + value_len;
        let go = self.emit(total, |h, src| {
            h.attribute(src, prefix_len, local_len, skip_len, value_len)
        })?;
        // closing quote
        self.src.skip(1)?;
        Ok(Self::flow(go, State::StartTag))
    }

    fn comment_or_doctype(&mut self) -> Result<Step> {
        self.src.mark(self.max_rewind);
        match self.next_in_markup("unterminated markup declaration")? {
            '-' => {
                if self.next_in_markup("unterminated comment")? != '-' {
                    return Err(self.malformed("expected '<!--'"));
                }
                self.comment()
            }
            '[' => self.cdata(),
            _ => {
                self.src.reset()?;
                self.doctype()
            }
        }
    }

    fn comment(&mut self) -> Result<Step> {
        self.src.mark(self.max_rewind);
        let mut count = 0;
        let mut dashes = 0;
        loop {
            match self.next_in_markup("unterminated comment")? {
                '>' if dashes >= 2 => break,
                '-' => dashes += 1,
                _ => dashes = 0,
            }
            count += 1;
        }

        let len = count - 2;
        let go = self.emit(len, |h, src| h.comment(src, len))?;
        self.src.skip(3)?;
        Ok(Self::flow(go, State::Outside))
    }

    fn cdata(&mut self) -> Result<Step> {
        let mut brackets = 0;
        loop {
            match self.next_in_markup("unterminated CDATA section")? {
                '>' if brackets >= 2 => return Ok(Step::Next(State::Outside)),
                ']' => brackets += 1,
                _ => brackets = 0,
            }
        }
    }

    fn doctype(&mut self) -> Result<Step> {
        let mut count = 0;
        let mut depth = 0usize;
        let mut quote = None;
        loop {
            let c = self.next_in_markup("unterminated doctype")?;
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    '"' | '\'' => quote = Some(c),
                    '[' => depth += 1,
                    ']' => depth = depth.saturating_sub(1),
                    '>' if depth == 0 => break,
                    _ => {}
                },
            }
            count += 1;
        }

        let go = self.emit(count, |h, src| h.doctype(src, count))?;
        self.src.skip(1)?;
        Ok(Self::flow(go, State::Outside))
    }

    fn declaration(&mut self) -> Result<Step> {
        self.src.mark(self.max_rewind);
        let mut count = 0;
        loop {
            match self.next_in_markup("unterminated declaration")? {
                c if c.is_whitespace() || c == '?' => break,
                _ => count += 1,
            }
        }
        if !self.emit(count, |h, src| h.start_declaration(src, count))? {
            return Ok(Step::Stop);
        }

        let mut question = false;
        loop {
            match self.next_in_markup("unterminated declaration")? {
                '>' if question => break,
                '?' => question = true,
                _ => question = false,
            }
        }
        let go = self.handler.end_declaration()?;
        Ok(Self::flow(go, State::Outside))
    }
}
