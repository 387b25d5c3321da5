//! Rewindable character source
//!
//! The tokenizer never buffers the text it scans. Instead it marks a
//! position, counts ahead, and rewinds to re-read the counted characters.
//! [`CharSource`] is that contract; [`RewindReader`] implements it over any
//! [`Read`] by decoding UTF-8 and keeping the characters read since the last
//! mark in a replay buffer bounded by the mark distance.

use std::io::{BufRead, BufReader, Read};

use crate::error::{Error, ParseError, Result};

/// A character stream supporting a single mark with bounded rewind
pub trait CharSource {
    /// Read the next character, `None` at end of input
    fn read_char(&mut self) -> Result<Option<char>>;

    /// Mark the current position. At most `max_distance` characters may be
    /// read before the mark is invalidated.
    fn mark(&mut self, max_distance: usize);

    /// Return to the most recent mark
    fn reset(&mut self) -> Result<()>;

    /// Number of characters consumed so far
    fn position(&self) -> u64;

    /// Read exactly `len` characters into a new string
    fn read_string(&mut self, len: usize) -> Result<String> {
        let mut text = String::with_capacity(len);
        for _ in 0..len {
            match self.read_char()? {
                Some(c) => text.push(c),
                None => {
                    return Err(ParseError::new("unexpected end of input inside span")
                        .at(self.position())
                        .into())
                }
            }
        }
        Ok(text)
    }

    /// Discard exactly `len` characters
    fn skip(&mut self, len: usize) -> Result<()> {
        for _ in 0..len {
            if self.read_char()?.is_none() {
                return Err(ParseError::new("unexpected end of input inside span")
                    .at(self.position())
                    .into());
            }
        }
        Ok(())
    }
}

/// UTF-8 decoding reader with a mark/reset replay buffer
pub struct RewindReader<R> {
    inner: BufReader<R>,
    /// Characters read since the mark
    replay: Vec<char>,
    /// Next index in `replay` to hand out after a reset
    cursor: usize,
    /// Distance bound of the active mark, `None` if there is no valid mark
    mark_limit: Option<usize>,
    /// Limit of the last mark that was invalidated by overrun
    overrun: Option<usize>,
    position: u64,
    byte_offset: u64,
}

impl<R: Read> RewindReader<R> {
    /// Wrap a byte stream
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            replay: Vec::new(),
            cursor: 0,
            mark_limit: None,
            overrun: None,
            position: 0,
            byte_offset: 0,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let buf = self.inner.fill_buf()?;
        let Some(&byte) = buf.first() else {
            return Ok(None);
        };
        self.inner.consume(1);
        self.byte_offset += 1;
        Ok(Some(byte))
    }

    fn decode(&mut self) -> Result<Option<char>> {
        let first = match self.next_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let start = self.byte_offset - 1;
        let width = match first {
            0x00..=0x7F => return Ok(Some(first as char)),
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(Error::Encoding { offset: start }),
        };

        let mut buf = [first, 0, 0, 0];
        for slot in buf.iter_mut().take(width).skip(1) {
            *slot = self
                .next_byte()?
                .ok_or(Error::Encoding { offset: start })?;
        }

        std::str::from_utf8(&buf[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .map(Some)
            .ok_or(Error::Encoding { offset: start })
    }
}

impl<'a> RewindReader<&'a [u8]> {
    /// Read from an in-memory string
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<R: Read> CharSource for RewindReader<R> {
    fn read_char(&mut self) -> Result<Option<char>> {
        if self.cursor < self.replay.len() {
            let c = self.replay[self.cursor];
            self.cursor += 1;
            self.position += 1;
            return Ok(Some(c));
        }

        if self.mark_limit.is_none() && !self.replay.is_empty() {
            self.replay.clear();
            self.cursor = 0;
        }

        let Some(c) = self.decode()? else {
            return Ok(None);
        };
        self.position += 1;

        match self.mark_limit {
            Some(limit) if self.replay.len() < limit => {
                self.replay.push(c);
                self.cursor += 1;
            }
            Some(limit) => {
                self.mark_limit = None;
                self.overrun = Some(limit);
                self.replay.clear();
                self.cursor = 0;
            }
            None => {}
        }

        Ok(Some(c))
    }

    fn mark(&mut self, max_distance: usize) {
        self.replay.drain(..self.cursor);
        self.cursor = 0;
        self.mark_limit = Some(max_distance);
        self.overrun = None;
    }

    fn reset(&mut self) -> Result<()> {
        match self.mark_limit {
            Some(_) => {
                self.position -= self.cursor as u64;
                self.cursor = 0;
                Ok(())
            }
            None => Err(Error::RewindLimit {
                limit: self.overrun.unwrap_or(0),
            }),
        }
    }

    fn position(&self) -> u64 {
        self.position
    }
}
