//! Pretty-printing decorator.
//!
//! [`IndentingWriter`] wraps another [`TokenWriter`] and inserts a newline
//! plus indentation before start tags and before end tags that close
//! elements with child elements. It looks back exactly one event and never
//! adds whitespace next to text, so mixed content keeps its exact value.

use crate::error::Result;
use crate::token::TokenWriter;

/// Whitespace used by [`IndentingWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentConfig {
    /// Written once per nesting level.
    pub indent: String,
    /// Written before every indented tag.
    pub newline: String,
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            newline: "\n".to_string(),
        }
    }
}

impl IndentConfig {
    /// Creates a config with the given indent unit and `"\n"` newlines.
    pub fn new<S: Into<String>>(indent: S) -> Self {
        Self {
            indent: indent.into(),
            ..Self::default()
        }
    }

    /// Creates a config that adds no whitespace at all.
    pub fn none() -> Self {
        Self {
            indent: String::new(),
            newline: String::new(),
        }
    }

    /// Sets the newline string.
    pub fn with_newline<S: Into<String>>(mut self, newline: S) -> Self {
        self.newline = newline.into();
        self
    }
}

/// What the decorator forwarded last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    Nothing,
    Document,
    Start,
    End,
    Text,
}

/// A [`TokenWriter`] that indents nested elements.
pub struct IndentingWriter<W> {
    inner: W,
    config: IndentConfig,
    depth: usize,
    last: Last,
    pad: String,
}

impl<W: TokenWriter> IndentingWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W, config: IndentConfig) -> Self {
        Self {
            inner,
            config,
            depth: 0,
            last: Last::Nothing,
            pad: String::new(),
        }
    }

    /// Returns the number of elements currently open.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns a reference to the wrapped writer.
    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Writes the newline followed by `depth` indent units.
    fn write_break(&mut self) -> Result<()> {
        self.pad.clear();
        self.pad.push_str(&self.config.newline);
        for _ in 0..self.depth {
            self.pad.push_str(&self.config.indent);
        }
        if self.pad.is_empty() {
            return Ok(());
        }
        self.inner.characters(&self.pad)
    }
}

impl<W: TokenWriter> TokenWriter for IndentingWriter<W> {
    fn start_document(&mut self) -> Result<()> {
        self.inner.start_document()?;
        self.last = Last::Document;
        Ok(())
    }

    fn start_element(&mut self, name: &str) -> Result<()> {
        match self.last {
            Last::Start | Last::End => self.write_break()?,
            Last::Document if !self.config.newline.is_empty() => {
                self.inner.characters(&self.config.newline)?
            }
            Last::Document => {}
            Last::Nothing | Last::Text => {}
        }
        self.inner.start_element(name)?;
        self.depth += 1;
        self.last = Last::Start;
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.attribute(name, value)
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        debug_assert!(self.depth > 0, "end_element without matching start_element");
        self.depth = self.depth.saturating_sub(1);
        if self.last == Last::End {
            self.write_break()?;
        }
        self.inner.end_element(name)?;
        self.last = Last::End;
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.inner.characters(text)?;
        self.last = Last::Text;
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        self.inner.cdata(text)?;
        self.last = Last::Text;
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.inner.end_document()?;
        self.inner.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
