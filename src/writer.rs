//! Byte-level end of the token pipeline.
//!
//! [`XmlWriter`] is the innermost link of the output pipeline: it turns
//! token events into UTF-8 bytes and adds no whitespace of its own.

use crate::error::{Error, Result};
use crate::escape::{escape_to, CDATA_END};
use crate::reader::is_xml_name;
use crate::token::TokenWriter;
use std::io::Write;

/// A token writer that produces well-formed XML bytes.
pub struct XmlWriter<W: Write> {
    sink: W,
    /// Names of the elements still open, innermost last.
    open_elements: Vec<String>,
    /// A start tag has been written without its closing `>`.
    start_tag_open: bool,
    /// Reused escape buffer.
    scratch: String,
}

impl<W: Write> XmlWriter<W> {
    /// Wraps a byte sink.
    #[inline]
    pub fn new(writer: W) -> Self {
        Self {
            sink: writer,
            open_elements: Vec::new(),
            start_tag_open: false,
            scratch: String::new(),
        }
    }

    /// Borrows the byte sink.
    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Unwraps the byte sink.
    #[inline]
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Number of elements still open.
    #[inline]
    pub fn depth(&self) -> usize {
        self.open_elements.len()
    }

    /// Terminates a pending start tag.
    fn finish_start_tag(&mut self) -> Result<()> {
        if self.start_tag_open {
            self.sink.write_all(b">")?;
            self.start_tag_open = false;
        }
        Ok(())
    }

    fn write_escaped(&mut self, s: &str) -> Result<()> {
        self.scratch.clear();
        escape_to(s, &mut self.scratch);
        self.sink.write_all(self.scratch.as_bytes())?;
        Ok(())
    }
}

impl<W: Write> TokenWriter for XmlWriter<W> {
    fn start_document(&mut self) -> Result<()> {
        self.sink
            .write_all(br#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        Ok(())
    }

    fn start_element(&mut self, name: &str) -> Result<()> {
        if !is_xml_name(name) {
            return Err(Error::invalid_name(name));
        }
        self.finish_start_tag()?;
        write!(self.sink, "<{}", name)?;
        self.open_elements.push(name.to_string());
        self.start_tag_open = true;
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.start_tag_open {
            return Err(Error::syntax(format!(
                "attribute '{}' written outside of a start tag",
                name
            )));
        }
        if !is_xml_name(name) {
            return Err(Error::invalid_name(name));
        }
        write!(self.sink, " {}=\"", name)?;
        self.write_escaped(value)?;
        self.sink.write_all(b"\"")?;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        match self.open_elements.pop() {
            Some(open) if open == name => {
                if self.start_tag_open {
                    self.sink.write_all(b"/>")?;
                    self.start_tag_open = false;
                } else {
                    write!(self.sink, "</{}>", name)?;
                }
                Ok(())
            }
            Some(open) => Err(Error::mismatched_tag(open, name.to_string())),
            None => Err(Error::syntax(format!("no element to close for </{}>", name))),
        }
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.finish_start_tag()?;
        self.write_escaped(text)
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        if text.contains(CDATA_END) {
            return Err(Error::invalid_value("CDATA section text contains ']]>'"));
        }
        self.finish_start_tag()?;
        write!(self.sink, "<![CDATA[{}]]>", text)?;
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        if let Some(open) = self.open_elements.last() {
            return Err(Error::unclosed_tag(open.as_str()));
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }
}
