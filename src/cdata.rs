//! CDATA decorator.
//!
//! [`CDataWriter`] rewrites the text content of selected elements as CDATA
//! sections. Text containing `]]>` is split across adjoining sections, so
//! the output stays well-formed and reads back as the original text.

use crate::error::Result;
use crate::escape::cdata_segments;
use crate::token::TokenWriter;
use std::collections::BTreeSet;

/// A [`TokenWriter`] that emits the text of chosen elements as CDATA.
pub struct CDataWriter<W> {
    inner: W,
    elements: BTreeSet<String>,
    /// Innermost open element; cleared when it closes.
    current: Option<String>,
}

impl<W: TokenWriter> CDataWriter<W> {
    /// Wraps `inner`; text directly inside any of `elements` becomes CDATA.
    pub fn new<I, S>(inner: W, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            elements: elements.into_iter().map(Into::into).collect(),
            current: None,
        }
    }

    /// Returns the element names whose text is written as CDATA.
    pub fn elements(&self) -> &BTreeSet<String> {
        &self.elements
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

    fn in_cdata_element(&self) -> bool {
        self.current
            .as_deref()
            .is_some_and(|name| self.elements.contains(name))
    }
}

impl<W: TokenWriter> TokenWriter for CDataWriter<W> {
    fn start_document(&mut self) -> Result<()> {
        self.inner.start_document()
    }

    fn start_element(&mut self, name: &str) -> Result<()> {
        self.inner.start_element(name)?;
        match &mut self.current {
            Some(current) => {
                current.clear();
                current.push_str(name);
            }
            None => self.current = Some(name.to_string()),
        }
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.attribute(name, value)
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.current = None;
        self.inner.end_element(name)
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if text.is_empty() || !self.in_cdata_element() {
            return self.inner.characters(text);
        }
        for segment in cdata_segments(text) {
            self.inner.cdata(segment)?;
        }
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        self.inner.cdata(text)
    }

    fn end_document(&mut self) -> Result<()> {
        self.inner.end_document()
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
