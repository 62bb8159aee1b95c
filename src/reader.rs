//! Pull tokenizer for XML input.
//!
//! [`XmlReader`] borrows its input and hands out one [`XmlEvent`] per call.
//! Text comes back as written, with entities decoded. Whitespace between
//! tags is reported too; [`is_blank`] tells indentation apart from content.

use crate::error::{Error, ErrorKind, Position, Result};
use crate::escape::unescape;
use memchr::{memchr, memchr2, memchr_iter, memmem, memrchr};
use std::borrow::Cow;

static WS: [bool; 256] = {
    let mut lut = [false; 256];
    lut[b' ' as usize] = true;
    lut[b'\t' as usize] = true;
    lut[b'\n' as usize] = true;
    lut[b'\r' as usize] = true;
    lut
};

static NAME_START: [bool; 256] = {
    let mut lut = [false; 256];
    let mut i = b'A';
    while i <= b'Z' {
        lut[i as usize] = true;
        lut[(i + 32) as usize] = true;
        i += 1;
    }
    lut[b'_' as usize] = true;
    lut[b':' as usize] = true;
    // Non-ASCII bytes belong to multi-byte UTF-8 name characters.
    let mut i: usize = 0x80;
    while i < 256 {
        lut[i] = true;
        i += 1;
    }
    lut
};

static NAME_CHAR: [bool; 256] = {
    let mut lut = NAME_START;
    let mut i = b'0';
    while i <= b'9' {
        lut[i as usize] = true;
        i += 1;
    }
    lut[b'-' as usize] = true;
    lut[b'.' as usize] = true;
    lut
};

/// Returns `true` if `text` holds nothing but XML whitespace.
pub fn is_blank(text: &str) -> bool {
    text.bytes().all(|b| WS[b as usize])
}

/// Returns `true` if `name` can be used as an element or attribute name.
pub fn is_xml_name(name: &str) -> bool {
    match name.as_bytes().split_first() {
        Some((first, rest)) => {
            NAME_START[*first as usize] && rest.iter().all(|b| NAME_CHAR[*b as usize])
        }
        None => false,
    }
}

/// One token of XML input.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent<'a> {
    /// `<?xml version="1.0"?>`
    XmlDecl {
        /// XML version.
        version: Cow<'a, str>,
        /// Declared character encoding.
        encoding: Option<Cow<'a, str>>,
        /// Standalone flag.
        standalone: Option<bool>,
    },
    /// `<name attr="value">`
    StartElement {
        /// Qualified name, prefix included.
        name: Cow<'a, str>,
        /// Attributes in document order.
        attributes: Vec<Attribute<'a>>,
    },
    /// `</name>`
    EndElement {
        /// Qualified name, prefix included.
        name: Cow<'a, str>,
    },
    /// `<name attr="value"/>`
    EmptyElement {
        /// Qualified name, prefix included.
        name: Cow<'a, str>,
        /// Attributes in document order.
        attributes: Vec<Attribute<'a>>,
    },
    /// Text content with entities decoded.
    Text(Cow<'a, str>),
    /// Contents of one `<![CDATA[...]]>` section.
    CData(Cow<'a, str>),
    /// `<!-- ... -->`
    Comment(Cow<'a, str>),
    /// `<?target data?>`
    ProcessingInstruction {
        /// Instruction target.
        target: Cow<'a, str>,
        /// Instruction data, if any.
        data: Option<Cow<'a, str>>,
    },
    /// End of input.
    Eof,
}

impl XmlEvent<'_> {
    /// Returns the element name for start, empty and end events.
    pub fn element_name(&self) -> Option<&str> {
        match self {
            XmlEvent::StartElement { name, .. }
            | XmlEvent::EmptyElement { name, .. }
            | XmlEvent::EndElement { name } => Some(name),
            _ => None,
        }
    }
}

/// A `name="value"` pair from a start tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<'a> {
    /// Qualified name.
    pub name: Cow<'a, str>,
    /// The attribute value, entities decoded.
    pub value: Cow<'a, str>,
}

/// A zero-copy XML tokenizer.
pub struct XmlReader<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    open: Vec<&'a str>,
    event_start: Position,
}

impl<'a> XmlReader<'a> {
    /// Creates a reader over a string.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &'a str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Creates a reader over UTF-8 bytes.
    #[inline]
    pub fn from_bytes(input: &'a [u8]) -> Self {
        let start = Position { line: 1, column: 1, offset: 0 };
        Self {
            input,
            pos: 0,
            line: start.line,
            col: start.column,
            open: Vec::with_capacity(8),
            event_start: start,
        }
    }

    /// Where the next token starts.
    #[inline]
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.col,
            offset: self.pos,
        }
    }

    /// Returns where the event returned last started.
    #[inline]
    pub fn event_position(&self) -> Position {
        self.event_start
    }

    /// Returns the number of open elements.
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Reads the next event.
    pub fn next_event(&mut self) -> Result<XmlEvent<'a>> {
        loop {
            self.event_start = self.position();
            let Some(&byte) = self.input.get(self.pos) else {
                return match self.open.last() {
                    Some(tag) => Err(Error::unclosed_tag(*tag).with_position(self.position())),
                    None => Ok(XmlEvent::Eof),
                };
            };

            if byte != b'<' {
                return self.read_text();
            }
            if let Some(event) = self.read_markup()? {
                return Ok(event);
            }
        }
    }

    /// Moves to `end`, keeping line and column in step.
    fn advance_to(&mut self, end: usize) {
        let skipped = &self.input[self.pos..end];
        match memrchr(b'\n', skipped) {
            Some(last) => {
                self.line += memchr_iter(b'\n', skipped).count();
                self.col = skipped.len() - last;
            }
            None => self.col += skipped.len(),
        }
        self.pos = end;
    }

    fn skip_whitespace(&mut self) {
        let end = self.input[self.pos..]
            .iter()
            .position(|b| !WS[*b as usize])
            .map_or(self.input.len(), |n| self.pos + n);
        self.advance_to(end);
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.input.get(self.pos) {
            Some(&b) if b == expected => {
                self.advance_to(self.pos + 1);
                Ok(())
            }
            Some(&b) => Err(Error::syntax(format!(
                "expected '{}', found '{}'",
                expected as char, b as char
            ))
            .with_position(self.position())),
            None => Err(Error::unexpected_eof().with_position(self.position())),
        }
    }

    fn read_text(&mut self) -> Result<XmlEvent<'a>> {
        let input = self.input;
        let start = self.pos;
        let end = memchr(b'<', &input[start..]).map_or(input.len(), |n| start + n);
        self.advance_to(end);

        let text = utf8(&input[start..end])?;
        match unescape(text) {
            Ok(text) => Ok(XmlEvent::Text(text)),
            Err(e) => Err(Error::invalid_escape(e.entity).with_position(self.event_start)),
        }
    }

    /// Returns `None` for constructs that produce no event (DOCTYPE).
    fn read_markup(&mut self) -> Result<Option<XmlEvent<'a>>> {
        match self.input.get(self.pos + 1) {
            None => Err(Error::unexpected_eof().with_position(self.position())),
            Some(b'/') => {
                self.advance_to(self.pos + 2);
                self.read_end_element().map(Some)
            }
            Some(b'?') => {
                self.advance_to(self.pos + 2);
                self.read_processing_instruction().map(Some)
            }
            Some(b'!') => {
                self.advance_to(self.pos + 2);
                self.read_declaration()
            }
            Some(_) => {
                self.advance_to(self.pos + 1);
                self.read_start_element().map(Some)
            }
        }
    }

    fn read_start_element(&mut self) -> Result<XmlEvent<'a>> {
        let name = self.read_name()?;
        let attributes = self.read_attributes()?;

        if self.input[self.pos..].starts_with(b"/>") {
            self.advance_to(self.pos + 2);
            return Ok(XmlEvent::EmptyElement {
                name: Cow::Borrowed(name),
                attributes,
            });
        }
        self.expect(b'>')?;
        self.open.push(name);
        Ok(XmlEvent::StartElement {
            name: Cow::Borrowed(name),
            attributes,
        })
    }

    fn read_end_element(&mut self) -> Result<XmlEvent<'a>> {
        let name = self.read_name()?;
        self.skip_whitespace();
        self.expect(b'>')?;

        match self.open.pop() {
            Some(open) if open == name => Ok(XmlEvent::EndElement {
                name: Cow::Borrowed(name),
            }),
            Some(open) => Err(Error::mismatched_tag(open, name).with_position(self.event_start)),
            None => Err(Error::syntax(format!("unexpected closing tag </{}>", name))
                .with_position(self.event_start)),
        }
    }

    fn read_processing_instruction(&mut self) -> Result<XmlEvent<'a>> {
        let target = self.read_name()?;
        if target.eq_ignore_ascii_case("xml") {
            return self.read_xml_decl();
        }

        self.skip_whitespace();
        let data = self.take_until(b"?>", "processing instruction")?.trim_end();
        Ok(XmlEvent::ProcessingInstruction {
            target: Cow::Borrowed(target),
            data: (!data.is_empty()).then_some(Cow::Borrowed(data)),
        })
    }

    fn read_xml_decl(&mut self) -> Result<XmlEvent<'a>> {
        let attributes = self.read_attributes()?;
        self.expect(b'?')?;
        self.expect(b'>')?;

        let mut version = Cow::Borrowed("1.0");
        let mut encoding = None;
        let mut standalone = None;
        for attr in attributes {
            match attr.name.as_ref() {
                "version" => version = attr.value,
                "encoding" => encoding = Some(attr.value),
                "standalone" => standalone = Some(attr.value == "yes"),
                _ => {}
            }
        }

        Ok(XmlEvent::XmlDecl {
            version,
            encoding,
            standalone,
        })
    }

    /// Reads whatever follows `<!`.
    fn read_declaration(&mut self) -> Result<Option<XmlEvent<'a>>> {
        let rest = &self.input[self.pos..];
        if rest.starts_with(b"--") {
            self.advance_to(self.pos + 2);
            let body = self.take_until(b"-->", "comment")?;
            Ok(Some(XmlEvent::Comment(Cow::Borrowed(body.trim()))))
        } else if rest.starts_with(b"[CDATA[") {
            self.advance_to(self.pos + 7);
            let body = self.take_until(b"]]>", "CDATA section")?;
            Ok(Some(XmlEvent::CData(Cow::Borrowed(body))))
        } else if rest.starts_with(b"DOCTYPE") {
            self.skip_doctype()?;
            Ok(None)
        } else {
            Err(Error::syntax("unknown construct after '<!'").with_position(self.event_start))
        }
    }

    /// Returns the text before `terminator` and moves past it.
    fn take_until(&mut self, terminator: &[u8], construct: &str) -> Result<&'a str> {
        let input = self.input;
        let start = self.pos;
        let Some(len) = memmem::find(&input[start..], terminator) else {
            return Err(Error::syntax(format!("unterminated {}", construct))
                .with_position(self.event_start));
        };
        self.advance_to(start + len + terminator.len());
        utf8(&input[start..start + len])
    }

    /// Skips a DOCTYPE declaration, including a bracketed internal subset.
    fn skip_doctype(&mut self) -> Result<()> {
        let mut nesting = 1usize;
        while nesting > 0 {
            let Some(n) = memchr2(b'<', b'>', &self.input[self.pos..]) else {
                return Err(Error::syntax("unterminated DOCTYPE").with_position(self.event_start));
            };
            let at = self.pos + n;
            if self.input[at] == b'<' {
                nesting += 1;
            } else {
                nesting -= 1;
            }
            self.advance_to(at + 1);
        }
        Ok(())
    }

    fn read_name(&mut self) -> Result<&'a str> {
        let input = self.input;
        let start = self.pos;
        match input.get(start) {
            None => return Err(Error::unexpected_eof().with_position(self.position())),
            Some(&b) if !NAME_START[b as usize] => {
                return Err(Error::invalid_name(format!(
                    "invalid name start character: {:?}",
                    b as char
                ))
                .with_position(self.position()));
            }
            Some(_) => {}
        }

        let end = input[start + 1..]
            .iter()
            .position(|b| !NAME_CHAR[*b as usize])
            .map_or(input.len(), |n| start + 1 + n);
        self.advance_to(end);
        utf8(&input[start..end])
    }

    fn read_attributes(&mut self) -> Result<Vec<Attribute<'a>>> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.input.get(self.pos) {
                None | Some(b'>' | b'/' | b'?') => return Ok(attributes),
                Some(_) => {}
            }

            let name = self.read_name()?;
            self.skip_whitespace();
            self.expect(b'=')?;
            self.skip_whitespace();
            let value = self.read_attribute_value()?;
            attributes.push(Attribute {
                name: Cow::Borrowed(name),
                value,
            });
        }
    }

    fn read_attribute_value(&mut self) -> Result<Cow<'a, str>> {
        let input = self.input;
        let quote = match input.get(self.pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            Some(_) => return Err(Error::syntax("expected quote").with_position(self.position())),
            None => return Err(Error::unexpected_eof().with_position(self.position())),
        };
        let start = self.pos + 1;
        let Some(len) = memchr(quote, &input[start..]) else {
            return Err(
                Error::syntax("unterminated attribute value").with_position(self.position())
            );
        };
        let value_position = self.position();
        self.advance_to(start + len + 1);

        let raw = utf8(&input[start..start + len])?;
        unescape(raw).map_err(|e| Error::invalid_escape(e.entity).with_position(value_position))
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::new(ErrorKind::InvalidUtf8))
}
