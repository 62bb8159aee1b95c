//! The token-writer interface shared by the raw writer and its decorators.
//!
//! A [`TokenWriter`] receives XML lexical events one at a time and in
//! document order. [`XmlWriter`](crate::XmlWriter) turns them into bytes;
//! [`IndentingWriter`](crate::IndentingWriter) and
//! [`CDataWriter`](crate::CDataWriter) wrap another token writer and change
//! what reaches it. Decorators are composed by nesting:
//!
//! ```rust
//! use xml_marshal::{CDataWriter, IndentConfig, IndentingWriter, TokenWriter, XmlWriter};
//!
//! let raw = XmlWriter::new(Vec::new());
//! let indented = IndentingWriter::new(raw, IndentConfig::default());
//! let mut writer = CDataWriter::new(indented, ["description"]);
//!
//! writer.start_element("task").unwrap();
//! writer.start_element("description").unwrap();
//! writer.characters("use <b> & <i>").unwrap();
//! writer.end_element("description").unwrap();
//! writer.end_element("task").unwrap();
//! writer.end_document().unwrap();
//!
//! let xml = String::from_utf8(writer.into_inner().into_inner().into_inner()).unwrap();
//! assert_eq!(
//!     xml,
//!     "<task>\n  <description><![CDATA[use <b> & <i>]]></description>\n</task>"
//! );
//! ```

use crate::error::Result;

/// Sink for XML lexical events.
///
/// Callers must keep start and end events balanced; attributes are only
/// valid directly after a start element.
pub trait TokenWriter {
    /// Writes the XML declaration.
    fn start_document(&mut self) -> Result<()>;

    /// Opens an element.
    fn start_element(&mut self, name: &str) -> Result<()>;

    /// Adds an attribute to the element opened last.
    fn attribute(&mut self, name: &str, value: &str) -> Result<()>;

    /// Closes the innermost open element.
    fn end_element(&mut self, name: &str) -> Result<()>;

    /// Writes text content, escaped as needed.
    fn characters(&mut self, text: &str) -> Result<()>;

    /// Writes one CDATA section. The text must not contain `]]>`.
    fn cdata(&mut self, text: &str) -> Result<()>;

    /// Ends the document and flushes.
    fn end_document(&mut self) -> Result<()>;

    /// Flushes buffered output to the underlying sink.
    fn flush(&mut self) -> Result<()>;
}

impl<T: TokenWriter + ?Sized> TokenWriter for &mut T {
    fn start_document(&mut self) -> Result<()> {
        (**self).start_document()
    }

    fn start_element(&mut self, name: &str) -> Result<()> {
        (**self).start_element(name)
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        (**self).attribute(name, value)
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        (**self).end_element(name)
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        (**self).characters(text)
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        (**self).cdata(text)
    }

    fn end_document(&mut self) -> Result<()> {
        (**self).end_document()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// An owned token event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// XML declaration.
    StartDocument,
    /// Element start tag.
    StartElement(String),
    /// Attribute of the element started last.
    Attribute(String, String),
    /// Element end tag.
    EndElement(String),
    /// Text content.
    Characters(String),
    /// CDATA section.
    CData(String),
    /// End of document.
    EndDocument,
    /// Flush request.
    Flush,
}

impl TokenEvent {
    /// Replays this event into a writer.
    pub fn write_to<W: TokenWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        match self {
            TokenEvent::StartDocument => writer.start_document(),
            TokenEvent::StartElement(name) => writer.start_element(name),
            TokenEvent::Attribute(name, value) => writer.attribute(name, value),
            TokenEvent::EndElement(name) => writer.end_element(name),
            TokenEvent::Characters(text) => writer.characters(text),
            TokenEvent::CData(text) => writer.cdata(text),
            TokenEvent::EndDocument => writer.end_document(),
            TokenEvent::Flush => writer.flush(),
        }
    }
}

/// A token writer that records the events it receives.
///
/// Useful for inspecting what a decorator forwards.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<TokenEvent>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events.
    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    /// Consumes the log and returns the recorded events.
    pub fn into_events(self) -> Vec<TokenEvent> {
        self.events
    }

    /// Replays every recorded event into another writer.
    pub fn replay<W: TokenWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        self.events.iter().try_for_each(|event| event.write_to(writer))
    }
}

impl TokenWriter for EventLog {
    fn start_document(&mut self) -> Result<()> {
        self.events.push(TokenEvent::StartDocument);
        Ok(())
    }

    fn start_element(&mut self, name: &str) -> Result<()> {
        self.events.push(TokenEvent::StartElement(name.to_string()));
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.events
            .push(TokenEvent::Attribute(name.to_string(), value.to_string()));
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.events.push(TokenEvent::EndElement(name.to_string()));
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.events.push(TokenEvent::Characters(text.to_string()));
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        self.events.push(TokenEvent::CData(text.to_string()));
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.events.push(TokenEvent::EndDocument);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.events.push(TokenEvent::Flush);
        Ok(())
    }
}
