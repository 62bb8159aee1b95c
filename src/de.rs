//! Serde deserializer reading from [`XmlReader`].
//!
//! The expected layout mirrors [`Serializer`](crate::Serializer). Input the
//! target type has no place for, and text that does not convert to the
//! expected scalar, is reported to a [`ValidationEventHandler`] as a
//! [`ValidationEvent`]; the handler decides whether to keep going.
//! [`FailFast`] is the default handler.
//!
//! ```rust
//! use serde::Deserialize;
//! use xml_marshal::from_str;
//!
//! #[derive(Deserialize)]
//! struct Person {
//!     #[serde(rename = "@id")]
//!     id: u32,
//!     name: String,
//! }
//!
//! let person: Person = from_str(r#"<Person id="4"><name>Alice</name></Person>"#).unwrap();
//! assert_eq!(person.id, 4);
//! assert_eq!(person.name, "Alice");
//! ```

use crate::error::{Error, ErrorKind, Position, Result};
use crate::reader::{is_blank, Attribute, XmlEvent, XmlReader};
use crate::validation::{
    FailFast, SchemaValidator, ValidationEvent, ValidationEventHandler,
};
use serde::de::{self, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

/// Deserializes a document from a string, failing on the first error.
pub fn from_str<'de, T>(s: &'de str) -> Result<T>
where
    T: de::Deserialize<'de>,
{
    Deserializer::from_str(s).deserialize_document()
}

/// Deserializes a document from UTF-8 bytes, failing on the first error.
pub fn from_bytes<'de, T>(bytes: &'de [u8]) -> Result<T>
where
    T: de::Deserialize<'de>,
{
    let s = std::str::from_utf8(bytes).map_err(|_| Error::new(ErrorKind::InvalidUtf8))?;
    from_str(s)
}

/// An element whose start tag has been consumed.
struct Opened<'de> {
    name: Cow<'de, str>,
    attributes: Vec<Attribute<'de>>,
    empty: bool,
    /// Whether this is the document element.
    root: bool,
    position: Position,
}

/// Coarse kind of the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Element,
    Text,
    End,
    Eof,
    Other,
}

fn text_deserializer(text: String) -> de::value::StringDeserializer<Error> {
    text.into_deserializer()
}

fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(format!("expected boolean, got '{}'", other)),
    }
}

fn parse_char(s: &str) -> std::result::Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err("expected a single character".to_string()),
    }
}

fn unhex(s: &str) -> std::result::Result<Vec<u8>, String> {
    let s = s.trim();
    if !s.is_ascii() || s.len() % 2 != 0 {
        return Err("expected an even number of hex digits".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

/// The XML deserializer.
pub struct Deserializer<'de, H = FailFast> {
    reader: XmlReader<'de>,
    peeked: Option<(XmlEvent<'de>, Position)>,
    /// Where the last consumed event started.
    position: Position,
    /// Where the text of the current scalar came from.
    value_position: Position,
    /// Elements open after the last consumed event.
    depth: usize,
    /// Start tag consumed on behalf of the next value.
    opened: Option<Opened<'de>>,
    /// Text for the next value: an attribute value or text content.
    pending: Option<String>,
    /// Attribute the pending text belongs to.
    pending_attr: Option<String>,
    handler: H,
    schema: Option<Box<dyn SchemaValidator + 'de>>,
    /// The event that stopped this parse.
    aborted: Option<ValidationEvent>,
}

impl<'de> Deserializer<'de, FailFast> {
    /// Creates a fail-fast deserializer from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &'de str) -> Self {
        Self::new(XmlReader::from_str(s))
    }

    /// Creates a fail-fast deserializer from UTF-8 bytes.
    pub fn from_bytes(bytes: &'de [u8]) -> Self {
        Self::new(XmlReader::from_bytes(bytes))
    }

    /// Creates a fail-fast deserializer over a reader.
    pub fn new(reader: XmlReader<'de>) -> Self {
        let start = reader.position();
        Self {
            reader,
            peeked: None,
            position: start,
            value_position: start,
            depth: 0,
            opened: None,
            pending: None,
            pending_attr: None,
            handler: FailFast,
            schema: None,
            aborted: None,
        }
    }
}

impl<'de, H: ValidationEventHandler> Deserializer<'de, H> {
    /// Replaces the validation event handler.
    pub fn with_handler<H2: ValidationEventHandler>(self, handler: H2) -> Deserializer<'de, H2> {
        Deserializer {
            reader: self.reader,
            peeked: self.peeked,
            position: self.position,
            value_position: self.value_position,
            depth: self.depth,
            opened: self.opened,
            pending: self.pending,
            pending_attr: self.pending_attr,
            handler,
            schema: self.schema,
            aborted: self.aborted,
        }
    }

    /// Checks every consumed event against `schema`.
    pub fn with_schema<S: SchemaValidator + 'de>(mut self, schema: S) -> Self {
        self.schema = Some(Box::new(schema));
        self
    }

    /// Returns the validation event handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Consumes the deserializer and returns its handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Deserializes one complete document: optional prolog, the document
    /// element, and nothing but comments or processing instructions after it.
    ///
    /// Once the handler has stopped the parse this returns the validation
    /// failure, even if a `Deserialize` impl swallowed the error.
    pub fn deserialize_document<T>(&mut self) -> Result<T>
    where
        T: de::Deserialize<'de>,
    {
        loop {
            match self.peek()? {
                Next::Element => break,
                Next::Eof => {
                    self.position = self.reader.position();
                    self.fatal("document has no root element")?;
                    return Err(Error::unexpected_eof().with_position(self.position));
                }
                Next::Text => {
                    self.next_event()?;
                    self.fatal("text before the root element")?;
                }
                Next::End | Next::Other => {
                    self.next_event()?;
                }
            }
        }

        let result = T::deserialize(&mut *self);
        if let Some(event) = &self.aborted {
            return Err(Error::validation(event.clone()));
        }
        let value = result.map_err(|e| self.locate(e))?;

        loop {
            match self.next_event()? {
                XmlEvent::Eof => return Ok(value),
                XmlEvent::StartElement { name, .. } => {
                    self.fatal(format!("content after the root element: <{}>", name))?;
                    self.skip_subtree()?;
                }
                XmlEvent::EmptyElement { name, .. } => {
                    self.fatal(format!("content after the root element: <{}>", name))?;
                }
                XmlEvent::Text(text) if is_blank(&text) => {}
                XmlEvent::Text(_) | XmlEvent::CData(_) => {
                    self.fatal("text after the root element")?;
                }
                _ => {}
            }
        }
    }

    fn locate(&self, err: Error) -> Error {
        match err.position() {
            Some(_) => err,
            None => err.with_position(self.position),
        }
    }

    /// Passes `event` to the handler; an `Err` means the parse is over.
    fn report(&mut self, event: ValidationEvent) -> Result<()> {
        if let Some(aborted) = &self.aborted {
            return Err(Error::validation(aborted.clone()));
        }
        if self.handler.handle_event(&event) {
            return Ok(());
        }
        self.aborted = Some(event.clone());
        Err(Error::validation(event))
    }

    fn warn<S: Into<String>>(&mut self, message: S) -> Result<()> {
        let at = self.position;
        self.report(ValidationEvent::warning(message).with_position(at))
    }

    fn fatal<S: Into<String>>(&mut self, message: S) -> Result<()> {
        let at = self.position;
        self.report(ValidationEvent::fatal(message).with_position(at))
    }

    fn peek_event(&mut self) -> Result<&XmlEvent<'de>> {
        let peeked = match self.peeked.take() {
            Some(peeked) => peeked,
            None => {
                let event = self.reader.next_event()?;
                (event, self.reader.event_position())
            }
        };
        Ok(&self.peeked.insert(peeked).0)
    }

    /// Classifies the next event, consuming indentation on the way.
    fn peek(&mut self) -> Result<Next> {
        while self.next_is_blank()? {
            self.next_event()?;
        }
        self.peek_raw()
    }

    /// Classifies the next event; whitespace-only text counts as text.
    fn peek_raw(&mut self) -> Result<Next> {
        Ok(match self.peek_event()? {
            XmlEvent::StartElement { .. } | XmlEvent::EmptyElement { .. } => Next::Element,
            XmlEvent::Text(_) | XmlEvent::CData(_) => Next::Text,
            XmlEvent::EndElement { .. } => Next::End,
            XmlEvent::Eof => Next::Eof,
            _ => Next::Other,
        })
    }

    fn next_is_blank(&mut self) -> Result<bool> {
        Ok(matches!(self.peek_event()?, XmlEvent::Text(text) if is_blank(text)))
    }

    fn peek_name(&mut self) -> Result<Option<&str>> {
        Ok(self.peek_event()?.element_name())
    }

    /// Consumes the next event and runs it past the schema validator.
    fn next_event(&mut self) -> Result<XmlEvent<'de>> {
        if let Some(aborted) = &self.aborted {
            return Err(Error::validation(aborted.clone()));
        }
        let (event, position) = match self.peeked.take() {
            Some(peeked) => peeked,
            None => {
                let event = self.reader.next_event()?;
                (event, self.reader.event_position())
            }
        };
        self.position = position;

        let depth = self.depth;
        match event {
            XmlEvent::StartElement { .. } => self.depth += 1,
            XmlEvent::EndElement { .. } => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }

        let found = match self.schema.as_mut() {
            Some(schema) => schema.validate(&event, depth),
            None => None,
        };
        if let Some(found) = found {
            let found = match found.position() {
                Some(_) => found,
                None => found.with_position(position),
            };
            self.report(found)?;
        }
        Ok(event)
    }

    fn take_pending(&mut self) -> Option<String> {
        self.pending_attr = None;
        self.pending.take()
    }

    /// Consumes the start tag of the next value, unless already consumed.
    fn open_element(&mut self) -> Result<Opened<'de>> {
        if let Some(opened) = self.opened.take() {
            return Ok(opened);
        }
        let root = self.depth == 0;
        let (name, attributes, empty) = match self.next_event()? {
            XmlEvent::StartElement { name, attributes } => (name, attributes, false),
            XmlEvent::EmptyElement { name, attributes } => (name, attributes, true),
            XmlEvent::EndElement { name } => {
                return Err(Error::invalid_value(format!(
                    "expected an element, found </{}>",
                    name
                ))
                .with_position(self.position))
            }
            XmlEvent::Eof => return Err(Error::unexpected_eof().with_position(self.position)),
            _ => {
                return Err(Error::invalid_value("expected an element").with_position(self.position))
            }
        };
        Ok(Opened {
            name,
            attributes,
            empty,
            root,
            position: self.position,
        })
    }

    /// Collects adjoining text and CDATA up to the next tag, whitespace
    /// included.
    fn read_text(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut first = true;
        loop {
            match self.peek_raw()? {
                Next::Text => {
                    let event = self.next_event()?;
                    if first {
                        self.value_position = self.position;
                        first = false;
                    }
                    if let XmlEvent::Text(chunk) | XmlEvent::CData(chunk) = event {
                        text.push_str(&chunk);
                    }
                }
                Next::Other => {
                    self.next_event()?;
                }
                Next::Element | Next::End | Next::Eof => return Ok(text),
            }
        }
    }

    /// Consumes an element's remaining content and its end tag.
    fn finish_element(&mut self) -> Result<()> {
        loop {
            match self.next_event()? {
                XmlEvent::EndElement { .. } => return Ok(()),
                XmlEvent::StartElement { name, .. } => {
                    self.warn(format!("unexpected element <{}>", name))?;
                    self.skip_subtree()?;
                }
                XmlEvent::EmptyElement { name, .. } => {
                    self.warn(format!("unexpected element <{}>", name))?;
                }
                XmlEvent::Text(text) if is_blank(&text) => {}
                XmlEvent::Text(_) | XmlEvent::CData(_) => self.warn("unexpected text content")?,
                XmlEvent::Eof => return Err(Error::unexpected_eof().with_position(self.position)),
                _ => {}
            }
        }
    }

    /// Skips the rest of an element whose start tag was just consumed.
    fn skip_subtree(&mut self) -> Result<()> {
        tracing::debug!(depth = self.depth, "skipping unmapped subtree");
        let mut nesting = 1usize;
        while nesting > 0 {
            match self.next_event()? {
                XmlEvent::StartElement { .. } => nesting += 1,
                XmlEvent::EndElement { .. } => nesting -= 1,
                XmlEvent::Eof => return Err(Error::unexpected_eof().with_position(self.position)),
                _ => {}
            }
        }
        Ok(())
    }

    fn ignore_attributes(&mut self, opened: &Opened<'de>) -> Result<()> {
        for attr in &opened.attributes {
            self.warn(format!(
                "unexpected attribute '{}' on <{}>",
                attr.name, opened.name
            ))?;
        }
        Ok(())
    }

    fn check_root(&mut self, opened: &Opened<'de>, expected: &str) -> Result<()> {
        if opened.root && opened.name != expected {
            let event = ValidationEvent::warning(format!(
                "root element <{}> does not match type {}",
                opened.name, expected
            ))
            .with_position(opened.position);
            self.report(event)?;
        }
        Ok(())
    }

    /// Reads the text of a scalar: pending text, bare text, or the content
    /// of the next element.
    fn get_text(&mut self) -> Result<String> {
        if let Some(text) = self.take_pending() {
            return Ok(text);
        }
        if self.opened.is_none() && self.peek()? == Next::Text {
            return self.read_text();
        }

        let opened = self.open_element()?;
        self.value_position = opened.position;
        self.ignore_attributes(&opened)?;
        if opened.empty {
            return Ok(String::new());
        }
        let text = self.read_text()?;
        self.finish_element()?;
        Ok(text)
    }

    /// Converts scalar text; a failure is reported as an error event and
    /// yields `T::default()` if the handler lets the parse continue.
    fn convert<T, F>(&mut self, expected: &str, parse: F) -> Result<T>
    where
        T: Default,
        F: FnOnce(&str) -> std::result::Result<T, String>,
    {
        let text = self.get_text()?;
        match parse(&text) {
            Ok(value) => Ok(value),
            Err(reason) => {
                let at = self.value_position;
                let event =
                    ValidationEvent::error(format!("cannot convert '{}' to {}", text, expected))
                        .with_position(at)
                        .with_cause(Error::invalid_value(reason).with_position(at));
                self.report(event)?;
                Ok(T::default())
            }
        }
    }

    fn parse_number<T>(&mut self) -> Result<T>
    where
        T: FromStr + Default,
        T::Err: Display,
    {
        self.convert(std::any::type_name::<T>(), |s| {
            s.trim().parse::<T>().map_err(|e| e.to_string())
        })
    }

    fn visit_element<V>(
        &mut self,
        opened: Opened<'de>,
        fields: &'static [&'static str],
        leading_text: Option<String>,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let empty = opened.empty;
        let value = visitor.visit_map(MapDeserializer {
            attrs: opened.attributes.into_iter(),
            position: opened.position,
            text: leading_text,
            text_key: fields
                .iter()
                .copied()
                .find(|f| *f == "$value" || *f == "$text"),
            text_seen: false,
            value: None,
            blank: None,
            children_seen: false,
            finished: empty,
            de: &mut *self,
        })?;
        if !empty {
            self.finish_element()?;
        }
        Ok(value)
    }

    /// Reads the children of one element as sequence items.
    fn deserialize_wrapped_seq<V>(&mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let opened = self.open_element()?;
        self.ignore_attributes(&opened)?;
        let value = visitor.visit_seq(SeqDeserializer {
            de: &mut *self,
            name: None,
            bounded: true,
            done: opened.empty,
        })?;
        if !opened.empty {
            self.finish_element()?;
        }
        Ok(value)
    }
}

impl<'de, H: ValidationEventHandler> de::Deserializer<'de> for &mut Deserializer<'de, H> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if let Some(text) = self.take_pending() {
            return visitor.visit_string(text);
        }
        if self.opened.is_none() {
            match self.peek()? {
                Next::Element => {}
                Next::Text => {
                    let text = self.read_text()?;
                    return visitor.visit_string(text);
                }
                _ => return visitor.visit_unit(),
            }
        }

        let opened = self.open_element()?;
        if opened.empty {
            if opened.attributes.is_empty() {
                return visitor.visit_unit();
            }
            return self.visit_element(opened, &[], None, visitor);
        }
        let text = self.read_text()?;
        if opened.attributes.is_empty() && self.peek()? == Next::End {
            self.next_event()?;
            return visitor.visit_string(text);
        }
        let leading = (!is_blank(&text)).then_some(text);
        self.visit_element(opened, &[], leading, visitor)
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.convert("bool", parse_bool)?;
        visitor.visit_bool(value)
    }

    fn deserialize_i8<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_i8(value)
    }

    fn deserialize_i16<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_i16(value)
    }

    fn deserialize_i32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_i32(value)
    }

    fn deserialize_i64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_i64(value)
    }

    fn deserialize_i128<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_i128(value)
    }

    fn deserialize_u8<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_u8(value)
    }

    fn deserialize_u16<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_u16(value)
    }

    fn deserialize_u32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_u32(value)
    }

    fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_u64(value)
    }

    fn deserialize_u128<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_u128(value)
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_f32(value)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.parse_number()?;
        visitor.visit_f64(value)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = self.convert("char", parse_char)?;
        visitor.visit_char(value)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let text = self.get_text()?;
        visitor.visit_string(text)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let bytes = self.convert("hex bytes", unhex)?;
        visitor.visit_byte_buf(bytes)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.pending.is_some() || self.opened.is_some() {
            return visitor.visit_some(self);
        }
        match self.peek()? {
            Next::Element | Next::Text => visitor.visit_some(self),
            _ => visitor.visit_none(),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.take_pending().is_some() {
            return visitor.visit_unit();
        }
        let opened = self.open_element()?;
        self.ignore_attributes(&opened)?;
        if !opened.empty {
            self.finish_element()?;
        }
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.take_pending().is_some() {
            return visitor.visit_unit();
        }
        let opened = self.open_element()?;
        self.check_root(&opened, name)?;
        self.ignore_attributes(&opened)?;
        if !opened.empty {
            self.finish_element()?;
        }
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.take_pending().is_some() {
            return Err(Error::unsupported("sequence in an attribute value or text")
                .with_position(self.value_position));
        }
        if self.opened.is_some() || self.depth == 0 {
            return self.deserialize_wrapped_seq(visitor);
        }
        visitor.visit_seq(SeqDeserializer {
            de: self,
            name: None,
            bounded: false,
            done: false,
        })
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_wrapped_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.take_pending().is_some() {
            return Err(Error::unsupported("map in an attribute value or text")
                .with_position(self.value_position));
        }
        let opened = self.open_element()?;
        self.visit_element(opened, &[], None, visitor)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.take_pending().is_some() {
            return Err(Error::invalid_value(format!("expected an element for {}, found text", name))
                .with_position(self.value_position));
        }
        let opened = self.open_element()?;
        self.check_root(&opened, name)?;
        self.visit_element(opened, fields, None, visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if let Some(text) = self.take_pending() {
            return visitor.visit_enum(text_deserializer(text.trim().to_string()));
        }
        if self.opened.is_none() && self.peek()? == Next::Text {
            let text = self.read_text()?;
            return visitor.visit_enum(text_deserializer(text.trim().to_string()));
        }

        let opened = self.open_element()?;
        if variants.iter().any(|variant| *variant == opened.name) {
            // The element itself names the variant.
            self.opened = Some(Opened {
                root: false,
                ..opened
            });
            return visitor.visit_enum(EnumDeserializer { de: self });
        }

        // A field element around either the variant name or the variant element.
        self.check_root(&opened, name)?;
        self.ignore_attributes(&opened)?;
        if opened.empty {
            return Err(Error::invalid_value(format!(
                "<{}> holds no {} variant",
                opened.name, name
            ))
            .with_position(opened.position));
        }
        let value = match self.peek()? {
            Next::Text => {
                let text = self.read_text()?;
                visitor.visit_enum(text_deserializer(text.trim().to_string()))?
            }
            _ => visitor.visit_enum(EnumDeserializer { de: &mut *self })?,
        };
        self.finish_element()?;
        Ok(value)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let attr = self.pending_attr.take();
        if self.pending.take().is_some() {
            let message = match attr {
                Some(name) => format!("unexpected attribute '{}'", name),
                None => "unexpected text content".to_string(),
            };
            let at = self.value_position;
            self.report(ValidationEvent::warning(message).with_position(at))?;
            return visitor.visit_unit();
        }
        if let Some(opened) = self.opened.take() {
            if !opened.empty {
                self.skip_subtree()?;
            }
            return visitor.visit_unit();
        }

        match self.peek()? {
            Next::Element => match self.next_event()? {
                XmlEvent::StartElement { name, .. } => {
                    self.warn(format!("unexpected element <{}>", name))?;
                    self.skip_subtree()?;
                }
                XmlEvent::EmptyElement { name, .. } => {
                    self.warn(format!("unexpected element <{}>", name))?;
                }
                _ => {}
            },
            Next::Text => {
                self.read_text()?;
                self.warn("unexpected text content")?;
            }
            Next::End | Next::Eof | Next::Other => {}
        }
        visitor.visit_unit()
    }
}

/// Sequence items: runs of same-named siblings, or every child of a
/// wrapper element.
struct SeqDeserializer<'a, 'de, H> {
    de: &'a mut Deserializer<'de, H>,
    /// Element name shared by the items; fixed by the first one.
    name: Option<String>,
    bounded: bool,
    done: bool,
}

impl<'de, H: ValidationEventHandler> SeqAccess<'de> for SeqDeserializer<'_, 'de, H> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        while !self.done {
            match self.de.peek()? {
                Next::Element => {
                    if !self.bounded {
                        let name = self.de.peek_name()?.unwrap_or_default();
                        if self.name.is_none() {
                            self.name = Some(name.to_string());
                        } else if self.name.as_deref() != Some(name) {
                            self.done = true;
                            return Ok(None);
                        }
                    }
                    return seed.deserialize(&mut *self.de).map(Some);
                }
                Next::Text if self.bounded => {
                    self.de.read_text()?;
                    self.de.warn("unexpected text content")?;
                }
                Next::Other => {
                    self.de.next_event()?;
                }
                Next::Text | Next::End | Next::Eof => self.done = true,
            }
        }
        Ok(None)
    }
}

/// Struct and map entries: attributes first, then children and text.
struct MapDeserializer<'a, 'de, H> {
    de: &'a mut Deserializer<'de, H>,
    attrs: std::vec::IntoIter<Attribute<'de>>,
    position: Position,
    /// Text read before the first child.
    text: Option<String>,
    /// The field that receives text content, if the struct has one.
    text_key: Option<&'static str>,
    text_seen: bool,
    /// Value for `next_value_seed`, with the attribute it came from.
    value: Option<(String, Option<String>)>,
    /// Whitespace that is, so far, the element's entire content.
    blank: Option<String>,
    children_seen: bool,
    finished: bool,
}

impl<'de, H: ValidationEventHandler> MapDeserializer<'_, 'de, H> {
    fn key<K>(&mut self, seed: K, name: String) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        seed.deserialize(text_deserializer(name)).map(Some)
    }

    fn text_entry<K>(&mut self, seed: K, text: String) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        self.text_seen = true;
        self.value = Some((text, None));
        let key = self.text_key.unwrap_or("$value").to_string();
        self.key(seed, key)
    }
}

impl<'de, H: ValidationEventHandler> MapAccess<'de> for MapDeserializer<'_, 'de, H> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if let Some(attr) = self.attrs.next() {
            let name = attr.name.into_owned();
            let key = format!("@{}", name);
            self.value = Some((attr.value.into_owned(), Some(name)));
            return self.key(seed, key);
        }
        if let Some(text) = self.text.take() {
            return self.text_entry(seed, text);
        }

        while !self.finished {
            match self.de.peek_raw()? {
                Next::Element => {
                    self.children_seen = true;
                    self.blank = None;
                    let name = self.de.peek_name()?.unwrap_or_default().to_string();
                    return self.key(seed, name);
                }
                Next::Text => {
                    let text = self.de.read_text()?;
                    if !is_blank(&text) {
                        return self.text_entry(seed, text);
                    }
                    if !self.children_seen {
                        self.blank = Some(text);
                    }
                }
                Next::Other => {
                    self.de.next_event()?;
                }
                Next::End | Next::Eof => self.finished = true,
            }
        }

        // Whitespace alone is the text value; an element without text
        // still has an empty one.
        if self.text_key.is_some() && !self.text_seen {
            let text = self.blank.take().unwrap_or_default();
            return self.text_entry(seed, text);
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        if let Some((text, attr)) = self.value.take() {
            if attr.is_some() {
                self.de.value_position = self.position;
            }
            self.de.pending = Some(text);
            self.de.pending_attr = attr;
        }
        seed.deserialize(&mut *self.de)
    }
}

/// Variant access over an element named after the variant.
struct EnumDeserializer<'a, 'de, H> {
    de: &'a mut Deserializer<'de, H>,
}

impl<'de, H: ValidationEventHandler> de::EnumAccess<'de> for EnumDeserializer<'_, 'de, H> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let opened = self.de.open_element()?;
        let variant = seed.deserialize(text_deserializer(opened.name.to_string()))?;
        self.de.opened = Some(Opened {
            root: false,
            ..opened
        });
        Ok((variant, self))
    }
}

impl<'de, H: ValidationEventHandler> de::VariantAccess<'de> for EnumDeserializer<'_, 'de, H> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        let opened = self.de.open_element()?;
        self.de.ignore_attributes(&opened)?;
        if !opened.empty {
            self.de.finish_element()?;
        }
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.de.deserialize_wrapped_seq(visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let opened = self.de.open_element()?;
        self.de.visit_element(opened, fields, None, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::validation::{Severity, ValidationEventCollector};
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Task {
        #[serde(rename = "@id")]
        id: u32,
        title: String,
        priority: i32,
    }

    fn collect<'de, T: de::Deserialize<'de>>(xml: &'de str) -> (Result<T>, Vec<ValidationEvent>) {
        let mut de = Deserializer::from_str(xml).with_handler(ValidationEventCollector::new());
        let result = de.deserialize_document();
        (result, de.into_handler().into_events())
    }

    #[test]
    fn test_simple_struct() {
        let task: Task =
            from_str(r#"<Task id="3"><title>Sort</title><priority>-2</priority></Task>"#).unwrap();
        assert_eq!(
            task,
            Task {
                id: 3,
                title: "Sort".into(),
                priority: -2
            }
        );
    }

    #[test]
    fn test_indented_input_with_declaration() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- saved -->\n<Task id=\"1\">\n  <title> padded </title>\n  <priority> 5 </priority>\n</Task>\n";
        let task: Task = from_str(xml).unwrap();
        assert_eq!(task.title, " padded ");
        assert_eq!(task.priority, 5);
    }

    #[test]
    fn test_whitespace_only_leaf_text_is_kept() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Gaps {
            a: String,
            b: String,
            c: Option<String>,
        }

        let xml = "<Gaps>\n  <a>   </a>\n  <b>\n</b>\n  <c>\t</c>\n</Gaps>\n";
        let (gaps, events) = collect::<Gaps>(xml);
        assert_eq!(
            gaps.unwrap(),
            Gaps {
                a: "   ".into(),
                b: "\n".into(),
                c: Some("\t".into()),
            }
        );
        assert!(events.is_empty(), "{:?}", events);
    }

    #[test]
    fn test_whitespace_only_text_value_is_kept() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Pad {
            #[serde(rename = "@n")]
            n: u8,
            #[serde(rename = "$value")]
            text: String,
        }

        assert_eq!(from_str::<Pad>(r#"<Pad n="1">  </Pad>"#).unwrap().text, "  ");
        assert_eq!(from_str::<Pad>(r#"<Pad n="1"><![CDATA[ ]]></Pad>"#).unwrap().text, " ");
        assert_eq!(from_str::<Pad>(r#"<Pad n="1"></Pad>"#).unwrap().text, "");
    }

    #[test]
    fn test_text_content_and_cdata() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Note {
            #[serde(rename = "@lang")]
            lang: String,
            #[serde(rename = "$value")]
            body: String,
        }

        let note: Note =
            from_str(r#"<Note lang="en">a &lt; <![CDATA[b]]]]><![CDATA[>c]]></Note>"#).unwrap();
        assert_eq!(note.body, "a < b]]>c");

        let empty: Note = from_str(r#"<Note lang="de"/>"#).unwrap();
        assert_eq!(empty.body, "");
    }

    #[test]
    fn test_sequences_and_options() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Doc {
            title: Option<String>,
            note: Option<String>,
            #[serde(default)]
            tag: Vec<String>,
            #[serde(default)]
            other: Vec<u8>,
        }

        let doc: Doc = from_str("<Doc><title>t</title><tag>a</tag><tag>b</tag></Doc>").unwrap();
        assert_eq!(doc.title.as_deref(), Some("t"));
        assert_eq!(doc.note, None);
        assert_eq!(doc.tag, ["a", "b"]);
        assert!(doc.other.is_empty());
    }

    #[test]
    fn test_top_level_sequence() {
        let values: Vec<u32> = from_str("<items><item>1</item><item>2</item></items>").unwrap();
        assert_eq!(values, [1, 2]);
    }

    #[test]
    fn test_enums() {
        #[derive(Debug, Deserialize, PartialEq)]
        enum Shape {
            Empty,
            Circle(u32),
            Rect { w: u32, h: u32 },
            Pair(u8, u8),
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Drawing {
            a: Shape,
            b: Shape,
            c: Shape,
            d: Shape,
        }

        let drawing: Drawing = from_str(
            "<Drawing><a>Empty</a><b><Circle>3</Circle></b>\
             <c><Rect><w>1</w><h>2</h></Rect></c>\
             <d><Pair><item>4</item><item>5</item></Pair></d></Drawing>",
        )
        .unwrap();
        assert_eq!(
            drawing,
            Drawing {
                a: Shape::Empty,
                b: Shape::Circle(3),
                c: Shape::Rect { w: 1, h: 2 },
                d: Shape::Pair(4, 5),
            }
        );

        assert_eq!(from_str::<Shape>("<Empty/>").unwrap(), Shape::Empty);
        assert_eq!(from_str::<Shape>("<Circle>9</Circle>").unwrap(), Shape::Circle(9));
    }

    #[test]
    fn test_enum_attribute() {
        #[derive(Debug, Deserialize, PartialEq)]
        enum Level {
            Low,
            High,
        }

        #[derive(Debug, Deserialize)]
        struct Alarm {
            #[serde(rename = "@level")]
            level: Level,
        }

        let alarm: Alarm = from_str(r#"<Alarm level="High"/>"#).unwrap();
        assert_eq!(alarm.level, Level::High);
    }

    #[test]
    fn test_map() {
        #[derive(Debug, Deserialize)]
        struct Config {
            env: BTreeMap<String, i32>,
        }

        let config: Config = from_str("<Config><env><a>1</a><b>2</b></env></Config>").unwrap();
        assert_eq!(config.env.get("a"), Some(&1));
        assert_eq!(config.env.get("b"), Some(&2));
    }

    #[test]
    fn test_unknown_content_is_a_warning() {
        let xml = r#"<Task id="1" color="red"><title>x</title><legacy><a/></legacy>stray<priority>1</priority></Task>"#;
        let (task, events) = collect::<Task>(xml);
        assert_eq!(task.unwrap().priority, 1);

        let messages: Vec<_> = events.iter().map(|e| e.message()).collect();
        assert_eq!(
            messages,
            [
                "unexpected attribute 'color'",
                "unexpected element <legacy>",
                "unexpected text content",
            ]
        );
        assert!(events.iter().all(|e| e.severity() == Severity::Warning));
    }

    #[test]
    fn test_fail_fast_stops_at_conversion_error() {
        let xml = "<Task id=\"1\">\n<title>x</title>\n<priority>abc</priority>\n</Task>";
        let err = from_str::<Task>(xml).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Validation);
        let event = err.validation_event().unwrap();
        assert_eq!(event.severity(), Severity::Error);
        assert_eq!(event.message(), "cannot convert 'abc' to i32");
        assert_eq!(event.position().map(|p| p.line), Some(3));
        assert!(matches!(event.cause().map(Error::kind), Some(ErrorKind::InvalidValue(_))));
    }

    #[test]
    fn test_lenient_handler_uses_default() {
        let xml = r#"<Task id="x"><title>t</title><priority>1</priority></Task>"#;
        let (task, events) = collect::<Task>(xml);
        assert_eq!(task.unwrap().id, 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity(), Severity::Error);
        assert_eq!(events[0].message(), "cannot convert 'x' to u32");
    }

    #[test]
    fn test_nothing_processed_after_abort() {
        let xml = r#"<Task id="1"><old/><priority>z</priority><older/><title>t</title></Task>"#;
        let mut seen = Vec::new();
        let result = Deserializer::from_str(xml)
            .with_handler(|event: &ValidationEvent| {
                seen.push(event.severity());
                event.severity() == Severity::Warning
            })
            .deserialize_document::<Task>();

        assert!(result.is_err());
        assert_eq!(seen, [Severity::Warning, Severity::Error]);
    }

    #[test]
    fn test_swallowed_error_still_fails() {
        #[derive(Debug)]
        struct Lenient;

        impl<'de> de::Deserialize<'de> for Lenient {
            fn deserialize<D: de::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
                let _ = u8::deserialize(d);
                Ok(Lenient)
            }
        }

        let err = from_str::<Lenient>("<n>300</n>").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_root_name_mismatch_is_a_warning() {
        let xml = r#"<Job id="1"><title>t</title><priority>1</priority></Job>"#;
        let (task, events) = collect::<Task>(xml);
        assert!(task.is_ok());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message(), "root element <Job> does not match type Task");
        assert_eq!(from_str::<Task>(xml).unwrap().id, 1);
    }

    #[test]
    fn test_empty_document_is_fatal() {
        for xml in ["", "  \n ", "<?xml version=\"1.0\"?>"] {
            let err = from_str::<Task>(xml).unwrap_err();
            let event = err.validation_event().unwrap();
            assert_eq!(event.severity(), Severity::FatalError, "{:?}", xml);
        }
    }

    #[test]
    fn test_trailing_content_is_fatal() {
        let xml = r#"<Task id="1"><title>t</title><priority>1</priority></Task><Task/>"#;
        let err = from_str::<Task>(xml).unwrap_err();
        assert_eq!(
            err.validation_event().map(|e| e.severity()),
            Some(Severity::FatalError)
        );

        let (task, events) = collect::<Task>(xml);
        assert!(task.is_ok());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_missing_field_is_a_mapping_error() {
        let err = from_str::<Task>(r#"<Task id="1"><title>t</title></Task>"#).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Mapping);
        assert!(err.to_string().contains("priority"));
        assert!(err.position().is_some());
    }

    #[test]
    fn test_malformed_xml_is_a_stream_error() {
        let err = from_str::<Task>("<Task><title>t</Task>").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Stream);
    }

    #[test]
    fn test_schema_validator_events() {
        struct NoDeepNesting;

        impl SchemaValidator for NoDeepNesting {
            fn validate(&mut self, event: &XmlEvent<'_>, depth: usize) -> Option<ValidationEvent> {
                match event {
                    XmlEvent::StartElement { name, .. } if depth >= 1 && name == "title" => {
                        Some(ValidationEvent::error("title is not allowed here"))
                    }
                    _ => None,
                }
            }
        }

        let xml = r#"<Task id="1"><title>t</title><priority>1</priority></Task>"#;
        let err = Deserializer::from_str(xml)
            .with_schema(NoDeepNesting)
            .deserialize_document::<Task>()
            .unwrap_err();
        let event = err.validation_event().unwrap();
        assert_eq!(event.message(), "title is not allowed here");
        assert_eq!(event.position().map(|p| p.offset), Some(13));
    }

    #[test]
    fn test_bool_char_and_bytes() {
        #[derive(Debug, Deserialize)]
        struct Flags {
            on: bool,
            off: bool,
            initial: char,
            #[serde(deserialize_with = "as_bytes")]
            data: Vec<u8>,
        }

        fn as_bytes<'de, D: de::Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
            struct Bytes;
            impl<'de> Visitor<'de> for Bytes {
                type Value = Vec<u8>;
                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str("bytes")
                }
                fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Vec<u8>, E> {
                    Ok(v)
                }
            }
            d.deserialize_bytes(Bytes)
        }

        let flags: Flags = from_str(
            "<Flags><on>1</on><off>false</off><initial>é</initial><data>dead01</data></Flags>",
        )
        .unwrap();
        assert!(flags.on);
        assert!(!flags.off);
        assert_eq!(flags.initial, 'é');
        assert_eq!(flags.data, [0xde, 0xad, 0x01]);
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let err = from_bytes::<Task>(b"<Task>\xff</Task>").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidUtf8));
    }
}
