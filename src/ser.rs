//! Serde serializer producing token events.
//!
//! [`Serializer`] maps a value onto XML through any [`TokenWriter`]:
//!
//! - a struct becomes an element named after the field holding it, or after
//!   its type at the top level;
//! - fields become child elements, in declaration order;
//! - fields renamed with a leading `@` become attributes and must be
//!   declared before the element's other fields;
//! - a field renamed `$value` or `$text` becomes the element's text;
//! - sequences repeat the field's element once per item;
//! - `None` fields are left out.
//!
//! ```rust
//! use serde::Serialize;
//! use xml_marshal::{Serializer, XmlWriter};
//!
//! #[derive(Serialize)]
//! struct Task {
//!     #[serde(rename = "@id")]
//!     id: u32,
//!     title: String,
//!     tags: Vec<String>,
//! }
//!
//! let task = Task { id: 7, title: "Sort".into(), tags: vec!["a".into(), "b".into()] };
//! let mut ser = Serializer::new(XmlWriter::new(Vec::new()));
//! task.serialize(&mut ser).unwrap();
//!
//! let xml = String::from_utf8(ser.into_inner().into_inner()).unwrap();
//! assert_eq!(
//!     xml,
//!     r#"<Task id="7"><title>Sort</title><tags>a</tags><tags>b</tags></Task>"#
//! );
//! ```

use crate::error::{Error, Result};
use crate::token::TokenWriter;
use serde::ser::{self, Impossible, Serialize};

/// Element name for sequence items that have no field name.
const ITEM: &str = "item";
/// Element name wrapping a top-level sequence.
const LIST: &str = "items";
/// Element name wrapping a top-level map.
const MAP: &str = "map";

const HEX: &[u8; 16] = b"0123456789abcdef";

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

/// Serde serializer writing into a [`TokenWriter`].
pub struct Serializer<W> {
    writer: W,
    /// Element name for the next value.
    key: Option<String>,
    depth: usize,
}

impl<W: TokenWriter> Serializer<W> {
    /// Creates a serializer; the top-level element is named after the type.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            key: None,
            depth: 0,
        }
    }

    /// Creates a serializer whose top-level element is called `root`.
    pub fn with_root<S: Into<String>>(writer: W, root: S) -> Self {
        Self {
            writer,
            key: Some(root.into()),
            depth: 0,
        }
    }

    /// Returns a reference to the token writer.
    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns a mutable reference to the token writer.
    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Returns the token writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.writer.start_element(name)?;
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.writer.end_element(name)
    }

    /// Writes `text` as `<key>text</key>`, or as bare text inside the
    /// current element when there is no key.
    fn write_scalar(&mut self, text: &str) -> Result<()> {
        match self.key.take() {
            Some(key) => {
                self.open(&key)?;
                self.writer.characters(text)?;
                self.close(&key)
            }
            None if self.depth == 0 => Err(Error::unsupported(
                "a bare value at document level needs a root element name",
            )),
            None => self.writer.characters(text),
        }
    }

    fn open_outer(&mut self) -> Result<Option<String>> {
        let outer = self.key.take();
        if let Some(name) = &outer {
            self.open(name)?;
        }
        Ok(outer)
    }
}

impl<'a, W: TokenWriter> ser::Serializer for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SeqSerializer<'a, W>;
    type SerializeTuple = SeqSerializer<'a, W>;
    type SerializeTupleStruct = SeqSerializer<'a, W>;
    type SerializeTupleVariant = SeqSerializer<'a, W>;
    type SerializeMap = MapSerializer<'a, W>;
    type SerializeStruct = StructSerializer<'a, W>;
    type SerializeStructVariant = StructSerializer<'a, W>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.write_scalar(if v { "true" } else { "false" })
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.write_scalar(itoa::Buffer::new().format(v))
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.write_scalar(itoa::Buffer::new().format(v))
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.write_scalar(itoa::Buffer::new().format(v))
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.write_scalar(itoa::Buffer::new().format(v))
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.write_scalar(ryu::Buffer::new().format(v))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.write_scalar(ryu::Buffer::new().format(v))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.write_scalar(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write_scalar(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.write_scalar(&hex(v))
    }

    fn serialize_none(self) -> Result<()> {
        self.key = None;
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        if let Some(key) = self.key.take() {
            self.open(&key)?;
            self.close(&key)?;
        }
        Ok(())
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<()> {
        let name = self.key.take().unwrap_or_else(|| name.to_string());
        self.open(&name)?;
        self.close(&name)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        match self.key.take() {
            Some(key) => {
                self.open(&key)?;
                self.writer.characters(variant)?;
                self.close(&key)
            }
            None => {
                self.open(variant)?;
                self.close(variant)
            }
        }
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let outer = self.open_outer()?;
        self.key = Some(variant.to_string());
        value.serialize(&mut *self)?;
        match outer {
            Some(name) => self.close(&name),
            None => Ok(()),
        }
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        let wrapper = if self.depth == 0 {
            let name = self.key.take().unwrap_or_else(|| LIST.to_string());
            self.open(&name)?;
            Some(name)
        } else {
            None
        };
        let item = self.key.take().unwrap_or_else(|| ITEM.to_string());
        Ok(SeqSerializer {
            ser: self,
            item,
            wrapper,
            outer: None,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        let name = self.key.take().unwrap_or_else(|| name.to_string());
        self.open(&name)?;
        Ok(SeqSerializer {
            ser: self,
            item: ITEM.to_string(),
            wrapper: Some(name),
            outer: None,
        })
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        let outer = self.open_outer()?;
        self.open(variant)?;
        Ok(SeqSerializer {
            ser: self,
            item: ITEM.to_string(),
            wrapper: Some(variant.to_string()),
            outer,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        let name = self.key.take().unwrap_or_else(|| MAP.to_string());
        self.open(&name)?;
        Ok(MapSerializer {
            ser: self,
            name,
            next_key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        let name = self.key.take().unwrap_or_else(|| name.to_string());
        Ok(StructSerializer {
            ser: self,
            name,
            attrs: Vec::new(),
            started: false,
            outer: None,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        let outer = self.open_outer()?;
        Ok(StructSerializer {
            ser: self,
            name: variant.to_string(),
            attrs: Vec::new(),
            started: false,
            outer,
        })
    }
}

/// Turns a scalar into the text of an attribute or map key.
///
/// `None` comes back as `Ok(None)` so optional attributes can be left out.
struct ScalarSerializer;

impl ScalarSerializer {
    fn unsupported<T>(what: &str) -> Result<T> {
        Err(Error::unsupported(format!("{} as attribute value or map key", what)))
    }
}

impl ser::Serializer for ScalarSerializer {
    type Ok = Option<String>;
    type Error = Error;

    type SerializeSeq = Impossible<Option<String>, Error>;
    type SerializeTuple = Impossible<Option<String>, Error>;
    type SerializeTupleStruct = Impossible<Option<String>, Error>;
    type SerializeTupleVariant = Impossible<Option<String>, Error>;
    type SerializeMap = Impossible<Option<String>, Error>;
    type SerializeStruct = Impossible<Option<String>, Error>;
    type SerializeStructVariant = Impossible<Option<String>, Error>;

    fn serialize_bool(self, v: bool) -> Result<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_i8(self, v: i8) -> Result<Option<String>> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<Option<String>> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<Option<String>> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<Option<String>> {
        Ok(Some(itoa::Buffer::new().format(v).to_string()))
    }

    fn serialize_u8(self, v: u8) -> Result<Option<String>> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<Option<String>> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<Option<String>> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<Option<String>> {
        Ok(Some(itoa::Buffer::new().format(v).to_string()))
    }

    fn serialize_f32(self, v: f32) -> Result<Option<String>> {
        Ok(Some(ryu::Buffer::new().format(v).to_string()))
    }

    fn serialize_f64(self, v: f64) -> Result<Option<String>> {
        Ok(Some(ryu::Buffer::new().format(v).to_string()))
    }

    fn serialize_char(self, v: char) -> Result<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Option<String>> {
        Ok(Some(hex(v)))
    }

    fn serialize_none(self) -> Result<Option<String>> {
        Ok(None)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Option<String>> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Option<String>> {
        Ok(Some(String::new()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Option<String>> {
        Ok(Some(String::new()))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Option<String>> {
        Ok(Some(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Option<String>> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Option<String>> {
        Self::unsupported("newtype variant")
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Self::unsupported("sequence")
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Self::unsupported("tuple")
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Self::unsupported("tuple struct")
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Self::unsupported("tuple variant")
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Self::unsupported("map")
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Self::unsupported("struct")
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Self::unsupported("struct variant")
    }
}

/// Serializes sequence, tuple and tuple-like items.
pub struct SeqSerializer<'a, W> {
    ser: &'a mut Serializer<W>,
    item: String,
    /// Element opened around the items, if any.
    wrapper: Option<String>,
    /// Field element around a tuple variant.
    outer: Option<String>,
}

impl<W: TokenWriter> SeqSerializer<'_, W> {
    fn item<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.ser.key = Some(self.item.clone());
        value.serialize(&mut *self.ser)
    }

    fn finish(self) -> Result<()> {
        if let Some(name) = &self.wrapper {
            self.ser.close(name)?;
        }
        if let Some(name) = &self.outer {
            self.ser.close(name)?;
        }
        Ok(())
    }
}

impl<W: TokenWriter> ser::SerializeSeq for SeqSerializer<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.item(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<W: TokenWriter> ser::SerializeTuple for SeqSerializer<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.item(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<W: TokenWriter> ser::SerializeTupleStruct for SeqSerializer<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.item(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<W: TokenWriter> ser::SerializeTupleVariant for SeqSerializer<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.item(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Serializes map entries as `<key>value</key>` children.
pub struct MapSerializer<'a, W> {
    ser: &'a mut Serializer<W>,
    name: String,
    next_key: Option<String>,
}

impl<W: TokenWriter> ser::SerializeMap for MapSerializer<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let key = key
            .serialize(ScalarSerializer)?
            .ok_or_else(|| Error::unsupported("map key must not be None"))?;
        self.next_key = Some(key);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.ser.key = self.next_key.take();
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.close(&self.name)
    }
}

/// Serializes struct fields; attributes are held back until the start tag
/// is written.
pub struct StructSerializer<'a, W> {
    ser: &'a mut Serializer<W>,
    name: String,
    attrs: Vec<(String, String)>,
    started: bool,
    /// Field element around a struct variant.
    outer: Option<String>,
}

impl<W: TokenWriter> StructSerializer<'_, W> {
    fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.ser.open(&self.name)?;
        for (name, value) in self.attrs.drain(..) {
            self.ser.writer.attribute(&name, &value)?;
        }
        self.started = true;
        Ok(())
    }
}

impl<W: TokenWriter> ser::SerializeStruct for StructSerializer<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if let Some(attr) = key.strip_prefix('@') {
            if self.started {
                return Err(Error::custom(format!(
                    "attribute `{}` of <{}> must be declared before its other fields",
                    attr, self.name
                )));
            }
            if let Some(text) = value.serialize(ScalarSerializer)? {
                self.attrs.push((attr.to_string(), text));
            }
            return Ok(());
        }

        self.start()?;
        self.ser.key = match key {
            "$value" | "$text" => None,
            _ => Some(key.to_string()),
        };
        value.serialize(&mut *self.ser)
    }

    fn end(mut self) -> Result<()> {
        self.start()?;
        self.ser.close(&self.name)?;
        if let Some(name) = &self.outer {
            self.ser.close(name)?;
        }
        Ok(())
    }
}

impl<W: TokenWriter> ser::SerializeStructVariant for StructSerializer<'_, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<()> {
        ser::SerializeStruct::end(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::token::{EventLog, TokenEvent};
    use crate::writer::XmlWriter;
    use serde::Serialize;
    use std::collections::BTreeMap;

    fn to_xml<T: Serialize>(value: &T) -> String {
        let mut ser = Serializer::new(XmlWriter::new(Vec::new()));
        value.serialize(&mut ser).unwrap();
        String::from_utf8(ser.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn test_simple_struct() {
        #[derive(Serialize)]
        struct Person {
            name: String,
            age: u32,
        }

        let xml = to_xml(&Person {
            name: "Alice".to_string(),
            age: 30,
        });
        assert_eq!(xml, "<Person><name>Alice</name><age>30</age></Person>");
    }

    #[test]
    fn test_attributes_and_text() {
        #[derive(Serialize)]
        struct Note {
            #[serde(rename = "@lang")]
            lang: &'static str,
            #[serde(rename = "@draft")]
            draft: Option<bool>,
            #[serde(rename = "$value")]
            body: &'static str,
        }

        let xml = to_xml(&Note {
            lang: "en",
            draft: None,
            body: "a < b",
        });
        assert_eq!(xml, r#"<Note lang="en">a &lt; b</Note>"#);
    }

    #[test]
    fn test_attribute_only_struct_is_self_closing() {
        #[derive(Serialize)]
        struct Point {
            #[serde(rename = "@x")]
            x: i32,
            #[serde(rename = "@y")]
            y: f64,
        }

        assert_eq!(to_xml(&Point { x: -1, y: 2.5 }), r#"<Point x="-1" y="2.5"/>"#);
    }

    #[test]
    fn test_late_attribute_is_rejected() {
        #[derive(Serialize)]
        struct Bad {
            name: &'static str,
            #[serde(rename = "@id")]
            id: u32,
        }

        let mut ser = Serializer::new(EventLog::new());
        let err = Bad { name: "x", id: 1 }.serialize(&mut ser).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Custom(msg) if msg.contains("`id`")));
    }

    #[test]
    fn test_nested_struct_named_by_field() {
        #[derive(Serialize)]
        struct Address {
            city: &'static str,
        }

        #[derive(Serialize)]
        struct Person {
            home: Address,
        }

        assert_eq!(
            to_xml(&Person {
                home: Address { city: "Oslo" }
            }),
            "<Person><home><city>Oslo</city></home></Person>"
        );
    }

    #[test]
    fn test_optional_and_sequence_fields() {
        #[derive(Serialize)]
        struct Doc {
            title: Option<&'static str>,
            note: Option<&'static str>,
            tag: Vec<u8>,
        }

        let xml = to_xml(&Doc {
            title: Some("t"),
            note: None,
            tag: vec![1, 2],
        });
        assert_eq!(xml, "<Doc><title>t</title><tag>1</tag><tag>2</tag></Doc>");
    }

    #[test]
    fn test_enums() {
        #[derive(Serialize)]
        enum Shape {
            Empty,
            Circle(u32),
            Rect { w: u32, h: u32 },
            Pair(u8, u8),
        }

        #[derive(Serialize)]
        struct Drawing {
            a: Shape,
            b: Shape,
            c: Shape,
            d: Shape,
        }

        let xml = to_xml(&Drawing {
            a: Shape::Empty,
            b: Shape::Circle(3),
            c: Shape::Rect { w: 1, h: 2 },
            d: Shape::Pair(4, 5),
        });
        assert_eq!(
            xml,
            "<Drawing><a>Empty</a><b><Circle>3</Circle></b>\
             <c><Rect><w>1</w><h>2</h></Rect></c>\
             <d><Pair><item>4</item><item>5</item></Pair></d></Drawing>"
        );

        assert_eq!(to_xml(&Shape::Empty), "<Empty/>");
        assert_eq!(to_xml(&Shape::Circle(9)), "<Circle>9</Circle>");
    }

    #[test]
    fn test_map_field() {
        #[derive(Serialize)]
        struct Config {
            env: BTreeMap<&'static str, i32>,
        }

        let mut env = BTreeMap::new();
        env.insert("a", 1);
        env.insert("b", 2);
        assert_eq!(
            to_xml(&Config { env }),
            "<Config><env><a>1</a><b>2</b></env></Config>"
        );
    }

    #[test]
    fn test_top_level_sequence_and_root_override() {
        assert_eq!(
            to_xml(&vec![1, 2]),
            "<items><item>1</item><item>2</item></items>"
        );

        let mut ser = Serializer::with_root(XmlWriter::new(Vec::new()), "count");
        42u32.serialize(&mut ser).unwrap();
        let xml = String::from_utf8(ser.into_inner().into_inner()).unwrap();
        assert_eq!(xml, "<count>42</count>");
    }

    #[test]
    fn test_bare_scalar_needs_root() {
        let mut ser = Serializer::new(EventLog::new());
        let err = "text".serialize(&mut ser).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
    }

    #[test]
    fn test_event_order() {
        #[derive(Serialize)]
        struct Task {
            #[serde(rename = "@id")]
            id: u8,
            done: bool,
        }

        let mut ser = Serializer::new(EventLog::new());
        Task { id: 1, done: true }.serialize(&mut ser).unwrap();
        assert_eq!(
            ser.into_inner().into_events(),
            [
                TokenEvent::StartElement("Task".into()),
                TokenEvent::Attribute("id".into(), "1".into()),
                TokenEvent::StartElement("done".into()),
                TokenEvent::Characters("true".into()),
                TokenEvent::EndElement("done".into()),
                TokenEvent::EndElement("Task".into()),
            ]
        );
    }

    #[test]
    fn test_bytes_and_char() {
        #[derive(Serialize)]
        struct Blob {
            #[serde(with = "serde_bytes_like")]
            data: Vec<u8>,
            initial: char,
        }

        mod serde_bytes_like {
            pub fn serialize<S: serde::Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
                s.serialize_bytes(v)
            }
        }

        assert_eq!(
            to_xml(&Blob {
                data: vec![0xde, 0xad, 0x01],
                initial: 'é',
            }),
            "<Blob><data>dead01</data><initial>é</initial></Blob>"
        );
    }
}
