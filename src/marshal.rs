//! One-call marshalling and unmarshalling.
//!
//! Writing assembles the full output pipeline for each call:
//!
//! ```text
//! Serializer -> CDataWriter -> IndentingWriter -> XmlWriter -> BufWriter -> sink
//! ```
//!
//! The CDATA decorator is outermost, so the indentation decorator treats
//! CDATA sections like any other text. Reading runs the fail-fast policy
//! unless a handler is given.
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use xml_marshal::{from_str, to_string_with, MarshalOptions};
//!
//! #[derive(Debug, Serialize, Deserialize, PartialEq)]
//! struct Task {
//!     #[serde(rename = "@id")]
//!     id: u32,
//!     description: String,
//! }
//!
//! let task = Task { id: 1, description: "if a < b ]]> done".into() };
//! let options = MarshalOptions::default().with_cdata_elements(["description"]);
//! let xml = to_string_with(&task, &options).unwrap();
//! assert_eq!(
//!     xml,
//!     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
//!      <Task id=\"1\">\n  \
//!      <description><![CDATA[if a < b ]]]]><![CDATA[> done]]></description>\n\
//!      </Task>"
//! );
//! assert_eq!(from_str::<Task>(&xml).unwrap(), task);
//! ```

use crate::cdata::CDataWriter;
use crate::de::Deserializer;
use crate::error::{Error, ErrorKind, Result};
use crate::indent::{IndentConfig, IndentingWriter};
use crate::ser::Serializer;
use crate::token::TokenWriter;
use crate::validation::{FailFast, SchemaValidator, ValidationEvent, ValidationEventHandler};
use crate::writer::XmlWriter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

pub use crate::de::{from_bytes, from_str};

/// Options for writing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalOptions {
    indent: IndentConfig,
    cdata_elements: BTreeSet<String>,
    declaration: bool,
    root: Option<String>,
}

impl Default for MarshalOptions {
    fn default() -> Self {
        Self {
            indent: IndentConfig::default(),
            cdata_elements: BTreeSet::new(),
            declaration: true,
            root: None,
        }
    }
}

impl MarshalOptions {
    /// Creates the default options: two-space indentation, no CDATA
    /// elements, with an XML declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation.
    pub fn with_indent(mut self, indent: IndentConfig) -> Self {
        self.indent = indent;
        self
    }

    /// Adds elements whose text is written as CDATA.
    pub fn with_cdata_elements<I, S>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cdata_elements
            .extend(elements.into_iter().map(Into::into));
        self
    }

    /// Sets whether the XML declaration is written.
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Names the document element instead of using the type name.
    pub fn with_root<S: Into<String>>(mut self, root: S) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Returns the indentation.
    pub fn indent(&self) -> &IndentConfig {
        &self.indent
    }

    /// Returns the elements whose text is written as CDATA.
    pub fn cdata_elements(&self) -> &BTreeSet<String> {
        &self.cdata_elements
    }

    /// Returns whether the XML declaration is written.
    pub fn declaration(&self) -> bool {
        self.declaration
    }

    /// Returns the document element override.
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }
}

/// Serializes `value` as a complete document into a token writer.
pub fn marshal<T, W>(value: &T, writer: W, options: &MarshalOptions) -> Result<()>
where
    T: ?Sized + Serialize,
    W: TokenWriter,
{
    let mut ser = match &options.root {
        Some(root) => Serializer::with_root(writer, root.as_str()),
        None => Serializer::new(writer),
    };
    if options.declaration {
        ser.get_mut().start_document()?;
    }
    value.serialize(&mut ser)?;
    ser.get_mut().end_document()
}

/// Serializes `value` through the full output pipeline into `output`.
///
/// The output is flushed even when serialization fails.
pub fn to_writer<T, W>(value: &T, output: W, options: &MarshalOptions) -> Result<()>
where
    T: ?Sized + Serialize,
    W: Write,
{
    tracing::debug!(
        cdata_elements = options.cdata_elements.len(),
        declaration = options.declaration,
        "assembling output pipeline"
    );
    let raw = XmlWriter::new(BufWriter::new(output));
    let indented = IndentingWriter::new(raw, options.indent.clone());
    let mut writer = CDataWriter::new(indented, options.cdata_elements.iter().cloned());

    let result = marshal(value, &mut writer, options);
    let flushed = writer.flush();
    result.and(flushed)
}

/// Serializes `value` to a string with the default options.
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    to_string_with(value, &MarshalOptions::default())
}

/// Serializes `value` to a string.
pub fn to_string_with<T>(value: &T, options: &MarshalOptions) -> Result<String>
where
    T: ?Sized + Serialize,
{
    let mut out = Vec::with_capacity(256);
    to_writer(value, &mut out, options)?;
    String::from_utf8(out).map_err(|_| Error::new(ErrorKind::InvalidUtf8))
}

/// Serializes `value` into a new file at `path`, replacing any existing one.
pub fn write_file<T, P>(value: &T, path: P, options: &MarshalOptions) -> Result<()>
where
    T: ?Sized + Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "writing document");
    to_writer(value, File::create(path)?, options)
}

/// Deserializes a document from `input` with the fail-fast policy.
pub fn from_reader<T, R>(input: R) -> Result<T>
where
    T: DeserializeOwned,
    R: Read,
{
    from_reader_with(input, &mut FailFast, None)
}

/// Deserializes a document from `input`, reporting validation events to
/// `handler` and checking tokens against `schema` if given.
pub fn from_reader_with<T, R, H>(
    mut input: R,
    handler: &mut H,
    schema: Option<Box<dyn SchemaValidator>>,
) -> Result<T>
where
    T: DeserializeOwned,
    R: Read,
    H: ValidationEventHandler + ?Sized,
{
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes).map_err(|_| Error::new(ErrorKind::InvalidUtf8))?;
    tracing::debug!(len = text.len(), schema = schema.is_some(), "unmarshalling document");

    let mut de = Deserializer::from_str(&text)
        .with_handler(|event: &ValidationEvent| handler.handle_event(event));
    if let Some(schema) = schema {
        de = de.with_schema(schema);
    }
    de.deserialize_document()
}

/// Deserializes the document in the file at `path`.
pub fn read_file<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "reading document");
    from_reader(File::open(path)?)
}

/// Reads and writes documents with fixed [`MarshalOptions`].
#[derive(Debug, Clone, Default)]
pub struct XmlMarshaller {
    options: MarshalOptions,
}

impl XmlMarshaller {
    /// Creates a marshaller with the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a marshaller with the given options.
    pub fn with_options(options: MarshalOptions) -> Self {
        Self { options }
    }

    /// Returns the options.
    pub fn options(&self) -> &MarshalOptions {
        &self.options
    }

    /// Deserializes a document from `input`.
    pub fn read<T: DeserializeOwned, R: Read>(&self, input: R) -> Result<T> {
        from_reader(input)
    }

    /// Serializes `value` into `output`.
    pub fn write<T: ?Sized + Serialize, W: Write>(&self, value: &T, output: W) -> Result<()> {
        to_writer(value, output, &self.options)
    }

    /// Deserializes the document in the file at `path`.
    pub fn read_file<T: DeserializeOwned, P: AsRef<Path>>(&self, path: P) -> Result<T> {
        read_file(path)
    }

    /// Serializes `value` into a new file at `path`.
    pub fn write_file<T: ?Sized + Serialize, P: AsRef<Path>>(&self, value: &T, path: P) -> Result<()> {
        write_file(value, path, &self.options)
    }

    /// Serializes `value` to a string.
    pub fn to_string<T: ?Sized + Serialize>(&self, value: &T) -> Result<String> {
        to_string_with(value, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::reader::XmlEvent;
    use crate::token::{EventLog, TokenEvent};
    use crate::validation::{Severity, ValidationEventCollector};
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Task {
        #[serde(rename = "@id")]
        id: u32,
        title: String,
        description: String,
    }

    fn task() -> Task {
        Task {
            id: 1,
            title: "Sort & merge".into(),
            description: "a]]>b".into(),
        }
    }

    #[test]
    fn test_default_output() {
        let xml = to_string(&task()).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Task id=\"1\">\n  \
             <title>Sort &amp; merge</title>\n  \
             <description>a]]&gt;b</description>\n\
             </Task>"
        );
    }

    #[test]
    fn test_cdata_elements() {
        let options = MarshalOptions::new().with_cdata_elements(["description"]);
        let xml = to_string_with(&task(), &options).unwrap();
        assert!(xml.contains("<description><![CDATA[a]]]]><![CDATA[>b]]></description>"));
        assert!(xml.contains("<title>Sort &amp; merge</title>"));
        assert_eq!(from_str::<Task>(&xml).unwrap(), task());
    }

    #[test]
    fn test_compact_without_declaration() {
        let options = MarshalOptions::new()
            .with_indent(IndentConfig::none())
            .with_declaration(false)
            .with_root("job");
        assert_eq!(options.root(), Some("job"));
        assert!(!options.declaration());

        let xml = to_string_with(&task(), &options).unwrap();
        assert_eq!(
            xml,
            "<job id=\"1\"><title>Sort &amp; merge</title><description>a]]&gt;b</description></job>"
        );
    }

    #[test]
    fn test_marshal_into_event_log() {
        let mut log = EventLog::new();
        marshal(&task(), &mut log, &MarshalOptions::new()).unwrap();
        let events = log.into_events();
        assert_eq!(events.first(), Some(&TokenEvent::StartDocument));
        assert_eq!(events.last(), Some(&TokenEvent::EndDocument));
        assert_eq!(events[1], TokenEvent::StartElement("Task".into()));
        assert_eq!(events[2], TokenEvent::Attribute("id".into(), "1".into()));
    }

    #[test]
    fn test_serialize_failure_is_a_mapping_error() {
        #[derive(Serialize)]
        struct Late {
            name: &'static str,
            #[serde(rename = "@late")]
            late: u8,
        }

        let mut out = Vec::new();
        let err = to_writer(&Late { name: "x", late: 1 }, &mut out, &MarshalOptions::new())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Mapping);
        assert!(String::from_utf8(out).unwrap().starts_with("<?xml"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.xml");

        write_file(&task(), &path, &MarshalOptions::new()).unwrap();
        let read: Task = read_file(&path).unwrap();
        assert_eq!(read, task());

        std::fs::write(&path, "<Task id=\"2\">").unwrap();
        assert!(read_file::<Task, _>(&path).is_err());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file::<Task, _>(dir.path().join("missing.xml")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
        assert_eq!(err.category(), ErrorCategory::Stream);
    }

    #[test]
    fn test_from_reader_with_collector() {
        let xml = r#"<Task id="one"><title>t</title><extra/><description>d</description></Task>"#;
        let mut collector = ValidationEventCollector::new();
        let read: Task = from_reader_with(xml.as_bytes(), &mut collector, None).unwrap();

        assert_eq!(read.id, 0);
        let severities: Vec<_> = collector.events().iter().map(|e| e.severity()).collect();
        assert_eq!(severities, [Severity::Error, Severity::Warning]);
        assert!(from_reader::<Task, _>(xml.as_bytes()).is_err());
    }

    #[test]
    fn test_from_reader_with_schema() {
        struct RequireId;

        impl SchemaValidator for RequireId {
            fn validate(&mut self, event: &XmlEvent<'_>, depth: usize) -> Option<ValidationEvent> {
                match event {
                    XmlEvent::StartElement { attributes, .. } | XmlEvent::EmptyElement { attributes, .. }
                        if depth == 0 && !attributes.iter().any(|a| a.name == "id") =>
                    {
                        Some(ValidationEvent::error("missing required attribute 'id'"))
                    }
                    _ => None,
                }
            }
        }

        let xml = "<Task><title>t</title><description>d</description></Task>";
        let schema: Box<dyn SchemaValidator> = Box::new(RequireId);
        let err = from_reader_with::<Task, _, _>(xml.as_bytes(), &mut FailFast, Some(schema))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(
            err.validation_event().map(|e| e.message()),
            Some("missing required attribute 'id'")
        );
    }

    #[test]
    fn test_from_reader_rejects_invalid_utf8() {
        let err = from_reader::<Task, _>(&b"<Task>\xfe</Task>"[..]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidUtf8));
    }

    #[test]
    fn test_marshaller_object() {
        let marshaller =
            XmlMarshaller::with_options(MarshalOptions::new().with_cdata_elements(["title"]));
        assert!(marshaller.options().cdata_elements().contains("title"));

        let mut out = Vec::new();
        marshaller.write(&task(), &mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("<title><![CDATA[Sort & merge]]></title>"));
        assert_eq!(marshaller.to_string(&task()).unwrap(), text);
        assert_eq!(marshaller.read::<Task, _>(&out[..]).unwrap(), task());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.xml");
        marshaller.write_file(&task(), &path).unwrap();
        assert_eq!(marshaller.read_file::<Task, _>(&path).unwrap(), task());
    }
}
