//! # xml_marshal
//!
//! Serde-driven XML marshalling with readable output.
//!
//! ## Features
//!
//! - Serialize any `Serialize` type into indented XML, and read it back
//!   with any `Deserialize` type
//! - Chosen elements written as CDATA, split safely around `]]>`
//! - A token-writer pipeline of small decorators that can be composed by hand
//! - Validation events for everything the target type does not account
//!   for, with a fail-fast default policy
//! - Companion schema files named after their namespace, with an
//!   interactive overwrite prompt
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use xml_marshal::{from_str, to_string};
//!
//! #[derive(Debug, Serialize, Deserialize, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let person = Person {
//!     name: "Alice".to_string(),
//!     age: 30,
//! };
//! let xml = to_string(&person).unwrap();
//! assert_eq!(
//!     xml,
//!     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
//!      <Person>\n  <name>Alice</name>\n  <age>30</age>\n</Person>"
//! );
//!
//! let parsed: Person = from_str(&xml).unwrap();
//! assert_eq!(parsed, person);
//! ```
//!
//! ## Attributes, Text and CDATA
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use xml_marshal::{from_str, to_string_with, MarshalOptions};
//!
//! #[derive(Debug, Serialize, Deserialize, PartialEq)]
//! struct Script {
//!     #[serde(rename = "@lang")]
//!     lang: String,
//!     #[serde(rename = "$value")]
//!     code: String,
//! }
//!
//! let script = Script { lang: "js".into(), code: "if (a < b) {}".into() };
//! let options = MarshalOptions::new()
//!     .with_cdata_elements(["Script"])
//!     .with_declaration(false);
//! let xml = to_string_with(&script, &options).unwrap();
//! assert_eq!(xml, r#"<Script lang="js"><![CDATA[if (a < b) {}]]></Script>"#);
//! assert_eq!(from_str::<Script>(&xml).unwrap(), script);
//! ```
//!
//! ## Lenient Reading
//!
//! ```rust
//! use serde::Deserialize;
//! use xml_marshal::{from_reader_with, ValidationEventCollector};
//!
//! #[derive(Debug, Deserialize)]
//! struct Config {
//!     name: String,
//!     retries: u8,
//! }
//!
//! let xml = "<Config><name>db</name><retries>many</retries></Config>";
//! let mut events = ValidationEventCollector::new();
//! let config: Config = from_reader_with(xml.as_bytes(), &mut events, None).unwrap();
//!
//! assert_eq!(config.retries, 0);
//! assert!(events.has_errors());
//! assert!(xml_marshal::from_str::<Config>(xml).is_err());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cdata;
pub mod de;
pub mod error;
pub mod escape;
pub mod indent;
pub mod marshal;
pub mod reader;
pub mod schema;
pub mod ser;
pub mod token;
pub mod validation;
pub mod writer;

// Re-export main types and functions
pub use cdata::CDataWriter;
pub use de::{from_bytes, from_str, Deserializer};
pub use error::{Error, ErrorCategory, ErrorKind, Position, Result};
pub use escape::{escape, unescape};
pub use indent::{IndentConfig, IndentingWriter};
pub use marshal::{
    from_reader, from_reader_with, marshal, read_file, to_string, to_string_with, to_writer,
    write_file, MarshalOptions, XmlMarshaller,
};
pub use reader::{Attribute, XmlEvent, XmlReader};
pub use schema::{query_xsd, Console, FileSchemaOutputResolver, QueryOutcome};
pub use ser::Serializer;
pub use token::{EventLog, TokenEvent, TokenWriter};
pub use validation::{
    FailFast, SchemaValidator, Severity, ValidationEvent, ValidationEventCollector,
    ValidationEventHandler,
};
pub use writer::XmlWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    enum Status {
        Open,
        Closed,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    enum Shape {
        Circle(u32),
        Rect { w: u32, h: u32 },
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Point(i32, i32);

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Step {
        #[serde(rename = "@n")]
        n: u16,
        #[serde(rename = "$value")]
        text: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Task {
        #[serde(rename = "@id")]
        id: u64,
        #[serde(rename = "@lang")]
        lang: Option<String>,
        title: String,
        description: String,
        weight: f64,
        done: bool,
        status: Status,
        shape: Shape,
        origin: Point,
        note: Option<String>,
        step: Vec<Step>,
        env: BTreeMap<String, i32>,
        empty: String,
    }

    fn task() -> Task {
        Task {
            id: 42,
            lang: Some("de".into()),
            title: "Sort \"fast\" & <stable>".into(),
            description: "ends with ]]> and ]]]]> inside <b>".into(),
            weight: 1.5,
            done: false,
            status: Status::Closed,
            shape: Shape::Rect { w: 3, h: 4 },
            origin: Point(-1, 2),
            note: None,
            step: vec![
                Step { n: 1, text: "read".into() },
                Step { n: 2, text: " write ".into() },
            ],
            env: [("a".to_string(), 1), ("b".to_string(), -2)].into_iter().collect(),
            empty: String::new(),
        }
    }

    fn cdata_options() -> MarshalOptions {
        MarshalOptions::new().with_cdata_elements(["description", "step"])
    }

    #[test]
    fn test_roundtrip_default_options() {
        let original = task();
        let xml = to_string(&original).unwrap();
        let parsed: Task = from_str(&xml).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_roundtrip_with_cdata() {
        let original = task();
        let xml = to_string_with(&original, &cdata_options()).unwrap();
        assert!(xml.contains("<![CDATA["));
        assert!(!xml.contains("<description>ends"));
        let parsed: Task = from_str(&xml).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_roundtrip_compact() {
        let options = MarshalOptions::new().with_indent(IndentConfig::none());
        let original = task();
        let xml = to_string_with(&original, &options).unwrap();
        assert!(!xml.contains('\n'));
        assert_eq!(from_str::<Task>(&xml).unwrap(), original);
    }

    #[test]
    fn test_whitespace_only_values_roundtrip() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Gaps {
            a: String,
            b: String,
            c: Option<String>,
            tab: Vec<String>,
            step: Step,
        }

        let original = Gaps {
            a: "   ".into(),
            b: "\n".into(),
            c: Some("\t".into()),
            tab: vec![" ".into(), "x".into(), "\t\t".into()],
            step: Step { n: 1, text: "  ".into() },
        };
        let compact = MarshalOptions::new().with_indent(IndentConfig::none());
        for options in [MarshalOptions::new(), cdata_options(), compact] {
            let xml = to_string_with(&original, &options).unwrap();
            assert_eq!(from_str::<Gaps>(&xml).unwrap(), original, "{}", xml);
        }
    }

    #[test]
    fn test_reserializing_is_stable() {
        let options = cdata_options();
        let once = to_string_with(&task(), &options).unwrap();
        let parsed: Task = from_str(&once).unwrap();
        let twice = to_string_with(&parsed, &options).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cdata_output_is_well_formed() {
        for text in ["", "plain", "]]>", "]]>]]>", "a]]>b]]>c", "]]]]>>"] {
            let step = Step {
                n: 1,
                text: text.to_string(),
            };
            let options = MarshalOptions::new().with_cdata_elements(["Step"]);
            let xml = to_string_with(&step, &options).unwrap();

            let mut reader = XmlReader::from_str(&xml);
            loop {
                match reader.next_event() {
                    Ok(XmlEvent::Eof) => break,
                    Ok(_) => {}
                    Err(e) => panic!("{} is not well-formed: {}", xml, e),
                }
            }
            assert_eq!(from_str::<Step>(&xml).unwrap().text, text, "{}", xml);
        }
    }

    #[test]
    fn test_layout() {
        let xml = to_string(&Step { n: 7, text: "go".into() }).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Step n=\"7\">go</Step>"
        );

        let xml = to_string(&Point(1, 2)).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Point>\n  <item>1</item>\n  <item>2</item>\n</Point>"
        );
    }

    #[test]
    fn test_top_level_sequence_roundtrip() {
        let values = vec![3u8, 1, 2];
        let xml = to_string(&values).unwrap();
        assert!(xml.contains("<items>"));
        assert_eq!(from_str::<Vec<u8>>(&xml).unwrap(), values);
    }

    #[test]
    fn test_error_reporting() {
        #[derive(Debug, Deserialize)]
        struct Item {
            #[allow(dead_code)]
            name: String,
        }

        let err = from_str::<Item>("<Item><name>test</wrong></Item>").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Stream);
        assert!(err.to_string().contains("mismatched"));
        assert_eq!(err.position().map(|p| p.line), Some(1));
    }

    #[test]
    fn test_escape_unescape() {
        let original = "<hello> & \"world\"";
        let escaped = escape(original);
        assert_eq!(unescape(&escaped).unwrap(), original);
    }
}
