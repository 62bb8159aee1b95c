//! Writes a task document with CDATA, reads it back, and writes its schema.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use xml_marshal::schema::StaticSchemas;
use xml_marshal::{
    from_reader_with, query_xsd, to_string_with, Console, MarshalOptions, ValidationEvent,
};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Task {
    #[serde(rename = "@id")]
    id: u32,
    title: String,
    description: String,
    tag: Vec<String>,
}

const TASK_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:demo:task">
  <xs:element name="Task"/>
</xs:schema>
"#;

fn main() {
    let task = Task {
        id: 1,
        title: "Sort the input".to_string(),
        description: "Use <b>merge sort</b> if n > 1000; beware of ]]> in the data.".to_string(),
        tag: vec!["sorting".to_string(), "easy".to_string()],
    };

    let options = MarshalOptions::new().with_cdata_elements(["description"]);
    let xml = to_string_with(&task, &options).expect("Failed to serialize");
    println!("Serialized XML:");
    println!("{}", xml);
    println!();

    // Unknown content is reported, not fatal.
    let input = r#"<Task id="2"><title>Search</title><owner>bob</owner><description>d</description><tag>x</tag></Task>"#;
    let mut report = |event: &ValidationEvent| {
        println!("  {}", event);
        true
    };
    println!("Validation events:");
    let parsed: Task =
        from_reader_with(input.as_bytes(), &mut report, None).expect("Failed to deserialize");
    println!("Deserialized task {}: {}", parsed.id, parsed.title);
    println!();

    let dest = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    let schemas = StaticSchemas::new().with_schema("urn:demo:task", "schema1.xsd", TASK_XSD);
    let mut console = Console::stdio();
    let outcome = query_xsd(&mut console, &schemas, Some(&dest));
    std::process::exit(outcome.exit_code());
}
