//! Writing companion schema documents.
//!
//! A [`SchemaGenerator`] produces one schema document per namespace and asks
//! a [`SchemaOutputResolver`] where each one goes. [`FileSchemaOutputResolver`]
//! names the files, places them in a destination directory and asks on a
//! [`Console`] before overwriting anything. [`query_xsd`] runs the whole
//! interaction and reports how it ended.
//!
//! ```rust
//! use std::io::Cursor;
//! use xml_marshal::schema::{query_xsd, Console, QueryOutcome, StaticSchemas};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let schemas = StaticSchemas::new().with_schema(
//!     "urn:example:task",
//!     "schema1.xsd",
//!     "<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\"/>",
//! );
//!
//! let mut console = Console::new(Cursor::new(&b""[..]), Vec::new());
//! let outcome = query_xsd(&mut console, &schemas, Some(dir.path()));
//! assert_eq!(outcome, QueryOutcome::Done);
//! assert!(dir.path().join("example_task.xsd").exists());
//! ```

use crate::error::{Error, Result};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Stdin, Stdout, Write};
use std::path::{Path, PathBuf};

/// Returns the file name used for the schema of `namespace`.
///
/// `urn:` namespaces map to the rest of the URN with every `:` replaced by
/// `_`, plus `.xsd`. Any other namespace keeps the suggested name.
///
/// ```rust
/// use xml_marshal::schema::schema_file_name;
///
/// assert_eq!(schema_file_name("urn:example:foo", "schema1.xsd"), "example_foo.xsd");
/// assert_eq!(schema_file_name("http://example.com/ns", "schema1.xsd"), "schema1.xsd");
/// ```
pub fn schema_file_name(namespace: &str, suggested_file_name: &str) -> String {
    match namespace.strip_prefix("urn:") {
        Some(rest) => format!("{}.xsd", rest.replace(':', "_")),
        None => suggested_file_name.to_string(),
    }
}

/// Line-oriented user interaction over a reader and a writer.
pub struct Console<R, W> {
    input: R,
    output: W,
    default_yes: bool,
}

impl Console<io::StdinLock<'static>, Stdout> {
    /// Creates a console on the process's stdin and stdout.
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// Creates a console; blank answers mean yes.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            default_yes: true,
        }
    }

    /// Sets the answer assumed for a blank line.
    pub fn with_default_answer(mut self, yes: bool) -> Self {
        self.default_yes = yes;
        self
    }

    /// Writes one line.
    pub fn println(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{}", line)?;
        self.output.flush()?;
        Ok(())
    }

    /// Asks a yes/no question until the answer is `Y` or `N`.
    ///
    /// The prompt is followed by the default answer in brackets. Answers are
    /// case-insensitive but must be exactly one letter; a blank line or end
    /// of input picks the default.
    pub fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let default = if self.default_yes { "Y" } else { "N" };
        let mut line = String::new();
        loop {
            write!(self.output, "{} [{}] ", prompt, default)?;
            self.output.flush()?;

            line.clear();
            self.input.read_line(&mut line)?;
            let answer = line.trim_end_matches(['\n', '\r']).to_uppercase();
            let answer = if answer.trim().is_empty() { default } else { answer.as_str() };
            match answer {
                "Y" => return Ok(true),
                "N" => return Ok(false),
                _ => {}
            }
        }
    }

    /// Returns the input and output handles.
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

/// Decides where the schema document for a namespace is written.
pub trait SchemaOutputResolver {
    /// Sink for one schema document.
    type Output: Write;

    /// Opens the destination for the schema of `namespace`.
    fn create_output(&mut self, namespace: &str, suggested_file_name: &str)
        -> Result<Self::Output>;
}

/// Produces schema documents.
pub trait SchemaGenerator {
    /// Writes every schema document through `resolver`.
    fn generate_schema<O: SchemaOutputResolver>(&self, resolver: &mut O) -> Result<()>;
}

/// A schema file created by [`FileSchemaOutputResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDestination {
    /// Namespace the schema describes.
    pub namespace: String,
    /// Absolute path of the file.
    pub path: PathBuf,
}

/// Writes schema documents to files, asking before overwriting one.
///
/// Declining an overwrite fails with
/// [`ErrorKind::Aborted`](crate::ErrorKind::Aborted), which ends the whole run.
pub struct FileSchemaOutputResolver<'c, R, W> {
    console: &'c mut Console<R, W>,
    dest_dir: Option<PathBuf>,
    written: Vec<SchemaDestination>,
}

impl<'c, R: BufRead, W: Write> FileSchemaOutputResolver<'c, R, W> {
    /// Creates a resolver writing into `dest_dir`, or the working directory.
    pub fn new(console: &'c mut Console<R, W>, dest_dir: Option<&Path>) -> Self {
        Self {
            console,
            dest_dir: dest_dir.map(Path::to_path_buf),
            written: Vec::new(),
        }
    }

    /// Returns the files created so far.
    pub fn written(&self) -> &[SchemaDestination] {
        &self.written
    }

    fn destination(&self, file_name: &str) -> Result<PathBuf> {
        let path = match &self.dest_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        };
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(env::current_dir()?.join(path))
        }
    }
}

impl<R: BufRead, W: Write> SchemaOutputResolver for FileSchemaOutputResolver<'_, R, W> {
    type Output = BufWriter<File>;

    fn create_output(
        &mut self,
        namespace: &str,
        suggested_file_name: &str,
    ) -> Result<Self::Output> {
        let file_name = schema_file_name(namespace, suggested_file_name);
        self.console.println(namespace)?;
        self.console.println(&file_name)?;

        let path = self.destination(&file_name)?;
        if path.exists() {
            let prompt = format!("File '{}' exists. Overwrite (Y/N)?", path.display());
            if !self.console.confirm(&prompt)? {
                return Err(Error::aborted(format!(
                    "not overwriting '{}'",
                    path.display()
                )));
            }
        } else {
            self.console
                .println(&format!("Writing file '{}'.", path.display()))?;
        }

        let file = File::create(&path)?;
        tracing::info!(namespace, path = %path.display(), "writing schema file");
        self.written.push(SchemaDestination {
            namespace: namespace.to_string(),
            path,
        });
        Ok(BufWriter::new(file))
    }
}

/// One fixed schema document.
#[derive(Debug, Clone)]
struct StaticSchema {
    namespace: String,
    suggested_file_name: String,
    content: String,
}

/// A [`SchemaGenerator`] that writes documents supplied up front.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemas {
    schemas: Vec<StaticSchema>,
}

impl StaticSchemas {
    /// Creates an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the schema document for `namespace`.
    pub fn with_schema<N, F, C>(mut self, namespace: N, suggested_file_name: F, content: C) -> Self
    where
        N: Into<String>,
        F: Into<String>,
        C: Into<String>,
    {
        self.schemas.push(StaticSchema {
            namespace: namespace.into(),
            suggested_file_name: suggested_file_name.into(),
            content: content.into(),
        });
        self
    }

    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if there are no documents.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaGenerator for StaticSchemas {
    fn generate_schema<O: SchemaOutputResolver>(&self, resolver: &mut O) -> Result<()> {
        for schema in &self.schemas {
            let mut out = resolver.create_output(&schema.namespace, &schema.suggested_file_name)?;
            out.write_all(schema.content.as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }
}

/// How a [`query_xsd`] run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Every schema document was written.
    Done,
    /// The user declined an overwrite, or generation failed.
    Aborted,
}

impl QueryOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            QueryOutcome::Done => 0,
            QueryOutcome::Aborted => 1,
        }
    }
}

/// Generates schema files into `dest_dir` (or the working directory),
/// prompting on `console` before overwriting existing files.
///
/// Ends by printing `Done.` or `Aborted.`; a generator failure is printed
/// as `Error: <message>` first.
pub fn query_xsd<R, W, G>(
    console: &mut Console<R, W>,
    generator: &G,
    dest_dir: Option<&Path>,
) -> QueryOutcome
where
    R: BufRead,
    W: Write,
    G: SchemaGenerator,
{
    let result = {
        let mut resolver = FileSchemaOutputResolver::new(console, dest_dir);
        generator.generate_schema(&mut resolver)
    };

    let outcome = match result {
        Ok(()) => QueryOutcome::Done,
        Err(err) if err.is_aborted() => {
            tracing::error!(%err, "schema output aborted");
            QueryOutcome::Aborted
        }
        Err(err) => {
            tracing::error!(%err, "schema generation failed");
            print_line(console, &format!("Error: {}", err));
            QueryOutcome::Aborted
        }
    };
    print_line(
        console,
        match outcome {
            QueryOutcome::Done => "Done.",
            QueryOutcome::Aborted => "Aborted.",
        },
    );
    outcome
}

fn print_line<R: BufRead, W: Write>(console: &mut Console<R, W>, line: &str) {
    if let Err(err) = console.println(line) {
        tracing::debug!(%err, "console output failed");
    }
}
