//! Validation events raised while unmarshalling.
//!
//! The deserializer reports every anomaly it tolerates or rejects as a
//! [`ValidationEvent`] and asks a [`ValidationEventHandler`] whether to keep
//! going. The default policy, [`FailFast`], lets warnings through and stops
//! at the first error or fatal error.
//!
//! ```rust
//! use serde::Deserialize;
//! use xml_marshal::validation::{Severity, ValidationEvent};
//! use xml_marshal::Deserializer;
//!
//! #[derive(Deserialize)]
//! struct Task {
//!     title: String,
//! }
//!
//! let mut warnings = Vec::new();
//! let xml = "<Task><title>Sort</title><legacy>1</legacy></Task>";
//! let mut de = Deserializer::from_str(xml).with_handler(|event: &ValidationEvent| {
//!     warnings.push(event.message().to_string());
//!     event.severity() == Severity::Warning
//! });
//! let task: Task = de.deserialize_document().unwrap();
//! drop(de);
//! assert_eq!(task.title, "Sort");
//! assert_eq!(warnings.len(), 1);
//! ```

use crate::error::{Error, Position};
use crate::reader::XmlEvent;
use std::fmt::{self, Display};
use std::sync::Arc;

/// Severity of a validation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Recoverable; the document is still usable.
    Warning,
    /// The document does not match the target type.
    Error,
    /// The document is unusable.
    FatalError,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::FatalError => "FATAL_ERROR",
        })
    }
}

/// An anomaly noticed while deserializing.
#[derive(Debug, Clone)]
pub struct ValidationEvent {
    severity: Severity,
    message: String,
    position: Option<Position>,
    cause: Option<Arc<Error>>,
}

impl ValidationEvent {
    /// Creates an event without position or cause.
    pub fn new<S: Into<String>>(severity: Severity, message: S) -> Self {
        Self {
            severity,
            message: message.into(),
            position: None,
            cause: None,
        }
    }

    /// Creates a warning.
    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Creates an error.
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Creates a fatal error.
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::FatalError, message)
    }

    /// Attaches the input position the event refers to.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Attaches the underlying failure.
    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Returns the severity.
    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the input position, if known.
    #[inline]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Returns the underlying failure, if any.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }
}

impl Display for ValidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(pos) = self.position {
            write!(f, " at {}", pos)?;
        }
        Ok(())
    }
}

/// Decides whether unmarshalling continues after a validation event.
///
/// Returning `false` aborts the current parse; the deserializer then fails
/// with [`ErrorKind::Validation`](crate::ErrorKind::Validation) carrying the
/// event. Closures of type `FnMut(&ValidationEvent) -> bool` are handlers.
pub trait ValidationEventHandler {
    /// Handles one event; `true` means continue.
    fn handle_event(&mut self, event: &ValidationEvent) -> bool;
}

impl<F> ValidationEventHandler for F
where
    F: FnMut(&ValidationEvent) -> bool,
{
    fn handle_event(&mut self, event: &ValidationEvent) -> bool {
        self(event)
    }
}

/// Tolerates warnings, aborts on errors and fatal errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFast;

impl ValidationEventHandler for FailFast {
    fn handle_event(&mut self, event: &ValidationEvent) -> bool {
        match event.severity() {
            Severity::Warning => {
                tracing::warn!("{}", event);
                true
            }
            Severity::Error | Severity::FatalError => {
                tracing::debug!("aborting unmarshal: {}", event);
                false
            }
        }
    }
}

/// Records every event and never aborts.
#[derive(Debug, Clone, Default)]
pub struct ValidationEventCollector {
    events: Vec<ValidationEvent>,
}

impl ValidationEventCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events in the order they were raised.
    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }

    /// Returns `true` if any recorded event is an error or fatal error.
    pub fn has_errors(&self) -> bool {
        self.events.iter().any(|e| e.severity() >= Severity::Error)
    }

    /// Consumes the collector and returns the events.
    pub fn into_events(self) -> Vec<ValidationEvent> {
        self.events
    }
}

impl ValidationEventHandler for ValidationEventCollector {
    fn handle_event(&mut self, event: &ValidationEvent) -> bool {
        self.events.push(event.clone());
        true
    }
}

/// Checks the token stream against a schema while unmarshalling.
///
/// The deserializer calls this once for every event it consumes; any event
/// returned is passed to the active [`ValidationEventHandler`].
pub trait SchemaValidator {
    /// Inspects one token; `depth` is the number of elements open before it.
    fn validate(&mut self, event: &XmlEvent<'_>, depth: usize) -> Option<ValidationEvent>;
}

impl<S: SchemaValidator + ?Sized> SchemaValidator for Box<S> {
    fn validate(&mut self, event: &XmlEvent<'_>, depth: usize) -> Option<ValidationEvent> {
        (**self).validate(event, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_fast_tolerates_warnings_only() {
        let mut policy = FailFast;
        assert!(policy.handle_event(&ValidationEvent::warning("unexpected element <x>")));
        assert!(!policy.handle_event(&ValidationEvent::error("not a number")));
        assert!(!policy.handle_event(&ValidationEvent::fatal("no document element")));
    }

    #[test]
    fn test_fail_fast_stops_at_first_error() {
        let events = vec![
            ValidationEvent::warning("w0"),
            ValidationEvent::warning("w1"),
            ValidationEvent::error("e2"),
            ValidationEvent::warning("w3"),
        ];

        let mut policy = FailFast;
        let mut processed = 0;
        let mut aborted_at = None;
        for (i, event) in events.iter().enumerate() {
            processed += 1;
            if !policy.handle_event(event) {
                aborted_at = Some(i);
                break;
            }
        }
        assert_eq!(aborted_at, Some(2));
        assert_eq!(processed, 3);
    }

    #[test]
    fn test_closure_handler() {
        let mut seen = 0;
        {
            let mut handler = |_: &ValidationEvent| {
                seen += 1;
                seen < 2
            };
            assert!(handler.handle_event(&ValidationEvent::error("first")));
            assert!(!handler.handle_event(&ValidationEvent::error("second")));
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_collector() {
        let mut collector = ValidationEventCollector::new();
        assert!(collector.handle_event(&ValidationEvent::warning("w")));
        assert!(!collector.has_errors());
        assert!(collector.handle_event(&ValidationEvent::fatal("f")));
        assert!(collector.has_errors());
        assert_eq!(collector.events().len(), 2);
        assert_eq!(collector.into_events()[1].severity(), Severity::FatalError);
    }

    #[test]
    fn test_event_display() {
        let event = ValidationEvent::warning("unexpected element <legacy>")
            .with_position(Position { line: 1, column: 27, offset: 26 });
        assert_eq!(
            event.to_string(),
            "[WARNING] unexpected element <legacy> at line 1, column 27 (offset 26)"
        );
        assert!(event.cause().is_none());
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::FatalError);
    }
}
