//! Validation event collection
//!
//! Every marshal or unmarshal call gets a fresh [`ValidationEventCollector`]. The
//! schema validator pushes warnings and errors into it, and once the call has
//! finished the collector flattens them into one human-readable message.

use std::fmt;

/// Severity of a validation event, as reported by the schema validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    FatalError,
}

impl Severity {
    /// Map a libxml2 error level (`XML_ERR_WARNING` = 1, `XML_ERR_ERROR` = 2,
    /// `XML_ERR_FATAL` = 3) to a severity
    pub fn from_libxml2_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(Severity::Warning),
            2 => Some(Severity::Error),
            3 => Some(Severity::FatalError),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::FatalError => "FATAL_ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position in the validated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventLocation {
    pub line: i32,
    pub column: i32,
}

/// A single warning or error reported while validating a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEvent {
    pub severity: Severity,
    pub message: String,
    pub location: EventLocation,
}

impl ValidationEvent {
    pub fn new(severity: Severity, message: impl Into<String>, line: i32, column: i32) -> Self {
        Self {
            severity,
            message: message.into(),
            location: EventLocation { line, column },
        }
    }
}

impl fmt::Display for ValidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " ** Message: [{}] {}. Column is '{}' at line number '{}'.",
            self.severity, self.message, self.location.column, self.location.line
        )
    }
}

/// Accumulates validation events produced during one operation
#[derive(Debug, Default)]
pub struct ValidationEventCollector {
    events: Vec<ValidationEvent>,
}

impl ValidationEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: ValidationEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn reset(&mut self) {
        self.events.clear();
    }

    /// Assemble all collected events into one message
    ///
    /// Returns an empty string when nothing was collected.
    pub fn combined_message(&self) -> String {
        if self.events.is_empty() {
            return String::new();
        }

        let lines: Vec<String> = self.events.iter().map(ToString::to_string).collect();
        format!("Messages: \n{}\n ==========", lines.join("\n"))
    }
}

impl Extend<ValidationEvent> for ValidationEventCollector {
    fn extend<I: IntoIterator<Item = ValidationEvent>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}
