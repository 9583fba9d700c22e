use thiserror::Error;

/// Broad classification of a [`BindError`]
///
/// Argument errors are raised synchronously, before any I/O, for empty or otherwise
/// unusable call parameters. Everything that originates from the binding stack,
/// the schema validator or the filesystem is a binding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Binding,
}

/// Main error type for marshalling, unmarshalling and schema handling
#[derive(Error, Debug)]
pub enum BindError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Error occurred while getting binding context for type '{type_name}': {details}")]
    Context { type_name: String, details: String },

    #[error("Error while loading XML schema '{path}': {details}")]
    SchemaLoad {
        path: String,
        details: String,
        #[source]
        source: Option<LibXml2Error>,
    },

    #[error("IO error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error occurred while marshalling entity of type '{type_name}': {source}")]
    Marshal {
        type_name: String,
        #[source]
        source: quick_xml::SeError,
    },

    #[error("Error occurred while unmarshalling entity of type '{type_name}': {source}")]
    Unmarshal {
        type_name: String,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("Unexpected root element '{found}', expected '{expected}'")]
    UnexpectedRoot { expected: String, found: String },

    #[error("XML validation failed: {details}")]
    Validation { details: String },

    #[error("Error occurred while converting date '{value}': {details}")]
    DateConversion { value: String, details: String },

    #[error("LibXML2 internal error: {0}")]
    LibXml2(#[from] LibXml2Error),
}

impl BindError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        BindError::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BindError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BindError::InvalidArgument { .. } => ErrorKind::Argument,
            _ => ErrorKind::Binding,
        }
    }

    pub fn is_argument_error(&self) -> bool {
        self.kind() == ErrorKind::Argument
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: {details}")]
    SchemaParseFailed { details: String },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Validation of document '{document}' failed with internal code {code}")]
    ValidationFailed { code: i32, document: String },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Invalid input for libxml2: {details}")]
    InvalidInput { details: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BindError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let argument = BindError::invalid_argument("File path should not be empty");
        assert_eq!(argument.kind(), ErrorKind::Argument);
        assert!(argument.is_argument_error());

        let validation = BindError::Validation {
            details: "Messages: ...".to_string(),
        };
        assert_eq!(validation.kind(), ErrorKind::Binding);
        assert!(!validation.is_argument_error());

        let schema = BindError::SchemaLoad {
            path: "missing.xsd".to_string(),
            details: "resource not found".to_string(),
            source: None,
        };
        assert_eq!(schema.kind(), ErrorKind::Binding);
    }

    #[test]
    fn test_schema_load_display_names_path() {
        let error = BindError::SchemaLoad {
            path: "schemas/sample.xsd".to_string(),
            details: "resource not found".to_string(),
            source: None,
        };

        let display = error.to_string();
        assert!(display.contains("schemas/sample.xsd"));
        assert!(display.contains("resource not found"));
    }

    #[test]
    fn test_io_error_preserves_source() {
        use std::error::Error;

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error = BindError::io("opening '/tmp/out.xml'", io_error);

        assert!(error.to_string().contains("/tmp/out.xml"));
        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "File not found");
    }

    #[test]
    fn test_validation_failure_names_document() {
        let error = LibXml2Error::ValidationFailed {
            code: -1,
            document: "sample".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Validation of document 'sample' failed with internal code -1"
        );
    }

    #[test]
    fn test_libxml2_error_conversion() {
        let libxml2_error = LibXml2Error::MemoryAllocation;
        let error: BindError = libxml2_error.into();

        match error {
            BindError::LibXml2(LibXml2Error::MemoryAllocation) => (),
            other => panic!("Expected BindError::LibXml2, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_load_source_chain() {
        use std::error::Error;

        let error = BindError::SchemaLoad {
            path: "broken.xsd".to_string(),
            details: "invalid schema document".to_string(),
            source: Some(LibXml2Error::SchemaParseFailed {
                details: "Start tag expected".to_string(),
            }),
        };

        let source = error.source().unwrap();
        assert!(source.to_string().contains("Start tag expected"));
    }

    #[test]
    fn test_debug_formatting() {
        let error = BindError::UnexpectedRoot {
            expected: "sample".to_string(),
            found: "other".to_string(),
        };

        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("UnexpectedRoot"));
        assert!(debug_str.contains("sample"));
    }
}
