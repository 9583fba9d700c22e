//! LibXML2 FFI Wrapper Module
//!
//! This module provides a safe wrapper around the handful of libxml2 calls needed for
//! XML Schema validation: compiling a schema (from a file or from memory) and
//! validating an in-memory document against it.
//!
//! The Rust ecosystem has no mature XSD validator, so schema validation is delegated
//! to the system libxml2. Object binding itself happens elsewhere (serde + quick-xml);
//! this module only ever sees serialized bytes.
//!
//! Errors reported by libxml2 are captured through structured error callbacks and
//! surfaced as [`ValidationEvent`]s, carrying severity, message and line/column.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_void};

use crate::error::{LibXml2Error, LibXml2Result};
use crate::events::{Severity, ValidationEvent};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they run exactly once.
static LIBXML2_INIT: Once = Once::new();

/// Parser options used when reading documents for validation
const XML_PARSE_NOERROR: c_int = 1 << 5;
const XML_PARSE_NOWARNING: c_int = 1 << 6;
const XML_PARSE_NONET: c_int = 1 << 11;
const DOCUMENT_PARSE_OPTIONS: c_int = XML_PARSE_NOERROR | XML_PARSE_NOWARNING | XML_PARSE_NONET;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    /// Column number, when libxml2 knows it
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Schema parsing functions
    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation functions
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;

    // Document functions
    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);

    // Error functions
    pub fn xmlGetLastError() -> *const xmlError;
    pub fn xmlResetLastError();
}

/// Convert a libxml2 error record into a validation event
///
/// # Safety
///
/// `error` must be null or point to a valid `xmlError` for the duration of the call.
unsafe fn event_from_error(error: *const xmlError) -> Option<ValidationEvent> {
    if error.is_null() {
        return None;
    }

    let error = unsafe { &*error };
    let message = if error.message.is_null() {
        String::from("unknown libxml2 error")
    } else {
        let c_str = unsafe { CStr::from_ptr(error.message) };
        c_str.to_string_lossy().trim().to_string()
    };
    let severity = Severity::from_libxml2_level(error.level).unwrap_or(Severity::Error);

    Some(ValidationEvent::new(severity, message, error.line, error.int2))
}

/// Callback for libxml2 to report schema and validation errors (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    let events = unsafe { &mut *(user_data as *mut Vec<ValidationEvent>) };

    if let Some(event) = unsafe { event_from_error(error) } {
        events.push(event);
    }
}

fn describe_events(events: &[ValidationEvent]) -> String {
    if events.is_empty() {
        return String::from("no details reported");
    }
    events
        .iter()
        .map(|event| event.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Shareable, reference-counted handle to a compiled libxml2 schema
///
/// The schema is freed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: libxml2 documentation states that xmlSchema structures are thread-safe for reading
// See: http://xmlsoft.org/threads.html
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// Create a new XmlSchemaPtr from a raw pointer
    ///
    /// # Safety
    ///
    /// The pointer must come from `xmlSchemaParse` and must not be freed elsewhere.
    unsafe fn from_raw(ptr: *mut XmlSchema, details: String) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed { details });
        }

        Ok(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }

    /// True when both handles refer to the same compiled schema
    pub fn same_schema(&self, other: &XmlSchemaPtr) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Validation succeeded (return code 0); warnings may still have been reported
    Valid { warnings: Vec<ValidationEvent> },
    /// Validation failed with errors (return code > 0) or the document was not well-formed
    Invalid {
        error_count: i32,
        events: Vec<ValidationEvent>,
    },
    /// Internal error occurred (return code < 0)
    InternalError { code: i32 },
}

impl ValidationResult {
    /// Create ValidationResult from libxml2 return code and captured events
    pub fn from_code(code: c_int, events: Vec<ValidationEvent>) -> Self {
        match code {
            0 => ValidationResult::Valid { warnings: events },
            n if n > 0 => ValidationResult::Invalid {
                error_count: n,
                events,
            },
            n => ValidationResult::InternalError { code: n },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationResult::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationResult::InternalError { .. })
    }

    /// All events reported during validation, warnings included
    pub fn into_events(self) -> Vec<ValidationEvent> {
        match self {
            ValidationResult::Valid { warnings } => warnings,
            ValidationResult::Invalid { events, .. } => events,
            ValidationResult::InternalError { .. } => Vec::new(),
        }
    }
}

/// Safe access to libxml2 schema compilation and validation
#[derive(Debug)]
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Create a new LibXML2 wrapper instance
    ///
    /// Initializes the libxml2 parser on first use; later calls are free.
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile an XML schema stored in a file
    ///
    /// `xs:include` and `xs:import` locations are resolved relative to `schema_path`.
    pub fn parse_schema_from_file(&self, schema_path: &Path) -> LibXml2Result<XmlSchemaPtr> {
        let path_str = schema_path
            .to_str()
            .ok_or_else(|| LibXml2Error::InvalidInput {
                details: format!("schema path is not valid UTF-8: {}", schema_path.display()),
            })?;
        let c_path = CString::new(path_str).map_err(|_| LibXml2Error::InvalidInput {
            details: format!("schema path contains a NUL byte: {}", path_str),
        })?;

        unsafe {
            let parser_ctxt = xmlSchemaNewParserCtxt(c_path.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            Self::parse_with_context(parser_ctxt)
        }
    }

    /// Compile an XML schema from a memory buffer
    pub fn parse_schema_from_memory(&self, schema_data: &[u8]) -> LibXml2Result<XmlSchemaPtr> {
        let size = c_int::try_from(schema_data.len()).map_err(|_| LibXml2Error::InvalidInput {
            details: format!("schema of {} bytes is too large", schema_data.len()),
        })?;

        unsafe {
            let parser_ctxt = xmlSchemaNewMemParserCtxt(schema_data.as_ptr() as *const c_char, size);
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            Self::parse_with_context(parser_ctxt)
        }
    }

    /// Run the schema parser and free its context
    ///
    /// # Safety
    ///
    /// `parser_ctxt` must be a valid, non-null parser context; it is freed here.
    unsafe fn parse_with_context(
        parser_ctxt: *mut XmlSchemaParserCtxt,
    ) -> LibXml2Result<XmlSchemaPtr> {
        let mut events: Vec<ValidationEvent> = Vec::new();
        let events_ptr = &mut events as *mut Vec<ValidationEvent> as *mut c_void;

        unsafe {
            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                events_ptr,
            );

            let schema_ptr = xmlSchemaParse(parser_ctxt);

            // Always free the parser context
            xmlSchemaFreeParserCtxt(parser_ctxt);

            XmlSchemaPtr::from_raw(schema_ptr, describe_events(&events))
        }
    }

    /// Validate an in-memory XML document against a schema
    ///
    /// A document that is not well-formed yields `Invalid` with a single fatal event.
    /// `document_name` only shows up in libxml2 diagnostics.
    pub fn validate_memory(
        &self,
        schema: &XmlSchemaPtr,
        xml_content: &[u8],
        document_name: &str,
    ) -> LibXml2Result<ValidationResult> {
        let size = c_int::try_from(xml_content.len()).map_err(|_| LibXml2Error::InvalidInput {
            details: format!("document of {} bytes is too large", xml_content.len()),
        })?;
        let c_name = CString::new(document_name).map_err(|_| LibXml2Error::InvalidInput {
            details: format!("document name contains a NUL byte: {}", document_name),
        })?;

        unsafe {
            xmlResetLastError();
            let doc = xmlReadMemory(
                xml_content.as_ptr() as *const c_char,
                size,
                c_name.as_ptr(),
                std::ptr::null(),
                DOCUMENT_PARSE_OPTIONS,
            );

            if doc.is_null() {
                let event = event_from_error(xmlGetLastError()).unwrap_or_else(|| {
                    ValidationEvent::new(
                        Severity::FatalError,
                        "Document is not well-formed",
                        0,
                        0,
                    )
                });
                return Ok(ValidationResult::Invalid {
                    error_count: 1,
                    events: vec![event],
                });
            }

            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                xmlFreeDoc(doc);
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut events: Vec<ValidationEvent> = Vec::new();
            let events_ptr = &mut events as *mut Vec<ValidationEvent> as *mut c_void;
            xmlSchemaSetValidStructuredErrors(valid_ctxt, Some(structured_error_callback), events_ptr);

            let result_code = xmlSchemaValidateDoc(valid_ctxt, doc);

            xmlSchemaFreeValidCtxt(valid_ctxt);
            xmlFreeDoc(doc);

            match ValidationResult::from_code(result_code, events) {
                ValidationResult::InternalError { code } => Err(LibXml2Error::ValidationFailed {
                    code,
                    document: document_name.to_string(),
                }),
                result => Ok(result),
            }
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
