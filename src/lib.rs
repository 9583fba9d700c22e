//! # bind-xml Library
//!
//! Thin helpers for binding serde types to XML documents, with optional XSD validation
//! through libxml2. Validation problems are either logged (tolerant mode, the default)
//! or returned as errors (strict mode).

pub mod config;
pub mod context;
pub mod datetime;
pub mod error;
pub mod events;
pub mod helper_base;
pub mod libxml2;
pub mod marshal;
pub mod resource;
pub mod unmarshal;

pub use config::{BindingConfig, ConfigError, ConfigManager, EnvProvider, SystemEnvProvider};
pub use context::{BindingContext, Marshaller, Unmarshaller, XmlElement, XmlRoot};
pub use datetime::{XmlDateTime, convert_to_date, convert_to_xml_date};
pub use error::{BindError, ErrorKind, LibXml2Error, Result};
pub use events::{EventLocation, Severity, ValidationEvent, ValidationEventCollector};
pub use helper_base::{DEFAULT_VALIDATION_ERROR_TOLERANCE, HelperBase, Operation};
pub use libxml2::{LibXml2Wrapper, ValidationResult, XmlSchemaPtr};
pub use marshal::MarshalHelper;
pub use resource::{ResourceResolver, SearchPathResolver, open_resource};
pub use unmarshal::UnmarshalHelper;
