//! Settings shared by the marshalling and unmarshalling helpers
//!
//! Holds the validation-error tolerance flag and the schema resource path, and keeps
//! the compiled schema in a single cache slot. The slot is filled lazily on first use
//! and cleared by [`HelperBase::set_schema_resource_path`], the only mutator that can
//! make it stale.

use std::cell::RefCell;
use std::fmt;

use crate::config::BindingConfig;
use crate::context::{BindingContext, XmlRoot};
use crate::error::{BindError, Result};
use crate::events::ValidationEventCollector;
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};
use crate::resource::{ResourceResolver, SearchPathResolver};

/// Validation failures are logged rather than raised unless configured otherwise
pub const DEFAULT_VALIDATION_ERROR_TOLERANCE: bool = true;

/// Which helper operation produced a set of validation events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Marshalling,
    Unmarshalling,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Marshalling => f.write_str("marshalling"),
            Operation::Unmarshalling => f.write_str("unmarshalling"),
        }
    }
}

pub struct HelperBase {
    validation_error_tolerant: bool,
    schema_resource_path: Option<String>,
    schema: RefCell<Option<XmlSchemaPtr>>,
    resolver: Box<dyn ResourceResolver + Send>,
}

impl fmt::Debug for HelperBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperBase")
            .field("validation_error_tolerant", &self.validation_error_tolerant)
            .field("schema_resource_path", &self.schema_resource_path)
            .field("schema_cached", &self.is_schema_cached())
            .finish()
    }
}

impl Default for HelperBase {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDATION_ERROR_TOLERANCE, None)
    }
}

impl HelperBase {
    pub fn new(validation_error_tolerant: bool, schema_resource_path: Option<String>) -> Self {
        Self::with_resolver(
            validation_error_tolerant,
            schema_resource_path,
            Box::new(SearchPathResolver::from_environment()),
        )
    }

    pub fn with_resolver(
        validation_error_tolerant: bool,
        schema_resource_path: Option<String>,
        resolver: Box<dyn ResourceResolver + Send>,
    ) -> Self {
        Self {
            validation_error_tolerant,
            schema_resource_path,
            schema: RefCell::new(None),
            resolver,
        }
    }

    pub fn from_config(config: &BindingConfig) -> Self {
        let resolver = if config.resource_roots.is_empty() {
            SearchPathResolver::from_environment()
        } else {
            SearchPathResolver::new(config.resource_roots.clone())
        };

        Self::with_resolver(
            config.tolerant,
            config.schema_resource_path.clone(),
            Box::new(resolver),
        )
    }

    /// If true, validation events are logged instead of failing the call
    pub fn is_validation_error_tolerant(&self) -> bool {
        self.validation_error_tolerant
    }

    pub fn set_validation_error_tolerant(&mut self, validation_error_tolerant: bool) {
        self.validation_error_tolerant = validation_error_tolerant;
    }

    /// Schema location, as a resource path
    pub fn schema_resource_path(&self) -> Option<&str> {
        self.schema_resource_path.as_deref()
    }

    /// Replace the schema location and drop the cached schema
    ///
    /// The new schema is compiled on the next operation that needs it.
    pub fn set_schema_resource_path(&mut self, schema_resource_path: Option<String>) {
        self.schema_resource_path = schema_resource_path;
        *self.schema.borrow_mut() = None;
    }

    pub fn is_schema_cached(&self) -> bool {
        self.schema.borrow().is_some()
    }

    pub(crate) fn resolver(&self) -> &dyn ResourceResolver {
        self.resolver.as_ref()
    }

    /// The compiled schema, loading it on first use
    pub fn load_schema(&self) -> Result<XmlSchemaPtr> {
        if let Some(schema) = self.schema.borrow().as_ref() {
            return Ok(schema.clone());
        }

        let path = match self.schema_resource_path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(BindError::invalid_argument(
                    "XML schema resource path should not be empty!",
                ));
            }
        };

        let location = self
            .resolver
            .resolve(path)
            .ok_or_else(|| BindError::SchemaLoad {
                path: path.to_string(),
                details: "resource not found".to_string(),
                source: None,
            })?;

        tracing::debug!(schema = path, location = %location.display(), "compiling XML schema");
        let schema = LibXml2Wrapper::new()
            .parse_schema_from_file(&location)
            .map_err(|e| BindError::SchemaLoad {
                path: path.to_string(),
                details: "invalid or unreadable schema document".to_string(),
                source: Some(e),
            })?;

        *self.schema.borrow_mut() = Some(schema.clone());
        Ok(schema)
    }

    /// Schema to validate the current operation with, if any
    ///
    /// Strict helpers always validate, so a missing or broken schema fails the call.
    /// Tolerant helpers validate only when a schema path is set, and carry on without
    /// validation when it cannot be loaded.
    pub(crate) fn schema_for_operation(&self) -> Result<Option<XmlSchemaPtr>> {
        if !self.validation_error_tolerant {
            return self.load_schema().map(Some);
        }

        if self.schema_resource_path.is_none() {
            return Ok(None);
        }

        match self.load_schema() {
            Ok(schema) => Ok(Some(schema)),
            Err(e) => {
                tracing::warn!(error = %e, "XML schema unavailable, skipping validation");
                Ok(None)
            }
        }
    }

    pub fn binding_context<T: XmlRoot>(&self) -> Result<BindingContext<T>> {
        BindingContext::new()
    }

    /// Log or raise the events collected during `operation`
    pub(crate) fn handle_events(
        &self,
        operation: Operation,
        events: &ValidationEventCollector,
    ) -> Result<()> {
        let message = events.combined_message();
        if message.is_empty() {
            return Ok(());
        }

        if self.validation_error_tolerant {
            tracing::warn!(
                "There are warnings/errors while {}: [[ {} ]]",
                operation,
                message
            );
            Ok(())
        } else {
            Err(BindError::Validation { details: message })
        }
    }
}
