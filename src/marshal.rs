//! Marshalling helper: typed entity -> XML document
//!
//! ```no_run
//! use bind_xml::{MarshalHelper, XmlRoot};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Sample {
//!     #[serde(rename = "@id")]
//!     id: i64,
//!     title: String,
//! }
//!
//! impl XmlRoot for Sample {
//!     const ROOT_ELEMENT: &'static str = "sample";
//! }
//!
//! # fn main() -> bind_xml::Result<()> {
//! let helper = MarshalHelper::with_options(
//!     false,
//!     Some("sample.xsd".to_string()),
//!     true,
//!     Some("http://example.com/sample".to_string()),
//! );
//! helper.marshal_to_path("/tmp/sample.out.xml", &Sample { id: 1001, title: "Sample".into() })?;
//! # Ok(())
//! # }
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use serde::Serialize;

use crate::config::BindingConfig;
use crate::context::{BindingContext, Marshaller, XmlRoot};
use crate::error::{BindError, Result};
use crate::helper_base::{DEFAULT_VALIDATION_ERROR_TOLERANCE, HelperBase, Operation};
use crate::resource::ResourceResolver;

/// Writes entities of type `T` as XML
///
/// Tolerance and schema settings live in the shared [`HelperBase`], reachable
/// through `Deref`.
#[derive(Debug)]
pub struct MarshalHelper<T> {
    base: HelperBase,
    schema_namespace: Option<String>,
    formatted_output: bool,
    _marker: PhantomData<fn(&T)>,
}

impl<T> Default for MarshalHelper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for MarshalHelper<T> {
    type Target = HelperBase;

    fn deref(&self) -> &HelperBase {
        &self.base
    }
}

impl<T> DerefMut for MarshalHelper<T> {
    fn deref_mut(&mut self) -> &mut HelperBase {
        &mut self.base
    }
}

impl<T> MarshalHelper<T> {
    pub fn new() -> Self {
        Self::from_base(HelperBase::default(), None, false)
    }

    pub fn with_tolerance(validation_error_tolerant: bool) -> Self {
        Self::from_base(HelperBase::new(validation_error_tolerant, None), None, false)
    }

    pub fn with_schema(schema_resource_path: impl Into<String>) -> Self {
        Self::from_base(
            HelperBase::new(
                DEFAULT_VALIDATION_ERROR_TOLERANCE,
                Some(schema_resource_path.into()),
            ),
            None,
            false,
        )
    }

    pub fn with_tolerance_and_schema(
        validation_error_tolerant: bool,
        schema_resource_path: Option<String>,
    ) -> Self {
        Self::from_base(
            HelperBase::new(validation_error_tolerant, schema_resource_path),
            None,
            false,
        )
    }

    pub fn with_namespace_and_formatting(
        schema_namespace: Option<String>,
        formatted_output: bool,
    ) -> Self {
        Self::from_base(HelperBase::default(), schema_namespace, formatted_output)
    }

    pub fn with_options(
        validation_error_tolerant: bool,
        schema_resource_path: Option<String>,
        formatted_output: bool,
        schema_namespace: Option<String>,
    ) -> Self {
        Self::from_base(
            HelperBase::new(validation_error_tolerant, schema_resource_path),
            schema_namespace,
            formatted_output,
        )
    }

    /// Like [`MarshalHelper::with_options`], resolving schemas through `resolver`
    pub fn with_resolver(
        validation_error_tolerant: bool,
        schema_resource_path: Option<String>,
        formatted_output: bool,
        schema_namespace: Option<String>,
        resolver: Box<dyn ResourceResolver + Send>,
    ) -> Self {
        Self::from_base(
            HelperBase::with_resolver(validation_error_tolerant, schema_resource_path, resolver),
            schema_namespace,
            formatted_output,
        )
    }

    pub fn from_config(config: &BindingConfig) -> Self {
        Self::from_base(
            HelperBase::from_config(config),
            config.schema_namespace.clone(),
            config.formatted_output,
        )
    }

    fn from_base(base: HelperBase, schema_namespace: Option<String>, formatted_output: bool) -> Self {
        Self {
            base,
            schema_namespace,
            formatted_output,
            _marker: PhantomData,
        }
    }

    pub fn schema_namespace(&self) -> Option<&str> {
        self.schema_namespace.as_deref()
    }

    pub fn set_schema_namespace(&mut self, schema_namespace: Option<String>) {
        self.schema_namespace = schema_namespace;
    }

    pub fn is_formatted_output(&self) -> bool {
        self.formatted_output
    }

    pub fn set_formatted_output(&mut self, formatted_output: bool) {
        self.formatted_output = formatted_output;
    }
}

impl<T: Serialize> MarshalHelper<T> {
    /// Marshal `entity` into the file at `path`, creating or truncating it
    pub fn marshal_to_path(&self, path: impl AsRef<Path>, entity: &T) -> Result<()>
    where
        T: XmlRoot,
    {
        let path = checked_output_path(path.as_ref())?;
        let context = self.base.binding_context::<T>()?;
        self.write_to_path(path, &context, entity)
    }

    pub fn marshal_to_path_with_context(
        &self,
        path: impl AsRef<Path>,
        context: &BindingContext<T>,
        entity: &T,
    ) -> Result<()> {
        let path = checked_output_path(path.as_ref())?;
        self.write_to_path(path, context, entity)
    }

    /// Marshal `entity` into an already opened file
    pub fn marshal_to_file(&self, file: &mut File, entity: &T) -> Result<()>
    where
        T: XmlRoot,
    {
        let context = self.base.binding_context::<T>()?;
        self.marshal_to_writer(file, &context, entity)
    }

    pub fn marshal_to_file_with_context(
        &self,
        file: &mut File,
        context: &BindingContext<T>,
        entity: &T,
    ) -> Result<()> {
        self.marshal_to_writer(file, context, entity)
    }

    /// Marshal `entity` into `writer`
    ///
    /// Validation events are inspected after the document has been written: tolerant
    /// helpers log them, strict helpers fail with [`BindError::Validation`].
    pub fn marshal_to_writer<W: Write>(
        &self,
        writer: W,
        context: &BindingContext<T>,
        entity: &T,
    ) -> Result<()> {
        let marshaller = self.configure(context)?;
        let events = marshaller.marshal(entity, writer)?;
        self.base.handle_events(Operation::Marshalling, &events)
    }

    /// Marshal `entity` into a string
    pub fn marshal_to_string(&self, entity: &T) -> Result<String>
    where
        T: XmlRoot,
    {
        let context = self.base.binding_context::<T>()?;
        let mut output = Vec::new();
        self.marshal_to_writer(&mut output, &context, entity)?;
        String::from_utf8(output).map_err(|e| {
            BindError::io(
                "decoding marshalled document",
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    fn write_to_path(&self, path: &Path, context: &BindingContext<T>, entity: &T) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                BindError::io(
                    format!(
                        "opening '{}' to marshal entity of type '{}'",
                        path.display(),
                        context.type_name()
                    ),
                    e,
                )
            })?;
        self.marshal_to_writer(file, context, entity)
    }

    fn configure<'c>(&self, context: &'c BindingContext<T>) -> Result<Marshaller<'c, T>> {
        let mut marshaller = context.create_marshaller();

        marshaller.set_schema(self.base.schema_for_operation()?);
        marshaller.set_formatted_output(self.formatted_output);
        if let Some(namespace) = &self.schema_namespace {
            marshaller.set_namespace(Some(namespace.clone()));
            if let Some(schema_path) = self.base.schema_resource_path() {
                marshaller.set_schema_location(Some(format!("{} {}", namespace, schema_path)));
            }
        }

        Ok(marshaller)
    }
}

fn checked_output_path(path: &Path) -> Result<&Path> {
    if path.as_os_str().is_empty() {
        return Err(BindError::invalid_argument(
            "File path for marshalling should not be empty!",
        ));
    }
    if path.file_name().is_none() {
        return Err(BindError::invalid_argument(format!(
            "File path for marshalling has no file name: '{}'",
            path.display()
        )));
    }
    Ok(path)
}
