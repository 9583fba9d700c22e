//! Unmarshalling helper: XML document -> typed entity

use std::fs::File;
use std::io::Read;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::BindingConfig;
use crate::context::{BindingContext, Unmarshaller, XmlElement, XmlRoot};
use crate::error::{BindError, Result};
use crate::helper_base::{DEFAULT_VALIDATION_ERROR_TOLERANCE, HelperBase, Operation};
use crate::resource::{ResourceResolver, open_resource};

/// Reads entities of type `T` from XML
///
/// Tolerance and schema settings live in the shared [`HelperBase`], reachable
/// through `Deref`.
#[derive(Debug)]
pub struct UnmarshalHelper<T> {
    base: HelperBase,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for UnmarshalHelper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for UnmarshalHelper<T> {
    type Target = HelperBase;

    fn deref(&self) -> &HelperBase {
        &self.base
    }
}

impl<T> DerefMut for UnmarshalHelper<T> {
    fn deref_mut(&mut self) -> &mut HelperBase {
        &mut self.base
    }
}

impl<T> UnmarshalHelper<T> {
    pub fn new() -> Self {
        Self::from_base(HelperBase::default())
    }

    pub fn with_tolerance(validation_error_tolerant: bool) -> Self {
        Self::from_base(HelperBase::new(validation_error_tolerant, None))
    }

    pub fn with_schema(schema_resource_path: impl Into<String>) -> Self {
        Self::from_base(HelperBase::new(
            DEFAULT_VALIDATION_ERROR_TOLERANCE,
            Some(schema_resource_path.into()),
        ))
    }

    pub fn with_tolerance_and_schema(
        validation_error_tolerant: bool,
        schema_resource_path: Option<String>,
    ) -> Self {
        Self::from_base(HelperBase::new(validation_error_tolerant, schema_resource_path))
    }

    /// Resolve resources and schemas through `resolver` instead of the search path
    pub fn with_resolver(
        validation_error_tolerant: bool,
        schema_resource_path: Option<String>,
        resolver: Box<dyn ResourceResolver + Send>,
    ) -> Self {
        Self::from_base(HelperBase::with_resolver(
            validation_error_tolerant,
            schema_resource_path,
            resolver,
        ))
    }

    pub fn from_config(config: &BindingConfig) -> Self {
        Self::from_base(HelperBase::from_config(config))
    }

    fn from_base(base: HelperBase) -> Self {
        Self {
            base,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> UnmarshalHelper<T> {
    /// Unmarshal the resource at `resource_path`
    ///
    /// A resource that cannot be found is an argument error.
    pub fn unmarshal_from_resource(&self, resource_path: &str) -> Result<T>
    where
        T: XmlRoot,
    {
        let context = self.base.binding_context::<T>()?;
        self.unmarshal_from_resource_with_context(resource_path, &context)
    }

    pub fn unmarshal_from_resource_with_context(
        &self,
        resource_path: &str,
        context: &BindingContext<T>,
    ) -> Result<T> {
        let file = open_resource(self.base.resolver(), resource_path)?;
        self.unmarshal_from_reader(file, context)
    }

    /// Unmarshal the file at `path`
    pub fn unmarshal_from_path(&self, path: impl AsRef<Path>) -> Result<T>
    where
        T: XmlRoot,
    {
        let context = self.base.binding_context::<T>()?;
        self.unmarshal_from_path_with_context(path, &context)
    }

    pub fn unmarshal_from_path_with_context(
        &self,
        path: impl AsRef<Path>,
        context: &BindingContext<T>,
    ) -> Result<T> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(BindError::invalid_argument(
                "File path for unmarshalling should not be empty!",
            ));
        }

        let file = File::open(path).map_err(|e| {
            BindError::io(
                format!("opening '{}' for unmarshalling", path.display()),
                e,
            )
        })?;
        self.unmarshal_from_reader(file, context)
    }

    /// Unmarshal from an already opened file, starting at its current position
    pub fn unmarshal_from_file(&self, file: &File) -> Result<T>
    where
        T: XmlRoot,
    {
        let context = self.base.binding_context::<T>()?;
        self.unmarshal_from_reader(file, &context)
    }

    pub fn unmarshal_from_file_with_context(
        &self,
        file: &File,
        context: &BindingContext<T>,
    ) -> Result<T> {
        self.unmarshal_from_reader(file, context)
    }

    /// Unmarshal an XML document held in a string
    pub fn unmarshal_from_str(&self, document: &str) -> Result<T>
    where
        T: XmlRoot,
    {
        let context = self.base.binding_context::<T>()?;
        self.unmarshal_from_reader(document.as_bytes(), &context)
    }

    /// Unmarshal from `reader`, unwrapping the root element
    pub fn unmarshal_from_reader<R: Read>(
        &self,
        reader: R,
        context: &BindingContext<T>,
    ) -> Result<T> {
        self.unmarshal_element_from_reader(reader, context)
            .map(XmlElement::into_value)
    }

    /// Unmarshal from `reader`, keeping the root element's name and namespace
    ///
    /// Strict helpers fail with [`BindError::Validation`] as soon as the document
    /// produced validation events; tolerant helpers log them and go on binding.
    pub fn unmarshal_element_from_reader<R: Read>(
        &self,
        reader: R,
        context: &BindingContext<T>,
    ) -> Result<XmlElement<T>> {
        let unmarshaller = self.configure(context)?;

        let document = unmarshaller.read_document(reader)?;
        let events = unmarshaller.validate(&document)?;
        self.base.handle_events(Operation::Unmarshalling, &events)?;

        unmarshaller.bind(&document)
    }

    fn configure<'c>(&self, context: &'c BindingContext<T>) -> Result<Unmarshaller<'c, T>> {
        let mut unmarshaller = context.create_unmarshaller();
        unmarshaller.set_schema(self.base.schema_for_operation()?);
        Ok(unmarshaller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MockResourceResolver;
    use serde::Deserialize;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::tempfile;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Ping {
        #[serde(rename = "@seq")]
        seq: u32,
    }

    impl XmlRoot for Ping {
        const ROOT_ELEMENT: &'static str = "ping";
    }

    #[test]
    fn test_constructor_defaults() {
        let helper = UnmarshalHelper::<Ping>::new();

        assert!(helper.is_validation_error_tolerant());
        assert_eq!(helper.schema_resource_path(), None);
    }

    #[test]
    fn test_unmarshal_from_str() {
        let helper = UnmarshalHelper::<Ping>::new();

        let ping = helper.unmarshal_from_str(r#"<ping seq="5"/>"#).unwrap();
        assert_eq!(ping, Ping { seq: 5 });
    }

    #[test]
    fn test_unmarshal_from_file_handle() {
        let mut file = tempfile().unwrap();
        file.write_all(br#"<?xml version="1.0"?><ping seq="9"></ping>"#)
            .unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let helper = UnmarshalHelper::<Ping>::new();
        assert_eq!(helper.unmarshal_from_file(&file).unwrap(), Ping { seq: 9 });
    }

    #[test]
    fn test_unmarshal_element_keeps_root_name() {
        let helper = UnmarshalHelper::<Ping>::new();
        let context = BindingContext::<Ping>::new().unwrap();

        let element = helper
            .unmarshal_element_from_reader(&br#"<ping xmlns="urn:ping" seq="1"/>"#[..], &context)
            .unwrap();

        assert_eq!(element.name, "ping");
        assert_eq!(element.namespace.as_deref(), Some("urn:ping"));
        assert_eq!(element.value, Ping { seq: 1 });
    }

    #[test]
    fn test_missing_resource_is_argument_error() {
        let mut resolver = MockResourceResolver::new();
        resolver.expect_resolve().returning(|_| None);
        let helper = UnmarshalHelper::<Ping>::with_resolver(true, None, Box::new(resolver));

        let error = helper
            .unmarshal_from_resource("sample_no_existent_in_universe_679304738235463.xml")
            .unwrap_err();

        assert!(error.is_argument_error());
        assert!(
            error
                .to_string()
                .contains("sample_no_existent_in_universe_679304738235463.xml")
        );
    }

    #[test]
    fn test_empty_resource_path_is_argument_error() {
        let mut resolver = MockResourceResolver::new();
        resolver.expect_resolve().never();
        let helper = UnmarshalHelper::<Ping>::with_resolver(true, None, Box::new(resolver));

        assert!(helper.unmarshal_from_resource("").unwrap_err().is_argument_error());
    }

    #[test]
    fn test_empty_file_path_is_argument_error() {
        let helper = UnmarshalHelper::<Ping>::new();

        assert!(helper.unmarshal_from_path("").unwrap_err().is_argument_error());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let helper = UnmarshalHelper::<Ping>::new();

        let error = helper
            .unmarshal_from_path("/nonexistent/dir/ping.xml")
            .unwrap_err();
        assert!(matches!(error, BindError::Io { .. }));
    }

    #[test]
    fn test_malformed_document_is_unmarshal_error() {
        let helper = UnmarshalHelper::<Ping>::new();

        let error = helper.unmarshal_from_str(r#"<ping seq="1"></pong>"#).unwrap_err();
        assert!(matches!(error, BindError::Unmarshal { .. }));
    }
}
