//! Binding contexts, marshallers and unmarshallers
//!
//! A [`BindingContext`] describes how one entity type maps onto an XML document: the
//! root element name and, optionally, its namespace. The object <-> XML mapping of the
//! element content is serde's job (via quick-xml); the context only adds the document
//! envelope around it.
//!
//! Contexts hand out short-lived [`Marshaller`]s and [`Unmarshaller`]s that carry the
//! per-call properties (formatting, schema-location hint, compiled schema). Neither
//! of them decides what validation events mean; they just return them.

use std::any::type_name;
use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::{NsReader, Reader};
use quick_xml::writer::Writer;
use quick_xml::{DeError, SeError};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BindError, Result};
use crate::events::ValidationEventCollector;
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};

/// Namespace of the `xsi:*` attributes
pub const XML_SCHEMA_INSTANCE_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

const INDENT_WIDTH: usize = 4;

/// Types that are bound to a root element
///
/// ```
/// use bind_xml::XmlRoot;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Sample {
///     #[serde(rename = "@id")]
///     id: i64,
/// }
///
/// impl XmlRoot for Sample {
///     const ROOT_ELEMENT: &'static str = "sample";
/// }
/// ```
pub trait XmlRoot {
    const ROOT_ELEMENT: &'static str;
    const NAMESPACE: Option<&'static str> = None;
}

/// Reusable description of how `T` is bound to an XML document
pub struct BindingContext<T> {
    root_element: String,
    namespace: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for BindingContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("type", &type_name::<T>())
            .field("root_element", &self.root_element)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl<T> Clone for BindingContext<T> {
    fn clone(&self) -> Self {
        Self {
            root_element: self.root_element.clone(),
            namespace: self.namespace.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: XmlRoot> BindingContext<T> {
    /// Derive the context from `T`'s [`XmlRoot`] declaration
    pub fn new() -> Result<Self> {
        Self::with_root(T::ROOT_ELEMENT, T::NAMESPACE.map(String::from))
    }
}

impl<T> BindingContext<T> {
    /// Build a context with an explicit root element, for types without [`XmlRoot`]
    /// or to bind a type under a different element name
    pub fn with_root(root_element: impl Into<String>, namespace: Option<String>) -> Result<Self> {
        let root_element = root_element.into();

        if !is_valid_element_name(&root_element) {
            return Err(BindError::Context {
                type_name: type_name::<T>().to_string(),
                details: format!("'{}' is not a valid root element name", root_element),
            });
        }
        if let Some(ns) = &namespace {
            if ns.trim().is_empty() {
                return Err(BindError::Context {
                    type_name: type_name::<T>().to_string(),
                    details: "namespace must not be blank".to_string(),
                });
            }
        }

        Ok(Self {
            root_element,
            namespace,
            _marker: PhantomData,
        })
    }

    pub fn root_element(&self) -> &str {
        &self.root_element
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    pub fn create_marshaller(&self) -> Marshaller<'_, T> {
        Marshaller {
            context: self,
            formatted_output: false,
            namespace: None,
            schema_location: None,
            schema: None,
        }
    }

    pub fn create_unmarshaller(&self) -> Unmarshaller<'_, T> {
        Unmarshaller {
            context: self,
            schema: None,
        }
    }
}

/// Unprefixed XML name check; prefixes are not supported on the root element
fn is_valid_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    if name
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml"))
    {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Validate a serialized document, if a schema is given
fn validate_document(
    schema: Option<&XmlSchemaPtr>,
    document: &[u8],
    document_name: &str,
) -> Result<ValidationEventCollector> {
    let mut collector = ValidationEventCollector::new();

    if let Some(schema) = schema {
        let result = LibXml2Wrapper::new().validate_memory(schema, document, document_name)?;
        collector.extend(result.into_events());
    }

    Ok(collector)
}

/// Writes one entity as an XML document
pub struct Marshaller<'a, T> {
    context: &'a BindingContext<T>,
    formatted_output: bool,
    namespace: Option<String>,
    schema_location: Option<String>,
    schema: Option<XmlSchemaPtr>,
}

impl<T> fmt::Debug for Marshaller<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marshaller")
            .field("context", self.context)
            .field("formatted_output", &self.formatted_output)
            .field("namespace", &self.namespace)
            .field("schema_location", &self.schema_location)
            .field("validating", &self.schema.is_some())
            .finish()
    }
}

impl<T: Serialize> Marshaller<'_, T> {
    pub fn set_formatted_output(&mut self, formatted_output: bool) {
        self.formatted_output = formatted_output;
    }

    /// Namespace of the root element; overrides the context's namespace
    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    /// Value of `xsi:schemaLocation`, i.e. `"<namespace> <schema location>"`
    pub fn set_schema_location(&mut self, schema_location: Option<String>) {
        self.schema_location = schema_location;
    }

    /// Validate every marshalled document against `schema`
    pub fn set_schema(&mut self, schema: Option<XmlSchemaPtr>) {
        self.schema = schema;
    }

    fn marshal_error(&self, source: SeError) -> BindError {
        BindError::Marshal {
            type_name: self.context.type_name().to_string(),
            source,
        }
    }

    /// Serialize `entity` into a complete XML document
    pub fn to_document(&self, entity: &T) -> Result<Vec<u8>> {
        let mut body = String::new();
        let mut serializer =
            quick_xml::se::Serializer::with_root(&mut body, Some(self.context.root_element()))
                .map_err(|e| self.marshal_error(e))?;
        if self.formatted_output {
            serializer.indent(' ', INDENT_WIDTH);
        }
        entity
            .serialize(serializer)
            .map_err(|e| self.marshal_error(e))?;

        self.wrap_document(&body)
    }

    /// Add the XML declaration and the namespace attributes to the serialized body
    fn wrap_document(&self, body: &str) -> Result<Vec<u8>> {
        let custom = |details: String| self.marshal_error(SeError::Custom(details));

        let namespace = self.namespace.as_deref().or(self.context.namespace());
        let mut root_attributes: Vec<(&str, &str)> = Vec::new();
        if let Some(ns) = namespace {
            root_attributes.push(("xmlns", ns));
        }
        if let Some(location) = self.schema_location.as_deref() {
            root_attributes.push(("xmlns:xsi", XML_SCHEMA_INSTANCE_NS));
            root_attributes.push(("xsi:schemaLocation", location));
        }

        let mut writer = Writer::new(Vec::with_capacity(body.len() + 256));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(|e| custom(e.to_string()))?;
        if self.formatted_output {
            writer.get_mut().push(b'\n');
        }

        let mut reader = Reader::from_str(body);
        let mut root_written = false;
        loop {
            let event = match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(Event::Start(start)) if !root_written => {
                    root_written = true;
                    Event::Start(with_attributes(start, &root_attributes))
                }
                Ok(Event::Empty(start)) if !root_written => {
                    root_written = true;
                    Event::Empty(with_attributes(start, &root_attributes))
                }
                Ok(event) => event,
                Err(e) => return Err(custom(format!("re-reading serialized document: {}", e))),
            };
            writer
                .write_event(event)
                .map_err(|e| custom(e.to_string()))?;
        }

        if self.formatted_output {
            writer.get_mut().push(b'\n');
        }
        Ok(writer.into_inner())
    }

    /// Serialize, validate and write `entity`
    ///
    /// The document is written even when validation reports events; what those
    /// events mean is up to the caller.
    pub fn marshal<W: Write>(&self, entity: &T, mut writer: W) -> Result<ValidationEventCollector> {
        let document = self.to_document(entity)?;
        let events = validate_document(
            self.schema.as_ref(),
            &document,
            self.context.root_element(),
        )?;

        let context = || format!("writing entity of type '{}'", self.context.type_name());
        writer
            .write_all(&document)
            .map_err(|e| BindError::io(context(), e))?;
        writer.flush().map_err(|e| BindError::io(context(), e))?;

        Ok(events)
    }
}

fn with_attributes<'a>(start: BytesStart<'_>, attributes: &[(&str, &str)]) -> BytesStart<'a> {
    let mut root = start.into_owned();
    for attribute in attributes {
        root.push_attribute(*attribute);
    }
    root
}

/// An unmarshalled root element together with the value bound from it
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement<T> {
    pub name: String,
    pub namespace: Option<String>,
    pub value: T,
}

impl<T> XmlElement<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Reads one entity from an XML document
pub struct Unmarshaller<'a, T> {
    context: &'a BindingContext<T>,
    schema: Option<XmlSchemaPtr>,
}

impl<T> fmt::Debug for Unmarshaller<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unmarshaller")
            .field("context", self.context)
            .field("validating", &self.schema.is_some())
            .finish()
    }
}

impl<T: DeserializeOwned> Unmarshaller<'_, T> {
    /// Validate every unmarshalled document against `schema`
    pub fn set_schema(&mut self, schema: Option<XmlSchemaPtr>) {
        self.schema = schema;
    }

    fn unmarshal_error(&self, source: DeError) -> BindError {
        BindError::Unmarshal {
            type_name: self.context.type_name().to_string(),
            source,
        }
    }

    /// Read the whole document from `reader`
    pub fn read_document<R: Read>(&self, mut reader: R) -> Result<Vec<u8>> {
        let mut document = Vec::new();
        reader.read_to_end(&mut document).map_err(|e| {
            BindError::io(
                format!("reading document for type '{}'", self.context.type_name()),
                e,
            )
        })?;
        Ok(document)
    }

    /// Validation events for `document`; empty when no schema is set
    pub fn validate(&self, document: &[u8]) -> Result<ValidationEventCollector> {
        validate_document(self.schema.as_ref(), document, self.context.root_element())
    }

    /// Bind `document` to `T`, keeping the root element's name and namespace
    pub fn bind(&self, document: &[u8]) -> Result<XmlElement<T>> {
        let (name, namespace) = self.read_root(document)?;
        if name != self.context.root_element() {
            return Err(BindError::UnexpectedRoot {
                expected: self.context.root_element().to_string(),
                found: name,
            });
        }

        let value = quick_xml::de::from_reader(document).map_err(|e| self.unmarshal_error(e))?;

        Ok(XmlElement {
            name,
            namespace,
            value,
        })
    }

    /// Read, validate and bind in one go
    pub fn unmarshal<R: Read>(&self, reader: R) -> Result<(XmlElement<T>, ValidationEventCollector)> {
        let document = self.read_document(reader)?;
        let events = self.validate(&document)?;
        let element = self.bind(&document)?;
        Ok((element, events))
    }

    fn read_root(&self, document: &[u8]) -> Result<(String, Option<String>)> {
        let custom = |details: String| self.unmarshal_error(DeError::Custom(details));

        let mut reader = NsReader::from_reader(document);
        loop {
            match reader.read_resolved_event() {
                Ok((resolved, Event::Start(start) | Event::Empty(start))) => {
                    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                    let namespace = match resolved {
                        ResolveResult::Bound(Namespace(uri)) => {
                            Some(String::from_utf8_lossy(uri).into_owned())
                        }
                        _ => None,
                    };
                    return Ok((name, namespace));
                }
                Ok((_, Event::Eof)) => {
                    return Err(custom("document has no root element".to_string()));
                }
                Ok(_) => {}
                Err(e) => return Err(custom(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(rename = "@id")]
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    }

    impl XmlRoot for Note {
        const ROOT_ELEMENT: &'static str = "note";
    }

    const NOTE_NS: &str = "http://example.com/note";

    const NOTE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="http://example.com/note"
           elementFormDefault="qualified">
    <xs:element name="note">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="body" type="xs:string" minOccurs="0"/>
            </xs:sequence>
            <xs:attribute name="id" type="xs:unsignedInt" use="required"/>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

    fn note() -> Note {
        Note {
            id: 7,
            body: Some("remember <milk> & eggs".to_string()),
        }
    }

    #[test]
    fn test_context_from_xml_root() {
        let context = BindingContext::<Note>::new().unwrap();

        assert_eq!(context.root_element(), "note");
        assert_eq!(context.namespace(), None);
        assert!(context.type_name().ends_with("Note"));
    }

    #[test]
    fn test_context_rejects_invalid_root_name() {
        for name in ["", "1note", "ns:note", "xmlNote", "no te"] {
            let error = BindingContext::<Note>::with_root(name, None).unwrap_err();
            assert!(
                matches!(error, BindError::Context { .. }),
                "{:?} should be rejected",
                name
            );
            assert!(!error.is_argument_error());
        }
    }

    #[test]
    fn test_context_accepts_multibyte_root_name() {
        for name in ["éé", "ünïcode", "数据", "x日"] {
            let context = BindingContext::<Note>::with_root(name, None).unwrap();
            assert_eq!(context.root_element(), name);
        }

        assert!(BindingContext::<Note>::with_root("XMLé", None).is_err());
    }

    #[test]
    fn test_context_rejects_blank_namespace() {
        let error = BindingContext::<Note>::with_root("note", Some("  ".to_string())).unwrap_err();
        assert!(matches!(error, BindError::Context { .. }));
    }

    #[test]
    fn test_document_has_declaration_and_root() {
        let context = BindingContext::<Note>::new().unwrap();
        let marshaller = context.create_marshaller();

        let document = String::from_utf8(marshaller.to_document(&note()).unwrap()).unwrap();

        assert!(document.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(document.contains(r#"<note id="7">"#));
        assert!(document.contains("remember &lt;milk"));
        assert!(document.contains("&amp; eggs"));
    }

    #[test]
    fn test_document_namespace_and_schema_location() {
        let context = BindingContext::<Note>::new().unwrap();
        let mut marshaller = context.create_marshaller();
        marshaller.set_namespace(Some(NOTE_NS.to_string()));
        marshaller.set_schema_location(Some(format!("{} note.xsd", NOTE_NS)));

        let document = String::from_utf8(marshaller.to_document(&note()).unwrap()).unwrap();

        assert!(document.contains(r#"xmlns="http://example.com/note""#));
        assert!(document.contains(r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#));
        assert!(document.contains(r#"xsi:schemaLocation="http://example.com/note note.xsd""#));
    }

    #[test]
    fn test_formatted_output_indents_children() {
        let context = BindingContext::<Note>::new().unwrap();
        let mut marshaller = context.create_marshaller();
        marshaller.set_formatted_output(true);

        let document = String::from_utf8(marshaller.to_document(&note()).unwrap()).unwrap();

        assert!(document.contains("\n    <body>"));
    }

    #[test]
    fn test_marshal_collects_validation_events() {
        let schema = LibXml2Wrapper::new()
            .parse_schema_from_memory(NOTE_XSD.as_bytes())
            .unwrap();
        let context = BindingContext::<Note>::new().unwrap();
        let mut marshaller = context.create_marshaller();
        marshaller.set_namespace(Some("urn:wrong".to_string()));
        marshaller.set_schema(Some(schema));

        let mut output = Vec::new();
        let events = marshaller.marshal(&note(), &mut output).unwrap();

        assert!(events.has_events());
        assert!(!output.is_empty());
    }

    #[test]
    fn test_marshal_then_unmarshal_with_schema() {
        let schema = LibXml2Wrapper::new()
            .parse_schema_from_memory(NOTE_XSD.as_bytes())
            .unwrap();
        let context = BindingContext::<Note>::new().unwrap();

        let mut marshaller = context.create_marshaller();
        marshaller.set_namespace(Some(NOTE_NS.to_string()));
        marshaller.set_schema(Some(schema.clone()));
        let mut output = Vec::new();
        let events = marshaller.marshal(&note(), &mut output).unwrap();
        assert_eq!(events.combined_message(), "");

        let mut unmarshaller = context.create_unmarshaller();
        unmarshaller.set_schema(Some(schema));
        let (element, events) = unmarshaller.unmarshal(output.as_slice()).unwrap();

        assert!(!events.has_events());
        assert_eq!(element.name, "note");
        assert_eq!(element.namespace.as_deref(), Some(NOTE_NS));
        assert_eq!(element.into_value(), note());
    }

    #[test]
    fn test_bind_rejects_unexpected_root() {
        let context = BindingContext::<Note>::new().unwrap();
        let unmarshaller = context.create_unmarshaller();

        let error = unmarshaller.bind(br#"<memo id="1"/>"#).unwrap_err();

        match error {
            BindError::UnexpectedRoot { expected, found } => {
                assert_eq!(expected, "note");
                assert_eq!(found, "memo");
            }
            other => panic!("Expected UnexpectedRoot, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_empty_document() {
        let context = BindingContext::<Note>::new().unwrap();
        let unmarshaller = context.create_unmarshaller();

        let error = unmarshaller.bind(b"").unwrap_err();
        assert!(matches!(error, BindError::Unmarshal { .. }));
    }

    #[test]
    fn test_bind_type_mismatch_is_unmarshal_error() {
        let context = BindingContext::<Note>::new().unwrap();
        let unmarshaller = context.create_unmarshaller();

        let error = unmarshaller.bind(br#"<note id="seven"/>"#).unwrap_err();
        assert!(matches!(error, BindError::Unmarshal { .. }));
    }

    #[test]
    fn test_explicit_context_for_other_root() {
        let context = BindingContext::<Note>::with_root("memo", None).unwrap();
        let unmarshaller = context.create_unmarshaller();

        let element = unmarshaller.bind(br#"<memo id="3"><body>hi</body></memo>"#).unwrap();
        assert_eq!(element.name, "memo");
        assert_eq!(element.value().id, 3);
    }
}
