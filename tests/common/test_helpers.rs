#![allow(dead_code)]

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::MakeWriter;

use bind_xml::{BindingConfig, XmlDateTime, XmlRoot};

pub const SAMPLE_NAMESPACE: &str = "http://example.com/bind-xml/sample";
pub const SAMPLE_SCHEMA: &str = "sample.xsd";
pub const TITLED_SAMPLE_SCHEMA: &str = "sample_titled.xsd";

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn sample_xml(&self) -> PathBuf {
        self.fixtures_dir.join("sample.xml")
    }

    /// Helper configuration resolving resources from the fixtures directory
    pub fn config(&self, tolerant: bool, schema: Option<&str>, namespace: Option<&str>) -> BindingConfig {
        BindingConfig {
            tolerant,
            schema_resource_path: schema.map(String::from),
            formatted_output: true,
            schema_namespace: namespace.map(String::from),
            resource_roots: vec![self.fixtures_dir.clone()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(rename = "@created", default, skip_serializing_if = "Option::is_none")]
    pub created: Option<XmlDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "item", default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl XmlRoot for Sample {
    const ROOT_ELEMENT: &'static str = "sample";
}

pub fn sample() -> Sample {
    Sample {
        id: 1001,
        created: Some("2021-06-15T08:45:00Z".parse().unwrap()),
        title: Some("Sample title".to_string()),
        items: vec!["first".to_string(), "second".to_string()],
    }
}

/// Collects formatted log output so tests can assert on it
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    /// Run `f` with a subscriber that writes into this capture
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
