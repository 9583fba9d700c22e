//! Resource resolution
//!
//! Schemas and sample documents are addressed by *resource paths* such as
//! `schemas/sample.xsd`, looked up against an ordered list of root directories, the
//! way a classpath is searched. Plain filesystem paths bypass this module.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{BindError, Result};

/// Environment variable holding extra resource roots, separated like `PATH`
pub const RESOURCE_PATH_ENV: &str = "BIND_XML_RESOURCE_PATH";

/// Looks up resource paths
#[cfg_attr(test, mockall::automock)]
pub trait ResourceResolver {
    /// Return the location of `resource_path`, or `None` when no root contains it
    fn resolve(&self, resource_path: &str) -> Option<PathBuf>;
}

/// Searches an ordered list of root directories; the first hit wins
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPathResolver {
    roots: Vec<PathBuf>,
}

impl SearchPathResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Roots from `BIND_XML_RESOURCE_PATH`, followed by the current directory
    pub fn from_environment() -> Self {
        let mut roots: Vec<PathBuf> = std::env::var_os(RESOURCE_PATH_ENV)
            .map(|value| std::env::split_paths(&value).collect())
            .unwrap_or_default();
        roots.push(PathBuf::from("."));
        Self::new(roots)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Default for SearchPathResolver {
    fn default() -> Self {
        Self::from_environment()
    }
}

impl ResourceResolver for SearchPathResolver {
    fn resolve(&self, resource_path: &str) -> Option<PathBuf> {
        // Resource paths are always relative to a root, "/a.xsd" included
        let relative = Path::new(resource_path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return None;
        }

        let found = self
            .roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file());

        tracing::debug!(resource = resource_path, found = ?found, "resolved resource");
        found
    }
}

/// Open a resource for reading
///
/// A missing resource is an argument error naming it.
pub fn open_resource(resolver: &dyn ResourceResolver, resource_path: &str) -> Result<File> {
    if resource_path.is_empty() {
        return Err(BindError::invalid_argument(
            "Resource path should not be empty!",
        ));
    }

    let location = resolver.resolve(resource_path).ok_or_else(|| {
        BindError::invalid_argument(format!("Resource '{}' was not found", resource_path))
    })?;

    File::open(&location).map_err(|e| {
        BindError::io(
            format!("opening resource '{}' at '{}'", resource_path, location.display()),
            e,
        )
    })
}
