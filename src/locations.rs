//! Resource location resolution
//!
//! Every document the resolver touches is identified by an absolute URL.
//! Plain filesystem paths are turned into `file:` URLs so that relative
//! `schemaLocation` references can be joined the same way for local and
//! remote documents.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

use crate::error::{Error, Result};

/// Absolute resource location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(Url);

impl Location {
    /// Parse a URL or a filesystem path (relative paths are taken from the working directory)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(url) = Url::parse(s) {
            // A single-letter scheme is a Windows drive, not a URL
            if url.scheme().len() > 1 {
                return Ok(Location(url));
            }
        }
        Self::from_path(s)
    }

    /// Create a location from a filesystem path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Url::from_file_path(&absolute)
            .map(Location)
            .map_err(|_| Error::Resource(format!("Not a usable file path: '{}'", path.display())))
    }

    /// Resolve a (possibly relative) reference against this location
    pub fn resolve(&self, reference: &str) -> Result<Self> {
        Ok(Location(self.0.join(reference.trim())?))
    }

    /// Get the location as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the underlying URL
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Check if this is a network location (http, https, ftp)
    pub fn is_remote(&self) -> bool {
        matches!(self.0.scheme(), "http" | "https" | "ftp")
    }

    /// Check if this location can be read without network access
    pub fn is_local(&self) -> bool {
        !self.is_remote()
    }

    /// Filesystem path for `file:` locations
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.0.scheme() == "file" {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_remote_url() {
        let loc = Location::parse("http://example.com/schema.xsd").unwrap();
        assert!(loc.is_remote());
        assert!(!loc.is_local());
        assert_eq!(loc.as_str(), "http://example.com/schema.xsd");
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::parse("/tmp/schema.xsd").unwrap();
        assert!(loc.is_local());
        assert_eq!(loc.as_str(), "file:///tmp/schema.xsd");
        assert_eq!(loc.to_file_path(), Some(PathBuf::from("/tmp/schema.xsd")));
    }

    #[test]
    fn test_relative_reference() {
        let base = Location::parse("http://example.com/a/root.xsd").unwrap();
        let other = base.resolve("../b/other.xsd").unwrap();
        assert_eq!(other.as_str(), "http://example.com/b/other.xsd");

        let absolute = base.resolve(" file:///x/y.xsd ").unwrap();
        assert_eq!(absolute.as_str(), "file:///x/y.xsd");
    }

    #[test]
    fn test_relative_path_uses_working_directory() {
        let loc = Location::parse("some/dir/doc.xml").unwrap();
        assert!(loc.as_str().starts_with("file:///"));
        assert!(loc.as_str().ends_with("some/dir/doc.xml"));
    }
}
