//! Resource loading
//!
//! The resolver never opens files or sockets itself; it asks a [`Fetch`]
//! implementation for a byte stream. Failures are classified where they
//! happen: [`FetchError::Unreachable`] means "could not get there" (network
//! down, remote access disabled) and is the only kind the resolver may
//! tolerate.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Cursor, Read};
use thiserror::Error;

use crate::limits::Limits;
use crate::locations::Location;

/// Classified fetch failure
#[derive(Error, Debug)]
pub enum FetchError {
    /// The location could not be reached (offline, connect failure, remote access disabled)
    #[error("'{location}' is unreachable: {reason}")]
    Unreachable {
        /// Location that was requested
        location: String,
        /// Why it could not be reached
        reason: String,
    },

    /// The location was reached but holds no document
    #[error("'{location}' not found")]
    NotFound {
        /// Location that was requested
        location: String,
    },

    /// The document is larger than allowed
    #[error("'{location}' is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Location that was requested
        location: String,
        /// Reported size
        size: u64,
        /// Configured limit
        limit: usize,
    },

    /// No loader for this URL scheme
    #[error("unsupported location scheme: '{location}'")]
    Unsupported {
        /// Location that was requested
        location: String,
    },

    /// Any other read failure
    #[error("failed to read '{location}': {source}")]
    Io {
        /// Location that was requested
        location: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Fetch collaborator used by the resolver
pub trait Fetch {
    /// Open the document at `location`
    fn fetch(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError> {
        (**self).fetch(location)
    }
}

impl<F: Fetch + ?Sized> Fetch for Box<F> {
    fn fetch(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError> {
        (**self).fetch(location)
    }
}

/// Filesystem and (with the `http` feature) network loader
#[derive(Debug)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
    /// Whether to allow remote resources
    allow_remote: bool,
    /// Request timeout for remote resources
    #[cfg_attr(not(feature = "http"), allow(dead_code))]
    timeout_seconds: u64,
    #[cfg(feature = "http")]
    client: once_cell::sync::OnceCell<reqwest::blocking::Client>,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            allow_remote: true,
            timeout_seconds: 30,
            #[cfg(feature = "http")]
            client: once_cell::sync::OnceCell::new(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set whether to allow remote resources
    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    /// Set the request timeout for remote resources
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    fn open_file(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError> {
        let path = location.to_file_path().ok_or_else(|| FetchError::Unsupported {
            location: location.to_string(),
        })?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound {
                location: location.to_string(),
            },
            _ => FetchError::Io {
                location: location.to_string(),
                source: e,
            },
        })?;

        let size = file
            .metadata()
            .map_err(|e| FetchError::Io {
                location: location.to_string(),
                source: e,
            })?
            .len();
        if size > self.limits.max_xml_size as u64 {
            return Err(FetchError::TooLarge {
                location: location.to_string(),
                size,
                limit: self.limits.max_xml_size,
            });
        }

        Ok(Box::new(file))
    }

    #[cfg(feature = "http")]
    fn open_remote(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError> {
        let client = self
            .client
            .get_or_try_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(std::time::Duration::from_secs(self.timeout_seconds))
                    .user_agent(format!("xsd-catalog/{}", env!("CARGO_PKG_VERSION")))
                    .build()
            })
            .map_err(|e| FetchError::Io {
                location: location.to_string(),
                source: io::Error::other(e),
            })?;

        let response = client.get(location.url().clone()).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                FetchError::Unreachable {
                    location: location.to_string(),
                    reason: e.to_string(),
                }
            } else {
                FetchError::Io {
                    location: location.to_string(),
                    source: io::Error::other(e),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                location: location.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Io {
                location: location.to_string(),
                source: io::Error::other(format!("HTTP status {}", status)),
            });
        }
        if let Some(size) = response.content_length() {
            if size > self.limits.max_xml_size as u64 {
                return Err(FetchError::TooLarge {
                    location: location.to_string(),
                    size,
                    limit: self.limits.max_xml_size,
                });
            }
        }

        Ok(Box::new(response))
    }

    #[cfg(not(feature = "http"))]
    fn open_remote(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError> {
        Err(FetchError::Unreachable {
            location: location.to_string(),
            reason: "built without HTTP support".to_string(),
        })
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for Loader {
    fn fetch(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError> {
        if location.is_remote() {
            if !self.allow_remote {
                return Err(FetchError::Unreachable {
                    location: location.to_string(),
                    reason: "remote resources are not allowed".to_string(),
                });
            }
            return self.open_remote(location);
        }
        self.open_file(location)
    }
}

/// In-memory documents keyed by absolute location
///
/// Useful for pre-fetched documents and for exercising the resolver without
/// touching the filesystem or the network.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, String>,
    unreachable: HashSet<String>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document
    pub fn insert(&mut self, location: &Location, content: impl Into<String>) -> &mut Self {
        self.documents
            .insert(location.as_str().to_string(), content.into());
        self
    }

    /// Builder form of [`MemoryLoader::insert`]
    pub fn with_document(mut self, location: &Location, content: impl Into<String>) -> Self {
        self.insert(location, content);
        self
    }

    /// Make every fetch of `location` fail as unreachable
    pub fn with_unreachable(mut self, location: &Location) -> Self {
        self.unreachable.insert(location.as_str().to_string());
        self
    }
}

impl Fetch for MemoryLoader {
    fn fetch(&self, location: &Location) -> Result<Box<dyn Read + '_>, FetchError> {
        if self.unreachable.contains(location.as_str()) {
            return Err(FetchError::Unreachable {
                location: location.to_string(),
                reason: "marked unreachable".to_string(),
            });
        }
        match self.documents.get(location.as_str()) {
            Some(content) => Ok(Box::new(Cursor::new(content.as_bytes()))),
            None => Err(FetchError::NotFound {
                location: location.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read_all(mut reader: Box<dyn Read + '_>) -> String {
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<root>test</root>").unwrap();

        let location = Location::from_path(file.path()).unwrap();
        let loader = Loader::new();
        let content = read_all(loader.fetch(&location).unwrap());

        assert!(content.contains("<root>test</root>"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let location = Location::from_path(dir.path().join("missing.xsd")).unwrap();
        let loader = Loader::new();
        let result = loader.fetch(&location);
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(11 * 1024 * 1024); // 11 MB
        write!(file, "{}", large_content).unwrap();

        let location = Location::from_path(file.path()).unwrap();
        let loader = Loader::new().with_limits(Limits::strict());
        let result = loader.fetch(&location);

        // Strict limits (10 MB max) should reject 11MB file
        assert!(matches!(result, Err(FetchError::TooLarge { .. })));
    }

    #[test]
    fn test_remote_disallowed_is_unreachable() {
        let location = Location::parse("http://example.com/schema.xsd").unwrap();
        let loader = Loader::new().with_allow_remote(false);
        let result = loader.fetch(&location);
        assert!(matches!(result, Err(FetchError::Unreachable { .. })));
    }

    #[test]
    fn test_memory_loader() {
        let doc = Location::parse("file:///virtual/a.xsd").unwrap();
        let offline = Location::parse("http://example.com/b.xsd").unwrap();
        let loader = MemoryLoader::new()
            .with_document(&doc, "<a/>")
            .with_unreachable(&offline);

        assert_eq!(read_all(loader.fetch(&doc).unwrap()), "<a/>");
        assert!(matches!(
            loader.fetch(&offline),
            Err(FetchError::Unreachable { .. })
        ));
        let missing = Location::parse("file:///virtual/c.xsd").unwrap();
        assert!(matches!(
            loader.fetch(&missing),
            Err(FetchError::NotFound { .. })
        ));
    }
}
