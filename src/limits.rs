//! Limits for tokenizing and catalog resolution
//!
//! These bound the rewind buffer of the character source, element nesting,
//! document size and the recursion depth of the import/include traversal.
//! A [`Limits`] value can be deserialized from a partial configuration; any
//! field left out keeps its default.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum rewind distance, in characters
pub const DEFAULT_MAX_REWIND: usize = 8192;

/// Resource bounds shared by the tokenizer, the event adapter, loaders and the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Limits {
    /// Longest span the tokenizer may rewind over, in characters
    pub max_rewind: usize,

    /// Deepest element nesting the event adapter accepts
    pub max_xml_depth: usize,

    /// Largest document a loader hands out, in bytes
    pub max_xml_size: usize,

    /// Most attributes on a single start tag
    pub max_attributes: usize,

    /// Deepest chain of imports and includes the resolver follows
    pub max_schema_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_rewind: DEFAULT_MAX_REWIND,
            max_xml_depth: 1000,
            max_xml_size: 100 * 1024 * 1024,
            max_attributes: 1000,
            max_schema_depth: 100,
        }
    }
}

fn exceeded(what: &str, value: usize, max: usize) -> Result<()> {
    if value > max {
        return Err(Error::LimitExceeded(format!(
            "{} {} exceeds maximum {}",
            what, value, max
        )));
    }
    Ok(())
}

impl Limits {
    /// Default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight bounds for untrusted input
    pub fn strict() -> Self {
        Self {
            max_rewind: 4096,
            max_xml_depth: 100,
            max_xml_size: 10 * 1024 * 1024,
            max_attributes: 100,
            max_schema_depth: 20,
        }
    }

    /// Loose bounds for large, trusted schema sets
    pub fn permissive() -> Self {
        Self {
            max_rewind: 1024 * 1024,
            max_xml_depth: 10_000,
            max_xml_size: 1024 * 1024 * 1024,
            max_attributes: 10_000,
            max_schema_depth: 1000,
        }
    }

    /// Set the rewind distance
    pub fn with_max_rewind(mut self, max_rewind: usize) -> Self {
        self.max_rewind = max_rewind;
        self
    }

    /// Set the import/include depth
    pub fn with_max_schema_depth(mut self, max_schema_depth: usize) -> Self {
        self.max_schema_depth = max_schema_depth;
        self
    }

    /// Element nesting
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        exceeded("XML depth", depth, self.max_xml_depth)
    }

    /// Document size in bytes
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        exceeded("XML size in bytes", size, self.max_xml_size)
    }

    /// Attributes on one element
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        exceeded("Attribute count", count, self.max_attributes)
    }

    /// Import/include chain length
    pub fn check_schema_depth(&self, depth: usize) -> Result<()> {
        exceeded("Schema depth", depth, self.max_schema_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_ordered() {
        let (strict, default, permissive) = (Limits::strict(), Limits::new(), Limits::permissive());
        assert_eq!(default.max_rewind, DEFAULT_MAX_REWIND);
        assert!(strict.max_rewind < default.max_rewind);
        assert!(permissive.max_rewind > default.max_rewind);
        assert!(strict.max_schema_depth < permissive.max_schema_depth);
    }

    #[test]
    fn test_checks_are_inclusive() {
        let limits = Limits::strict();
        assert!(limits.check_attributes(100).is_ok());
        assert!(limits.check_attributes(101).is_err());
        assert!(limits.check_schema_depth(20).is_ok());
        assert!(limits.check_schema_depth(21).is_err());
        assert!(limits.check_xml_depth(101).is_err());
        assert!(limits.check_xml_size(1024).is_ok());
    }

    #[test]
    fn test_limit_message() {
        let err = Limits::new().with_max_schema_depth(3).check_schema_depth(4).unwrap_err();
        assert_eq!(err.to_string(), "limit exceeded: Schema depth 4 exceeds maximum 3");
    }

    #[test]
    fn test_partial_configuration() {
        let limits: Limits = serde_json::from_str(r#"{"maxRewind": 256, "maxSchemaDepth": 5}"#).unwrap();
        assert_eq!(limits.max_rewind, 256);
        assert_eq!(limits.max_schema_depth, 5);
        assert_eq!(limits.max_xml_depth, Limits::default().max_xml_depth);
    }
}
