//! # xsd-catalog
//!
//! Discovers the transitive set of XML Schema documents a document depends on
//! and records them in a [`Catalog`] keyed by namespace and location.
//!
//! The pieces, bottom-up:
//!
//! - [`reader`]: a character source with bounded mark/rewind
//! - [`tokenizer`]: a streaming XML tokenizer reporting spans, not strings
//! - [`events`]: namespace-aware element events on top of the tokenizer
//! - [`manifest`]: the schema references and namespaces of one document
//! - [`resolver`]: recursive traversal of imports and includes
//! - [`catalog`]: the result, exportable as an OASIS text catalog
//! - [`lookup`]: catalog-backed entity resolution for a validation engine
//!
//! ## Example
//!
//! ```rust,no_run
//! use xsd_catalog::{CatalogResolver, Loader, Location, ResolveOptions};
//!
//! # fn main() -> xsd_catalog::Result<()> {
//! let root = Location::parse("schemas/main.xsd")?;
//! let resolver = CatalogResolver::new(Loader::new())
//!     .with_options(ResolveOptions::new().with_local_only(true));
//! let resolution = resolver.resolve(&root)?;
//!
//! print!("{}", resolution.catalog.to_canonical_text());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Character input and markup
pub mod reader;
pub mod tokenizer;
pub mod namespaces;
pub mod events;

// Locations and loading
pub mod locations;
pub mod loaders;

// Discovery
pub mod manifest;
pub mod catalog;
pub mod resolver;
pub mod lookup;

// Re-exports for convenience
pub use catalog::{Catalog, CatalogSummary, Entity, Resource};
pub use error::{Error, ParseError, Result};
pub use events::{Attributes, ElementHandler, EventAdapter};
pub use limits::Limits;
pub use loaders::{Fetch, FetchError, Loader, MemoryLoader};
pub use locations::Location;
pub use lookup::{CatalogLookup, EntityRequest, EntityResolver, ResolvedInput};
pub use manifest::{Manifest, ManifestExtractor};
pub use namespaces::{QName, XML_NAMESPACE, XSD_1_0_NAMESPACE, XSD_1_1_NAMESPACE, XSI_NAMESPACE};
pub use reader::{CharSource, RewindReader};
pub use resolver::{CatalogResolver, Resolution, ResolveOptions};
pub use tokenizer::{TokenHandler, Tokenizer};

/// Version of the xsd-catalog library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
