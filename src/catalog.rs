//! Catalog of resolved entities
//!
//! A [`Catalog`] maps a URI (a namespace, or the absolute URL of an included
//! document) to the [`Entity`] it was resolved to. The first registration of
//! a URI wins and is never overwritten. An entity may carry a nested catalog
//! holding the documents its own root pulled in.
//!
//! The catalog can be exported in the OASIS textual catalog format, and
//! seeded from an OASIS XML catalog file:
//!
//! ```xml
//! <catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
//!   <system systemId="urn:oasis:names:tc:dita:xsd:topic.xsd:1.3"
//!           uri="xsd/topic.xsd"/>
//!   <nextCatalog catalog="base/catalog.xml"/>
//! </catalog>
//! ```

use indexmap::map::Entry;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{Attributes, ElementHandler, EventAdapter};
use crate::loaders::{Fetch, Loader};
use crate::locations::Location;
use crate::namespaces::{QName, XML_NAMESPACE};
use crate::reader::RewindReader;

/// A resolved document and, optionally, its fetched bytes
#[derive(Debug, Clone)]
pub struct Resource {
    /// Where the document was found
    pub location: Location,
    /// Cached content, if the resolver was asked to keep it
    pub input: Option<Arc<[u8]>>,
}

/// Catalog value
#[derive(Debug, Clone)]
pub enum Entity {
    /// A single resolved document
    Resource(Resource),
    /// A namespace root document together with the documents it includes
    Nested {
        /// The root document of the namespace
        root: Resource,
        /// Its own sub-references
        catalog: Catalog,
    },
}

impl Entity {
    /// Entity for a location without cached content
    pub fn resource(location: Location) -> Self {
        Entity::Resource(Resource {
            location,
            input: None,
        })
    }

    /// Attach cached content
    pub fn with_input(mut self, input: Option<Arc<[u8]>>) -> Self {
        match &mut self {
            Entity::Resource(r) | Entity::Nested { root: r, .. } => r.input = input,
        }
        self
    }

    /// Turn into a nested entity holding `catalog`
    pub fn nest(self, catalog: Catalog) -> Self {
        match self {
            Entity::Resource(root) | Entity::Nested { root, .. } => Entity::Nested { root, catalog },
        }
    }

    /// Resolved location
    pub fn location(&self) -> &Location {
        match self {
            Entity::Resource(r) | Entity::Nested { root: r, .. } => &r.location,
        }
    }

    /// Cached content
    pub fn input(&self) -> Option<&Arc<[u8]>> {
        match self {
            Entity::Resource(r) | Entity::Nested { root: r, .. } => r.input.as_ref(),
        }
    }

    /// Nested catalog, if any
    pub fn as_catalog(&self) -> Option<&Catalog> {
        match self {
            Entity::Nested { catalog, .. } => Some(catalog),
            Entity::Resource(_) => None,
        }
    }
}

/// Registry of resolved entities keyed by URI
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: IndexMap<String, Entity>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entity` under `uri` unless the URI is already known
    ///
    /// Returns `true` if a prior mapping existed; the prior mapping is kept.
    pub fn put(&mut self, uri: impl Into<String>, entity: Entity) -> bool {
        match self.entries.entry(uri.into()) {
            Entry::Occupied(existing) => {
                debug!(
                    "Keeping first registration of '{}' ({})",
                    existing.key(),
                    existing.get().location()
                );
                true
            }
            Entry::Vacant(slot) => {
                debug!("Registering '{}' -> {}", slot.key(), entity.location());
                slot.insert(entity);
                false
            }
        }
    }

    /// Look up `uri` here, then in nested catalogs
    pub fn get(&self, uri: &str) -> Option<&Entity> {
        self.entries.get(uri).or_else(|| {
            self.entries
                .values()
                .filter_map(Entity::as_catalog)
                .find_map(|nested| nested.get(uri))
        })
    }

    /// Check whether `uri` is registered here or in a nested catalog
    pub fn contains(&self, uri: &str) -> bool {
        self.get(uri).is_some()
    }

    /// Check if this catalog is empty (has no mappings)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level mappings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Top-level mappings in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every distinct URI with its location, nested catalogs flattened
    pub fn flatten(&self) -> IndexMap<&str, &Location> {
        let mut flat = IndexMap::new();
        self.collect_flat(&mut flat);
        flat
    }

    fn collect_flat<'a>(&'a self, flat: &mut IndexMap<&'a str, &'a Location>) {
        for (uri, entity) in &self.entries {
            flat.entry(uri.as_str()).or_insert_with(|| entity.location());
            if let Some(nested) = entity.as_catalog() {
                nested.collect_flat(flat);
            }
        }
    }

    /// Merge another catalog into this one; existing URIs keep their entity
    pub fn merge(&mut self, other: Catalog) {
        for (uri, entity) in other.entries {
            self.put(uri, entity);
        }
    }

    /// Render in the OASIS textual catalog format
    ///
    /// Each distinct URI gets one `PUBLIC`/`SYSTEM`/`REWRITE_SYSTEM` group.
    pub fn to_canonical_text(&self) -> String {
        let mut out = String::new();
        let mut emitted = HashSet::new();
        self.write_canonical(&mut out, &mut emitted);
        out
    }

    fn write_canonical<'a>(&'a self, out: &mut String, emitted: &mut HashSet<&'a str>) {
        for (uri, entity) in &self.entries {
            if emitted.insert(uri.as_str()) {
                let location = entity.location();
                // Writing to a String cannot fail
                let _ = writeln!(out, "PUBLIC \"{}\" \"{}\"", uri, location);
                let _ = writeln!(out, "SYSTEM \"{}\" \"{}\"", uri, location);
                let _ = writeln!(out, "REWRITE_SYSTEM \"{}\" \"{}\"", uri, location);
            }
            if let Some(nested) = entity.as_catalog() {
                nested.write_canonical(out, emitted);
            }
        }
    }

    /// Load an OASIS XML catalog file
    ///
    /// This will recursively load any catalogs referenced via `<nextCatalog>`.
    pub fn from_xml_catalog(path: impl AsRef<Path>) -> Result<Self> {
        let location = Location::from_path(path)?;
        Self::load_xml_catalog(&location, &Loader::new())
    }

    /// Load an OASIS XML catalog through a fetcher
    pub fn load_xml_catalog<F: Fetch + ?Sized>(location: &Location, fetcher: &F) -> Result<Self> {
        let mut catalog = Self::new();
        let mut visited = HashSet::new();
        catalog.parse_xml_catalog(location, fetcher, &mut visited)?;
        Ok(catalog)
    }

    fn parse_xml_catalog<F: Fetch + ?Sized>(
        &mut self,
        location: &Location,
        fetcher: &F,
        visited: &mut HashSet<Location>,
    ) -> Result<()> {
        if !visited.insert(location.clone()) {
            return Ok(());
        }

        let input = fetcher.fetch(location)?;
        let mut adapter = EventAdapter::new(XmlCatalogHandler::new(location.clone()));
        adapter.parse(&mut RewindReader::new(input))?;
        let handler = adapter.into_inner();

        match &handler.root {
            Some(root) if root.local_name == "catalog" => {}
            Some(root) => {
                return Err(Error::Catalog(format!(
                    "Expected catalog root element, got {}",
                    root
                )))
            }
            None => return Err(Error::Catalog(format!("Empty catalog document: {}", location))),
        }

        for (uri, target) in handler.entries {
            self.put(uri, Entity::resource(target));
        }

        for next in handler.next_catalogs {
            // Nested catalogs are optional; a broken one does not spoil the parent
            let mut nested = Catalog::new();
            match nested.parse_xml_catalog(&next, fetcher, visited) {
                Ok(()) => self.merge(nested),
                Err(e) => warn!("Skipping next catalog {}: {}", next, e),
            }
        }

        Ok(())
    }
}

/// Collects `system`, `uri`, `public` and `nextCatalog` entries, honouring `xml:base`
struct XmlCatalogHandler {
    root: Option<QName>,
    bases: Vec<Location>,
    entries: Vec<(String, Location)>,
    next_catalogs: Vec<Location>,
}

impl XmlCatalogHandler {
    fn new(location: Location) -> Self {
        Self {
            root: None,
            bases: vec![location],
            entries: Vec::new(),
            next_catalogs: Vec::new(),
        }
    }

    fn base(&self) -> &Location {
        // The document location is never popped
        &self.bases[self.bases.len() - 1]
    }

    fn resolve(&self, reference: &str) -> Option<Location> {
        match self.base().resolve(reference) {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("Ignoring catalog reference '{}': {}", reference, e);
                None
            }
        }
    }
}

impl ElementHandler for XmlCatalogHandler {
    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<bool> {
        if self.root.is_none() {
            self.root = Some(name.clone());
        }

        let base = match attributes.get(&QName::namespaced(XML_NAMESPACE, "base")) {
            Some(xml_base) => self.resolve(xml_base).unwrap_or_else(|| self.base().clone()),
            None => self.base().clone(),
        };
        self.bases.push(base);

        let attr = |local: &str| attributes.get(&QName::local(local));
        let key_attr = match name.local_name.as_str() {
            "system" => Some("systemId"),
            "uri" => Some("name"),
            "public" => Some("publicId"),
            "nextCatalog" => {
                if let Some(target) = attr("catalog").and_then(|c| self.resolve(c)) {
                    self.next_catalogs.push(target);
                }
                None
            }
            // <group> and unknown elements only contribute xml:base
            _ => None,
        };

        if let Some(key_attr) = key_attr {
            if let (Some(key), Some(uri)) = (attr(key_attr), attr("uri")) {
                if let Some(target) = self.resolve(uri) {
                    self.entries.push((key.clone(), target));
                }
            }
        }

        Ok(true)
    }

    fn end_element(&mut self, _name: &QName) -> Result<bool> {
        if self.bases.len() > 1 {
            self.bases.pop();
        }
        Ok(true)
    }
}

/// Serializable view of a catalog: URI -> location, nested catalogs flattened
#[derive(Debug, Serialize)]
pub struct CatalogSummary<'a> {
    /// Distinct URIs and their locations
    pub entries: IndexMap<&'a str, &'a Location>,
}

impl<'a> From<&'a Catalog> for CatalogSummary<'a> {
    fn from(catalog: &'a Catalog) -> Self {
        Self {
            entries: catalog.flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn loc(s: &str) -> Location {
        Location::parse(s).unwrap()
    }

    #[test]
    fn test_first_write_wins() {
        let mut catalog = Catalog::new();
        assert!(!catalog.put("urn:a", Entity::resource(loc("file:///one.xsd"))));
        assert!(catalog.put("urn:a", Entity::resource(loc("file:///two.xsd"))));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("urn:a").unwrap().location().as_str(), "file:///one.xsd");
    }

    #[test]
    fn test_nested_lookup() {
        let mut inner = Catalog::new();
        inner.put("file:///b-part.xsd", Entity::resource(loc("file:///b-part.xsd")));

        let mut catalog = Catalog::new();
        catalog.put("urn:b", Entity::resource(loc("file:///b.xsd")).nest(inner));

        assert!(catalog.contains("urn:b"));
        assert!(catalog.contains("file:///b-part.xsd"));
        assert!(!catalog.contains("urn:c"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.flatten().len(), 2);
    }

    #[test]
    fn test_canonical_text_emits_each_uri_once() {
        let mut inner = Catalog::new();
        inner.put("urn:a", Entity::resource(loc("file:///elsewhere.xsd")));
        inner.put("file:///b-part.xsd", Entity::resource(loc("file:///b-part.xsd")));

        let mut catalog = Catalog::new();
        catalog.put("urn:a", Entity::resource(loc("file:///a.xsd")));
        catalog.put("urn:b", Entity::resource(loc("file:///b.xsd")).nest(inner));

        let text = catalog.to_canonical_text();
        assert_eq!(
            text,
            "PUBLIC \"urn:a\" \"file:///a.xsd\"\n\
             SYSTEM \"urn:a\" \"file:///a.xsd\"\n\
             REWRITE_SYSTEM \"urn:a\" \"file:///a.xsd\"\n\
             PUBLIC \"urn:b\" \"file:///b.xsd\"\n\
             SYSTEM \"urn:b\" \"file:///b.xsd\"\n\
             REWRITE_SYSTEM \"urn:b\" \"file:///b.xsd\"\n\
             PUBLIC \"file:///b-part.xsd\" \"file:///b-part.xsd\"\n\
             SYSTEM \"file:///b-part.xsd\" \"file:///b-part.xsd\"\n\
             REWRITE_SYSTEM \"file:///b-part.xsd\" \"file:///b-part.xsd\"\n"
        );
    }

    #[test]
    fn test_parse_simple_catalog() {
        let catalog_xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <system systemId="urn:example:schema.xsd" uri="schemas/schema.xsd"/>
    <uri name="urn:example:types.xsd" uri="schemas/types.xsd"/>
    <public publicId="-//EXAMPLE//DTD Doc//EN" uri="dtd/doc.dtd"/>
</catalog>"#;

        let temp_dir = TempDir::new().unwrap();
        let catalog_path = temp_dir.path().join("catalog.xml");
        std::fs::write(&catalog_path, catalog_xml).unwrap();

        let catalog = Catalog::from_xml_catalog(&catalog_path).unwrap();

        assert_eq!(catalog.len(), 3);

        let resolved = catalog.get("urn:example:schema.xsd").unwrap();
        assert!(resolved.location().as_str().ends_with("schemas/schema.xsd"));

        let resolved = catalog.get("urn:example:types.xsd").unwrap();
        assert!(resolved.location().as_str().ends_with("schemas/types.xsd"));

        assert!(catalog.get("-//EXAMPLE//DTD Doc//EN").is_some());
        assert!(catalog.get("urn:example:not-found.xsd").is_none());
    }

    #[test]
    fn test_nested_catalogs() {
        let temp_dir = TempDir::new().unwrap();

        let main_catalog = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <system systemId="urn:main:schema.xsd" uri="main.xsd"/>
    <nextCatalog catalog="sub/catalog.xml"/>
    <nextCatalog catalog="missing/catalog.xml"/>
</catalog>"#;

        let sub_dir = temp_dir.path().join("sub");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let sub_catalog = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <system systemId="urn:sub:schema.xsd" uri="sub.xsd"/>
    <system systemId="urn:main:schema.xsd" uri="shadowed.xsd"/>
</catalog>"#;

        std::fs::write(temp_dir.path().join("catalog.xml"), main_catalog).unwrap();
        std::fs::write(sub_dir.join("catalog.xml"), sub_catalog).unwrap();

        let catalog = Catalog::from_xml_catalog(temp_dir.path().join("catalog.xml")).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog
            .get("urn:main:schema.xsd")
            .unwrap()
            .location()
            .as_str()
            .ends_with("/main.xsd"));
        assert!(catalog
            .get("urn:sub:schema.xsd")
            .unwrap()
            .location()
            .as_str()
            .ends_with("sub/sub.xsd"));
    }

    #[test]
    fn test_group_element_with_xml_base() {
        let catalog_xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
    <group xml:base="grouped/">
        <system systemId="urn:grouped:schema.xsd" uri="grouped.xsd"/>
    </group>
    <system systemId="urn:plain:schema.xsd" uri="plain.xsd"/>
</catalog>"#;

        let temp_dir = TempDir::new().unwrap();
        let catalog_path = temp_dir.path().join("catalog.xml");
        std::fs::write(&catalog_path, catalog_xml).unwrap();

        let catalog = Catalog::from_xml_catalog(&catalog_path).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog
            .get("urn:grouped:schema.xsd")
            .unwrap()
            .location()
            .as_str()
            .ends_with("/grouped/grouped.xsd"));
        assert!(!catalog
            .get("urn:plain:schema.xsd")
            .unwrap()
            .location()
            .as_str()
            .contains("grouped"));
    }

    #[test]
    fn test_wrong_root_element() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.xml");
        std::fs::write(&path, "<notacatalog/>").unwrap();
        assert!(matches!(
            Catalog::from_xml_catalog(&path),
            Err(Error::Catalog(_))
        ));
    }
}
