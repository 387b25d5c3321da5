//! Per-document manifest extraction
//!
//! A [`Manifest`] says what a document is (a schema or an ordinary
//! document), which namespaces it uses, and which other documents it pulls
//! in. [`ManifestExtractor`] builds one from the resolved event stream and
//! stops the scan as soon as a schema's header (its imports, includes and
//! annotations) has been read.

use indexmap::{IndexMap, IndexSet};
use log::{trace, warn};
use serde::Serialize;

use crate::error::Result;
use crate::events::{Attributes, ElementHandler, EventAdapter};
use crate::limits::Limits;
use crate::locations::Location;
use crate::namespaces::{
    is_schema_namespace, QName, XINCLUDE_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE, XSI_NAMESPACE,
};
use crate::reader::CharSource;

/// Schema element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ANNOTATION: &str = "annotation";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const OVERRIDE: &str = "override";
}

/// Attribute local names
mod attrs {
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const NAMESPACE: &str = "namespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const NO_NAMESPACE_SCHEMA_LOCATION: &str = "noNamespaceSchemaLocation";
    pub const HREF: &str = "href";
}

/// Namespaces that describe documents rather than being described by a schema
fn is_meta_namespace(namespace: &str) -> bool {
    matches!(
        namespace,
        XSI_NAMESPACE | XINCLUDE_NAMESPACE | XML_NAMESPACE | XMLNS_NAMESPACE
    )
}

/// Extracted namespace metadata of one document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Location of the document itself
    pub location: Location,
    /// Root element is `schema` in a schema-definition namespace
    pub is_schema: bool,
    /// Resolved name of the root element
    pub root_element: Option<QName>,
    /// `targetNamespace` of a schema document
    pub target_namespace: Option<String>,
    /// Namespaces used by an ordinary document
    pub namespace_uris: IndexSet<String>,
    /// Imported namespace -> resolved location (no-namespace imports use `""`)
    pub imports: IndexMap<String, Location>,
    /// Location as written -> resolved location
    pub includes: IndexMap<String, Location>,
    /// Every recorded reference resolved to a local location
    pub references_only_local: bool,
}

impl Manifest {
    /// Create an empty manifest for the document at `location`
    pub fn new(location: Location) -> Self {
        Self {
            location,
            is_schema: false,
            root_element: None,
            target_namespace: None,
            namespace_uris: IndexSet::new(),
            imports: IndexMap::new(),
            includes: IndexMap::new(),
            references_only_local: true,
        }
    }

    /// Extract the manifest of a single document
    pub fn extract(location: &Location, src: &mut dyn CharSource, limits: &Limits) -> Result<Self> {
        let extractor = ManifestExtractor::new(location.clone());
        let mut adapter = EventAdapter::with_limits(extractor, limits.clone());
        adapter.parse(src)?;
        Ok(adapter.into_inner().into_manifest())
    }

    fn resolve_reference(&mut self, reference: &str) -> Option<Location> {
        match self.location.resolve(reference) {
            Ok(resolved) => {
                self.references_only_local &= resolved.is_local();
                Some(resolved)
            }
            Err(e) => {
                warn!(
                    "Ignoring unresolvable reference '{}' in {}: {}",
                    reference, self.location, e
                );
                None
            }
        }
    }

    fn add_import(&mut self, namespace: Option<&str>, reference: &str) {
        let key = namespace.unwrap_or_default();
        if self.imports.contains_key(key) {
            return;
        }
        if let Some(resolved) = self.resolve_reference(reference) {
            trace!("{}: import '{}' from {}", self.location, key, resolved);
            self.imports.insert(key.to_string(), resolved);
        }
    }

    fn add_include(&mut self, reference: &str) {
        if self.includes.contains_key(reference) {
            return;
        }
        if let Some(resolved) = self.resolve_reference(reference) {
            trace!("{}: include {}", self.location, resolved);
            self.includes.insert(reference.to_string(), resolved);
        }
    }
}

/// Element handler that fills a [`Manifest`]
///
/// One traversal owns an extractor and calls [`ManifestExtractor::reset`]
/// before each document; it is not meant to be shared.
#[derive(Debug)]
pub struct ManifestExtractor {
    manifest: Manifest,
    depth: usize,
}

impl ManifestExtractor {
    /// Create an extractor for the document at `location`
    pub fn new(location: Location) -> Self {
        Self {
            manifest: Manifest::new(location),
            depth: 0,
        }
    }

    /// Prepare for the next document
    pub fn reset(&mut self, location: Location) {
        self.manifest = Manifest::new(location);
        self.depth = 0;
    }

    /// Manifest collected so far
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Take the collected manifest, leaving an empty one for the same location
    pub fn take_manifest(&mut self) -> Manifest {
        let location = self.manifest.location.clone();
        std::mem::replace(&mut self.manifest, Manifest::new(location))
    }

    /// Consume the extractor
    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }

    fn schema_element(&mut self, name: &QName, attributes: &Attributes) -> bool {
        // Only direct children of xs:schema make up the header
        if self.depth != 2 {
            return true;
        }
        if !is_schema_namespace(name.namespace()) {
            return false;
        }

        let schema_location = attributes.get(&QName::local(attrs::SCHEMA_LOCATION));
        match name.local_name.as_str() {
            xsd_elements::IMPORT => {
                if let Some(location) = schema_location {
                    let namespace = attributes.get(&QName::local(attrs::NAMESPACE));
                    self.manifest.add_import(namespace.map(String::as_str), location);
                }
                true
            }
            xsd_elements::INCLUDE | xsd_elements::REDEFINE | xsd_elements::OVERRIDE => {
                if let Some(location) = schema_location {
                    self.manifest.add_include(location);
                }
                true
            }
            xsd_elements::ANNOTATION => true,
            _ => false,
        }
    }

    fn instance_element(&mut self, name: &QName, attributes: &Attributes) {
        if name.is(XINCLUDE_NAMESPACE, xsd_elements::INCLUDE) {
            if let Some(href) = attributes.get(&QName::local(attrs::HREF)) {
                self.manifest.add_include(href);
            }
        } else if let Some(ns) = name.namespace() {
            if !is_meta_namespace(ns) {
                self.manifest.namespace_uris.insert(ns.to_string());
            }
        }

        for (attribute, value) in attributes {
            match attribute.namespace() {
                Some(XSI_NAMESPACE) => match attribute.local_name.as_str() {
                    attrs::NO_NAMESPACE_SCHEMA_LOCATION => self.manifest.add_include(value),
                    attrs::SCHEMA_LOCATION => self.schema_location_pairs(value),
                    _ => {}
                },
                Some(ns) if !is_meta_namespace(ns) => {
                    self.manifest.namespace_uris.insert(ns.to_string());
                }
                _ => {}
            }
        }
    }

    fn schema_location_pairs(&mut self, value: &str) {
        let tokens: Vec<&str> = value.split_whitespace().collect();
        for pair in tokens.chunks(2) {
            match pair {
                [namespace, location] => self.manifest.add_import(Some(*namespace), location),
                [dangling] => warn!(
                    "{}: xsi:schemaLocation namespace '{}' has no location",
                    self.manifest.location, dangling
                ),
                _ => {}
            }
        }
    }
}

impl ElementHandler for ManifestExtractor {
    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<bool> {
        self.depth += 1;

        if self.manifest.root_element.is_none() {
            self.manifest.is_schema =
                is_schema_namespace(name.namespace()) && name.local_name == xsd_elements::SCHEMA;
            self.manifest.root_element = Some(name.clone());

            if self.manifest.is_schema {
                self.manifest.target_namespace = attributes
                    .get(&QName::local(attrs::TARGET_NAMESPACE))
                    .cloned();
                return Ok(true);
            }
        }

        if self.manifest.is_schema {
            Ok(self.schema_element(name, attributes))
        } else {
            self.instance_element(name, attributes);
            Ok(true)
        }
    }

    fn end_element(&mut self, _name: &QName) -> Result<bool> {
        self.depth = self.depth.saturating_sub(1);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::XSD_1_0_NAMESPACE;
    use crate::reader::RewindReader;
    use pretty_assertions::assert_eq;

    fn extract(location: &str, xml: &str) -> Manifest {
        let location = Location::parse(location).unwrap();
        Manifest::extract(&location, &mut RewindReader::from_text(xml), &Limits::default()).unwrap()
    }

    #[test]
    fn test_schema_with_import() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:ns">
            <xs:import namespace="urn:other" schemaLocation="other.xsd"/>
        </xs:schema>"#;
        let manifest = extract("file:///schemas/main.xsd", xml);

        assert!(manifest.is_schema);
        assert_eq!(
            manifest.root_element,
            Some(QName::namespaced(XSD_1_0_NAMESPACE, "schema"))
        );
        assert_eq!(manifest.target_namespace.as_deref(), Some("urn:ns"));
        assert_eq!(manifest.imports.len(), 1);
        assert_eq!(
            manifest.imports["urn:other"].as_str(),
            "file:///schemas/other.xsd"
        );
        assert!(manifest.includes.is_empty());
        assert!(manifest.references_only_local);
    }

    #[test]
    fn test_schema_header_stops_at_first_declaration() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:annotation><xs:documentation>docs</xs:documentation></xs:annotation>
            <xs:include schemaLocation="types/common.xsd"/>
            <xs:redefine schemaLocation="base.xsd"><xs:simpleType name="t"/></xs:redefine>
            <xs:element name="root"/>
            <xs:import namespace="urn:late" schemaLocation="late.xsd"/>
        </xs:schema>"#;
        let manifest = extract("file:///s/main.xsd", xml);

        let includes: Vec<_> = manifest
            .includes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            includes,
            vec![
                ("types/common.xsd", "file:///s/types/common.xsd"),
                ("base.xsd", "file:///s/base.xsd"),
            ]
        );
        assert!(manifest.imports.is_empty());
        assert_eq!(manifest.target_namespace, None);
    }

    #[test]
    fn test_first_import_wins_and_remote_flag() {
        let xml = r#"<schema xmlns="http://www.w3.org/2001/XMLSchema">
            <import namespace="urn:a" schemaLocation="http://example.com/a.xsd"/>
            <import namespace="urn:a" schemaLocation="a-copy.xsd"/>
            <import schemaLocation="nons.xsd"/>
        </schema>"#;
        let manifest = extract("file:///s/main.xsd", xml);

        assert_eq!(manifest.imports["urn:a"].as_str(), "http://example.com/a.xsd");
        assert_eq!(manifest.imports[""].as_str(), "file:///s/nons.xsd");
        assert!(!manifest.references_only_local);
    }

    #[test]
    fn test_instance_document() {
        let xml = r#"<doc xmlns="urn:doc"
                xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                xmlns:x="urn:extra"
                xmlns:xi="http://www.w3.org/2001/XInclude"
                xsi:schemaLocation="urn:doc doc.xsd
                                    urn:extra http://example.com/extra.xsd"
                xsi:noNamespaceSchemaLocation="plain.xsd">
            <x:item x:flag="1" xml:lang="en"/>
            <xi:include href="part.xml"/>
        </doc>"#;
        let manifest = extract("file:///d/doc.xml", xml);

        assert!(!manifest.is_schema);
        assert_eq!(manifest.root_element, Some(QName::namespaced("urn:doc", "doc")));
        assert_eq!(manifest.target_namespace, None);

        let namespaces: Vec<_> = manifest.namespace_uris.iter().map(String::as_str).collect();
        assert_eq!(namespaces, vec!["urn:doc", "urn:extra"]);

        assert_eq!(manifest.imports["urn:doc"].as_str(), "file:///d/doc.xsd");
        assert_eq!(
            manifest.imports["urn:extra"].as_str(),
            "http://example.com/extra.xsd"
        );
        let includes: Vec<_> = manifest.includes.keys().map(String::as_str).collect();
        assert_eq!(includes, vec!["plain.xsd", "part.xml"]);
        assert!(!manifest.references_only_local);
    }

    #[test]
    fn test_extractor_reset_for_next_document() {
        let first = Location::parse("file:///a.xsd").unwrap();
        let second = Location::parse("file:///b.xml").unwrap();
        let mut adapter = EventAdapter::new(ManifestExtractor::new(first));
        adapter
            .parse(&mut RewindReader::from_text(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a"/>"#,
            ))
            .unwrap();
        let a = adapter.handler_mut().take_manifest();
        assert!(a.is_schema);

        adapter.handler_mut().reset(second.clone());
        adapter
            .parse(&mut RewindReader::from_text("<plain/>"))
            .unwrap();
        let b = adapter.handler_mut().take_manifest();
        assert!(!b.is_schema);
        assert_eq!(b.location, second);
        assert_eq!(b.target_namespace, None);
        assert_eq!(b.root_element, Some(QName::local("plain")));
    }
}
