//! End-to-end resolution over schema sets on disk

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use xsd_catalog::{
    Catalog, CatalogLookup, CatalogResolver, EntityRequest, EntityResolver, Loader, Location,
    ResolveOptions, XSD_1_0_NAMESPACE,
};

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn url(dir: &Path, name: &str) -> String {
    Location::from_path(dir.join(name)).unwrap().to_string()
}

/// order.xsd includes order-types.xsd and imports the address and
/// currency schemas; address.xsd imports order.xsd back.
fn order_schemas() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "order.xsd",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- Purchase orders -->
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:example:order"
           xmlns="urn:example:order">
  <xs:annotation><xs:documentation>Orders</xs:documentation></xs:annotation>
  <xs:include schemaLocation="order-types.xsd"/>
  <xs:import namespace="urn:example:address" schemaLocation="common/address.xsd"/>
  <xs:import namespace="urn:example:currency" schemaLocation="http://example.invalid/currency.xsd"/>
  <xs:element name="order" type="OrderType"/>
</xs:schema>"#,
    );
    write(
        dir.path(),
        "order-types.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:example:order">
  <xs:complexType name="OrderType"/>
</xs:schema>"#,
    );
    write(
        dir.path(),
        "common/address.xsd",
        r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:example:address">
  <import namespace="urn:example:order" schemaLocation="../order.xsd"/>
  <include schemaLocation="address-types.xsd"/>
  <element name="address"/>
</schema>"#,
    );
    write(
        dir.path(),
        "common/address-types.xsd",
        r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:example:address"/>"#,
    );
    dir
}

#[test]
fn test_resolve_schema_set_offline() {
    let dir = order_schemas();
    let root = Location::from_path(dir.path().join("order.xsd")).unwrap();

    let resolution = CatalogResolver::new(Loader::new())
        .with_options(ResolveOptions::new().with_local_only(true))
        .resolve(&root)
        .unwrap();

    assert!(resolution.root.is_schema);
    assert!(!resolution.references_only_local);
    assert_eq!(resolution.documents, 4);
    assert_eq!(resolution.unreachable.len(), 1);
    assert!(!resolution.catalog.contains("urn:example:currency"));

    let flat = resolution.catalog.flatten();
    let uris: Vec<String> = flat.keys().map(|uri| uri.to_string()).collect();
    assert_eq!(
        uris,
        vec![
            "urn:example:order".to_string(),
            "urn:example:address".to_string(),
            url(dir.path(), "common/address-types.xsd"),
            url(dir.path(), "order-types.xsd"),
        ]
    );
    assert_eq!(
        flat["urn:example:address"].to_string(),
        url(dir.path(), "common/address.xsd")
    );
}

#[test]
fn test_canonical_text_export() {
    let dir = order_schemas();
    let root = Location::from_path(dir.path().join("order.xsd")).unwrap();
    let resolution = CatalogResolver::new(Loader::new().with_allow_remote(false))
        .resolve(&root)
        .unwrap();

    let text = resolution.catalog.to_canonical_text();
    let order = url(dir.path(), "order.xsd");
    assert!(text.starts_with(&format!(
        "PUBLIC \"urn:example:order\" \"{0}\"\nSYSTEM \"urn:example:order\" \"{0}\"\nREWRITE_SYSTEM \"urn:example:order\" \"{0}\"\n",
        order
    )));
    // four distinct URIs, three lines each
    assert_eq!(text.lines().count(), 12);
}

#[test]
fn test_instance_document_with_seed_catalog() {
    let dir = order_schemas();
    write(
        dir.path(),
        "pinned/address.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:example:address"/>"#,
    );
    write(
        dir.path(),
        "catalog.xml",
        r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="urn:example:address" uri="pinned/address.xsd"/>
</catalog>"#,
    );
    write(
        dir.path(),
        "po.xml",
        r#"<po:order xmlns:po="urn:example:order"
          xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
          xsi:schemaLocation="urn:example:order order.xsd"/>"#,
    );

    let seed = Catalog::from_xml_catalog(dir.path().join("catalog.xml")).unwrap();
    let root = Location::from_path(dir.path().join("po.xml")).unwrap();
    let resolution = CatalogResolver::new(Loader::new().with_allow_remote(false))
        .with_seed(seed)
        .resolve(&root)
        .unwrap();

    assert!(!resolution.root.is_schema);
    let catalog = &resolution.catalog;
    assert_eq!(
        catalog.get("urn:example:address").unwrap().location().to_string(),
        url(dir.path(), "pinned/address.xsd")
    );
    assert_eq!(
        catalog.get("urn:example:order").unwrap().location().to_string(),
        url(dir.path(), "order.xsd")
    );
    assert!(catalog.contains(&url(dir.path(), "order-types.xsd")));
    assert!(!catalog.contains(&url(dir.path(), "common/address.xsd")));
}

#[test]
fn test_lookup_after_resolution() {
    let dir = order_schemas();
    let root = Location::from_path(dir.path().join("order.xsd")).unwrap();
    let resolution = CatalogResolver::new(Loader::new().with_allow_remote(false))
        .with_options(ResolveOptions::new().with_cache_inputs(true))
        .resolve(&root)
        .unwrap();

    // the cached copy is served even after the file is gone
    fs::remove_file(dir.path().join("common/address.xsd")).unwrap();

    let loader = Loader::new();
    let lookup = CatalogLookup::new(&resolution.catalog, &loader);
    let input = lookup
        .resolve_entity(&EntityRequest {
            kind: XSD_1_0_NAMESPACE,
            namespace: Some("urn:example:address"),
            ..Default::default()
        })
        .unwrap()
        .unwrap();
    assert!(input.text().contains("address-types.xsd"));
}

#[test]
fn test_missing_include_is_an_error() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "broken.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:include schemaLocation="nowhere.xsd"/>
</xs:schema>"#,
    );
    let root = Location::from_path(dir.path().join("broken.xsd")).unwrap();
    let result = CatalogResolver::new(Loader::new()).resolve(&root);
    assert!(result.is_err());
    assert!(!result.unwrap_err().is_unreachable());
}
