//! Entity lookup for a validation engine
//!
//! Once a [`Catalog`] is resolved it is handed to a schema validator, which
//! asks for documents by logical reference: a resource kind, a namespace,
//! public and system identifiers and a base URI. [`CatalogLookup`] answers
//! from the catalog first and falls back to the built-in schema of the XML
//! namespace.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use crate::catalog::{Catalog, Entity};
use crate::error::Result;
use crate::loaders::Fetch;
use crate::locations::Location;
use crate::namespaces::XML_NAMESPACE;

/// Schema of the XML namespace, served without network access
const XML_XSD: &str = include_str!("../resources/xml.xsd");

/// Canonical location of the XML namespace schema
pub const XML_XSD_LOCATION: &str = "http://www.w3.org/2001/xml.xsd";

/// System identifiers under which the XML namespace schema is published
static BUILTIN_SYSTEM_IDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut ids = HashMap::new();
    ids.insert(XML_XSD_LOCATION, XML_XSD);
    ids.insert("https://www.w3.org/2001/xml.xsd", XML_XSD);
    ids.insert("http://www.w3.org/2009/01/xml.xsd", XML_XSD);
    ids
});

/// A logical reference from the validation engine
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityRequest<'a> {
    /// Resource type URI (e.g. the XML Schema namespace for schema documents)
    pub kind: &'a str,
    /// Target namespace being looked for
    pub namespace: Option<&'a str>,
    /// Public identifier
    pub public_id: Option<&'a str>,
    /// System identifier as written
    pub system_id: Option<&'a str>,
    /// Base URI of the referencing document
    pub base_uri: Option<&'a str>,
}

/// Document handed back to the validation engine
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// Where the document lives
    pub location: Location,
    /// Its content
    pub content: Arc<[u8]>,
}

impl ResolvedInput {
    /// Content as text
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Location-resolution contract for a validation engine
pub trait EntityResolver {
    /// Resolve a logical reference, `Ok(None)` if nothing is known about it
    fn resolve_entity(&self, request: &EntityRequest<'_>) -> Result<Option<ResolvedInput>>;
}

/// [`EntityResolver`] backed by a resolved catalog
pub struct CatalogLookup<'c, F> {
    catalog: &'c Catalog,
    fetcher: F,
}

impl<'c, F: Fetch> CatalogLookup<'c, F> {
    /// Answer from `catalog`, fetching uncached documents with `fetcher`
    pub fn new(catalog: &'c Catalog, fetcher: F) -> Self {
        Self { catalog, fetcher }
    }

    fn find(&self, request: &EntityRequest<'_>) -> Option<&'c Entity> {
        if let Some(entity) = request.namespace.and_then(|ns| self.catalog.get(ns)) {
            return Some(entity);
        }
        if let Some(entity) = request.public_id.and_then(|id| self.catalog.get(id)) {
            return Some(entity);
        }

        let system_id = request.system_id?;
        Self::absolute_system_id(request)
            .and_then(|abs| self.catalog.get(abs.as_str()))
            .or_else(|| self.catalog.get(system_id))
    }

    /// The system id resolved against the base URI, if both are present
    fn absolute_system_id(request: &EntityRequest<'_>) -> Option<Location> {
        let system_id = request.system_id?;
        let base = Location::parse(request.base_uri?).ok()?;
        base.resolve(system_id).ok()
    }

    fn builtin(request: &EntityRequest<'_>) -> Option<ResolvedInput> {
        let absolute = Self::absolute_system_id(request);
        let known = absolute
            .as_ref()
            .map(|abs| abs.as_str())
            .into_iter()
            .chain(request.system_id)
            .find_map(|id| BUILTIN_SYSTEM_IDS.get_key_value(id));

        let (id, content) = match known {
            Some((id, content)) => (*id, *content),
            None if request.namespace == Some(XML_NAMESPACE) => (XML_XSD_LOCATION, XML_XSD),
            None => return None,
        };
        let location = Location::parse(id).ok()?;
        Some(ResolvedInput {
            location,
            content: Arc::from(content.as_bytes()),
        })
    }
}

impl<F: Fetch> EntityResolver for CatalogLookup<'_, F> {
    fn resolve_entity(&self, request: &EntityRequest<'_>) -> Result<Option<ResolvedInput>> {
        let Some(entity) = self.find(request) else {
            return Ok(Self::builtin(request));
        };

        let content = match entity.input() {
            Some(cached) => cached.clone(),
            None => {
                let mut bytes = Vec::new();
                self.fetcher
                    .fetch(entity.location())?
                    .read_to_end(&mut bytes)?;
                Arc::from(bytes)
            }
        };

        Ok(Some(ResolvedInput {
            location: entity.location().clone(),
            content,
        }))
    }
}
