//! Recursive import/include resolution
//!
//! [`CatalogResolver`] starts from one document, extracts its [`Manifest`],
//! and follows every include and import it names until nothing new is
//! reachable or every namespace that was asked for has been found. Results
//! accumulate in a [`Catalog`].
//!
//! Traversal rules:
//!
//! - includes of a document are resolved before its imports, since they share
//!   its namespace;
//! - a URL is fetched at most once, and a namespace that is already
//!   registered (or being resolved) is not imported again, which makes
//!   reference cycles terminate;
//! - a remote reference that cannot be reached is skipped, any other fetch
//!   failure aborts the traversal.

use indexmap::IndexSet;
use log::{debug, trace, warn};
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use crate::catalog::{Catalog, Entity};
use crate::error::Result;
use crate::events::EventAdapter;
use crate::limits::Limits;
use crate::loaders::{Fetch, FetchError};
use crate::locations::Location;
use crate::manifest::{Manifest, ManifestExtractor};
use crate::reader::RewindReader;

/// Resolution settings
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Never touch the network; remote references count as unreachable
    pub local_only: bool,
    /// Keep fetched bytes in catalog entities
    pub cache_inputs: bool,
    /// Resource limits
    pub limits: Limits,
}

impl ResolveOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set local-only mode
    pub fn with_local_only(mut self, local_only: bool) -> Self {
        self.local_only = local_only;
        self
    }

    /// Set input caching
    pub fn with_cache_inputs(mut self, cache_inputs: bool) -> Self {
        self.cache_inputs = cache_inputs;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Outcome of a traversal
#[derive(Debug)]
pub struct Resolution {
    /// Manifest of the root document
    pub root: Manifest,
    /// Everything that was resolved
    pub catalog: Catalog,
    /// No document referenced anything outside local storage
    pub references_only_local: bool,
    /// Remote references that were skipped as unreachable
    pub unreachable: Vec<Location>,
    /// Number of documents fetched and scanned
    pub documents: usize,
}

/// Resolver entry point
pub struct CatalogResolver<F> {
    fetcher: F,
    options: ResolveOptions,
    seed: Catalog,
}

impl<F: Fetch> CatalogResolver<F> {
    /// Create a resolver fetching through `fetcher`
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            options: ResolveOptions::default(),
            seed: Catalog::new(),
        }
    }

    /// Set the options
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Pre-register entries; they take precedence over anything discovered
    pub fn with_seed(mut self, seed: Catalog) -> Self {
        self.seed = seed;
        self
    }

    /// Resolve everything reachable from `root`
    ///
    /// Each call runs its own traversal with its own catalog and visited sets.
    pub fn resolve(&self, root: &Location) -> Result<Resolution> {
        Traversal::new(&self.fetcher, &self.options, self.seed.clone(), root).run(root)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

type Loaded = (Manifest, Option<Arc<[u8]>>);

/// State of one traversal; owns the reusable extractor
struct Traversal<'r, F> {
    fetcher: &'r F,
    options: &'r ResolveOptions,
    adapter: EventAdapter<ManifestExtractor>,
    catalog: Catalog,
    visited_urls: HashSet<Location>,
    visited_namespaces: HashSet<String>,
    pending: IndexSet<String>,
    references_only_local: bool,
    unreachable: Vec<Location>,
    documents: usize,
}

impl<'r, F: Fetch> Traversal<'r, F> {
    fn new(fetcher: &'r F, options: &'r ResolveOptions, seed: Catalog, root: &Location) -> Self {
        Self {
            fetcher,
            options,
            adapter: EventAdapter::with_limits(
                ManifestExtractor::new(root.clone()),
                options.limits.clone(),
            ),
            catalog: seed,
            visited_urls: HashSet::new(),
            visited_namespaces: HashSet::new(),
            pending: IndexSet::new(),
            references_only_local: true,
            unreachable: Vec::new(),
            documents: 0,
        }
    }

    fn run(mut self, root: &Location) -> Result<Resolution> {
        self.visited_urls.insert(root.clone());
        let (manifest, input) = self.load(root)?;

        if let Some(tns) = &manifest.target_namespace {
            self.visited_namespaces.insert(tns.clone());
            self.catalog
                .put(tns.as_str(), Entity::resource(root.clone()).with_input(input));
        }
        if !manifest.is_schema {
            self.pending.extend(manifest.namespace_uris.iter().cloned());
        }

        let mut root_includes = Catalog::new();
        if self.process(&manifest, None, &mut root_includes, 0)? == Flow::Stop {
            debug!("All pending namespaces of {} resolved", root);
        }
        self.catalog.merge(root_includes);

        debug!(
            "Resolved {}: {} documents, {} catalog entries, {} unreachable",
            root,
            self.documents,
            self.catalog.len(),
            self.unreachable.len()
        );

        Ok(Resolution {
            root: manifest,
            catalog: self.catalog,
            references_only_local: self.references_only_local,
            unreachable: self.unreachable,
            documents: self.documents,
        })
    }

    /// Fetch and scan a document, failing on any fetch error
    fn load(&mut self, location: &Location) -> Result<Loaded> {
        let fetcher = self.fetcher;
        let mut input = fetcher.fetch(location)?;
        self.documents += 1;
        trace!("Scanning {}", location);

        self.adapter.handler_mut().reset(location.clone());
        let cached = if self.options.cache_inputs {
            let mut bytes = Vec::new();
            input.read_to_end(&mut bytes)?;
            self.options.limits.check_xml_size(bytes.len())?;
            self.adapter.parse(&mut RewindReader::new(bytes.as_slice()))?;
            Some(Arc::from(bytes))
        } else {
            self.adapter.parse(&mut RewindReader::new(input))?;
            None
        };

        let manifest = self.adapter.handler_mut().take_manifest();
        self.references_only_local &= manifest.references_only_local;
        Ok((manifest, cached))
    }

    /// Fetch and scan a referenced document, skipping unreachable remote ones
    fn load_reference(&mut self, location: &Location) -> Result<Option<Loaded>> {
        if self.options.local_only && location.is_remote() {
            self.skip_unreachable(location, "local-only mode");
            return Ok(None);
        }

        match self.load(location) {
            Ok(loaded) => Ok(Some(loaded)),
            Err(crate::Error::Fetch(FetchError::Unreachable { reason, .. }))
                if location.is_remote() =>
            {
                self.skip_unreachable(location, &reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn skip_unreachable(&mut self, location: &Location, reason: &str) {
        warn!("Skipping unreachable {}: {}", location, reason);
        self.references_only_local = false;
        self.unreachable.push(location.clone());
    }

    /// Follow the references of one document
    ///
    /// Includes land in `owner`, the catalog of the namespace they belong to.
    fn process(
        &mut self,
        manifest: &Manifest,
        via_import: Option<&str>,
        owner: &mut Catalog,
        depth: usize,
    ) -> Result<Flow> {
        self.options.limits.check_schema_depth(depth)?;

        // The whole include closure is loaded, and its imports are pending,
        // before any import is followed
        let mut parts = Vec::new();
        let targets: Vec<Location> = manifest.includes.values().cloned().collect();
        self.collect_includes(targets, owner, depth + 1, &mut parts)?;

        self.pending.extend(manifest.imports.keys().cloned());
        for part in &parts {
            self.pending.extend(part.imports.keys().cloned());
        }

        if let Some(namespace) = via_import {
            self.pending.shift_remove(namespace);
            if self.pending.is_empty() {
                return Ok(Flow::Stop);
            }
        }

        for document in std::iter::once(manifest).chain(&parts) {
            for (namespace, target) in &document.imports {
                if self.import(namespace, target, depth + 1)? == Flow::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }

        Ok(Flow::Continue)
    }

    /// Load included documents recursively, in document order, into `owner`
    fn collect_includes(
        &mut self,
        targets: Vec<Location>,
        owner: &mut Catalog,
        depth: usize,
        parts: &mut Vec<Manifest>,
    ) -> Result<()> {
        for target in targets {
            if !self.visited_urls.insert(target.clone()) {
                continue;
            }
            self.options.limits.check_schema_depth(depth)?;
            let Some((included, input)) = self.load_reference(&target)? else {
                continue;
            };
            let nested: Vec<Location> = included.includes.values().cloned().collect();
            owner.put(target.to_string(), Entity::resource(target).with_input(input));
            parts.push(included);
            self.collect_includes(nested, owner, depth + 1, parts)?;
        }
        Ok(())
    }

    fn import(&mut self, namespace: &str, target: &Location, depth: usize) -> Result<Flow> {
        if self.catalog.contains(namespace) || self.visited_namespaces.contains(namespace) {
            self.pending.shift_remove(namespace);
            return Ok(Flow::Continue);
        }
        if !self.visited_urls.insert(target.clone()) {
            return Ok(Flow::Continue);
        }

        self.visited_namespaces.insert(namespace.to_string());
        let Some((imported, input)) = self.load_reference(target)? else {
            // Another document may still import it from a reachable location
            self.visited_namespaces.remove(namespace);
            return Ok(Flow::Continue);
        };

        if imported.is_schema && imported.target_namespace.as_deref() != Some(namespace) {
            warn!(
                "{} imported for namespace '{}' declares targetNamespace {:?}",
                target, namespace, imported.target_namespace
            );
        }

        let mut nested = Catalog::new();
        let flow = self.process(&imported, Some(namespace), &mut nested, depth)?;

        let entity = Entity::resource(target.clone()).with_input(input);
        let entity = if nested.is_empty() {
            entity
        } else {
            entity.nest(nested)
        };
        self.catalog.put(namespace, entity);

        Ok(flow)
    }
}
