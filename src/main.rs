//! Command-line interface for xsd-catalog

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use xsd_catalog::{
    Catalog, CatalogResolver, CatalogSummary, CharSource, Fetch, Limits, Loader, Location,
    Manifest, ResolveOptions, RewindReader, TokenHandler, Tokenizer,
};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsd-catalog")]
#[command(author, version, about = "XML Schema dependency discovery tool", long_about = None)]
struct Cli {
    /// JSON file overriding resource limits (e.g. {"maxRewind": 65536})
    #[arg(long, global = true, value_name = "FILE")]
    limits: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve every schema a document depends on and print the catalog
    Resolve {
        /// Schema or instance document (path or URL)
        #[arg(value_name = "FILE")]
        file: String,

        /// Never fetch remote documents
        #[arg(short, long)]
        local_only: bool,

        /// OASIS XML catalog whose entries take precedence
        #[arg(short, long, value_name = "CATALOG")]
        catalog: Option<PathBuf>,

        /// Maximum import/include nesting
        #[arg(long)]
        max_depth: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the schema references of a single document
    Manifest {
        /// Schema or instance document (path or URL)
        #[arg(value_name = "FILE")]
        file: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the raw tokenizer events of a document
    Tokens {
        /// XML document (path or URL)
        #[arg(value_name = "FILE")]
        file: String,

        /// Maximum rewind distance in characters
        #[arg(long)]
        max_rewind: Option<usize>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let limits = match load_limits(cli.limits.as_deref()) {
        Ok(limits) => limits,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Resolve {
            file,
            local_only,
            catalog,
            max_depth,
            json,
        } => cmd_resolve(&file, limits, local_only, catalog, max_depth, json),
        Commands::Manifest { file, json } => cmd_manifest(&file, limits, json),
        Commands::Tokens { file, max_rewind } => cmd_tokens(&file, limits, max_rewind),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn load_limits(path: Option<&std::path::Path>) -> Result<Limits, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => Ok(Limits::default()),
    }
}

#[cfg(feature = "cli")]
fn cmd_resolve(
    file: &str,
    mut limits: Limits,
    local_only: bool,
    seed: Option<PathBuf>,
    max_depth: Option<usize>,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = Location::parse(file)?;

    if let Some(depth) = max_depth {
        limits = limits.with_max_schema_depth(depth);
    }
    let loader = Loader::new()
        .with_limits(limits.clone())
        .with_allow_remote(!local_only);
    let seed = match seed {
        Some(path) => Catalog::from_xml_catalog(path)?,
        None => Catalog::new(),
    };

    let resolution = CatalogResolver::new(loader)
        .with_options(
            ResolveOptions::new()
                .with_local_only(local_only)
                .with_limits(limits),
        )
        .with_seed(seed)
        .resolve(&root)?;

    if json_output {
        let output = serde_json::json!({
            "root": resolution.root.location,
            "isSchema": resolution.root.is_schema,
            "targetNamespace": resolution.root.target_namespace,
            "referencesOnlyLocal": resolution.references_only_local,
            "documents": resolution.documents,
            "unreachable": resolution.unreachable,
            "catalog": CatalogSummary::from(&resolution.catalog),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print!("{}", resolution.catalog.to_canonical_text());
    if !resolution.references_only_local {
        eprintln!("note: some references point outside local storage");
    }
    for location in &resolution.unreachable {
        eprintln!("warning: skipped unreachable {}", location);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_manifest(
    file: &str,
    limits: Limits,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let location = Location::parse(file)?;
    let loader = Loader::new().with_limits(limits.clone());
    let input = loader.fetch(&location)?;
    let manifest = Manifest::extract(&location, &mut RewindReader::new(input), &limits)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    print_manifest(&manifest);
    Ok(())
}

#[cfg(feature = "cli")]
fn print_manifest(manifest: &Manifest) {
    println!("Document: {}", manifest.location);
    if let Some(root) = &manifest.root_element {
        println!("Root element: {}", root);
    }
    if manifest.is_schema {
        println!(
            "Target namespace: {}",
            manifest.target_namespace.as_deref().unwrap_or("(none)")
        );
    } else {
        println!("\n=== Namespaces ===");
        for uri in &manifest.namespace_uris {
            println!("  {}", uri);
        }
    }

    println!("\n=== Imports ===");
    for (namespace, location) in &manifest.imports {
        let namespace = if namespace.is_empty() { "(no namespace)" } else { namespace };
        println!("  {} -> {}", namespace, location);
    }

    println!("\n=== Includes ===");
    for (reference, location) in &manifest.includes {
        println!("  {} -> {}", reference, location);
    }

    println!("\nReferences only local: {}", manifest.references_only_local);
}

/// Prints each tokenizer event with the character offset it starts at
#[cfg(feature = "cli")]
struct TokenPrinter;

#[cfg(feature = "cli")]
impl TokenPrinter {
    fn print(src: &dyn CharSource, event: &str) {
        println!("{:>8}  {}", src.position(), event);
    }
}

#[cfg(feature = "cli")]
impl TokenHandler for TokenPrinter {
    fn comment(&mut self, src: &mut dyn CharSource, len: usize) -> xsd_catalog::Result<bool> {
        let position = src.position();
        let text = src.read_string(len)?;
        println!("{:>8}  {:<18} {:?}", position, "comment", text);
        Ok(true)
    }

    fn doctype(&mut self, src: &mut dyn CharSource, len: usize) -> xsd_catalog::Result<bool> {
        Self::print(src, "doctype");
        src.skip(len)?;
        Ok(true)
    }

    fn start_declaration(
        &mut self,
        src: &mut dyn CharSource,
        name_len: usize,
    ) -> xsd_catalog::Result<bool> {
        let position = src.position();
        let name = src.read_string(name_len)?;
        println!("{:>8}  {:<18} {}", position, "start-declaration", name);
        Ok(true)
    }

    fn end_declaration(&mut self) -> xsd_catalog::Result<bool> {
        println!("{:>8}  end-declaration", "");
        Ok(true)
    }

    fn start_element(
        &mut self,
        src: &mut dyn CharSource,
        prefix_len: usize,
        local_len: usize,
    ) -> xsd_catalog::Result<bool> {
        let position = src.position();
        let name = src.read_string(prefix_len + local_len)?;
        println!("{:>8}  {:<18} {}", position, "start-element", name);
        Ok(true)
    }

    fn close_start_tag(&mut self) -> xsd_catalog::Result<bool> {
        println!("{:>8}  close-start-tag", "");
        Ok(true)
    }

    fn end_element(&mut self) -> xsd_catalog::Result<bool> {
        println!("{:>8}  end-element", "");
        Ok(true)
    }

    fn attribute(
        &mut self,
        src: &mut dyn CharSource,
        prefix_len: usize,
        local_len: usize,
        skip_len: usize,
        value_len: usize,
    ) -> xsd_catalog::Result<bool> {
        let position = src.position();
        let name = src.read_string(prefix_len + local_len)?;
        src.skip(skip_len)?;
        let value = src.read_string(value_len)?;
        println!("{:>8}  {:<18} {}={:?}", position, "attribute", name, value);
        Ok(true)
    }
}

#[cfg(feature = "cli")]
fn cmd_tokens(
    file: &str,
    mut limits: Limits,
    max_rewind: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let location = Location::parse(file)?;
    if let Some(max_rewind) = max_rewind {
        limits = limits.with_max_rewind(max_rewind);
    }
    let loader = Loader::new().with_limits(limits.clone());
    let input = loader.fetch(&location)?;

    Tokenizer::with_limits(&limits).tokenize(&mut RewindReader::new(input), &mut TokenPrinter)?;
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
