//! Bindery Check
//!
//! Loads a configuration, resolves its roots and reports the first error.
//!
//! Usage: `bindery-check <config.gin> --registry <manifest.yaml> [options]`

use bindery::{Error, FsLoader, OverrideKind, Registry};
use clap::Parser;
use std::fs;
use std::iter;
use std::path::PathBuf;
use std::process;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "bindery-check")]
#[command(about = "Resolve a binding configuration and report diagnostics")]
struct Args {
    /// Primary configuration file
    primary: String,

    /// Override file applied after the primary file (repeatable)
    #[arg(long = "config", value_name = "PATH")]
    overrides: Vec<String>,

    /// Direct `key = value` override applied after every file (repeatable)
    #[arg(long = "binding", value_name = "BINDING")]
    bindings: Vec<String>,

    /// YAML manifest describing the registered configurables
    #[arg(long, value_name = "MANIFEST")]
    registry: PathBuf,

    /// Directory searched for relative includes (repeatable)
    #[arg(long = "search-path", value_name = "DIR")]
    search_paths: Vec<PathBuf>,

    /// Configurable to construct, optionally `scope/symbol` (repeatable).
    /// Without any, bindings are only loaded and validated.
    #[arg(long = "root", value_name = "SYMBOL")]
    roots: Vec<String>,

    /// Print the operative config to stdout after resolving
    #[arg(long)]
    print_operative: bool,
}

fn main() {
    bindery_tools::init_logging();

    let args = Args::parse();

    let manifest = match fs::read_to_string(&args.registry) {
        Ok(text) => text,
        Err(e) => {
            error!(
                "Cannot read registry manifest '{}': {}",
                args.registry.display(),
                e
            );
            process::exit(1);
        }
    };

    let mut registry = Registry::new();
    if let Err(err) = registry.load_manifest(&manifest) {
        fail(&err);
    }
    info!("Registered {} configurables", registry.len());

    let loader = FsLoader::new().with_search_paths(&args.search_paths);
    let files = iter::once(args.primary.as_str()).chain(args.overrides.iter().map(String::as_str));
    let config =
        match bindery::parse_config_files_and_bindings(&registry, loader, files, &args.bindings) {
            Ok(config) => config,
            Err(err) => fail(&err),
        };

    info!(
        "Loaded {} bindings from {} sources",
        config.table().len(),
        config.store().sources().file_count()
    );
    for o in config.table().overrides() {
        let (Some(first), Some(last)) = (o.events.first(), o.winner()) else {
            continue;
        };
        match o.kind {
            OverrideKind::Conflicting => debug!(
                "{} overridden: {} ({}) -> {} ({})",
                o.key, first.value, first.origin, last.value, last.origin
            ),
            OverrideKind::Redundant => {
                warn!("{} re-bound to the same value at {}", o.key, last.origin)
            }
        }
    }

    if args.roots.is_empty() {
        info!("No roots given; bindings validated, nothing constructed");
        return;
    }

    let mut resolver = config.resolver();
    for root in &args.roots {
        let (scope, symbol) = bindery_tools::parse_root(root);
        if let Err(err) = resolver.resolve(&scope, symbol) {
            fail(&err);
        }
    }
    let graph = resolver.finish();

    info!(
        "Resolved {} roots into {} nodes",
        args.roots.len(),
        graph.len()
    );

    if args.print_operative {
        print!("{}", graph.operative_config());
    }
}

/// Log the error with its kind and location, then exit non-zero.
fn fail(err: &Error) -> ! {
    match err.location() {
        Some(location) => error!(kind = %err.kind(), %location, "{}", err),
        None => error!(kind = %err.kind(), "{}", err),
    }
    process::exit(1);
}
