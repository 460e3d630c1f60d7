//! Bindery Tools
//!
//! CLI tools for checking and resolving binding configurations.

use bindery::ScopePath;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `info` for bindery crates and `warn` for others. Logs go to
/// stderr so stdout stays clean for the operative config.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,bindery=info,bindery_tools=info,bindery_check=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Split a `--root` argument into scope and symbol.
///
/// `train/utils.DatasetConfig` is scoped to `train`; a bare symbol is unscoped.
pub fn parse_root(root: &str) -> (ScopePath, &str) {
    match root.rsplit_once('/') {
        Some((scope, symbol)) => (ScopePath::parse(scope), symbol),
        None => (ScopePath::root(), root),
    }
}
