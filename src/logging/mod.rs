// Diagnostic logging setup
//
// Logs go to stderr so they never interleave with the transcript on stdout.

use tracing_subscriber::EnvFilter;

/// Filter used when neither RUST_LOG nor --verbose says otherwise.
pub const DEFAULT_FILTER: &str = "warn";

/// Filter used with --verbose.
pub const VERBOSE_FILTER: &str = "warn,matetutor=debug";

/// Build the filter: `--verbose` wins, then `RUST_LOG`, then the default.
pub fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_FILTER);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbose: bool) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();

    if result.is_ok() {
        tracing::debug!(verbose, "Logging initialized");
    }
}
