// Logger initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "sealed_upload=info";

/// Pick the filter for the given verbosity flags.
///
/// `quiet` silences everything, `verbose` turns on debug output for this
/// crate; otherwise `RUST_LOG` wins over [`DEFAULT_FILTER`].
pub fn log_filter(quiet: bool, verbose: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("sealed_upload=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

pub fn init_logger(quiet: bool, verbose: bool) {
    tracing_subscriber::registry()
        .with(log_filter(quiet, verbose))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
