//! Explicit logging setup, called once by `main` before any discovery.
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// Install the stderr subscriber. Later calls are no-ops.
///
/// `RUST_LOG` wins over the `verbose` default when set.
pub fn init(verbose: bool) {
    INIT_ONCE.call_once(|| {
        let default = if verbose { "refnorm=debug" } else { "refnorm=info" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        // A subscriber installed elsewhere (tests) keeps precedence.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
