// Log output setup

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "playlist_backup=info";

/// Install the global fmt subscriber. `RUST_LOG` wins over the default filter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A subscriber may already be installed (tests, embedding binaries)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
