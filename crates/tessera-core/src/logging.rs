use tracing_subscriber::EnvFilter;

/// Default filter: everything from Tessera, only the noisy GPU crates at `info`.
pub const DEFAULT_FILTER: &str = "trace,wgpu_core=info,wgpu_hal=info,naga=info";

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over [`DEFAULT_FILTER`] when set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Install the global fmt subscriber with an explicit filter directive.
///
/// Returns `false` when a global subscriber is already installed, which is
/// common in test binaries that call this more than once.
pub fn try_init_with_filter(filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .try_init()
        .is_ok()
}
