use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Initialize logging for embedders and test binaries.
///
/// The library itself only emits `tracing` events under the
/// `fieldwright` target and never installs a subscriber on its own. This
/// helper wires a stdout subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Calling it more than once is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
