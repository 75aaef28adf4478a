use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
///
/// Log level is Debug in development builds and Info in production builds
fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "photomesh=debug,photomesh_lib=debug,info"
    } else {
        "info"
    }
}

/// Installs the global log backend
///
/// Records from the `log` facade are forwarded through tracing-subscriber's
/// log bridge and written to stderr, leaving stdout for command output.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));

    // A second init (e.g. from tests) leaves the first subscriber in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
