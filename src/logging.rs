use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing. Logs go to stderr so stdout stays scriptable.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("lead_tier=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lead_tier=info"))
    };

    // Ignore a subscriber that is already installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
