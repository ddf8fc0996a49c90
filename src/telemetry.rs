use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Initialize tracing subscribers and output. The coordinator never calls this itself, it exists
/// so that embedding workers and tests have an easy way to see the diagnostics [crate::TracingSink]
/// produces. Respects `RUST_LOG`, defaulting to `info`. Calling it more than once is harmless.
pub fn tracing_init() {
    TRACING_INIT.get_or_init(|| {
        let filter_layer = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        // Someone else may already own the global subscriber, which is fine
        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    });
}
