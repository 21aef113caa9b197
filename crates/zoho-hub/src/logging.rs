use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber; call once, at startup
///
/// `RUST_LOG` wins when set. Otherwise logs at info, or at debug for this
/// crate when `debug` is on.
pub fn init(debug: bool) {
    let default_filter = if debug { "info,zoho_hub=debug" } else { "info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
