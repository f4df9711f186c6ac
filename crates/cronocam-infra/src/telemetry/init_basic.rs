use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "cronocam=info";

/// Initialize tracing to stderr, optionally as JSON lines.
///
/// `verbose` raises the default filter to debug; an explicit `RUST_LOG` always wins.
pub fn init_telemetry(verbose: bool, json: bool) -> anyhow::Result<()> {
    let default_filter = if verbose { "cronocam=debug" } else { DEFAULT_FILTER };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!(json, "Tracing initialized");
    Ok(())
}
