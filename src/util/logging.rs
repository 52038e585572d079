use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Default filter for the service binaries when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,actix_web=info";

/// Installs the global fmt subscriber shared by every binary.
///
/// `RUST_LOG` wins over `default_filter`. `LOG_FORMAT=compact` drops file/line
/// locations, which is friendlier for the one-shot `ingest` CLI.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let compact = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("compact"))
        .unwrap_or(false);

    let builder = SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(!compact);

    let res = if compact {
        builder.compact().try_init()
    } else {
        builder.with_line_number(true).with_file(true).try_init()
    };
    res.map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
