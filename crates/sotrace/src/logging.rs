use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

pub const DEFAULT_LOG_FILTER: &str = "sotrace=info";

/// `RUST_LOG` wins over the default filter. Logs go to stderr so stdout stays
/// free for data.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = match format {
        LogFormat::Human => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
