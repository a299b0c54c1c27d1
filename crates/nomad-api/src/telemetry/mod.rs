//! Tracing subscriber setup

use nomad_core::Config;
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "nomad_api=debug,nomad_storage=debug,nomad_db=debug,tower_http=debug";

/// Install the global subscriber.
///
/// Console output is compact by default. `LOG_FORMAT=json`, or running in
/// production, switches to one JSON object per event.
pub fn init_tracing(config: &Config) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = match config.log_format() {
        Some(format) => format.eq_ignore_ascii_case("json"),
        None => config.is_production(),
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()?;
    } else {
        let console_fmt = tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        );
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .try_init()?;
    }

    tracing::info!(json, "Tracing initialized");
    Ok(())
}
