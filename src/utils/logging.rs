use crate::utils::config::LogSettings;
use std::str::FromStr;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Build the level filter: `RUST_LOG` first, then the configured level
pub fn level_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a console subscriber for the driver's `tracing` output
///
/// Fails instead of panicking when a global subscriber is already set, so
/// a host application that configured its own keeps it.
pub fn init_logging(settings: &LogSettings) -> Result<(), TryInitError> {
    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_file(settings.show_file_line)
        .with_line_number(settings.show_file_line)
        .with_target(settings.show_target)
        .with_ansi(settings.ansi_colors);

    tracing_subscriber::registry()
        .with(level_filter(settings))
        .with(console_layer)
        .try_init()?;

    tracing::debug!(level = %settings.level, "Logging initialized");
    Ok(())
}
