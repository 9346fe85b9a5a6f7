//! Logging setup using tracing.
//!
//! Diagnostics go to stderr; stdout is reserved for window snapshots so that
//! consumers can pipe it straight into a JSON parser.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the global tracing subscriber.
///
/// # Arguments
/// * `verbosity` - Number of `-v` flags passed (0=warn, 1=info, 2=debug, 3+=trace)
///
/// `RUST_LOG` directives are honored on top of the chosen level.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
