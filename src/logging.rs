//! Debug logging.
//!
//! Logs go to a file, never to the terminal being drawn on. Nothing is installed unless
//! `LINEKIT_DEBUG=1`.

use std::fs::File;
use std::io;
use std::sync::Mutex;

use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{env_config, EnvConfig};

/// Install the file subscriber described by `config`.
///
/// Returns `Ok(false)` when debug logging is disabled or a global subscriber already
/// exists, so calling it repeatedly is harmless.
pub fn init(config: &EnvConfig) -> io::Result<bool> {
    if !config.debug {
        return Ok(false);
    }
    let file = File::create(&config.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file));
    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok())
}

pub fn init_from_env() -> io::Result<bool> {
    init(env_config())
}

pub fn debug_redraw_enabled() -> bool {
    env_config().debug_redraw
}

/// Record one display redraw decision.
pub fn log_debug_redraw(reason: &str, previous_rows: usize, new_rows: usize, height: usize) {
    debug!(
        target: "linekit::redraw",
        reason,
        previous_rows,
        new_rows,
        height,
        "redraw"
    );
}
