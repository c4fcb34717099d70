//! Logging setup for hive.
//!
//! All modules log through `tracing`. `init` installs a fmt subscriber that
//! writes to `~/.hive/hive.log` (truncated on startup), or to stderr when no
//! home directory is available.
//!
//! Debug mode can be enabled with `--debug` flag or `HIVE_DEBUG=1` env var.
//! `RUST_LOG` takes precedence over both when set.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Environment variable that enables debug logging.
pub const DEBUG_ENV: &str = "HIVE_DEBUG";

/// Check the debug env var.
pub fn debug_from_env() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Default filter directive for the given debug setting.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "hive=debug"
    } else {
        "hive=info"
    }
}

/// Path of the log file, if a home directory exists.
pub fn log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hive").join("hive.log"))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(debug: bool) {
    let verbose = debug || debug_from_env();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let file = log_path().and_then(|path| {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok()?;
        }
        File::create(&path).ok()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false);

    let installed = match file {
        Some(file) => builder.with_writer(Mutex::new(file)).try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(verbose, "logging initialized");
    }
}
