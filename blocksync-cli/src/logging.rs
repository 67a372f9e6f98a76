//! Log output for the command-line tool.
//!
//! Events go to stderr so stdout stays clean for reports and JSON.
//! `BLOCKSYNC_LOG` takes an `EnvFilter` directive; without it the level is
//! `warn`, or `debug` when `NOTION_DEBUG=1`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "BLOCKSYNC_LOG";
pub const DEBUG_ENV: &str = "NOTION_DEBUG";

pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_level() -> &'static str {
    if std::env::var(DEBUG_ENV).is_ok_and(|value| value == "1") {
        "debug"
    } else {
        "warn"
    }
}
