//! Logging setup
//!
//! The engine logs through `tracing`. Hosts that don't install their own
//! subscriber can call [`init`]; `FOXHOUND_LOG` overrides the filter.

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive
const LOG_ENV: &str = "FOXHOUND_LOG";

/// Install a fmt subscriber at `log_level` for this crate
///
/// Does nothing if a global subscriber is already installed.
pub fn init(log_level: &str) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("foxhound_preview={}", log_level)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        info!("Preview logging initialized at level {}", log_level);
    }
}
