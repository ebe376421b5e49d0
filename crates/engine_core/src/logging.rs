// crates/engine_core/src/logging.rs

use std::str::FromStr;

use tracing::Level;

/// Installs the global fmt subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, embedders),
/// which is not an error.
pub fn init(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_thread_names(true)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Parses `error|warn|info|debug|trace` (case-insensitive).
pub fn parse_level(name: &str) -> Option<Level> {
    Level::from_str(name).ok()
}
