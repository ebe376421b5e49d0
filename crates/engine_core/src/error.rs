// crates/engine_core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while bringing the engine up, running it, or
/// tearing it down.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A subsystem or a required plugin could not be initialised. Fatal.
    #[error("failed to start {subsystem}: {reason}")]
    StartupFailure {
        subsystem: &'static str,
        reason: String,
    },

    /// A module could not be located or mapped.
    #[error("failed to load module '{name}': {reason}")]
    PluginLoad { name: String, reason: String },

    #[error("subsystem {0} is not live")]
    SubsystemNotLive(&'static str),

    #[error("subsystem {0} is not part of the declared start order")]
    UnknownSubsystem(&'static str),

    #[error("nothing is registered under '{0}'")]
    UnknownFactory(String),

    #[error("no resource named '{0}'")]
    UnknownResource(String),

    #[error("resource '{name}' is a {stored}, not a {requested}")]
    ResourceType {
        name: String,
        stored: &'static str,
        requested: &'static str,
    },

    #[error("the core thread terminated unexpectedly")]
    CoreThreadTerminated,

    #[error("the thread pool is not running")]
    ThreadPoolStopped,

    #[error("gpu program language '{0}' is not supported by the active render system")]
    UnsupportedGpuProgram(String),

    #[error("failed to import {}: {reason}", path.display())]
    Import { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn startup(subsystem: &'static str, reason: impl Into<String>) -> Self {
        EngineError::StartupFailure {
            subsystem,
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
