//! Engine error type
//!
//! Every fatal condition in the engine is reported through [`EngineError`].
//! Usage and resource-load failures carry the name of the object that raised
//! them, the operation that failed and a human readable constraint, and are
//! written to the log before they are returned.

use thiserror::Error;

use crate::config::ConfigError;

/// Engine-wide error
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid argument or configuration detected at construction or call time
    #[error("Object [{object}] threw exception from function [{function}] with message [{message}].")]
    Usage {
        /// Name of the object that rejected the call
        object: String,
        /// Operation that failed
        function: &'static str,
        /// Constraint description
        message: String,
    },

    /// A shader, texture or framebuffer could not be created
    #[error("Object [{object}] failed to load resource in function [{function}] with message [{message}].")]
    ResourceLoad {
        /// Name of the object that was loading
        object: String,
        /// Operation that failed
        function: &'static str,
        /// Driver or decoder diagnostic
        message: String,
    },

    /// Window system failure
    #[error("Window error: {0}")]
    Window(String),

    /// Configuration file failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Log and build a usage error
    pub fn usage(object: impl Into<String>, function: &'static str, message: impl Into<String>) -> Self {
        let object = object.into();
        let message = message.into();
        log::error!(target: "ember_engine", "[{}] {}: {}", object, function, message);
        Self::Usage { object, function, message }
    }

    /// Log and build a resource-load error
    pub fn resource(object: impl Into<String>, function: &'static str, message: impl Into<String>) -> Self {
        let object = object.into();
        let message = message.into();
        log::error!(target: "ember_engine", "[{}] {}: {}", object, function, message);
        Self::ResourceLoad { object, function, message }
    }
}

/// Fail with a usage error unless `condition` holds
///
/// Used by setters that validate numeric ranges.
pub(crate) fn ensure(
    condition: bool,
    object: &str,
    function: &'static str,
    message: &str,
) -> EngineResult<()> {
    if condition {
        Ok(())
    } else {
        Err(EngineError::usage(object, function, message))
    }
}
