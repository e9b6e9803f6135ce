//! Custom error types for the crate.
//!
//! This module defines the primary error type, `DaqError`, used by every
//! parameter, function, sweep and device operation. Using the `thiserror`
//! crate, it provides a centralized and consistent way to report what went
//! wrong, and to let callers tell a rejected input apart from a device fault.
//!
//! ## Error Hierarchy
//!
//! - **`Validation`**: a value was rejected by a [`Validator`](crate::validators::Validator).
//!   Raised before any device interaction, so a rejected value never produces
//!   a partial write.
//! - **`CapabilityAbsent`**: a get/set variant (blocking or suspendable) was
//!   requested but is not available, either because it was never defined in
//!   that execution mode or because it has since been removed.
//! - **`NotImplemented`**: the object has no get (or set) capability at all.
//! - **`Arity`**: a function was called with the wrong number of arguments.
//! - **`Configuration`**: conflicting or missing construction parameters.
//! - **`DeviceProtocol`**: a command template could not be formatted, or a
//!   response could not be parsed.
//! - **`Instrument`**: the device (or its model) reported a failure.
//! - **`TypeMismatch`**: an argument of the wrong shape, e.g. combining sweep
//!   values of two different parameters.
//!
//! Device-side errors are propagated unchanged; this crate never retries.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type DaqResult<T> = std::result::Result<T, DaqError>;

/// Every failure this crate reports.
#[derive(Error, Debug)]
pub enum DaqError {
    /// A value was rejected by a validator.
    #[error("{value} is not a valid value for {target}: {reason}")]
    Validation {
        /// Rendered offending value.
        value: String,
        /// What was being validated (parameter name, argument position, ...).
        target: String,
        /// Validator description.
        reason: String,
    },

    /// The requested execution variant is not available.
    #[error("{owner} has no {capability}")]
    CapabilityAbsent {
        /// Name of the parameter, function or sweep.
        owner: String,
        /// Requested capability, e.g. `set_async`.
        capability: String,
    },

    /// Neither a blocking nor a suspendable form was configured.
    #[error("{0}")]
    NotImplemented(String),

    /// Wrong argument count for a function.
    #[error("{name} called with {got} parameters but requires {expected}")]
    Arity {
        /// Function name.
        name: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },

    /// Conflicting or missing construction parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Command formatting or response parsing failed.
    #[error("Device protocol error: {0}")]
    DeviceProtocol(String),

    /// The device reported a failure.
    #[error("Instrument error: {0}")]
    Instrument(String),

    /// Argument of an unsupported shape.
    #[error("Type error: {0}")]
    TypeMismatch(String),

    /// A parameter or function with this name already exists.
    #[error("Duplicate {kind} name {name}")]
    DuplicateName {
        /// `parameter` or `function`.
        kind: &'static str,
        /// Offending name.
        name: String,
    },

    /// No parameter or function with this name.
    #[error("{owner} has no {kind} named {name}")]
    UnknownName {
        /// Instrument name.
        owner: String,
        /// `parameter` or `function`.
        kind: &'static str,
        /// Requested name.
        name: String,
    },

    /// Settings could not be loaded.
    #[error("Configuration load error: {0}")]
    Config(#[from] figment::Error),

    /// I/O failure (runtime construction, files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scheduler failure inside the sync/async bridge.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl DaqError {
    /// Shorthand for [`DaqError::CapabilityAbsent`].
    pub fn capability_absent(owner: impl Into<String>, capability: impl Into<String>) -> Self {
        DaqError::CapabilityAbsent {
            owner: owner.into(),
            capability: capability.into(),
        }
    }

    /// True for errors raised before any device interaction could happen.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DaqError::Validation { .. }
                | DaqError::Arity { .. }
                | DaqError::Configuration(_)
                | DaqError::TypeMismatch(_)
        )
    }
}
