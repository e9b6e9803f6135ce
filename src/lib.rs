//! Core library for instrument parameters.
//!
//! This library contains the parameter, function and sweep abstractions
//! used to drive laboratory instruments, together with the sync/async
//! execution bridge they are built on and a mock driver for testing. It is
//! used by the `daq-param` command-line tool and by the integration tests.
//!
//! The usual entry point is an [`Instrument`](instrument::Instrument) with
//! parameters added through a [`ParameterBuilder`](parameter::ParameterBuilder).

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod function;
pub mod instrument;
pub mod logging;
pub mod mock;
pub mod parameter;
pub mod ranges;
pub mod sweep_values;
pub mod sync_async;
pub mod validators;
pub mod value;

pub use error::{DaqError, DaqResult};
pub use function::{Function, FunctionBuilder};
pub use instrument::Instrument;
pub use parameter::{Parameter, ParameterBuilder};
pub use sweep_values::{AdaptiveSweep, Slice, Sweep, SweepValues};
pub use validators::Validator;
pub use value::Value;
