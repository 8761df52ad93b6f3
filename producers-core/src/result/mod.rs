//! Result Model
//!
//! The typed containers passed between producers:
//!
//! - [`Value`]: an immutable, successfully produced value
//! - [`Error`]: a failure message with an optional causal chain
//! - [`Output`]: what a producer returns, exactly one of value or error
//! - [`Input`]: the read-only view of an upstream output handed to a
//!   downstream producer
//!
//! # Ownership
//!
//! The node that ran a producer owns its output for the lifetime of the
//! graph. Inputs are views onto that storage; they are cheap to clone and
//! never copy the underlying value.

mod error;
mod input;
mod output;
mod value;

pub use error::Error;
pub use input::Input;
pub use output::Output;
pub use value::Value;
