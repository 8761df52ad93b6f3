//! Producer Inputs
//!
//! An [`Input`] is the read-only view a downstream producer receives for
//! each of its dependencies. It points at the upstream node's stored
//! [`Output`]; it never holds a value or an error of its own.
//!
//! Producers are expected to check the state of an input before reading
//! it and to propagate upstream failures explicitly:
//!
//! ```rust
//! use producers_core::{Error, Input, Output};
//!
//! fn message_for_number(number: Input<i32>) -> Output<String> {
//!     match number.try_get() {
//!         Ok(number) => Output::value(format!("Hello world, number: {number}")),
//!         Err(cause) => Output::error(Error::caused_by("no number to print", cause)),
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use super::{Error, Output};

/// A read-only view of an upstream [`Output`].
pub struct Input<T> {
    output: Arc<Output<T>>,
}

impl<T> Input<T> {
    pub(crate) fn new(output: Arc<Output<T>>) -> Self {
        Self { output }
    }

    /// Whether the upstream producer yielded a value.
    pub fn is_value(&self) -> bool {
        self.output.is_value()
    }

    /// Whether the upstream producer failed.
    pub fn is_error(&self) -> bool {
        self.output.is_error()
    }

    /// The upstream value.
    ///
    /// Reading the value of a failed input is a programming error; check
    /// [`is_error`](Self::is_error) or use [`try_get`](Self::try_get).
    ///
    /// # Panics
    ///
    /// Panics with the rendered upstream error if the input is an error.
    pub fn get(&self) -> &T {
        match self.output.as_ref() {
            Output::Value(value) => value.get(),
            Output::Error(error) => panic!("value read from a failed input:\n{error}"),
        }
    }

    /// Checked access to the upstream value or error.
    pub fn try_get(&self) -> Result<&T, &Error> {
        self.output.as_result()
    }

    /// The upstream error, if there is one.
    pub fn error(&self) -> Option<&Error> {
        self.output.error_ref()
    }
}

impl<T> Clone for Input<T> {
    fn clone(&self) -> Self {
        Self {
            output: Arc::clone(&self.output),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.output).finish()
    }
}
