//! Producer Outputs
//!
//! An [`Output`] is what running one producer yields: exactly one of a
//! [`Value`] or an [`Error`]. Once a node stores it, it never changes.
//!
//! Producers usually build outputs through the constructors or from a
//! `Result`:
//!
//! ```rust
//! use producers_core::{Error, Output};
//!
//! let ok: Output<i32> = Output::value(7);
//! let failed: Output<i32> = Output::error(Error::new("no number today"));
//! let from_result: Output<i32> = Ok::<_, Error>(3).into();
//!
//! assert!(ok.is_value());
//! assert!(failed.is_error());
//! assert_eq!(*from_result.get(), 3);
//! ```

use std::sync::Arc;

use super::{Error, Input, Value};

/// The immutable result of running a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output<T> {
    /// The producer succeeded.
    Value(Value<T>),

    /// The producer failed, or panicked and the node converted the panic.
    Error(Error),
}

impl<T> Output<T> {
    /// A successful output.
    pub fn value(content: T) -> Self {
        Self::Value(Value::new(content))
    }

    /// A failed output.
    pub fn error(error: Error) -> Self {
        Self::Error(error)
    }

    /// Whether this output holds a value.
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Whether this output holds an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The produced value.
    ///
    /// This must only be called if [`is_value`](Self::is_value) returns
    /// true.
    ///
    /// # Panics
    ///
    /// Panics with the rendered error if this output holds an error.
    pub fn get(&self) -> &T {
        match self {
            Self::Value(value) => value.get(),
            Self::Error(error) => panic!("value read from a failed output:\n{error}"),
        }
    }

    /// The error, if this output holds one.
    pub fn error_ref(&self) -> Option<&Error> {
        match self {
            Self::Value(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    /// Checked access to either side.
    pub fn as_result(&self) -> Result<&T, &Error> {
        match self {
            Self::Value(value) => Ok(value.get()),
            Self::Error(error) => Err(error),
        }
    }

    /// Convert into a plain `Result`.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Value(value) => Ok(value.into_inner()),
            Self::Error(error) => Err(error),
        }
    }

    /// A read-only view of this output for a downstream producer.
    ///
    /// The view shares the storage of the output rather than copying it,
    /// and stays valid for as long as the view itself lives.
    pub fn as_input(self: &Arc<Self>) -> Input<T> {
        Input::new(Arc::clone(self))
    }
}

impl<T> From<Result<T, Error>> for Output<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(content) => Self::value(content),
            Err(error) => Self::error(error),
        }
    }
}

impl<T> From<Error> for Output<T> {
    fn from(error: Error) -> Self {
        Self::error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_output_predicates() {
        let output = Output::value(42);
        assert!(output.is_value());
        assert!(!output.is_error());
        assert_eq!(*output.get(), 42);
        assert!(output.error_ref().is_none());
    }

    #[test]
    fn error_output_predicates() {
        let output: Output<i32> = Output::error(Error::new("boom"));
        assert!(output.is_error());
        assert!(!output.is_value());
        assert_eq!(output.error_ref().map(Error::message), Some("boom"));
        assert!(output.as_result().is_err());
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn get_on_error_panics_with_message() {
        let output: Output<i32> = Output::error(Error::new("boom"));
        output.get();
    }

    #[test]
    fn converts_from_result() {
        let ok: Output<&str> = Ok("fine").into();
        let failed: Output<&str> = Err(Error::new("bad")).into();

        assert_eq!(ok.into_result(), Ok("fine"));
        assert_eq!(failed.into_result(), Err(Error::new("bad")));
    }

    #[test]
    fn input_view_shares_storage() {
        let output = Arc::new(Output::value(String::from("shared")));
        let input = output.as_input();

        assert!(input.is_value());
        assert!(std::ptr::eq(input.get(), output.get()));
    }
}
