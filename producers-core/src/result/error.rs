//! Producer Errors
//!
//! An [`Error`] is the failure half of an [`Output`](super::Output). It
//! carries a human-readable message and optionally the upstream error that
//! caused it, so a consumer that sees a failed input can report its own
//! failure without losing where the problem started.
//!
//! # Rendering
//!
//! `Display` renders the whole causal chain:
//!
//! ```text
//! Producer error with message:
//! <message>
//! Caused by:
//! Producer error with message:
//! <cause message>
//!
//! ```

use std::fmt;
use std::sync::Arc;

/// A failure record produced by a producer (or by the node running it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Error {
    message: String,

    /// A copy of the upstream error taken when chaining. Links further down
    /// the chain are shared with the upstream error rather than copied.
    cause: Option<Arc<Error>>,
}

impl Error {
    /// Create an error with the given message and no cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Create an error caused by another one.
    ///
    /// Typically used by a producer that received a failed
    /// [`Input`](super::Input) and propagates the failure downstream.
    pub fn caused_by(message: impl Into<String>, cause: &Error) -> Self {
        Self {
            message: message.into(),
            cause: Some(Arc::new(cause.clone())),
        }
    }

    /// The message of this error, without its causes.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error that caused this one, if any.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    /// Iterate over this error followed by each of its causes.
    pub fn chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |error| error.cause())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Producer error with message:")?;
        writeln!(f, "{}", self.message)?;
        if let Some(cause) = &self.cause {
            writeln!(f, "Caused by:")?;
            writeln!(f, "{cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_single_error() {
        let error = Error::new("disk on fire");
        assert_eq!(
            error.to_string(),
            "Producer error with message:\ndisk on fire\n"
        );
    }

    #[test]
    fn renders_full_causal_chain() {
        let root = Error::new("root");
        let middle = Error::caused_by("middle", &root);
        let top = Error::caused_by("top", &middle);

        assert_eq!(
            top.to_string(),
            "Producer error with message:\ntop\n\
             Caused by:\n\
             Producer error with message:\nmiddle\n\
             Caused by:\n\
             Producer error with message:\nroot\n\n\n"
        );
    }

    #[test]
    fn chain_walks_causes_in_order() {
        let root = Error::new("root");
        let top = Error::caused_by("top", &Error::caused_by("middle", &root));

        let messages: Vec<_> = top.chain().map(Error::message).collect();
        assert_eq!(messages, ["top", "middle", "root"]);
    }

    #[test]
    fn chaining_copies_the_cause_and_shares_deeper_links() {
        let middle = Error::caused_by("middle", &Error::new("root"));
        let first = Error::caused_by("first", &middle);
        let second = Error::caused_by("second", &middle);

        let (first_cause, second_cause) = (first.cause().unwrap(), second.cause().unwrap());
        assert_eq!(first_cause, &middle);
        assert!(!std::ptr::eq(first_cause, second_cause));
        assert!(std::ptr::eq(
            first_cause.cause().unwrap(),
            second_cause.cause().unwrap()
        ));
    }

    #[test]
    fn source_follows_cause() {
        use std::error::Error as _;

        let top = Error::caused_by("top", &Error::new("root"));
        let source = top.source().expect("cause should be exposed as source");
        assert!(source.to_string().contains("root"));
        assert!(Error::new("alone").source().is_none());
    }

    #[test]
    fn default_error_has_empty_message() {
        let error = Error::default();
        assert_eq!(error.message(), "");
        assert!(error.cause().is_none());
    }
}
