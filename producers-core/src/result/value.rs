//! Immutable holder for a successfully produced value.

/// A value produced by a producer.
///
/// Created once when the producer returns, read-only thereafter. The
/// [`Output`](super::Output) holding it owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value<T> {
    content: T,
}

impl<T> Value<T> {
    /// Wrap a produced value.
    pub fn new(content: T) -> Self {
        Self { content }
    }

    /// Borrow the produced value.
    pub fn get(&self) -> &T {
        &self.content
    }

    /// Unwrap the produced value.
    pub fn into_inner(self) -> T {
        self.content
    }
}

impl<T> From<T> for Value<T> {
    fn from(content: T) -> Self {
        Self::new(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_exposes_content() {
        let value = Value::new(vec![1, 2, 3]);
        assert_eq!(value.get(), &vec![1, 2, 3]);
        assert_eq!(value.into_inner(), vec![1, 2, 3]);
    }
}
