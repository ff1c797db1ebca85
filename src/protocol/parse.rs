//! Outcome of incremental parsing.
//!
//! Parsers return `Result<Parse<T>>`: `Ok(Complete)`, `Ok(Incomplete)` or
//! `Err` for input that can never become valid.

/// Successful parse outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parse<T> {
    /// A value was parsed.
    Complete(T),
    /// More input is needed.
    Incomplete {
        /// Total number of bytes the parser expects to need, counted from the
        /// start of the buffer it was given. Callers may use it to pre-grow
        /// their staging buffer.
        hint: usize,
    },
}

impl<T> Parse<T> {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Parse::Complete(_))
    }

    /// The parsed value, if any.
    #[must_use]
    pub fn complete(self) -> Option<T> {
        match self {
            Parse::Complete(value) => Some(value),
            Parse::Incomplete { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parse<U> {
        match self {
            Parse::Complete(value) => Parse::Complete(f(value)),
            Parse::Incomplete { hint } => Parse::Incomplete { hint },
        }
    }
}
