//! Incremental UTF-8 validation for fragmented text messages.
//!
//! A multi-byte character may be split across two fragments; the trailing
//! bytes of one fragment are carried over and checked together with the
//! start of the next.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Incremental UTF-8 validator.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    /// Bytes of a sequence cut off at the end of the previous fragment.
    incomplete: [u8; 4],
    incomplete_len: usize,
}

impl Utf8Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next fragment.
    ///
    /// A non-final fragment may end in the middle of a character; the final
    /// fragment must not.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` on the first invalid sequence.
    pub fn validate(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        let check_data: Cow<'_, [u8]> = if self.incomplete_len > 0 {
            let mut combined = Vec::with_capacity(self.incomplete_len + data.len());
            combined.extend_from_slice(&self.incomplete[..self.incomplete_len]);
            combined.extend_from_slice(data);
            Cow::Owned(combined)
        } else {
            Cow::Borrowed(data)
        };
        self.incomplete_len = 0;

        match std::str::from_utf8(&check_data) {
            Ok(_) => Ok(()),
            // error_len() is None only for a truncated sequence at the very end
            Err(e) if !is_final && e.error_len().is_none() => {
                let remaining = &check_data[e.valid_up_to()..];
                self.incomplete[..remaining.len()].copy_from_slice(remaining);
                self.incomplete_len = remaining.len();
                Ok(())
            }
            Err(_) => Err(Error::InvalidUtf8),
        }
    }

    pub fn reset(&mut self) {
        self.incomplete_len = 0;
    }

    /// Check if there are pending incomplete bytes.
    pub fn has_incomplete(&self) -> bool {
        self.incomplete_len > 0
    }
}

/// Validate a complete, unfragmented payload.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    std::str::from_utf8(data)
        .map(|_| ())
        .map_err(|_| Error::InvalidUtf8)
}
