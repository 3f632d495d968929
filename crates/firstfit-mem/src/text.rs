//! NUL-terminated text helpers.
//!
//! Text is a byte slice whose content ends at the first `0` byte. A slice
//! with no terminator is treated as text running to the end of the slice
//! by [`text_len`], but is rejected as a destination because there is no
//! terminator to append after.

use core::fmt;

/// Errors from the text helpers. The destination is left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextError {
    /// The destination slice holds no NUL terminator.
    Unterminated,
    /// The result (including its terminator) does not fit in the destination.
    DestinationTooSmall {
        /// Bytes required, terminator included.
        needed: usize,
        /// Bytes available in the destination slice.
        available: usize,
    },
}

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unterminated => write!(f, "destination text has no NUL terminator"),
            Self::DestinationTooSmall { needed, available } => {
                write!(
                    f,
                    "destination too small: needed {needed} bytes, available {available}"
                )
            }
        }
    }
}

impl core::error::Error for TextError {}

/// Number of bytes before the first NUL, or `s.len()` if there is none.
pub fn text_len(s: &[u8]) -> usize {
    s.iter().position(|&b| b == 0).unwrap_or(s.len())
}

/// Copy the text in `src` plus a terminator into `dst`.
///
/// Returns the length of the copied text (terminator excluded).
pub fn text_copy(dst: &mut [u8], src: &[u8]) -> Result<usize, TextError> {
    let len = text_len(src);
    let needed = len + 1;
    if needed > dst.len() {
        return Err(TextError::DestinationTooSmall {
            needed,
            available: dst.len(),
        });
    }
    crate::bytes::copy(dst, src, len);
    dst[len] = 0;
    Ok(len)
}

/// Append the text in `src` to the text already in `dst`.
///
/// Returns the length of the combined text (terminator excluded).
pub fn text_append(dst: &mut [u8], src: &[u8]) -> Result<usize, TextError> {
    let available = dst.len();
    let start = dst
        .iter()
        .position(|&b| b == 0)
        .ok_or(TextError::Unterminated)?;
    let written = text_copy(&mut dst[start..], src).map_err(|err| match err {
        TextError::DestinationTooSmall { needed, .. } => TextError::DestinationTooSmall {
            needed: start + needed,
            available,
        },
        other => other,
    })?;
    Ok(start + written)
}
