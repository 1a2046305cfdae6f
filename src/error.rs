// error.rs - Error type for regex compilation and matching.
//
// Groups the numeric error codes of regerror.rs into semantic variants
// while preserving the code for callers that want it.

use std::fmt;

use crate::regerror::*;

/// Error type for regex compilation and matching operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// The pattern uses a construct this engine cannot express as a DFA.
    UnsupportedConstruct { code: i32, message: String },
    /// A configured ceiling (tree, capture groups, NFA, DFA, registers) was exceeded.
    SizeLimit { code: i32, message: String },
    /// Invalid argument passed to a function.
    InvalidArgument,
    /// Other error not covered by specific variants.
    Other(i32),
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::UnsupportedConstruct { message, .. } => {
                write!(f, "unsupported construct: {}", message)
            }
            RegexError::SizeLimit { message, .. } => write!(f, "size limit: {}", message),
            RegexError::InvalidArgument => write!(f, "invalid argument"),
            RegexError::Other(code) => write!(f, "error code {}", code),
        }
    }
}

impl std::error::Error for RegexError {}

impl From<i32> for RegexError {
    fn from(code: i32) -> Self {
        match code {
            TREGEX_ERR_INVALID_ARGUMENT => RegexError::InvalidArgument,
            c if is_unsupported_error(c) => RegexError::UnsupportedConstruct {
                code: c,
                message: error_code_to_message(c).to_string(),
            },
            c if is_size_limit_error(c) => RegexError::SizeLimit {
                code: c,
                message: error_code_to_message(c).to_string(),
            },
            _ => RegexError::Other(code),
        }
    }
}

impl RegexError {
    /// Size-limit error carrying the ceiling that was hit.
    pub(crate) fn size_limit(code: i32, limit: usize) -> Self {
        RegexError::SizeLimit {
            code,
            message: format!("{} (limit {})", error_code_to_message(code), limit),
        }
    }

    /// Returns the numeric error code.
    pub fn code(&self) -> i32 {
        match self {
            RegexError::UnsupportedConstruct { code, .. } => *code,
            RegexError::SizeLimit { code, .. } => *code,
            RegexError::InvalidArgument => TREGEX_ERR_INVALID_ARGUMENT,
            RegexError::Other(code) => *code,
        }
    }
}
