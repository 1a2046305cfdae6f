// prelude.rs - Convenient re-exports for the idiomatic API.
//
//! # Prelude
//!
//! ```
//! use tregex::prelude::*;
//!
//! let re = Regex::new(&Pattern::plus(Pattern::range('0', '9'))).unwrap();
//! let m = re.find("answer: 42").unwrap();
//! assert_eq!(m.as_str(), "42");
//! ```

pub use crate::api::{Captures, CapturesIter, FindIter, Match, Regex, RegexBuilder};
pub use crate::error::RegexError;
pub use crate::options::CompilerOptions;
pub use crate::syntax::{Pattern, RepeatKind};
