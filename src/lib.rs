//! # tregex
//!
//! Compiles regular expression syntax trees into deterministic automata,
//! with [`memchr`](https://crates.io/crates/memchr)-accelerated search.
//!
//! A pattern is lowered into an arena syntax tree, turned into an NFA with
//! prioritized transitions and capture boundary annotations, and then into
//! DFAs by priority-sensitive subset construction. Capture groups are
//! tracked by register programs attached to DFA edges; the programs move
//! register rows by reordering and copy only where a row must be shared.
//! Loop-free patterns skip the registers entirely and look up one of a
//! few pre-calculated capture layouts instead.
//!
//! ## Quick Start
//!
//! ```rust
//! use tregex::prelude::*;
//!
//! // ([0-9]+)-([0-9]+)
//! let digits = || Pattern::capture(Pattern::plus(Pattern::range('0', '9')));
//! let re = Regex::new(&Pattern::concat([digits(), Pattern::Char('-'), digits()])).unwrap();
//! let caps = re.captures("page 12-345").unwrap();
//! assert_eq!(caps.get(0).unwrap().as_str(), "12-345");
//! assert_eq!(caps.get(2).unwrap().as_str(), "345");
//! ```
//!
//! For fine-grained control, use [`RegexBuilder`](api::RegexBuilder):
//!
//! ```rust
//! use tregex::prelude::*;
//!
//! let re = Regex::builder(&Pattern::literal("hello"))
//!     .max_dfa_size(100)
//!     .trace_finder(false)
//!     .build()
//!     .unwrap();
//! assert!(re.is_match("say hello"));
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`syntax`] | Structured pattern description and lowering |
//! | [`regast`] | Syntax tree store, analysis, look-behind prefix |
//! | [`nfa`], [`nfagen`] | NFA and its construction |
//! | [`stateset`] | Transition sets, the subset construction key |
//! | [`dfagen`] | DFA subset construction |
//! | [`cgtrans`] | Capture group register programs |
//! | [`tracefinder`] | Pre-calculated capture layouts |
//! | [`regcomp`] | Compile pipeline |
//! | [`regexec`] | Automaton execution |
//! | [`regdump`] | Graphviz and tree dumps |
//! | [`charclass`] | Code point sets and range partitioning |
//! | [`regint`] | Identifiers, bit sets, limits |
//! | [`options`] | Compiler options |
//! | [`error`], [`regerror`] | Error type and codes |
//! | [`api`] | `Regex`, `Match`, `Captures` |

pub mod api;
pub mod cgtrans;
pub mod charclass;
pub mod dfagen;
pub mod error;
pub mod nfa;
pub mod nfagen;
pub mod options;
pub mod prelude;
pub mod regast;
pub mod regcomp;
pub mod regdump;
pub mod regerror;
pub mod regexec;
pub mod regint;
pub mod stateset;
pub mod syntax;
pub mod tracefinder;
