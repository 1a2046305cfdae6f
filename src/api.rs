// api.rs - Idiomatic Rust API for tregex.
//
// Wraps the compile pipeline and the executors with Rust-native types:
// Regex, RegexBuilder, Match, Captures, FindIter.

use std::ops::Range;

use crate::error::RegexError;
use crate::options::CompilerOptions;
use crate::regcomp::{compile, CompiledRegex};
use crate::regexec::{is_match_at, search, Region};
use crate::syntax::Pattern;

/// A compiled regular expression.
///
/// # Examples
///
/// ```
/// use tregex::api::Regex;
/// use tregex::syntax::Pattern;
///
/// // [0-9]+
/// let re = Regex::new(&Pattern::plus(Pattern::range('0', '9'))).unwrap();
/// assert!(re.is_match("hello 42"));
///
/// let m = re.find("hello 42").unwrap();
/// assert_eq!(m.as_str(), "42");
/// assert_eq!(m.start(), 6);
/// assert_eq!(m.end(), 8);
/// ```
pub struct Regex {
    inner: CompiledRegex,
}

impl Regex {
    /// Compile a pattern using default options.
    pub fn new(pattern: &Pattern) -> Result<Regex, RegexError> {
        Self::with_options(pattern, &CompilerOptions::default())
    }

    pub fn with_options(pattern: &Pattern, options: &CompilerOptions) -> Result<Regex, RegexError> {
        let inner = compile(pattern, options)?;
        Ok(Regex { inner })
    }

    /// Create a [`RegexBuilder`] for fine-grained control over compilation.
    pub fn builder(pattern: &Pattern) -> RegexBuilder {
        RegexBuilder::new(pattern)
    }

    /// Return the first match in `text`, or `None` if no match.
    pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        let region = search(&self.inner, text, 0)?;
        Match::from_region(text, &region, 0)
    }

    /// Return the first match starting at or after byte offset `start`.
    ///
    /// Characters before `start` are still visible to look-behind
    /// assertions. Fails if `start` is past the end of `text` or not on a
    /// character boundary.
    pub fn find_at<'t>(&self, text: &'t str, start: usize) -> Result<Option<Match<'t>>, RegexError> {
        check_start(text, start)?;
        Ok(search(&self.inner, text, start).and_then(|region| Match::from_region(text, &region, 0)))
    }

    /// Check whether `text` matches the pattern anywhere.
    pub fn is_match(&self, text: &str) -> bool {
        is_match_at(&self.inner, text, 0)
    }

    /// Return the first match with all capture groups, or `None`.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        let region = search(&self.inner, text, 0)?;
        Some(Captures { text, region })
    }

    /// Like [`Regex::captures`], starting at byte offset `start`.
    pub fn captures_at<'t>(&self, text: &'t str, start: usize) -> Result<Option<Captures<'t>>, RegexError> {
        check_start(text, start)?;
        Ok(search(&self.inner, text, start).map(|region| Captures { text, region }))
    }

    /// Iterate over all non-overlapping matches in `text`.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> FindIter<'r, 't> {
        FindIter {
            regex: self,
            text,
            last_end: 0,
            last_was_empty: false,
        }
    }

    /// Return the number of capture groups in the pattern (excluding group 0).
    pub fn captures_len(&self) -> usize {
        self.inner.number_of_capture_groups - 1
    }

    /// Access the compiled automata, e.g. for the dumps in [`crate::regdump`].
    pub fn as_compiled(&self) -> &CompiledRegex {
        &self.inner
    }
}

impl std::fmt::Debug for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regex")
            .field("strategy", &self.inner.strategy.name())
            .finish_non_exhaustive()
    }
}

fn check_start(text: &str, start: usize) -> Result<(), RegexError> {
    if start > text.len() || !text.is_char_boundary(start) {
        return Err(RegexError::InvalidArgument);
    }
    Ok(())
}

// === RegexBuilder ===

/// Builder for compiling a [`Regex`] with custom options.
///
/// # Examples
///
/// ```
/// use tregex::api::Regex;
/// use tregex::syntax::Pattern;
///
/// let re = Regex::builder(&Pattern::literal("hello"))
///     .max_dfa_size(64)
///     .build()
///     .unwrap();
/// assert!(re.is_match("say hello"));
/// ```
pub struct RegexBuilder {
    pattern: Pattern,
    options: CompilerOptions,
}

impl RegexBuilder {
    /// Create a new builder for the given pattern.
    pub fn new(pattern: &Pattern) -> Self {
        RegexBuilder {
            pattern: pattern.clone(),
            options: CompilerOptions::default(),
        }
    }

    /// Maximum number of syntax tree nodes.
    pub fn max_parse_tree_size(mut self, n: u32) -> Self {
        self.options = self.options.max_parse_tree_size(n);
        self
    }

    /// Maximum number of capture groups, including group 0.
    pub fn max_capture_groups(mut self, n: u32) -> Self {
        self.options = self.options.max_capture_groups(n);
        self
    }

    pub fn max_nfa_size(mut self, n: usize) -> Self {
        self.options = self.options.max_nfa_size(n);
        self
    }

    /// Maximum number of states of each DFA.
    pub fn max_dfa_size(mut self, n: usize) -> Self {
        self.options = self.options.max_dfa_size(n);
        self
    }

    /// Enable or disable the trace finder for loop-free patterns.
    pub fn trace_finder(mut self, yes: bool) -> Self {
        self.options = self.options.trace_finder(yes);
        self
    }

    pub fn trace_finder_max_paths(mut self, n: usize) -> Self {
        self.options = self.options.trace_finder_max_paths(n);
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile the pattern into a [`Regex`].
    pub fn build(self) -> Result<Regex, RegexError> {
        Regex::with_options(&self.pattern, &self.options)
    }
}

// === Match ===

/// A single match result referencing the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'t> {
    text: &'t str,
    start: usize,
    end: usize,
}

impl<'t> Match<'t> {
    fn from_region(text: &'t str, region: &Region, i: usize) -> Option<Self> {
        let range = region.get(i)?;
        Some(Match {
            text,
            start: range.start,
            end: range.end,
        })
    }

    /// Byte offset of the start of the match.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the match (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Byte range of the match.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The matched text.
    pub fn as_str(&self) -> &'t str {
        &self.text[self.start..self.end]
    }

    /// Returns the length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the match is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// === Captures ===

/// All capture groups from a single match.
///
/// Group 0 is the entire match. Groups 1..N are numbered by their opening
/// position in the pattern.
pub struct Captures<'t> {
    text: &'t str,
    region: Region,
}

impl<'t> Captures<'t> {
    /// Get capture group `i`, or `None` if the group did not participate.
    pub fn get(&self, i: usize) -> Option<Match<'t>> {
        Match::from_region(self.text, &self.region, i)
    }

    /// Number of capture groups (including group 0).
    pub fn len(&self) -> usize {
        self.region.num_regs()
    }

    /// Returns `true` if there are no capture groups (never the case for a match).
    pub fn is_empty(&self) -> bool {
        self.region.num_regs() == 0
    }

    /// Iterate over all capture groups.
    pub fn iter(&self) -> CapturesIter<'_, 't> {
        CapturesIter {
            captures: self,
            index: 0,
        }
    }
}

impl std::fmt::Debug for Captures<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for i in 0..self.len() {
            list.entry(&self.get(i).map(|m| m.range()));
        }
        list.finish()
    }
}

// === CapturesIter ===

/// Iterator over capture groups in a [`Captures`].
pub struct CapturesIter<'c, 't> {
    captures: &'c Captures<'t>,
    index: usize,
}

impl<'c, 't> Iterator for CapturesIter<'c, 't> {
    type Item = Option<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.captures.len() {
            return None;
        }
        let m = self.captures.get(self.index);
        self.index += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.captures.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CapturesIter<'_, '_> {}

// === FindIter ===

/// Iterator over all non-overlapping matches in a text.
pub struct FindIter<'r, 't> {
    regex: &'r Regex,
    text: &'t str,
    last_end: usize,
    last_was_empty: bool,
}

impl<'r, 't> Iterator for FindIter<'r, 't> {
    type Item = Match<'t>;

    fn next(&mut self) -> Option<Match<'t>> {
        loop {
            if self.last_end > self.text.len() {
                return None;
            }
            let region = search(&self.regex.inner, self.text, self.last_end)?;
            let m = Match::from_region(self.text, &region, 0)?;

            // An empty match right after the previous one: retry one
            // character further.
            if m.is_empty() && self.last_was_empty && m.start == self.last_end {
                let Some(c) = self.text[self.last_end..].chars().next() else {
                    return None;
                };
                self.last_end += c.len_utf8();
                self.last_was_empty = false;
                continue;
            }
            self.last_was_empty = m.is_empty();
            self.last_end = m.end;
            return Some(m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> Pattern {
        Pattern::plus(Pattern::range('0', '9'))
    }

    #[test]
    fn regex_new_and_find() {
        let re = Regex::new(&digits()).unwrap();
        let m = re.find("hello 42 world").unwrap();
        assert_eq!(m.as_str(), "42");
        assert_eq!(m.start(), 6);
        assert_eq!(m.end(), 8);
        assert_eq!(m.range(), 6..8);
        assert_eq!(m.len(), 2);
        assert!(!m.is_empty());
    }

    #[test]
    fn regex_no_match() {
        let re = Regex::new(&digits()).unwrap();
        assert!(re.find("no digits here").is_none());
    }

    #[test]
    fn regex_is_match() {
        let re = Regex::new(&Pattern::literal("hello")).unwrap();
        assert!(re.is_match("say hello"));
        assert!(!re.is_match("say goodbye"));
    }

    #[test]
    fn regex_captures() {
        let d = || Pattern::range('0', '9');
        // (dddd)-(dd)-(dd)
        let p = Pattern::concat([
            Pattern::capture(Pattern::concat([d(), d(), d(), d()])),
            Pattern::Char('-'),
            Pattern::capture(Pattern::concat([d(), d()])),
            Pattern::Char('-'),
            Pattern::capture(Pattern::concat([d(), d()])),
        ]);
        let re = Regex::new(&p).unwrap();
        let caps = re.captures("date: 2026-02-14").unwrap();
        assert_eq!(caps.get(0).unwrap().as_str(), "2026-02-14");
        assert_eq!(caps.get(1).unwrap().as_str(), "2026");
        assert_eq!(caps.get(2).unwrap().as_str(), "02");
        assert_eq!(caps.get(3).unwrap().as_str(), "14");
        assert!(caps.get(4).is_none());
        assert_eq!(caps.len(), 4);
    }

    #[test]
    fn regex_captures_len() {
        let p = Pattern::concat([
            Pattern::capture(Pattern::Char('a')),
            Pattern::capture(Pattern::Char('b')),
            Pattern::capture(Pattern::Char('c')),
        ]);
        assert_eq!(Regex::new(&p).unwrap().captures_len(), 3);
    }

    #[test]
    fn regex_find_iter() {
        let re = Regex::new(&digits()).unwrap();
        let matches: Vec<&str> = re.find_iter("1 + 22 = 333").map(|m| m.as_str()).collect();
        assert_eq!(matches, vec!["1", "22", "333"]);
    }

    #[test]
    fn regex_find_at() {
        let re = Regex::new(&Pattern::literal("ab")).unwrap();
        assert_eq!(re.find_at("abab", 1).unwrap().unwrap().start(), 2);
        assert!(re.find_at("abab", 3).unwrap().is_none());
        assert_eq!(re.find_at("ab", 3).unwrap_err(), RegexError::InvalidArgument);
        assert_eq!(re.find_at("é", 1).unwrap_err(), RegexError::InvalidArgument);
    }

    #[test]
    fn regex_builder_limits() {
        let err = Regex::builder(&Pattern::literal("abcdef"))
            .max_dfa_size(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, RegexError::SizeLimit { .. }));
    }

    #[test]
    fn captures_iter() {
        let p = Pattern::concat([
            Pattern::capture(Pattern::Char('a')),
            Pattern::optional(Pattern::capture(Pattern::Char('b'))),
        ]);
        let re = Regex::new(&p).unwrap();
        let caps = re.captures("a").unwrap();
        let items: Vec<_> = caps.iter().collect();
        // group 0 = "a", group 1 = "a", group 2 = None (didn't participate)
        assert_eq!(items.len(), 3);
        assert!(items[0].is_some());
        assert!(items[1].is_some());
        assert!(items[2].is_none());
    }

    #[test]
    fn empty_match_find_iter() {
        let re = Regex::new(&Pattern::concat([])).unwrap();
        let matches: Vec<_> = re.find_iter("ab").collect();
        // Should yield empty matches at positions 0, 1, 2
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].start(), 0);
        assert_eq!(matches[1].start(), 1);
        assert_eq!(matches[2].start(), 2);
    }

    #[test]
    fn regex_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Regex>();
    }
}
