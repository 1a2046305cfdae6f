// options.rs - Compiler configuration.
// Ceilings applied while building the tree and the automata, and the
// switches that enable or disable optional compilation phases.

use crate::regint::*;

/// Settings for one compilation.
///
/// ```
/// use tregex::options::CompilerOptions;
///
/// let opts = CompilerOptions::default().max_dfa_size(100).trace_finder(false);
/// assert_eq!(opts.get_max_dfa_size(), 100);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerOptions {
    max_parse_tree_size: u32,
    max_capture_groups: u32,
    max_nfa_size: usize,
    max_dfa_size: usize,
    trace_finder: bool,
    trace_finder_max_paths: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            max_parse_tree_size: DEFAULT_MAX_PARSE_TREE_SIZE,
            max_capture_groups: DEFAULT_MAX_CAPTURE_GROUPS,
            max_nfa_size: DEFAULT_MAX_NFA_SIZE,
            max_dfa_size: DEFAULT_MAX_DFA_SIZE,
            trace_finder: true,
            trace_finder_max_paths: DEFAULT_TRACE_FINDER_MAX_PATHS,
        }
    }
}

impl CompilerOptions {
    /// Maximum number of syntax tree nodes.
    pub fn max_parse_tree_size(mut self, n: u32) -> Self {
        self.max_parse_tree_size = n;
        self
    }

    /// Maximum number of capture groups, including group 0.
    pub fn max_capture_groups(mut self, n: u32) -> Self {
        self.max_capture_groups = n.min(DEFAULT_MAX_CAPTURE_GROUPS);
        self
    }

    pub fn max_nfa_size(mut self, n: usize) -> Self {
        self.max_nfa_size = n;
        self
    }

    /// Maximum number of states per DFA; never above the 16 bit id space.
    pub fn max_dfa_size(mut self, n: usize) -> Self {
        self.max_dfa_size = n.min(MAX_DFA_STATE_ID);
        self
    }

    /// Enable the trace finder for loop-free patterns with capture groups.
    pub fn trace_finder(mut self, yes: bool) -> Self {
        self.trace_finder = yes;
        self
    }

    pub fn trace_finder_max_paths(mut self, n: usize) -> Self {
        self.trace_finder_max_paths = n;
        self
    }

    pub fn get_max_parse_tree_size(&self) -> u32 {
        self.max_parse_tree_size
    }

    pub fn get_max_capture_groups(&self) -> u32 {
        self.max_capture_groups
    }

    pub fn get_max_nfa_size(&self) -> usize {
        self.max_nfa_size
    }

    pub fn get_max_dfa_size(&self) -> usize {
        self.max_dfa_size
    }

    pub fn is_trace_finder_enabled(&self) -> bool {
        self.trace_finder
    }

    pub fn get_trace_finder_max_paths(&self) -> usize {
        self.trace_finder_max_paths
    }
}
