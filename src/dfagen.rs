// dfagen.rs - DFA subset construction.
//
// Every DFA state is identified by a TransitionSet. Starting from the
// entry sets, each state's outgoing character ranges are split into
// disjoint cells; every cell leads to the set of NFA transitions leaving
// the endpoints whose matcher accepts it. Equal successor sets share a
// DFA state; edges of one state are merged when their successor sets
// (and, for capture groups, the transitions themselves) agree.

use std::collections::{HashMap, VecDeque};

use bitflags::bitflags;
use log::{debug, trace};

use crate::cgtrans::*;
use crate::charclass::{partition, CodePointSet};
use crate::error::RegexError;
use crate::nfa::{Nfa, NfaStateFlags};
use crate::options::CompilerOptions;
use crate::regerror::TREGEX_ERR_TOO_BIG_DFA;
use crate::regint::*;
use crate::stateset::TransitionSet;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DfaStateFlags: u8 {
        const FINAL = 1 << 0;
        /// Final only at the end of the input (or its start, backwards).
        const ANCHORED_FINAL = 1 << 1;
    }
}

/// What kind of automaton to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DfaConfig {
    pub forward: bool,
    pub priority_sensitive: bool,
    pub track_capture_groups: bool,
    pub name: &'static str,
}

impl DfaConfig {
    /// Finds the end of the leftmost match.
    pub const FORWARD_SEARCH: DfaConfig = DfaConfig {
        forward: true,
        priority_sensitive: true,
        track_capture_groups: false,
        name: "forward",
    };

    /// Finds the start of a match from its end.
    pub const BACKWARD: DfaConfig = DfaConfig {
        forward: false,
        priority_sensitive: false,
        track_capture_groups: false,
        name: "backward",
    };

    /// Replays a match with capture group registers.
    pub const CAPTURE_GROUPS: DfaConfig = DfaConfig {
        forward: true,
        priority_sensitive: true,
        track_capture_groups: true,
        name: "capture groups",
    };

    /// Runs a reversed path trie, reporting pre-calculated results.
    pub const TRACE_FINDER: DfaConfig = DfaConfig {
        forward: true,
        priority_sensitive: false,
        track_capture_groups: false,
        name: "trace finder",
    };
}

// === DfaState ===

#[derive(Clone, Debug)]
pub struct DfaState {
    pub id: DfaStateId,
    pub flags: DfaStateFlags,
    /// Disjoint, parallel to `successors`.
    pub matchers: Vec<CodePointSet>,
    pub successors: Vec<DfaStateId>,
    /// Every range of `matchers` as `(lo, hi, edge)`, sorted by `lo`.
    ranges: Vec<(u32, u32, u16)>,
    /// The state loops to itself on everything except this character.
    pub find_single_char: Option<char>,
    pub pre_calc_unanchored: u8,
    pub pre_calc_anchored: u8,
    pub cg: Option<LazyTransition>,
}

impl DfaState {
    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags.contains(DfaStateFlags::FINAL)
    }

    #[inline]
    pub fn is_anchored_final(&self) -> bool {
        self.flags.contains(DfaStateFlags::ANCHORED_FINAL)
    }

    /// Index of the edge taken on `c`.
    #[inline]
    pub fn edge_for(&self, c: char) -> Option<usize> {
        let c = c as u32;
        let i = self.ranges.partition_point(|&(lo, _, _)| lo <= c);
        if i == 0 {
            return None;
        }
        let (_, hi, edge) = self.ranges[i - 1];
        (c <= hi).then_some(edge as usize)
    }

    #[inline]
    pub fn successor(&self, c: char) -> Option<DfaStateId> {
        self.edge_for(c).map(|e| self.successors[e])
    }
}

// === Dfa ===

#[derive(Clone, Debug)]
pub struct Dfa {
    pub config: DfaConfig,
    pub states: Vec<DfaState>,
    /// Per look-behind prefix offset. Backward automata use index 0 for a
    /// match that ends at the end of the input.
    pub anchored_entry: Vec<Option<DfaStateId>>,
    pub unanchored_entry: Vec<Option<DfaStateId>>,
    /// Capture group programs entering the entry states, parallel to the entries.
    pub anchored_entry_programs: Vec<Option<ProgramId>>,
    pub unanchored_entry_programs: Vec<Option<ProgramId>>,
    /// Where a backward run would continue through the look-behind prefix.
    pub backward_prefix_state: Option<DfaStateId>,
    pub cg: Option<CgPrograms>,
    pub prefix_length: usize,
    pub number_of_capture_groups: usize,
}

impl Dfa {
    #[inline]
    pub fn state(&self, id: DfaStateId) -> &DfaState {
        &self.states[id.index()]
    }

    pub fn number_of_states(&self) -> usize {
        self.states.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.states.iter().map(|s| s.successors.len()).sum()
    }

    pub fn is_forward(&self) -> bool {
        self.config.forward
    }

    pub fn tracks_capture_groups(&self) -> bool {
        self.cg.is_some()
    }
}

// ============================================================================
// DfaGenerator
// ============================================================================

/// Candidate edge of the state being expanded.
struct Edge {
    matcher: CodePointSet,
    successor: TransitionSet,
}

pub struct DfaGenerator<'a> {
    nfa: &'a Nfa,
    config: DfaConfig,
    states: Vec<DfaState>,
    sets: Vec<TransitionSet>,
    visited: HashMap<TransitionSet, DfaStateId>,
    worklist: VecDeque<DfaStateId>,
    cg: Option<CgTransitionCompiler>,
    max_size: usize,
}

/// Build the DFA of `nfa` for `config`.
pub fn create_dfa(nfa: &Nfa, config: DfaConfig, options: &CompilerOptions) -> Result<Dfa, RegexError> {
    DfaGenerator::new(nfa, config, options).generate()
}

impl<'a> DfaGenerator<'a> {
    pub fn new(nfa: &'a Nfa, config: DfaConfig, options: &CompilerOptions) -> Self {
        DfaGenerator {
            nfa,
            config,
            states: Vec::new(),
            sets: Vec::new(),
            visited: HashMap::new(),
            worklist: VecDeque::new(),
            cg: config.track_capture_groups.then(CgTransitionCompiler::new),
            max_size: options.get_max_dfa_size(),
        }
    }

    fn new_set(&self) -> TransitionSet {
        TransitionSet::new(self.config.forward, self.config.priority_sensitive)
    }

    /// Transitions a backward set may follow: never through the restart.
    fn backward_allowed(&self, t: TransitionId) -> bool {
        let source = self.nfa.transition(t).source;
        !self.nfa.state(source).flags.contains(NfaStateFlags::LOOP_BACK)
    }

    pub fn generate(mut self) -> Result<Dfa, RegexError> {
        let mut dfa = Dfa {
            config: self.config,
            states: Vec::new(),
            anchored_entry: Vec::new(),
            unanchored_entry: Vec::new(),
            anchored_entry_programs: Vec::new(),
            unanchored_entry_programs: Vec::new(),
            backward_prefix_state: None,
            cg: None,
            prefix_length: self.nfa.prefix_length,
            number_of_capture_groups: self.nfa.number_of_capture_groups,
        };

        if self.config.forward {
            for k in 0..self.nfa.anchored_entry.len() {
                let initial = self.nfa.anchored_entry[k];
                let (state, program) = self.create_entry(initial)?;
                dfa.anchored_entry.push(state);
                dfa.anchored_entry_programs.push(program);
                if let Some(&initial) = self.nfa.unanchored_entry.get(k) {
                    let (state, program) = self.create_entry(initial)?;
                    dfa.unanchored_entry.push(state);
                    dfa.unanchored_entry_programs.push(program);
                }
            }
        } else {
            let mut at_end = self.new_set();
            let list: Vec<TransitionId> = self
                .nfa
                .reverse_entry_transitions(true)
                .into_iter()
                .filter(|&t| self.backward_allowed(t))
                .collect();
            at_end.add_all_transitions(self.nfa, list);
            let mut inside = self.new_set();
            let list: Vec<TransitionId> = self
                .nfa
                .reverse_entry_transitions(false)
                .into_iter()
                .filter(|&t| self.backward_allowed(t))
                .collect();
            inside.add_all_transitions(self.nfa, list);
            let at_end = self.get_or_create(at_end)?;
            let inside = self.get_or_create(inside)?;
            dfa.anchored_entry.push(at_end);
            dfa.unanchored_entry.push(inside);
        }

        while let Some(id) = self.worklist.pop_front() {
            self.expand(id)?;
        }

        debug!(
            "{} DFA: {} states, {} edges",
            self.config.name,
            self.states.len(),
            self.states.iter().map(|s| s.successors.len()).sum::<usize>()
        );
        dfa.states = self.states;
        dfa.cg = self.cg.map(CgTransitionCompiler::finish);
        Ok(dfa)
    }

    fn create_entry(
        &mut self,
        initial: NfaStateId,
    ) -> Result<(Option<DfaStateId>, Option<ProgramId>), RegexError> {
        let mut set = self.new_set();
        set.add_all_transitions(self.nfa, self.nfa.state(initial).next.iter().copied());
        let program = match self.cg.as_mut() {
            Some(cg) if !set.is_empty() => Some(cg.compile_initial(self.nfa, &set)),
            _ => None,
        };
        Ok((self.get_or_create(set)?, program))
    }

    /// Empty sets are dead ends and get no state.
    fn get_or_create(&mut self, set: TransitionSet) -> Result<Option<DfaStateId>, RegexError> {
        if set.is_empty() {
            return Ok(None);
        }
        if let Some(&id) = self.visited.get(&set) {
            return Ok(Some(id));
        }
        if self.states.len() >= self.max_size {
            return Err(RegexError::size_limit(TREGEX_ERR_TOO_BIG_DFA, self.max_size));
        }
        if let Some(cg) = self.cg.as_mut() {
            cg.register_layout(&set)?;
        }
        let id = DfaStateId(self.states.len() as u16);
        let mut flags = DfaStateFlags::empty();
        if set.is_final() {
            flags |= DfaStateFlags::FINAL;
        }
        if set.is_anchored_final() {
            flags |= DfaStateFlags::ANCHORED_FINAL;
        }
        trace!("{} DFA state {}: {:?}", self.config.name, id, set);
        self.states.push(DfaState {
            id,
            flags,
            matchers: Vec::new(),
            successors: Vec::new(),
            ranges: Vec::new(),
            find_single_char: None,
            pre_calc_unanchored: set.pre_calc_unanchored_result(),
            pre_calc_anchored: set.pre_calc_anchored_result(),
            cg: None,
        });
        self.visited.insert(set.clone(), id);
        self.sets.push(set);
        self.worklist.push_back(id);
        Ok(Some(id))
    }

    /// NFA transitions that continue from `endpoint` after it consumed a character.
    fn continuations(&self, endpoint: NfaStateId) -> Vec<TransitionId> {
        let state = self.nfa.state(endpoint);
        if self.config.forward {
            state.next.to_vec()
        } else {
            state
                .prev
                .iter()
                .copied()
                .filter(|&t| self.backward_allowed(t))
                .collect()
        }
    }

    fn expand(&mut self, id: DfaStateId) -> Result<(), RegexError> {
        let edges = self.compute_edges(id);
        let mut matchers = Vec::with_capacity(edges.len());
        let mut successors = Vec::with_capacity(edges.len());
        let mut partial = Vec::new();
        for (i, edge) in edges.into_iter().enumerate() {
            let Some(target) = self.get_or_create(edge.successor.clone())? else {
                continue;
            };
            if let Some(cg) = self.cg.as_mut() {
                let source = &self.sets[id.index()];
                partial.push(cg.compile_partial(self.nfa, id, i, source, &edge.successor));
            }
            matchers.push(edge.matcher);
            successors.push(target);
        }

        if let Some(cg) = self.cg.as_mut() {
            let set = &self.sets[id.index()];
            let final_program = cg.compile_final(set);
            let anchored_program = cg.compile_anchored_final(set);
            let lazy = cg.create_lazy_transition(partial, final_program, anchored_program);
            self.states[id.index()].cg = Some(lazy);
        }

        let state = &mut self.states[id.index()];
        state.ranges = matchers
            .iter()
            .enumerate()
            .flat_map(|(e, m)| m.ranges().iter().map(move |&(lo, hi)| (lo, hi, e as u16)))
            .collect();
        state.ranges.sort_unstable_by_key(|&(lo, _, _)| lo);
        state.find_single_char = find_single_char(id, &matchers, &successors);
        state.matchers = matchers;
        state.successors = successors;
        Ok(())
    }

    /// Partition the endpoint matchers and merge equivalent cells.
    fn compute_edges(&self, id: DfaStateId) -> Vec<Edge> {
        let set = &self.sets[id.index()];
        let classes: Vec<&CodePointSet> = set
            .endpoints()
            .iter()
            .map(|&s| &self.nfa.state(s).matcher)
            .collect();
        let mut edges: Vec<Edge> = Vec::new();
        for cell in partition(&classes) {
            let mut successor = self.new_set();
            for &m in &cell.members {
                let list = self.continuations(set.endpoints()[m]);
                successor.add_all_transitions(self.nfa, list);
            }
            if successor.is_empty() {
                continue;
            }
            match edges
                .iter()
                .position(|e| self.can_merge(&e.successor, &successor))
            {
                Some(i) => edges[i].matcher = edges[i].matcher.union(&cell.set),
                None => edges.push(Edge {
                    matcher: cell.set,
                    successor,
                }),
            }
        }
        edges
    }

    fn can_merge(&self, a: &TransitionSet, b: &TransitionSet) -> bool {
        if a != b {
            return false;
        }
        if !self.config.track_capture_groups {
            return true;
        }
        let (ta, tb): (Vec<_>, Vec<_>) = (a.iter_with_finals().collect(), b.iter_with_finals().collect());
        ta.len() == tb.len()
            && ta.iter().zip(&tb).all(|(&x, &y)| {
                let (x, y) = (self.nfa.transition(x), self.nfa.transition(y));
                x.source == y.source && x.target == y.target && x.group_boundaries == y.group_boundaries
            })
    }
}

/// A state whose self loop covers everything but one character can skip
/// ahead to that character.
fn find_single_char(id: DfaStateId, matchers: &[CodePointSet], successors: &[DfaStateId]) -> Option<char> {
    let mut looping = CodePointSet::empty();
    for (m, &s) in matchers.iter().zip(successors) {
        if s == id {
            looping = looping.union(m);
        }
    }
    if looping.is_empty() {
        return None;
    }
    looping.complement().single_char()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfagen::create_nfa;
    use crate::syntax::Pattern;
    use std::collections::BTreeSet;

    fn nfa_of(p: &Pattern) -> Nfa {
        let opts = CompilerOptions::default();
        let mut ast = p.to_ast(&opts).unwrap();
        ast.create_prefix().unwrap();
        create_nfa(&ast, &opts).unwrap()
    }

    fn dfa_of(nfa: &Nfa, config: DfaConfig) -> Dfa {
        create_dfa(nfa, config, &CompilerOptions::default()).unwrap()
    }

    /// Reference simulation: does some path from the anchored entry end
    /// in a final state after consuming all of `input`?
    fn nfa_accepts(nfa: &Nfa, input: &str) -> bool {
        let targets = |s: NfaStateId| -> Vec<NfaStateId> {
            nfa.state(s).next.iter().map(|&t| nfa.transition(t).target).collect()
        };
        let mut current: BTreeSet<NfaStateId> = targets(nfa.anchored_entry[0]).into_iter().collect();
        for c in input.chars() {
            let mut next = BTreeSet::new();
            for &s in &current {
                let state = nfa.state(s);
                if state.is_matcher() && state.matcher.contains_char(c) {
                    next.extend(targets(s));
                }
            }
            current = next;
        }
        current
            .iter()
            .any(|&s| nfa.state(s).is_final() || nfa.state(s).is_anchored_final())
    }

    fn dfa_accepts(dfa: &Dfa, input: &str) -> bool {
        let Some(mut state) = dfa.anchored_entry[0] else {
            return false;
        };
        for c in input.chars() {
            match dfa.state(state).successor(c) {
                Some(next) => state = next,
                None => return false,
            }
        }
        let s = dfa.state(state);
        s.is_final() || s.is_anchored_final()
    }

    fn samples() -> Vec<Pattern> {
        vec![
            Pattern::literal("abc"),
            Pattern::alt([Pattern::literal("a"), Pattern::literal("ab")]),
            Pattern::concat([Pattern::star(Pattern::class("ab")), Pattern::literal("b")]),
            Pattern::concat([
                Pattern::capture(Pattern::plus(Pattern::literal("a"))),
                Pattern::optional(Pattern::literal("b")),
                Pattern::Dollar,
            ]),
            Pattern::concat([Pattern::Caret, Pattern::star_lazy(Pattern::Any), Pattern::literal("c")]),
            Pattern::concat([
                Pattern::look_ahead(Pattern::literal("ab")),
                Pattern::class("ab"),
            ]),
        ]
    }

    #[test]
    fn subset_construction_agrees_with_nfa() {
        let inputs = ["", "a", "b", "ab", "abc", "aab", "ba", "cab", "abab", "aaab", "bbc"];
        for p in samples() {
            let nfa = nfa_of(&p);
            let dfa = dfa_of(&nfa, DfaConfig::TRACE_FINDER);
            for input in inputs {
                assert_eq!(
                    nfa_accepts(&nfa, input),
                    dfa_accepts(&dfa, input),
                    "pattern {:?} on {:?}",
                    p,
                    input
                );
            }
        }
    }

    #[test]
    fn construction_is_deterministic() {
        for p in samples() {
            let a = dfa_of(&nfa_of(&p), DfaConfig::FORWARD_SEARCH);
            let b = dfa_of(&nfa_of(&p), DfaConfig::FORWARD_SEARCH);
            assert_eq!(a.number_of_states(), b.number_of_states());
            assert_eq!(a.number_of_edges(), b.number_of_edges());
            for (x, y) in a.states.iter().zip(&b.states) {
                assert_eq!(x.matchers, y.matchers);
                assert_eq!(x.successors, y.successors);
            }
        }
    }

    #[test]
    fn capture_groups_keep_edges_apart() {
        // (a)|(b): both letters lead to an equal final-only set
        let p = Pattern::alt([
            Pattern::capture(Pattern::literal("a")),
            Pattern::capture(Pattern::literal("b")),
        ]);
        let nfa = nfa_of(&p);
        let plain = dfa_of(&nfa, DfaConfig::FORWARD_SEARCH);
        let cg = dfa_of(&nfa, DfaConfig::CAPTURE_GROUPS);
        let entry = |d: &Dfa| d.state(d.anchored_entry[0].unwrap()).successors.len();
        // plain: [ab] and the restart; capture groups: a, b and the restart
        assert_eq!(entry(&plain), 2);
        assert_eq!(entry(&cg), 3);
        let s = cg.state(cg.anchored_entry[0].unwrap());
        assert_eq!(s.successor('a'), s.successor('b'));
        assert_ne!(s.edge_for('a'), s.edge_for('b'));
    }

    #[test]
    fn priority_final_shadows_longer_alternative() {
        // a|ab: after 'a' the match is final and 'b' is never explored
        let p = Pattern::alt([Pattern::literal("a"), Pattern::literal("ab")]);
        let dfa = dfa_of(&nfa_of(&p), DfaConfig::FORWARD_SEARCH);
        let entry = dfa.state(dfa.anchored_entry[0].unwrap());
        let after_a = dfa.state(entry.successor('a').unwrap());
        assert!(after_a.is_final());
        assert_eq!(after_a.successor('b'), None);
    }

    #[test]
    fn backward_entries_start_at_finals() {
        let p = Pattern::concat([Pattern::literal("ab"), Pattern::Dollar]);
        let dfa = dfa_of(&nfa_of(&p), DfaConfig::BACKWARD);
        assert!(dfa.unanchored_entry[0].is_none());
        let at_end = dfa.state(dfa.anchored_entry[0].unwrap());
        let after_b = dfa.state(at_end.successor('b').unwrap());
        let after_a = dfa.state(after_b.successor('a').unwrap());
        assert!(after_a.is_final());
    }

    #[test]
    fn skip_ahead_hint_on_restart_state() {
        let p = Pattern::literal("x");
        let dfa = dfa_of(&nfa_of(&p), DfaConfig::FORWARD_SEARCH);
        let entry = dfa.unanchored_entry[0].unwrap();
        let restart = dfa.state(entry).successor('q').unwrap();
        assert_eq!(dfa.state(restart).find_single_char, Some('x'));
    }

    #[test]
    fn capture_programs_are_attached() {
        let p = Pattern::concat([
            Pattern::capture(Pattern::literal("a")),
            Pattern::optional(Pattern::capture(Pattern::literal("b"))),
        ]);
        let dfa = dfa_of(&nfa_of(&p), DfaConfig::CAPTURE_GROUPS);
        assert!(dfa.anchored_entry_programs[0].is_some());
        let programs = dfa.cg.as_ref().unwrap();
        assert!(programs.max_slots >= 2);
        for s in &dfa.states {
            let lazy = s.cg.as_ref().unwrap();
            assert_eq!(lazy.partial.len(), s.successors.len());
            assert_eq!(lazy.final_transition.is_some(), s.is_final());
        }
    }

    #[test]
    fn dfa_size_limit() {
        let nfa = nfa_of(&Pattern::literal("abcdef"));
        let opts = CompilerOptions::default().max_dfa_size(3);
        let err = create_dfa(&nfa, DfaConfig::FORWARD_SEARCH, &opts).unwrap_err();
        assert_eq!(err.code(), TREGEX_ERR_TOO_BIG_DFA);
    }
}
