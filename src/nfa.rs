// nfa.rs - Non-deterministic automaton.
// States, prioritized transitions and the capture boundary descriptors
// they carry. Built by nfagen.rs and tracefinder.rs, consumed by the
// DFA builder and the debug dumps.

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::charclass::CodePointSet;
use crate::regint::*;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NfaStateFlags: u8 {
        /// Consumes a look-behind prefix character.
        const PREFIX = 1 << 0;
        /// The lowest priority restart of an unanchored search.
        const LOOP_BACK = 1 << 1;
        /// Has pending look-ahead threads.
        const LOOK_AHEAD = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NfaStateKind {
    /// Entry point; consumes nothing.
    Initial { anchored: bool },
    /// Consumes one character out of `matcher`.
    Matcher,
    Final,
    /// Final only at the end of the input.
    AnchoredFinal,
}

// === GroupBoundaries ===

/// Capture boundary indices stamped or reset when a transition fires.
/// Boundary `2g` is the start of group `g`, `2g + 1` its end.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupBoundaries {
    updates: CompactBitSet,
    clears: CompactBitSet,
}

impl GroupBoundaries {
    pub fn new() -> Self {
        GroupBoundaries::default()
    }

    /// Stamp `index` with the current position; overrides an earlier clear.
    pub fn set_update(&mut self, index: usize) {
        self.updates.insert(index);
        self.clears.remove(index);
    }

    /// Reset `index`; overrides an earlier update.
    pub fn set_clear(&mut self, index: usize) {
        self.clears.insert(index);
        self.updates.remove(index);
    }

    /// Combine the boundaries of threads that fire in the same step.
    pub fn merge(&mut self, other: &GroupBoundaries) {
        self.updates.union_with(&other.updates);
        self.clears.union_with(&other.clears);
        self.clears.subtract(&self.updates);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.clears.is_empty()
    }

    pub fn updates(&self) -> &CompactBitSet {
        &self.updates
    }

    pub fn clears(&self) -> &CompactBitSet {
        &self.clears
    }

    pub fn update_indices(&self) -> SmallVec<[u16; 4]> {
        self.updates.iter().map(|i| i as u16).collect()
    }

    pub fn clear_indices(&self) -> SmallVec<[u16; 4]> {
        self.clears.iter().map(|i| i as u16).collect()
    }
}

impl fmt::Debug for GroupBoundaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for GroupBoundaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (tag, set) in [("u", &self.updates), ("c", &self.clears)] {
            if set.is_empty() {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{}", tag)?;
            let items: Vec<String> = set.iter().map(|i| i.to_string()).collect();
            write!(f, "[{}]", items.join(","))?;
        }
        Ok(())
    }
}

// === States and transitions ===

#[derive(Clone, Debug)]
pub struct NfaState {
    pub id: NfaStateId,
    pub kind: NfaStateKind,
    pub matcher: CodePointSet,
    /// Outgoing transitions, highest priority first.
    pub next: SmallVec<[TransitionId; 4]>,
    pub prev: SmallVec<[TransitionId; 4]>,
    pub flags: NfaStateFlags,
    /// Ranks of the results a final state stands for; lower is better.
    pub possible_results: SmallVec<[u8; 2]>,
    /// Syntax nodes this state was built from, for dumps.
    pub ast_nodes: SmallVec<[NodeId; 2]>,
}

impl NfaState {
    pub fn is_matcher(&self) -> bool {
        self.kind == NfaStateKind::Matcher
    }

    pub fn is_final(&self) -> bool {
        self.kind == NfaStateKind::Final
    }

    pub fn is_anchored_final(&self) -> bool {
        self.kind == NfaStateKind::AnchoredFinal
    }

    pub fn is_initial(&self) -> bool {
        matches!(self.kind, NfaStateKind::Initial { .. })
    }

    /// Best (lowest) possible result, `NO_RESULT` if there is none.
    pub fn best_result(&self) -> u8 {
        self.possible_results.iter().copied().min().unwrap_or(NO_RESULT)
    }
}

#[derive(Clone, Debug)]
pub struct NfaStateTransition {
    pub id: TransitionId,
    pub source: NfaStateId,
    pub target: NfaStateId,
    pub group_boundaries: GroupBoundaries,
}

// === Nfa ===

#[derive(Clone, Debug, Default)]
pub struct Nfa {
    pub states: Vec<NfaState>,
    pub transitions: Vec<NfaStateTransition>,
    /// One anchored entry per look-behind prefix offset.
    pub anchored_entry: Vec<NfaStateId>,
    /// Parallel to `anchored_entry`; empty when the pattern starts with `^`.
    pub unanchored_entry: Vec<NfaStateId>,
    pub number_of_capture_groups: usize,
    pub prefix_length: usize,
}

impl Nfa {
    pub fn new(number_of_capture_groups: usize, prefix_length: usize) -> Self {
        Nfa {
            number_of_capture_groups,
            prefix_length,
            ..Nfa::default()
        }
    }

    pub fn add_state(&mut self, kind: NfaStateKind, matcher: CodePointSet) -> NfaStateId {
        let id = NfaStateId(self.states.len() as u32);
        self.states.push(NfaState {
            id,
            kind,
            matcher,
            next: SmallVec::new(),
            prev: SmallVec::new(),
            flags: NfaStateFlags::empty(),
            possible_results: SmallVec::new(),
            ast_nodes: SmallVec::new(),
        });
        id
    }

    /// Append a transition at the lowest priority of `source`.
    pub fn add_transition(
        &mut self,
        source: NfaStateId,
        target: NfaStateId,
        group_boundaries: GroupBoundaries,
    ) -> TransitionId {
        let id = TransitionId(self.transitions.len() as u32);
        self.transitions.push(NfaStateTransition {
            id,
            source,
            target,
            group_boundaries,
        });
        self.states[source.index()].next.push(id);
        self.states[target.index()].prev.push(id);
        id
    }

    #[inline]
    pub fn state(&self, id: NfaStateId) -> &NfaState {
        &self.states[id.index()]
    }

    pub fn state_mut(&mut self, id: NfaStateId) -> &mut NfaState {
        &mut self.states[id.index()]
    }

    #[inline]
    pub fn transition(&self, id: TransitionId) -> &NfaStateTransition {
        &self.transitions[id.index()]
    }

    pub fn number_of_states(&self) -> usize {
        self.states.len()
    }

    pub fn number_of_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn has_unanchored_entry(&self) -> bool {
        !self.unanchored_entry.is_empty()
    }

    /// Transitions entering final states; with `at_end`, anchored-final
    /// states count too. Entry points of a backward automaton.
    pub fn reverse_entry_transitions(&self, at_end: bool) -> Vec<TransitionId> {
        self.states
            .iter()
            .filter(|s| s.is_final() || (at_end && s.is_anchored_final()))
            .flat_map(|s| s.prev.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_later_operation_wins() {
        let mut b = GroupBoundaries::new();
        b.set_clear(2);
        b.set_update(2);
        b.set_update(3);
        b.set_clear(3);
        assert_eq!(b.update_indices().as_slice(), &[2]);
        assert_eq!(b.clear_indices().as_slice(), &[3]);
        assert_eq!(b.to_string(), "u[2] c[3]");
    }

    #[test]
    fn merged_boundaries_stay_disjoint() {
        let mut a = GroupBoundaries::new();
        a.set_clear(4);
        let mut b = GroupBoundaries::new();
        b.set_update(4);
        b.set_update(5);
        a.merge(&b);
        assert!(a.updates().is_disjoint(a.clears()));
        assert_eq!(a.update_indices().as_slice(), &[4, 5]);
        assert!(a.clears().is_empty());
    }

    #[test]
    fn transitions_link_both_endpoints() {
        let mut nfa = Nfa::new(1, 0);
        let s = nfa.add_state(NfaStateKind::Initial { anchored: true }, CodePointSet::empty());
        let m = nfa.add_state(NfaStateKind::Matcher, CodePointSet::from_char('a'));
        let f = nfa.add_state(NfaStateKind::Final, CodePointSet::empty());
        let t0 = nfa.add_transition(s, m, GroupBoundaries::new());
        let t1 = nfa.add_transition(m, f, GroupBoundaries::new());
        assert_eq!(nfa.state(s).next.as_slice(), &[t0]);
        assert_eq!(nfa.state(m).prev.as_slice(), &[t0]);
        assert_eq!(nfa.reverse_entry_transitions(false), vec![t1]);
        assert_eq!(nfa.state(f).best_result(), NO_RESULT);
    }
}
