// stateset.rs - Transition sets, the identity of DFA states.
// An ordered set of NFA transitions, each standing for the NFA state it
// leads to (forward) or comes from (backward). Under priority-sensitive
// construction the order of the transitions is part of the identity.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::nfa::{Nfa, NfaState, NfaStateKind};
use crate::regint::*;

#[derive(Clone)]
pub struct TransitionSet {
    /// Transitions whose endpoint is a matcher state, highest priority first.
    transitions: SmallVec<[TransitionId; 4]>,
    /// Endpoint of each entry of `transitions`.
    endpoints: SmallVec<[NfaStateId; 4]>,
    /// Every admitted endpoint, final states included.
    members: CompactBitSet,
    final_transition: Option<TransitionId>,
    anchored_final_transition: Option<TransitionId>,
    pre_calc_unanchored: u8,
    pre_calc_anchored: u8,
    forward: bool,
    priority_sensitive: bool,
    index_map: OnceCell<HashMap<NfaStateId, usize>>,
}

impl TransitionSet {
    pub fn new(forward: bool, priority_sensitive: bool) -> Self {
        TransitionSet {
            transitions: SmallVec::new(),
            endpoints: SmallVec::new(),
            members: CompactBitSet::new(),
            final_transition: None,
            anchored_final_transition: None,
            pre_calc_unanchored: NO_RESULT,
            pre_calc_anchored: NO_RESULT,
            forward,
            priority_sensitive,
            index_map: OnceCell::new(),
        }
    }

    /// The state a transition stands for in this set.
    #[inline]
    pub fn endpoint_of(&self, nfa: &Nfa, t: TransitionId) -> NfaStateId {
        let tr = nfa.transition(t);
        if self.forward {
            tr.target
        } else {
            tr.source
        }
    }

    fn is_final_endpoint(&self, state: &NfaState) -> bool {
        if self.forward {
            state.kind == NfaStateKind::Final
        } else {
            state.kind == NfaStateKind::Initial { anchored: false }
        }
    }

    fn is_anchored_final_endpoint(&self, state: &NfaState) -> bool {
        if self.forward {
            state.kind == NfaStateKind::AnchoredFinal
        } else {
            state.kind == NfaStateKind::Initial { anchored: true }
        }
    }

    /// A final endpoint that ends every lower priority alternative.
    fn blocks_additions(&self) -> bool {
        self.priority_sensitive && self.final_transition.is_some()
    }

    /// Admit `t`. Returns false if it was dropped: its endpoint is already
    /// present, or an earlier final shadows it in priority mode.
    pub fn add(&mut self, nfa: &Nfa, t: TransitionId) -> bool {
        assert!(
            self.index_map.get().is_none(),
            "transition set modified after its index map was built"
        );
        if self.blocks_additions() {
            return false;
        }
        let endpoint = self.endpoint_of(nfa, t);
        if !self.members.insert(endpoint.index()) {
            return false;
        }
        let state = nfa.state(endpoint);
        if self.is_final_endpoint(state) {
            self.final_transition = Some(t);
            self.pre_calc_unanchored = self.pre_calc_unanchored.min(state.best_result());
        } else if self.is_anchored_final_endpoint(state) {
            self.anchored_final_transition = Some(t);
            self.pre_calc_anchored = self.pre_calc_anchored.min(state.best_result());
        } else {
            self.transitions.push(t);
            self.endpoints.push(endpoint);
        }
        true
    }

    pub fn add_all_transitions<I: IntoIterator<Item = TransitionId>>(&mut self, nfa: &Nfa, list: I) {
        for t in list {
            if self.blocks_additions() {
                return;
            }
            self.add(nfa, t);
        }
    }

    /// Add the transitions of `other` in its order, finals at their priority.
    pub fn add_all(&mut self, nfa: &Nfa, other: &TransitionSet) {
        let list: Vec<TransitionId> = other.iter_with_finals().collect();
        self.add_all_transitions(nfa, list);
    }

    pub fn create_merged(&self, nfa: &Nfa, other: &TransitionSet) -> TransitionSet {
        let mut merged = TransitionSet::new(self.forward, self.priority_sensitive);
        merged.add_all(nfa, self);
        merged.add_all(nfa, other);
        merged
    }

    /// Matcher transitions followed by the finals. A final in priority mode
    /// only ever comes after every matcher it admits, so this order
    /// reproduces the admission order for `add_all`.
    pub fn iter_with_finals(&self) -> impl Iterator<Item = TransitionId> + '_ {
        self.transitions
            .iter()
            .copied()
            .chain(self.anchored_final_transition)
            .chain(self.final_transition)
    }

    pub fn transitions(&self) -> &[TransitionId] {
        &self.transitions
    }

    pub fn endpoints(&self) -> &[NfaStateId] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// No matcher transitions and no finals: a dead state.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && !self.is_final() && !self.is_anchored_final()
    }

    pub fn contains_state(&self, state: NfaStateId) -> bool {
        self.members.contains(state.index())
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn is_priority_sensitive(&self) -> bool {
        self.priority_sensitive
    }

    pub fn final_transition(&self) -> Option<TransitionId> {
        self.final_transition
    }

    pub fn anchored_final_transition(&self) -> Option<TransitionId> {
        self.anchored_final_transition
    }

    pub fn is_final(&self) -> bool {
        self.final_transition.is_some()
    }

    pub fn is_anchored_final(&self) -> bool {
        self.anchored_final_transition.is_some()
    }

    pub fn pre_calc_unanchored_result(&self) -> u8 {
        self.pre_calc_unanchored
    }

    pub fn pre_calc_anchored_result(&self) -> u8 {
        self.pre_calc_anchored
    }

    // === Register layout ===

    /// Slots of a register layout over this set: one per matcher
    /// transition, then the final slot and the anchored-final slot.
    pub fn slot_count(&self) -> usize {
        self.transitions.len() + 2
    }

    pub fn final_slot(&self) -> usize {
        self.transitions.len()
    }

    pub fn anchored_final_slot(&self) -> usize {
        self.transitions.len() + 1
    }

    /// Slot of the matcher transition whose endpoint is `state`. Freezes the set.
    pub fn index_of(&self, state: NfaStateId) -> Option<usize> {
        self.index_map
            .get_or_init(|| {
                self.endpoints
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| (s, i))
                    .collect()
            })
            .get(&state)
            .copied()
    }
}

impl PartialEq for TransitionSet {
    fn eq(&self, other: &Self) -> bool {
        if self.priority_sensitive {
            self.endpoints == other.endpoints
                && self.is_final() == other.is_final()
                && self.is_anchored_final() == other.is_anchored_final()
        } else {
            self.members == other.members
        }
    }
}

impl Eq for TransitionSet {}

impl Hash for TransitionSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.priority_sensitive {
            self.endpoints.hash(state);
            self.is_final().hash(state);
            self.is_anchored_final().hash(state);
        } else {
            self.members.hash(state);
        }
    }
}

impl fmt::Debug for TransitionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (t, s)) in self.transitions.iter().zip(&self.endpoints).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", t, s)?;
        }
        if let Some(t) = self.anchored_final_transition {
            write!(f, " AF:{}", t)?;
        }
        if let Some(t) = self.final_transition {
            write!(f, " F:{}", t)?;
        }
        write!(f, "}}")
    }
}
