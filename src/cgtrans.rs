// cgtrans.rs - Capture group register programs.
//
// Every slot of a DFA state's register layout holds the capture
// boundaries of one NFA thread. Taking a DFA edge moves those rows into
// the successor's layout: a reorder permutation covers every source that
// is needed once, explicit copies cover the rest, and the boundary
// updates and clears of the NFA transitions are applied per destination.

use std::collections::HashMap;
use std::fmt;

use smallvec::SmallVec;

use crate::error::RegexError;
use crate::nfa::{GroupBoundaries, Nfa};
use crate::regerror::TREGEX_ERR_TOO_MANY_REGISTER_SLOTS;
use crate::regint::*;
use crate::stateset::TransitionSet;

/// Index into the program table of a compiled automaton.
pub type ProgramId = u32;

/// Logical register slot holding the published match.
pub const RESULT_SLOT: usize = MAX_REGISTER_SLOTS;

/// Register moves and boundary stamps for one DFA edge.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct CgProgram {
    /// `reorder[d]` is the slot whose registers end up in slot `d`. Slots
    /// past the end keep their rows; `None` is the identity.
    pub reorder: Option<Box<[u8]>>,
    /// `(source, dest)` slot pairs copied after reordering.
    pub copies: SmallVec<[(u8, u8); 2]>,
    /// Per destination slot, boundaries set to the current position.
    pub index_updates: SmallVec<[(u8, SmallVec<[u16; 4]>); 2]>,
    /// Per destination slot, boundaries reset to unset.
    pub index_clears: SmallVec<[(u8, SmallVec<[u16; 4]>); 2]>,
}

impl CgProgram {
    pub fn is_empty(&self) -> bool {
        self.reorder.is_none()
            && self.copies.is_empty()
            && self.index_updates.is_empty()
            && self.index_clears.is_empty()
    }

    fn add_boundaries(&mut self, slot: usize, boundaries: &GroupBoundaries) {
        if !boundaries.updates().is_empty() {
            self.index_updates.push((slot as u8, boundaries.update_indices()));
        }
        if !boundaries.clears().is_empty() {
            self.index_clears.push((slot as u8, boundaries.clear_indices()));
        }
    }
}

impl fmt::Debug for CgProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for CgProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(r) = &self.reorder {
            write!(f, "reorder{:?} ", r)?;
        }
        for (s, d) in &self.copies {
            write!(f, "copy {}->{} ", s, d)?;
        }
        for (slot, idx) in &self.index_updates {
            write!(f, "upd[{}]{:?} ", slot, idx.as_slice())?;
        }
        for (slot, idx) in &self.index_clears {
            write!(f, "clr[{}]{:?} ", slot, idx.as_slice())?;
        }
        Ok(())
    }
}

/// Compile the register program for a layout change.
///
/// `sources[d]` is the source slot destination `d` derives from, `None`
/// for destinations nobody reads. The first destination needing a source
/// takes it through the reorder; every further one becomes a copy.
pub fn compile_program(sources: &[Option<usize>], boundaries: &[Option<&GroupBoundaries>]) -> CgProgram {
    assert_eq!(
        sources.len(),
        boundaries.len(),
        "register layout and boundary list disagree"
    );
    let n = sources
        .iter()
        .flatten()
        .map(|&s| s + 1)
        .max()
        .unwrap_or(0)
        .max(sources.len());

    let mut reorder: Vec<Option<usize>> = vec![None; n];
    let mut used = vec![false; n];
    let mut first_dest = vec![usize::MAX; n];
    let mut program = CgProgram::default();
    for (d, src) in sources.iter().enumerate() {
        let Some(s) = *src else { continue };
        if used[s] {
            program.copies.push((first_dest[s] as u8, d as u8));
        } else {
            used[s] = true;
            first_dest[s] = d;
            reorder[d] = Some(s);
        }
    }
    // Unclaimed destinations keep their own row where possible, then take
    // the lowest free one.
    for d in 0..n {
        if reorder[d].is_none() && !used[d] {
            used[d] = true;
            reorder[d] = Some(d);
        }
    }
    let mut free = (0..n).filter(|&s| !used[s]);
    for slot in reorder.iter_mut().filter(|r| r.is_none()) {
        *slot = free.next();
    }

    let mut perm: Vec<u8> = reorder
        .into_iter()
        .map(|s| s.unwrap_or_else(|| panic!("register reorder is not a permutation")) as u8)
        .collect();
    while perm.last().is_some_and(|&s| s as usize == perm.len() - 1) {
        perm.pop();
    }
    if !perm.is_empty() {
        program.reorder = Some(perm.into_boxed_slice());
    }

    for (d, b) in boundaries.iter().enumerate() {
        if let Some(b) = b {
            program.add_boundaries(d, b);
        }
    }
    program
}

/// Program entering an automaton: every slot starts from the blank row
/// in slot 0.
pub fn compile_initial_program(boundaries: &[Option<&GroupBoundaries>]) -> CgProgram {
    let mut program = CgProgram::default();
    for (d, b) in boundaries.iter().enumerate() {
        if let Some(b) = b {
            if d > 0 {
                program.copies.push((0, d as u8));
            }
            program.add_boundaries(d, b);
        }
    }
    program
}

/// Capture group data of one DFA state: one program per successor edge
/// and the programs publishing a final result.
#[derive(Clone, Debug)]
pub struct LazyTransition {
    pub id: LazyTransitionId,
    /// Parallel to the state's successors.
    pub partial: Vec<ProgramId>,
    pub final_transition: Option<ProgramId>,
    pub anchored_final_transition: Option<ProgramId>,
}

/// Programs of a finished capture group DFA.
#[derive(Clone, Debug, Default)]
pub struct CgPrograms {
    pub programs: Vec<CgProgram>,
    /// Largest register layout.
    pub max_slots: usize,
}

impl CgPrograms {
    #[inline]
    pub fn program(&self, id: ProgramId) -> &CgProgram {
        &self.programs[id as usize]
    }

    /// Logical slot the final programs copy a result into; always past
    /// every layout slot.
    pub fn result_slot(&self) -> usize {
        RESULT_SLOT
    }
}

// ============================================================================
// CgTransitionCompiler
// ============================================================================

/// Compiles and interns the programs while the DFA is built.
pub struct CgTransitionCompiler {
    programs: Vec<CgProgram>,
    interned: HashMap<CgProgram, ProgramId>,
    next_lazy_id: u32,
    max_slots: usize,
}

impl Default for CgTransitionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CgTransitionCompiler {
    pub fn new() -> Self {
        CgTransitionCompiler {
            programs: Vec::new(),
            interned: HashMap::new(),
            next_lazy_id: 0,
            max_slots: 0,
        }
    }

    fn intern(&mut self, program: CgProgram) -> ProgramId {
        if let Some(&id) = self.interned.get(&program) {
            return id;
        }
        let id = self.programs.len() as ProgramId;
        self.programs.push(program.clone());
        self.interned.insert(program, id);
        id
    }

    /// Account for the layout of `set`.
    pub fn register_layout(&mut self, set: &TransitionSet) -> Result<(), RegexError> {
        let slots = set.slot_count();
        if slots >= MAX_REGISTER_SLOTS {
            return Err(RegexError::size_limit(
                TREGEX_ERR_TOO_MANY_REGISTER_SLOTS,
                MAX_REGISTER_SLOTS,
            ));
        }
        self.max_slots = self.max_slots.max(slots);
        Ok(())
    }

    fn layout_boundaries<'n>(nfa: &'n Nfa, set: &TransitionSet) -> Vec<Option<&'n GroupBoundaries>> {
        let mut out: Vec<Option<&GroupBoundaries>> = set
            .transitions()
            .iter()
            .map(|&t| Some(&nfa.transition(t).group_boundaries))
            .collect();
        out.push(set.final_transition().map(|t| &nfa.transition(t).group_boundaries));
        out.push(
            set.anchored_final_transition()
                .map(|t| &nfa.transition(t).group_boundaries),
        );
        out
    }

    pub fn compile_initial(&mut self, nfa: &Nfa, entry: &TransitionSet) -> ProgramId {
        let program = compile_initial_program(&Self::layout_boundaries(nfa, entry));
        self.intern(program)
    }

    /// Program for edge `edge` of `state`, leaving layout `source` for the
    /// edge's own transitions `successor`. Each edge is compiled once while
    /// the DFA is built; edges that need the same moves share one interned
    /// program.
    pub fn compile_partial(
        &mut self,
        nfa: &Nfa,
        state: DfaStateId,
        edge: usize,
        source: &TransitionSet,
        successor: &TransitionSet,
    ) -> ProgramId {
        let slot_of = |t: TransitionId| {
            let from = nfa.transition(t).source;
            source.index_of(from).unwrap_or_else(|| {
                panic!(
                    "DFA state {} has no register slot for NFA state {} (edge {})",
                    state, from, edge
                )
            })
        };
        let mut sources: Vec<Option<usize>> =
            successor.transitions().iter().map(|&t| Some(slot_of(t))).collect();
        sources.push(successor.final_transition().map(slot_of));
        sources.push(successor.anchored_final_transition().map(slot_of));
        let program = compile_program(&sources, &Self::layout_boundaries(nfa, successor));
        self.intern(program)
    }

    /// Publish the final slot of `set` as the match result.
    pub fn compile_final(&mut self, set: &TransitionSet) -> Option<ProgramId> {
        set.final_transition()?;
        let mut program = CgProgram::default();
        program
            .copies
            .push((set.final_slot() as u8, RESULT_SLOT as u8));
        Some(self.intern(program))
    }

    pub fn compile_anchored_final(&mut self, set: &TransitionSet) -> Option<ProgramId> {
        set.anchored_final_transition()?;
        let mut program = CgProgram::default();
        program
            .copies
            .push((set.anchored_final_slot() as u8, RESULT_SLOT as u8));
        Some(self.intern(program))
    }

    pub fn create_lazy_transition(
        &mut self,
        partial: Vec<ProgramId>,
        final_transition: Option<ProgramId>,
        anchored_final_transition: Option<ProgramId>,
    ) -> LazyTransition {
        let id = LazyTransitionId(self.next_lazy_id);
        self.next_lazy_id += 1;
        LazyTransition {
            id,
            partial,
            final_transition,
            anchored_final_transition,
        }
    }

    pub fn number_of_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn finish(self) -> CgPrograms {
        CgPrograms {
            programs: self.programs,
            max_slots: self.max_slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updates(indices: &[usize]) -> GroupBoundaries {
        let mut b = GroupBoundaries::new();
        for &i in indices {
            b.set_update(i);
        }
        b
    }

    #[test]
    fn identity_layout_needs_no_moves() {
        let p = compile_program(&[Some(0), Some(1), None], &[None, None, None]);
        assert!(p.reorder.is_none());
        assert!(p.copies.is_empty());
        assert!(p.is_empty());
    }

    #[test]
    fn single_source_keeps_its_slot() {
        let b = updates(&[2]);
        let p = compile_program(&[Some(0), None, None], &[Some(&b), None, None]);
        assert!(p.copies.is_empty());
        assert!(p.reorder.is_none());
        assert_eq!(p.index_updates.len(), 1);
    }

    #[test]
    fn shared_source_needs_exactly_one_copy() {
        let p = compile_program(&[Some(0), Some(0)], &[None, None]);
        assert_eq!(p.copies.as_slice(), &[(0, 1)]);
        assert!(p.reorder.is_none());
    }

    #[test]
    fn swap_is_a_permutation() {
        let p = compile_program(&[Some(1), Some(0)], &[None, None]);
        assert_eq!(p.reorder.as_deref(), Some(&[1u8, 0][..]));
        assert!(p.copies.is_empty());
    }

    #[test]
    fn trailing_identity_is_trimmed() {
        let p = compile_program(&[Some(1), Some(0), Some(2), Some(3)], &[None; 4]);
        assert_eq!(p.reorder.as_deref(), Some(&[1u8, 0][..]));
    }

    #[test]
    fn unclaimed_destinations_take_free_sources() {
        // slot 0 keeps source 2, slot 1 is unused and slot 2 needs source 0
        let p = compile_program(&[Some(2), None, Some(0)], &[None; 3]);
        let r = p.reorder.unwrap();
        assert_eq!(&r[..], &[2, 1, 0]);
    }

    #[test]
    fn initial_program_copies_blank_row() {
        let a = updates(&[0]);
        let b = updates(&[0, 2]);
        let p = compile_initial_program(&[Some(&a), Some(&b), None]);
        assert!(p.reorder.is_none());
        assert_eq!(p.copies.as_slice(), &[(0, 1)]);
        assert_eq!(p.index_updates.len(), 2);
        assert_eq!(p.index_updates[1].1.as_slice(), &[0, 2]);
    }

    #[test]
    fn clears_are_recorded_per_slot() {
        let mut b = GroupBoundaries::new();
        b.set_clear(2);
        b.set_clear(3);
        let p = compile_program(&[Some(0)], &[Some(&b)]);
        assert_eq!(p.index_clears.len(), 1);
        assert_eq!(p.index_clears[0].0, 0);
        assert_eq!(p.index_clears[0].1.as_slice(), &[2, 3]);
    }

    #[test]
    fn programs_are_interned() {
        let mut c = CgTransitionCompiler::new();
        let a = c.intern(compile_program(&[Some(0), Some(0)], &[None, None]));
        let b = c.intern(compile_program(&[Some(0), Some(0)], &[None, None]));
        assert_eq!(a, b);
        assert_eq!(c.number_of_programs(), 1);
        let l0 = c.create_lazy_transition(vec![a], None, None);
        let l1 = c.create_lazy_transition(vec![], None, None);
        assert!(l1.id > l0.id);
    }
}
