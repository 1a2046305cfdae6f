// nfagen.rs - NFA construction from the (wrapped) syntax tree.
//
// Every NFA matcher state stands for a position that consumes one
// character: the main tree position, the positions of pending look-ahead
// threads, and for each look-behind the set of body prefixes matched by
// the most recent characters. Stepping from a state walks all epsilon
// paths of the tree in priority order and combines them into
// transitions whose boundary descriptors record the capture group
// starts, ends and clears crossed on the way.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace};
use smallvec::SmallVec;

use crate::charclass::{partition, CodePointSet};
use crate::error::RegexError;
use crate::nfa::*;
use crate::options::CompilerOptions;
use crate::regast::*;
use crate::regerror::*;
use crate::regint::*;

// ============================================================================
// Tree walking
// ============================================================================

/// Where an epsilon path through the tree stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathEnd {
    /// At a character class that consumes the next character.
    Consume(NodeId),
    /// At the match-found sentinel of the walked subtree.
    Done,
    /// At the search restart of an unanchored entry.
    LoopBack,
}

#[derive(Clone, Debug, Default)]
struct PathState {
    boundaries: GroupBoundaries,
    look_aheads: SmallVec<[NodeId; 1]>,
    look_behinds: SmallVec<[usize; 1]>,
    requires_end: bool,
    visited_loops: SmallVec<[NodeId; 2]>,
}

#[derive(Clone, Debug)]
struct Path {
    end: PathEnd,
    boundaries: GroupBoundaries,
    look_aheads: SmallVec<[NodeId; 1]>,
    look_behinds: SmallVec<[usize; 1]>,
    requires_end: bool,
}

impl Path {
    fn loop_back() -> Path {
        Path {
            end: PathEnd::LoopBack,
            boundaries: GroupBoundaries::new(),
            look_aheads: SmallVec::new(),
            look_behinds: SmallVec::new(),
            requires_end: false,
        }
    }

    fn done() -> Path {
        Path {
            end: PathEnd::Done,
            ..Path::loop_back()
        }
    }
}

/// Collects the epsilon paths leaving one tree position, highest priority first.
struct TreeWalker<'a> {
    ast: &'a RegexAst,
    caret_allowed: bool,
    paths: Vec<Path>,
}

impl<'a> TreeWalker<'a> {
    fn new(ast: &'a RegexAst, caret_allowed: bool) -> Self {
        TreeWalker {
            ast,
            caret_allowed,
            paths: Vec::new(),
        }
    }

    /// Paths that start by entering `node`.
    fn walk_into(mut self, node: NodeId) -> Vec<Path> {
        self.enter(node, PathState::default());
        self.paths
    }

    /// Paths that start right after the character class `node` consumed.
    fn walk_from(mut self, node: NodeId) -> Vec<Path> {
        self.advance(node, PathState::default());
        self.paths
    }

    fn emit(&mut self, end: PathEnd, ps: PathState) {
        self.paths.push(Path {
            end,
            boundaries: ps.boundaries,
            look_aheads: ps.look_aheads,
            look_behinds: ps.look_behinds,
            requires_end: ps.requires_end,
        });
    }

    fn enter(&mut self, node: NodeId, mut ps: PathState) {
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::CharacterClass(_) => self.emit(PathEnd::Consume(node), ps),
            NodeKind::Group(_) => self.enter_group(node, ps),
            NodeKind::Sequence(_) => self.enter_sequence(node, ps),
            NodeKind::PositionAssertion(PositionKind::Caret) => {
                if self.caret_allowed {
                    self.advance(node, ps);
                }
            }
            NodeKind::PositionAssertion(PositionKind::Dollar) => {
                ps.requires_end = true;
                self.advance(node, ps);
            }
            NodeKind::LookAhead(_) => {
                ps.look_aheads.push(node);
                self.advance(node, ps);
            }
            NodeKind::LookBehind(_) => {
                let index = ast
                    .look_behind_index(node)
                    .unwrap_or_else(|| panic!("look-behind {} is not registered", node));
                ps.look_behinds.push(index);
                self.advance(node, ps);
            }
            NodeKind::MatchFound => self.emit(PathEnd::Done, ps),
            NodeKind::BackReference(_) | NodeKind::Root(_) => {
                panic!("unexpected node {} while building the NFA", node)
            }
        }
    }

    fn enter_group(&mut self, group: NodeId, mut ps: PathState) {
        let ast = self.ast;
        let g = ast.group(group);
        if let Some(n) = g.group_number {
            ps.boundaries.set_update(2 * n as usize);
        }
        if g.is_loop {
            // an iteration that consumed nothing ends the path
            if ps.visited_loops.contains(&group) {
                return;
            }
            ps.visited_loops.push(group);
        }
        for &alt in &g.alternatives {
            let mut ps = ps.clone();
            // a new iteration resets the groups of the previous one
            if g.is_loop && !ast.sequence(alt).terms.is_empty() {
                for n in g.enclosed_captures.clone() {
                    ps.boundaries.set_clear(2 * n as usize);
                    ps.boundaries.set_clear(2 * n as usize + 1);
                }
            }
            self.enter_sequence(alt, ps);
        }
    }

    fn enter_sequence(&mut self, seq: NodeId, ps: PathState) {
        match self.ast.sequence(seq).terms.first() {
            Some(&first) => self.enter(first, ps),
            None => self.leave_sequence(seq, ps),
        }
    }

    fn leave_sequence(&mut self, seq: NodeId, mut ps: PathState) {
        let ast = self.ast;
        let group = ast
            .node(seq)
            .parent
            .unwrap_or_else(|| panic!("sequence {} has no group", seq));
        let g = ast.group(group);
        if g.is_loop && !ast.sequence(seq).terms.is_empty() {
            self.enter_group(group, ps);
            return;
        }
        if g.is_loop {
            // Leaving the loop: an enclosing loop may enter it afresh. Loops
            // entered after it are nested in it and were left already.
            if let Some(i) = ps.visited_loops.iter().position(|&l| l == group) {
                ps.visited_loops.truncate(i);
            }
        }
        if let Some(n) = g.group_number {
            ps.boundaries.set_update(2 * n as usize + 1);
        }
        self.advance(group, ps);
    }

    /// Continue after `node` inside its parent.
    fn advance(&mut self, node: NodeId, ps: PathState) {
        let ast = self.ast;
        let Some((parent, index)) = ast.step_parent(node) else {
            panic!("node {} has no parent", node);
        };
        match ast.kind(parent) {
            NodeKind::Sequence(s) => match s.terms.get(index as usize + 1) {
                Some(&next) => self.enter(next, ps),
                None => self.leave_sequence(parent, ps),
            },
            NodeKind::LookAhead(r) | NodeKind::LookBehind(r) | NodeKind::Root(r) => {
                self.enter(r.match_found, ps)
            }
            other => panic!("node {} has unexpected parent {:?}", node, other),
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum MainPos {
    Node(NodeId),
    LoopBack,
    /// The main tree matched; look-ahead threads are still pending.
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct StateKey {
    main: MainPos,
    /// Look-ahead thread positions, sorted.
    threads: SmallVec<[NodeId; 2]>,
    /// Per look-behind: bit `j` set if the last `j` characters match the
    /// first `j` classes of its body. Empty once the main tree is done.
    lb_progress: SmallVec<[u64; 1]>,
    matcher: CodePointSet,
}

/// One main path combined with one path per pending thread.
#[derive(Clone, Debug)]
struct Combo {
    main: PathEnd,
    threads: SmallVec<[NodeId; 2]>,
    boundaries: GroupBoundaries,
    pending_look_aheads: SmallVec<[NodeId; 1]>,
    look_behinds: SmallVec<[usize; 1]>,
    requires_end: bool,
}

impl Combo {
    fn from_main(path: &Path) -> Combo {
        Combo {
            main: path.end,
            threads: SmallVec::new(),
            boundaries: path.boundaries.clone(),
            pending_look_aheads: path.look_aheads.clone(),
            look_behinds: path.look_behinds.clone(),
            requires_end: path.requires_end,
        }
    }

    fn with_thread(&self, path: &Path) -> Combo {
        let mut c = self.clone();
        if let PathEnd::Consume(node) = path.end {
            c.threads.push(node);
        }
        c.boundaries.merge(&path.boundaries);
        c.pending_look_aheads.extend(path.look_aheads.iter().copied());
        c.look_behinds.extend(path.look_behinds.iter().copied());
        c.requires_end |= path.requires_end;
        c
    }
}

/// Builds the NFA of an analyzed tree.
pub struct NfaGenerator<'a> {
    ast: &'a RegexAst,
    look_behinds: &'a [LookBehindInfo],
    nfa: Nfa,
    keys: Vec<Option<StateKey>>,
    state_map: HashMap<StateKey, NfaStateId>,
    worklist: VecDeque<NfaStateId>,
    step_cache: HashMap<NodeId, Vec<Path>>,
    final_state: NfaStateId,
    anchored_final_state: NfaStateId,
    /// Offsets where the unanchored restart is offered: entry offset 0 and
    /// the last non-optional prefix matcher.
    loop_back_after: Option<NodeId>,
    with_loop_back: bool,
    max_size: usize,
}

/// Reject constructs that have no fixed-automaton translation.
pub fn check_supported(ast: &RegexAst) -> Result<(), RegexError> {
    let props = ast.properties();
    if props.contains(RegexProperties::BACK_REFERENCES) {
        return Err(RegexError::from(TREGEX_ERR_UNSUPPORTED_BACK_REFERENCE));
    }
    if props.contains(RegexProperties::NEGATIVE_LOOK_AHEAD) {
        return Err(RegexError::from(TREGEX_ERR_UNSUPPORTED_NEGATIVE_LOOK_AHEAD));
    }
    for info in ast.look_behind_infos() {
        if !info.is_literal {
            return Err(RegexError::from(TREGEX_ERR_UNSUPPORTED_COMPLEX_LOOK_BEHIND));
        }
        if info.nested {
            return Err(RegexError::from(TREGEX_ERR_UNSUPPORTED_NESTED_LOOK_BEHIND));
        }
        if info.length() > MAX_LOOK_BEHIND_LENGTH {
            return Err(RegexError::from(TREGEX_ERR_UNSUPPORTED_LONG_LOOK_BEHIND));
        }
    }
    Ok(())
}

/// Build the NFA of `ast`, which must have been analyzed (and wrapped,
/// if a look-behind prefix is wanted).
pub fn create_nfa(ast: &RegexAst, options: &CompilerOptions) -> Result<Nfa, RegexError> {
    assert!(ast.is_analyzed(), "syntax tree must be analyzed before NFA construction");
    check_supported(ast)?;
    NfaGenerator::new(ast, options).generate()
}

impl<'a> NfaGenerator<'a> {
    fn new(ast: &'a RegexAst, options: &CompilerOptions) -> Self {
        let mut nfa = Nfa::new(ast.number_of_capture_groups(), ast.wrapped_prefix_length());
        let final_state = nfa.add_state(NfaStateKind::Final, CodePointSet::empty());
        let anchored_final_state = nfa.add_state(NfaStateKind::AnchoredFinal, CodePointSet::empty());
        let loop_back_after = ast.wrapped_root().and_then(|w| {
            let n = w.prefix_length as usize;
            ast.sequence(w.sequence).terms.get(n.wrapping_sub(1)).copied()
        });
        NfaGenerator {
            ast,
            look_behinds: ast.look_behind_infos(),
            nfa,
            keys: vec![None, None],
            state_map: HashMap::new(),
            worklist: VecDeque::new(),
            step_cache: HashMap::new(),
            final_state,
            anchored_final_state,
            loop_back_after,
            with_loop_back: !ast.starts_with_caret(),
            max_size: options.get_max_nfa_size(),
        }
    }

    fn generate(mut self) -> Result<Nfa, RegexError> {
        let prefix_length = self.ast.wrapped_prefix_length();
        for k in 0..=prefix_length {
            let anchored = self.add_initial_state(true);
            self.nfa.anchored_entry.push(anchored);
            self.expand_entry(anchored, k, true)?;
            if self.with_loop_back {
                let unanchored = self.add_initial_state(false);
                self.nfa.unanchored_entry.push(unanchored);
                self.expand_entry(unanchored, k, false)?;
            }
        }
        while let Some(id) = self.worklist.pop_front() {
            let key = self.keys[id.index()]
                .clone()
                .unwrap_or_else(|| panic!("NFA state {} has no key", id));
            self.expand_state(id, &key)?;
        }
        debug!(
            "NFA: {} states, {} transitions, {} entries",
            self.nfa.number_of_states(),
            self.nfa.number_of_transitions(),
            self.nfa.anchored_entry.len() + self.nfa.unanchored_entry.len()
        );
        Ok(self.nfa)
    }

    fn add_initial_state(&mut self, anchored: bool) -> NfaStateId {
        let id = self
            .nfa
            .add_state(NfaStateKind::Initial { anchored }, CodePointSet::empty());
        self.keys.push(None);
        id
    }

    fn initial_progress(&self) -> SmallVec<[u64; 1]> {
        self.look_behinds.iter().map(|_| 1u64).collect()
    }

    /// Paths from the entry position that still has `k` prefix characters ahead.
    fn entry_paths(&self, k: usize, caret_allowed: bool) -> Vec<Path> {
        let walker = TreeWalker::new(self.ast, caret_allowed);
        let mut paths = match self.ast.wrapped_root() {
            Some(w) => {
                let terms = &self.ast.sequence(w.sequence).terms;
                walker.walk_into(terms[w.prefix_length as usize - k])
            }
            None => walker.walk_into(self.ast.root_group()),
        };
        if k == 0 && self.with_loop_back {
            paths.push(Path::loop_back());
        }
        paths
    }

    fn expand_entry(&mut self, source: NfaStateId, k: usize, anchored: bool) -> Result<(), RegexError> {
        let main_paths = self.entry_paths(k, anchored);
        let progress = self.initial_progress();
        self.combine(source, &main_paths, &[], &progress, anchored)
    }

    fn step_from(&mut self, node: NodeId) -> Vec<Path> {
        if let Some(paths) = self.step_cache.get(&node) {
            return paths.clone();
        }
        let mut paths = TreeWalker::new(self.ast, false).walk_from(node);
        if self.with_loop_back && self.loop_back_after == Some(node) {
            paths.push(Path::loop_back());
        }
        self.step_cache.insert(node, paths.clone());
        paths
    }

    fn expand_state(&mut self, source: NfaStateId, key: &StateKey) -> Result<(), RegexError> {
        let main_paths = match key.main {
            MainPos::Node(node) => self.step_from(node),
            MainPos::LoopBack => self.entry_paths(0, false),
            MainPos::Done => vec![Path::done()],
        };
        let thread_paths: Vec<Vec<Path>> = key.threads.iter().map(|&t| self.step_from(t)).collect();
        self.combine(source, &main_paths, &thread_paths, &key.lb_progress, false)
    }

    /// Emit the transitions of `source`: every main path crossed with every
    /// choice of thread paths, main path order first.
    fn combine(
        &mut self,
        source: NfaStateId,
        main_paths: &[Path],
        thread_paths: &[Vec<Path>],
        progress: &[u64],
        caret_allowed: bool,
    ) -> Result<(), RegexError> {
        for main in main_paths {
            let mut combos = vec![Combo::from_main(main)];
            for paths in thread_paths {
                combos = combos
                    .iter()
                    .flat_map(|c| paths.iter().map(move |p| c.with_thread(p)))
                    .collect();
            }
            for combo in combos {
                for resolved in self.start_look_aheads(combo, caret_allowed) {
                    self.emit_transition(source, resolved, progress)?;
                }
            }
        }
        Ok(())
    }

    /// Start the look-ahead threads crossed by `combo`; one result per
    /// combination of their paths.
    fn start_look_aheads(&self, mut combo: Combo, caret_allowed: bool) -> Vec<Combo> {
        if combo.pending_look_aheads.is_empty() {
            return vec![combo];
        }
        let la = combo.pending_look_aheads.remove(0);
        let group = self.ast.subtree_root(la).group;
        let paths = TreeWalker::new(self.ast, caret_allowed).walk_into(group);
        paths
            .iter()
            .flat_map(|p| self.start_look_aheads(combo.with_thread(p), caret_allowed))
            .collect()
    }

    fn emit_transition(
        &mut self,
        source: NfaStateId,
        mut combo: Combo,
        progress: &[u64],
    ) -> Result<(), RegexError> {
        for &lb in &combo.look_behinds {
            let length = self.look_behinds[lb].length();
            if progress.get(lb).map_or(true, |p| *p & (1u64 << length) == 0) {
                return Ok(());
            }
        }
        combo.threads.sort_unstable();
        combo.threads.dedup();

        if combo.main == PathEnd::Done && combo.threads.is_empty() {
            let target = if combo.requires_end {
                self.anchored_final_state
            } else {
                self.final_state
            };
            self.add_transition(source, target, combo.boundaries);
            return Ok(());
        }
        if combo.requires_end {
            return Ok(());
        }

        let mut matcher = match combo.main {
            PathEnd::Consume(node) => self.class_of(node).clone(),
            PathEnd::LoopBack | PathEnd::Done => CodePointSet::full(),
        };
        for &t in &combo.threads {
            matcher = matcher.intersect(self.class_of(t));
        }
        if matcher.is_empty() {
            return Ok(());
        }
        let main = match combo.main {
            PathEnd::Consume(node) => MainPos::Node(node),
            PathEnd::LoopBack => MainPos::LoopBack,
            PathEnd::Done => MainPos::Done,
        };
        let cells = if main == MainPos::Done {
            let mut cells = SmallVec::<[_; 2]>::new();
            cells.push((matcher, SmallVec::new()));
            cells
        } else {
            self.refine(&matcher, progress)
        };
        for (cell, lb_progress) in cells {
            let key = StateKey {
                main,
                threads: combo.threads.clone(),
                lb_progress,
                matcher: cell,
            };
            let target = self.get_or_create(key)?;
            self.add_transition(source, target, combo.boundaries.clone());
        }
        Ok(())
    }

    fn class_of(&self, node: NodeId) -> &'a CodePointSet {
        let ast: &'a RegexAst = self.ast;
        match ast.kind(node) {
            NodeKind::CharacterClass(set) => set,
            other => panic!("node {} is not a character class: {:?}", node, other),
        }
    }

    /// Split `matcher` so that every part leads to one deterministic
    /// look-behind progress after consuming its character.
    fn refine(
        &self,
        matcher: &CodePointSet,
        progress: &[u64],
    ) -> SmallVec<[(CodePointSet, SmallVec<[u64; 1]>); 2]> {
        let mut extensions: Vec<(usize, usize)> = Vec::new();
        let mut classes: Vec<&CodePointSet> = vec![matcher];
        for (i, info) in self.look_behinds.iter().enumerate() {
            let bits = progress.get(i).copied().unwrap_or(1);
            for j in 0..info.length() {
                if bits & (1u64 << j) != 0 {
                    extensions.push((i, j));
                    classes.push(&info.classes[j]);
                }
            }
        }
        let mut cells: SmallVec<[(CodePointSet, SmallVec<[u64; 1]>); 2]> = SmallVec::new();
        if extensions.is_empty() {
            cells.push((matcher.clone(), self.initial_progress()));
            return cells;
        }
        for cell in partition(&classes) {
            if cell.members.first() != Some(&0) {
                continue;
            }
            let mut next = self.initial_progress();
            for &m in &cell.members[1..] {
                let (i, j) = extensions[m - 1];
                next[i] |= 1u64 << (j + 1);
            }
            match cells.iter().position(|(_, p)| *p == next) {
                Some(i) => cells[i].0 = cells[i].0.union(&cell.set),
                None => cells.push((cell.set, next)),
            }
        }
        cells
    }

    fn get_or_create(&mut self, key: StateKey) -> Result<NfaStateId, RegexError> {
        if let Some(&id) = self.state_map.get(&key) {
            return Ok(id);
        }
        if self.nfa.number_of_states() >= self.max_size {
            return Err(RegexError::size_limit(TREGEX_ERR_TOO_BIG_NFA, self.max_size));
        }
        let id = self.nfa.add_state(NfaStateKind::Matcher, key.matcher.clone());
        let state = self.nfa.state_mut(id);
        match key.main {
            MainPos::Node(node) => {
                state.ast_nodes.push(node);
                if self.ast.node(node).flags.contains(NodeFlags::PREFIX) {
                    state.flags |= NfaStateFlags::PREFIX;
                }
            }
            MainPos::LoopBack => state.flags |= NfaStateFlags::LOOP_BACK,
            MainPos::Done => {}
        }
        if !key.threads.is_empty() {
            state.flags |= NfaStateFlags::LOOK_AHEAD;
            state.ast_nodes.extend(key.threads.iter().copied());
        }
        trace!("NFA state {}: {:?}", id, key);
        self.keys.push(Some(key.clone()));
        self.state_map.insert(key, id);
        self.worklist.push_back(id);
        Ok(id)
    }

    /// Higher priority transitions to the same target shadow later ones.
    fn add_transition(&mut self, source: NfaStateId, target: NfaStateId, boundaries: GroupBoundaries) {
        let nfa = &self.nfa;
        if nfa
            .state(source)
            .next
            .iter()
            .any(|&t| nfa.transition(t).target == target)
        {
            return;
        }
        self.nfa.add_transition(source, target, boundaries);
    }
}
