// regast.rs - Syntax tree store.
// Arena of syntax nodes addressed by NodeId. Owns registration and the
// size ceilings, answers structural queries, computes minimum path
// lengths and look-behind shapes, and synthesizes the optional
// character prefix that gives look-behind assertions their context.

use std::ops::Range;

use bitflags::bitflags;
use log::debug;

use crate::charclass::CodePointSet;
use crate::error::RegexError;
use crate::options::CompilerOptions;
use crate::regerror::*;
use crate::regint::*;

bitflags! {
    /// Constructs present in a tree, collected while nodes are registered.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RegexProperties: u16 {
        const ALTERNATIONS = 1 << 0;
        const LOOPS = 1 << 1;
        /// A class matching more than one code point.
        const CHAR_CLASSES = 1 << 2;
        /// Capture groups other than group 0.
        const CAPTURE_GROUPS = 1 << 3;
        const LOOK_AHEAD = 1 << 4;
        const NEGATIVE_LOOK_AHEAD = 1 << 5;
        const LOOK_BEHIND = 1 << 6;
        const COMPLEX_LOOK_BEHIND = 1 << 7;
        const BACK_REFERENCES = 1 << 8;
        const CARETS = 1 << 9;
        const DOLLARS = 1 << 10;
    }
}

impl RegexProperties {
    pub fn has_look_around(self) -> bool {
        self.intersects(
            RegexProperties::LOOK_AHEAD
                | RegexProperties::NEGATIVE_LOOK_AHEAD
                | RegexProperties::LOOK_BEHIND,
        )
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Synthesized by the look-behind prefix.
        const PREFIX = 1 << 0;
    }
}

// === Node types ===

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionKind {
    /// `^`, start of input.
    Caret,
    /// `$`, end of input.
    Dollar,
}

#[derive(Clone, Debug, Default)]
pub struct Group {
    pub alternatives: Vec<NodeId>,
    /// Capture group number, `None` for non-capturing groups.
    pub group_number: Option<u32>,
    /// Loop groups jump back to their start at the end of every non-empty
    /// alternative and are left through an empty one.
    pub is_loop: bool,
    /// Capture groups inside a loop body; cleared on each iteration.
    pub enclosed_captures: Range<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct Sequence {
    pub terms: Vec<NodeId>,
}

/// Look-around assertions and the pattern root own one group and one
/// match-found sentinel each.
#[derive(Clone, Copy, Debug)]
pub struct SubtreeRoot {
    pub group: NodeId,
    pub match_found: NodeId,
    pub negated: bool,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Sequence(Sequence),
    Group(Group),
    CharacterClass(CodePointSet),
    BackReference(u32),
    PositionAssertion(PositionKind),
    LookAhead(SubtreeRoot),
    LookBehind(SubtreeRoot),
    MatchFound,
    Root(SubtreeRoot),
}

impl NodeKind {
    pub fn is_subtree_root(&self) -> bool {
        matches!(
            self,
            NodeKind::LookAhead(_) | NodeKind::LookBehind(_) | NodeKind::Root(_)
        )
    }
}

#[derive(Clone, Debug)]
pub struct AstNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub flags: NodeFlags,
    /// Fewest characters consumed between the enclosing subtree root's
    /// start and this node. Valid after `analyze`.
    pub min_path: u32,
    /// Position inside the parent sequence.
    pub seq_index: u32,
}

/// Shape of one look-behind assertion, computed by `analyze`.
#[derive(Clone, Debug)]
pub struct LookBehindInfo {
    pub node: NodeId,
    /// Body classes in reading order; empty for complex bodies.
    pub classes: Vec<CodePointSet>,
    /// Body is a single alternative of character classes.
    pub is_literal: bool,
    /// Sits inside another look-around assertion.
    pub nested: bool,
    /// Fewest characters between the start of the whole pattern and the assertion.
    pub min_path_from_root: u32,
}

impl LookBehindInfo {
    pub fn length(&self) -> usize {
        self.classes.len()
    }
}

/// The wrapper produced by `create_prefix`.
#[derive(Clone, Copy, Debug)]
pub struct WrappedRoot {
    pub group: NodeId,
    pub sequence: NodeId,
    /// Index of the original root group inside `sequence`.
    pub root_index: u32,
    pub prefix_length: u32,
}

#[derive(Clone, Debug)]
struct ThresholdCounter {
    count: u32,
    max: u32,
    code: i32,
}

impl ThresholdCounter {
    fn new(max: u32, code: i32) -> Self {
        ThresholdCounter { count: 0, max, code }
    }

    /// Returns the value before incrementing.
    fn inc(&mut self) -> Result<u32, RegexError> {
        if self.count >= self.max {
            return Err(RegexError::size_limit(self.code, self.max as usize));
        }
        self.count += 1;
        Ok(self.count - 1)
    }
}

// ============================================================================
// RegexAst
// ============================================================================

/// Flat node table of one pattern.
#[derive(Clone, Debug)]
pub struct RegexAst {
    nodes: Vec<AstNode>,
    root: Option<NodeId>,
    wrapped: Option<WrappedRoot>,
    look_arounds: Vec<NodeId>,
    look_behinds: Vec<NodeId>,
    look_behind_infos: Vec<LookBehindInfo>,
    match_founds: Vec<NodeId>,
    reachable_carets: Vec<NodeId>,
    reachable_dollars: Vec<NodeId>,
    properties: RegexProperties,
    node_count: ThresholdCounter,
    group_count: ThresholdCounter,
    analyzed: bool,
}

impl RegexAst {
    pub fn new(options: &CompilerOptions) -> Self {
        RegexAst {
            nodes: Vec::new(),
            root: None,
            wrapped: None,
            look_arounds: Vec::new(),
            look_behinds: Vec::new(),
            look_behind_infos: Vec::new(),
            match_founds: Vec::new(),
            reachable_carets: Vec::new(),
            reachable_dollars: Vec::new(),
            properties: RegexProperties::empty(),
            node_count: ThresholdCounter::new(
                options.get_max_parse_tree_size(),
                TREGEX_ERR_TOO_BIG_PARSE_TREE,
            ),
            group_count: ThresholdCounter::new(
                options.get_max_capture_groups(),
                TREGEX_ERR_TOO_MANY_CAPTURE_GROUPS,
            ),
            analyzed: false,
        }
    }

    // === Registration ===

    /// Append `kind` to the node table and return its id.
    pub fn register(&mut self, kind: NodeKind) -> Result<NodeId, RegexError> {
        self.node_count.inc()?;
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AstNode {
            kind,
            parent: None,
            flags: NodeFlags::empty(),
            min_path: 0,
            seq_index: 0,
        });
        Ok(id)
    }

    /// Create the pattern root: capture group 0 plus its match-found sentinel.
    pub fn create_root(&mut self) -> Result<NodeId, RegexError> {
        assert!(self.root.is_none(), "root already created");
        let group = self.create_capture_group(0)?;
        let match_found = self.create_match_found()?;
        let root = self.register(NodeKind::Root(SubtreeRoot {
            group,
            match_found,
            negated: false,
        }))?;
        self.set_parent(group, root);
        self.set_parent(match_found, root);
        self.root = Some(root);
        Ok(root)
    }

    pub fn create_group(&mut self) -> Result<NodeId, RegexError> {
        self.register(NodeKind::Group(Group::default()))
    }

    /// Create capture group `number` (0 is the root group). The same number
    /// may be used by several nodes when a front-end duplicates a body, as
    /// in `(a)+` = `(a)(a)*`.
    pub fn create_capture_group(&mut self, number: u32) -> Result<NodeId, RegexError> {
        while self.group_count.count <= number {
            self.group_count.inc()?;
        }
        if number > 0 {
            self.properties |= RegexProperties::CAPTURE_GROUPS;
        }
        self.register(NodeKind::Group(Group {
            group_number: Some(number),
            ..Group::default()
        }))
    }

    /// Turn `group` into a loop that clears `enclosed_captures` on every iteration.
    pub fn set_loop(&mut self, group: NodeId, enclosed_captures: Range<u32>) {
        let g = self.group_mut(group);
        g.is_loop = true;
        g.enclosed_captures = enclosed_captures;
        self.properties |= RegexProperties::LOOPS;
    }

    pub fn create_sequence(&mut self) -> Result<NodeId, RegexError> {
        self.register(NodeKind::Sequence(Sequence::default()))
    }

    pub fn create_character_class(&mut self, set: CodePointSet) -> Result<NodeId, RegexError> {
        if set.single_char().is_none() {
            self.properties |= RegexProperties::CHAR_CLASSES;
        }
        self.register(NodeKind::CharacterClass(set))
    }

    pub fn create_position_assertion(&mut self, kind: PositionKind) -> Result<NodeId, RegexError> {
        let id = self.register(NodeKind::PositionAssertion(kind))?;
        match kind {
            PositionKind::Caret => {
                self.properties |= RegexProperties::CARETS;
                self.reachable_carets.push(id);
            }
            PositionKind::Dollar => {
                self.properties |= RegexProperties::DOLLARS;
                self.reachable_dollars.push(id);
            }
        }
        Ok(id)
    }

    pub fn create_back_reference(&mut self, group_number: u32) -> Result<NodeId, RegexError> {
        self.properties |= RegexProperties::BACK_REFERENCES;
        self.register(NodeKind::BackReference(group_number))
    }

    /// Create a look-ahead assertion; alternatives go into its group.
    pub fn create_look_ahead(&mut self, negated: bool) -> Result<NodeId, RegexError> {
        self.properties |= if negated {
            RegexProperties::NEGATIVE_LOOK_AHEAD
        } else {
            RegexProperties::LOOK_AHEAD
        };
        let (group, match_found) = (self.create_group()?, self.create_match_found()?);
        let id = self.register(NodeKind::LookAhead(SubtreeRoot {
            group,
            match_found,
            negated,
        }))?;
        self.set_parent(group, id);
        self.set_parent(match_found, id);
        self.look_arounds.push(id);
        Ok(id)
    }

    pub fn create_look_behind(&mut self) -> Result<NodeId, RegexError> {
        self.properties |= RegexProperties::LOOK_BEHIND;
        let (group, match_found) = (self.create_group()?, self.create_match_found()?);
        let id = self.register(NodeKind::LookBehind(SubtreeRoot {
            group,
            match_found,
            negated: false,
        }))?;
        self.set_parent(group, id);
        self.set_parent(match_found, id);
        self.look_arounds.push(id);
        self.look_behinds.push(id);
        Ok(id)
    }

    fn create_match_found(&mut self) -> Result<NodeId, RegexError> {
        let id = self.register(NodeKind::MatchFound)?;
        self.match_founds.push(id);
        Ok(id)
    }

    pub fn add_alternative(&mut self, group: NodeId, sequence: NodeId) {
        let g = self.group_mut(group);
        g.alternatives.push(sequence);
        if g.alternatives.len() > 1 {
            self.properties |= RegexProperties::ALTERNATIONS;
        }
        self.set_parent(sequence, group);
    }

    pub fn add_term(&mut self, sequence: NodeId, term: NodeId) {
        let index = match &mut self.nodes[sequence.index()].kind {
            NodeKind::Sequence(s) => {
                s.terms.push(term);
                s.terms.len() - 1
            }
            other => panic!("node {} is not a sequence: {:?}", sequence, other),
        };
        self.set_parent(term, sequence);
        self.nodes[term.index()].seq_index = index as u32;
    }

    fn set_parent(&mut self, node: NodeId, parent: NodeId) {
        self.nodes[node.index()].parent = Some(parent);
    }

    // === Queries ===

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn group(&self, id: NodeId) -> &Group {
        match &self.nodes[id.index()].kind {
            NodeKind::Group(g) => g,
            other => panic!("node {} is not a group: {:?}", id, other),
        }
    }

    fn group_mut(&mut self, id: NodeId) -> &mut Group {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Group(g) => g,
            other => panic!("node {} is not a group: {:?}", id, other),
        }
    }

    pub fn sequence(&self, id: NodeId) -> &Sequence {
        match &self.nodes[id.index()].kind {
            NodeKind::Sequence(s) => s,
            other => panic!("node {} is not a sequence: {:?}", id, other),
        }
    }

    pub fn subtree_root(&self, id: NodeId) -> &SubtreeRoot {
        match &self.nodes[id.index()].kind {
            NodeKind::LookAhead(r) | NodeKind::LookBehind(r) | NodeKind::Root(r) => r,
            other => panic!("node {} is not a subtree root: {:?}", id, other),
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Capture groups including group 0.
    pub fn number_of_capture_groups(&self) -> usize {
        self.group_count.count as usize
    }

    pub fn root(&self) -> NodeId {
        self.root.unwrap_or_else(|| panic!("syntax tree has no root"))
    }

    pub fn root_group(&self) -> NodeId {
        self.subtree_root(self.root()).group
    }

    /// Entry group for automaton construction: the prefix wrapper if one
    /// was created, the original root group otherwise.
    pub fn wrapped_root_group(&self) -> NodeId {
        match self.wrapped {
            Some(w) => w.group,
            None => self.root_group(),
        }
    }

    pub fn wrapped_root(&self) -> Option<&WrappedRoot> {
        self.wrapped.as_ref()
    }

    /// Number of non-optional prefix matchers in the wrapped root.
    pub fn wrapped_prefix_length(&self) -> usize {
        self.wrapped.map_or(0, |w| w.prefix_length as usize)
    }

    pub fn look_behinds(&self) -> &[NodeId] {
        &self.look_behinds
    }

    pub fn look_arounds(&self) -> &[NodeId] {
        &self.look_arounds
    }

    /// Per-look-behind shapes, parallel to `look_behinds()`. Empty before `analyze`.
    pub fn look_behind_infos(&self) -> &[LookBehindInfo] {
        &self.look_behind_infos
    }

    pub fn look_behind_index(&self, node: NodeId) -> Option<usize> {
        self.look_behinds.iter().position(|&lb| lb == node)
    }

    pub fn match_founds(&self) -> &[NodeId] {
        &self.match_founds
    }

    pub fn reachable_carets(&self) -> &[NodeId] {
        &self.reachable_carets
    }

    pub fn reachable_dollars(&self) -> &[NodeId] {
        &self.reachable_dollars
    }

    pub fn properties(&self) -> RegexProperties {
        self.properties
    }

    pub fn is_analyzed(&self) -> bool {
        self.analyzed
    }

    /// Every alternative of the root group begins with `^`.
    pub fn starts_with_caret(&self) -> bool {
        let alternatives = &self.group(self.root_group()).alternatives;
        !alternatives.is_empty()
            && alternatives.iter().all(|&alt| {
                self.sequence(alt).terms.first().is_some_and(|&t| {
                    matches!(self.kind(t), NodeKind::PositionAssertion(PositionKind::Caret))
                })
            })
    }

    /// Parent used while stepping through the tree. The original root group
    /// continues inside the prefix wrapper once one exists.
    pub fn step_parent(&self, id: NodeId) -> Option<(NodeId, u32)> {
        if let Some(w) = self.wrapped {
            if id == self.root_group() {
                return Some((w.sequence, w.root_index));
            }
        }
        let node = self.node(id);
        node.parent.map(|p| (p, node.seq_index))
    }

    /// Closest look-around or root node above `id`.
    pub fn enclosing_subtree_root(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            if self.kind(p).is_subtree_root() {
                return Some(p);
            }
            cur = self.node(p).parent;
        }
        None
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Compute minimum paths and look-behind shapes. Idempotent.
    pub fn analyze(&mut self) {
        if self.analyzed {
            return;
        }
        let mut subtrees = vec![self.root()];
        subtrees.extend(self.look_arounds.iter().copied());
        for subtree in subtrees {
            let group = self.subtree_root(subtree).group;
            self.calc_min_path(group, 0);
        }

        let mut infos = Vec::with_capacity(self.look_behinds.len());
        for &lb in &self.look_behinds {
            let info = self.look_behind_shape(lb);
            if !info.is_literal {
                self.properties |= RegexProperties::COMPLEX_LOOK_BEHIND;
            }
            infos.push(info);
        }
        self.look_behind_infos = infos;
        self.analyzed = true;
        debug!(
            "analyzed syntax tree: {} nodes, {} capture groups, properties {:?}",
            self.nodes.len(),
            self.number_of_capture_groups(),
            self.properties
        );
    }

    /// Sets `min_path` on `group` and everything below it; returns the
    /// group's own minimum length.
    fn calc_min_path(&mut self, group: NodeId, start: u32) -> u32 {
        self.nodes[group.index()].min_path = start;
        let alternatives = self.group(group).alternatives.clone();
        let mut shortest = u32::MAX;
        for alt in alternatives {
            self.nodes[alt.index()].min_path = start;
            let mut cur = start;
            let terms = self.sequence(alt).terms.clone();
            for term in terms {
                self.nodes[term.index()].min_path = cur;
                cur += match self.kind(term) {
                    NodeKind::CharacterClass(_) => 1,
                    NodeKind::Group(_) => self.calc_min_path(term, cur),
                    _ => 0,
                };
            }
            shortest = shortest.min(cur - start);
        }
        if shortest == u32::MAX {
            0
        } else {
            shortest
        }
    }

    fn look_behind_shape(&self, lb: NodeId) -> LookBehindInfo {
        let body = self.group(self.subtree_root(lb).group);
        let mut classes = Vec::new();
        let mut is_literal = body.alternatives.len() == 1;
        if is_literal {
            for &t in &self.sequence(body.alternatives[0]).terms {
                match self.kind(t) {
                    NodeKind::CharacterClass(set) => classes.push(set.clone()),
                    _ => {
                        is_literal = false;
                        break;
                    }
                }
            }
        }
        if !is_literal {
            classes.clear();
        }

        let mut min_path = self.node(lb).min_path;
        let mut nested = false;
        let mut parent = self.enclosing_subtree_root(lb);
        while let Some(p) = parent {
            if matches!(self.kind(p), NodeKind::Root(_)) {
                break;
            }
            nested = true;
            min_path += self.node(p).min_path;
            parent = self.enclosing_subtree_root(p);
        }
        LookBehindInfo {
            node: lb,
            classes,
            is_literal,
            nested,
            min_path_from_root: min_path,
        }
    }

    // ========================================================================
    // Prefix
    // ========================================================================

    /// Wrap the root as `(?:P1..PN (?:|P(?:|P...)) ROOT MF)` so that
    /// look-behind assertions near the search start can see up to N
    /// characters before it.
    ///
    /// N is the largest amount by which a look-behind reaches before the
    /// pattern start. Without look-behinds, with N <= 0, or when the pattern
    /// starts with `^`, nothing is created. The original root group keeps
    /// its structure; only `step_parent` routes its exit through the wrapper.
    pub fn create_prefix(&mut self) -> Result<(), RegexError> {
        self.analyze();
        if self.wrapped.is_some() || self.look_behinds.is_empty() || self.starts_with_caret() {
            return Ok(());
        }
        let prefix_length = self
            .look_behind_infos
            .iter()
            .map(|info| info.length() as i64 - info.min_path_from_root as i64)
            .max()
            .unwrap_or(0);
        if prefix_length <= 0 {
            return Ok(());
        }
        let n = prefix_length as u32;

        let root = self.root();
        let root_group = self.root_group();
        let match_found = self.subtree_root(root).match_found;

        let wrap_group = self.create_group()?;
        let wrap_seq = self.create_sequence()?;
        self.add_alternative(wrap_group, wrap_seq);
        self.set_parent(wrap_group, root);
        for _ in 0..n {
            let p = self.create_prefix_any_matcher()?;
            self.add_term(wrap_seq, p);
        }

        let mut opt_group = self.create_group()?;
        self.add_term(wrap_seq, opt_group);
        for i in 0..n {
            let empty = self.create_sequence()?;
            self.add_alternative(opt_group, empty);
            let seq = self.create_sequence()?;
            self.add_alternative(opt_group, seq);
            let p = self.create_prefix_any_matcher()?;
            self.add_term(seq, p);
            if i + 1 < n {
                let next = self.create_group()?;
                self.add_term(seq, next);
                opt_group = next;
            }
        }

        // The root group and the match-found sentinel become terms of the
        // wrapper without changing their parent links.
        let root_index = match &mut self.nodes[wrap_seq.index()].kind {
            NodeKind::Sequence(s) => {
                s.terms.push(root_group);
                s.terms.push(match_found);
                s.terms.len() as u32 - 2
            }
            _ => unreachable!(),
        };
        self.wrapped = Some(WrappedRoot {
            group: wrap_group,
            sequence: wrap_seq,
            root_index,
            prefix_length: n,
        });
        self.calc_wrapper_min_path(wrap_seq, root_index as usize);
        debug!("created look-behind prefix of length {}", n);
        Ok(())
    }

    /// Min paths of the wrapper's own nodes. The root group and the
    /// match-found sentinel keep the values of the root subtree.
    fn calc_wrapper_min_path(&mut self, wrap_seq: NodeId, root_index: usize) {
        let wrap_group = self.nodes[wrap_seq.index()].parent;
        if let Some(g) = wrap_group {
            self.nodes[g.index()].min_path = 0;
        }
        self.nodes[wrap_seq.index()].min_path = 0;
        let prefix_terms = self.sequence(wrap_seq).terms[..root_index].to_vec();
        let mut cur = 0;
        for term in prefix_terms {
            self.nodes[term.index()].min_path = cur;
            cur += match self.kind(term) {
                NodeKind::Group(_) => self.calc_min_path(term, cur),
                _ => 1,
            };
        }
    }

    fn create_prefix_any_matcher(&mut self) -> Result<NodeId, RegexError> {
        let id = self.register(NodeKind::CharacterClass(CodePointSet::full()))?;
        self.nodes[id.index()].flags |= NodeFlags::PREFIX;
        Ok(id)
    }
}
