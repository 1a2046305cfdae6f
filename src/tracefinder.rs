// tracefinder.rs - Pre-calculated capture group results.
//
// A loop-free pattern has finitely many NFA paths, and every path fixes
// where each capture boundary lands relative to the match start. Those
// layouts are ranked in priority order. A trie of the reversed paths is
// compiled into a DFA that runs backwards from the match end and reports
// the best ranked path that fits the text.

use std::collections::HashMap;

use log::{debug, info};
use smallvec::SmallVec;

use crate::charclass::CodePointSet;
use crate::dfagen::{create_dfa, Dfa, DfaConfig};
use crate::error::RegexError;
use crate::nfa::{GroupBoundaries, Nfa, NfaStateFlags, NfaStateKind};
use crate::options::CompilerOptions;
use crate::regint::*;

// === PreCalculatedResult ===

/// Capture boundaries of one NFA path, as character offsets from the
/// match start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreCalculatedResult {
    /// Per boundary index, `REGION_NOTPOS` if unset.
    pub indices: Vec<i32>,
    /// Characters consumed by the path.
    pub length: usize,
}

impl PreCalculatedResult {
    fn from_path(nfa: &Nfa, path: &[TransitionId]) -> Self {
        let mut indices = vec![REGION_NOTPOS; nfa.number_of_capture_groups * 2];
        for (offset, &t) in path.iter().enumerate() {
            apply_boundaries(&mut indices, &nfa.transition(t).group_boundaries, offset as i32);
        }
        PreCalculatedResult {
            indices,
            length: path.len().saturating_sub(1),
        }
    }

    /// Write byte offsets for a match starting at byte `start` into `regs`.
    pub fn apply_from_start(&self, input: &str, start: usize, regs: &mut [i32]) {
        let mut offsets: SmallVec<[usize; 16]> = SmallVec::new();
        offsets.push(start);
        for (i, c) in input[start..].char_indices().take(self.length) {
            offsets.push(start + i + c.len_utf8());
        }
        for (reg, &idx) in regs.iter_mut().zip(&self.indices) {
            *reg = if idx == REGION_NOTPOS {
                REGION_NOTPOS
            } else {
                offsets[idx as usize] as i32
            };
        }
    }

    /// Same as `apply_from_start` for a match ending at byte `end`.
    pub fn apply_from_end(&self, input: &str, end: usize, regs: &mut [i32]) {
        let start = match self.length {
            0 => end,
            n => input[..end]
                .char_indices()
                .rev()
                .nth(n - 1)
                .map_or(0, |(i, _)| i),
        };
        self.apply_from_start(input, start, regs);
    }
}

fn apply_boundaries(indices: &mut [i32], boundaries: &GroupBoundaries, offset: i32) {
    for i in boundaries.updates().iter() {
        indices[i] = offset;
    }
    for i in boundaries.clears().iter() {
        indices[i] = REGION_NOTPOS;
    }
}

// === Path enumeration ===

/// Paths from `entry` to a final state in priority order, restart excluded.
/// `None` once more than `max_paths` exist.
fn enumerate_paths(nfa: &Nfa, entry: NfaStateId, max_paths: usize) -> Option<Vec<Vec<TransitionId>>> {
    fn walk(
        nfa: &Nfa,
        state: NfaStateId,
        path: &mut Vec<TransitionId>,
        out: &mut Vec<Vec<TransitionId>>,
        max_paths: usize,
    ) -> bool {
        for &t in &nfa.state(state).next {
            let target = nfa.state(nfa.transition(t).target);
            if target.flags.contains(NfaStateFlags::LOOP_BACK) {
                continue;
            }
            path.push(t);
            if target.is_final() || target.is_anchored_final() {
                if out.len() >= max_paths {
                    return false;
                }
                out.push(path.clone());
            } else if !walk(nfa, target.id, path, out, max_paths) {
                return false;
            }
            path.pop();
        }
        true
    }

    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(nfa, entry, &mut path, &mut out, max_paths).then_some(out)
}

/// The single capture layout of a pattern without alternatives, or `None`.
pub fn precalculate_single(nfa: &Nfa) -> Option<PreCalculatedResult> {
    let entry = nfa
        .unanchored_entry
        .first()
        .or(nfa.anchored_entry.first())
        .copied()?;
    let paths = enumerate_paths(nfa, entry, 1)?;
    let [path] = paths.as_slice() else {
        return None;
    };
    Some(PreCalculatedResult::from_path(nfa, path))
}

// === Trace finder ===

/// Backward DFA over the reversed paths plus the results it ranks.
#[derive(Clone, Debug)]
pub struct TraceFinder {
    pub dfa: Dfa,
    /// Indexed by rank.
    pub results: Vec<PreCalculatedResult>,
}

impl TraceFinder {
    pub fn result(&self, rank: u8) -> &PreCalculatedResult {
        &self.results[rank as usize]
    }
}

struct TrieBuilder {
    nfa: Nfa,
    children: HashMap<(NfaStateId, CodePointSet), NfaStateId>,
    finals: HashMap<(NfaStateId, bool), NfaStateId>,
}

impl TrieBuilder {
    fn child(&mut self, parent: NfaStateId, class: &CodePointSet) -> NfaStateId {
        if let Some(&id) = self.children.get(&(parent, class.clone())) {
            return id;
        }
        let id = self.nfa.add_state(NfaStateKind::Matcher, class.clone());
        self.nfa.add_transition(parent, id, GroupBoundaries::new());
        self.children.insert((parent, class.clone()), id);
        id
    }

    /// Accepting state after `node`; anchored ones only count at the input start.
    fn accept(&mut self, node: NfaStateId, anchored: bool, rank: u8) {
        let id = match self.finals.get(&(node, anchored)) {
            Some(&id) => id,
            None => {
                let kind = if anchored {
                    NfaStateKind::AnchoredFinal
                } else {
                    NfaStateKind::Final
                };
                let id = self.nfa.add_state(kind, CodePointSet::empty());
                self.nfa.add_transition(node, id, GroupBoundaries::new());
                self.finals.insert((node, anchored), id);
                id
            }
        };
        self.nfa.state_mut(id).possible_results.push(rank);
    }

    fn insert(&mut self, root: NfaStateId, classes: &[&CodePointSet], anchored: bool, rank: u8) {
        let mut cur = root;
        for class in classes.iter().rev() {
            cur = self.child(cur, class);
        }
        self.accept(cur, anchored, rank);
    }
}

/// Build the trace finder of a loop-free NFA without look-arounds.
/// Returns `Ok(None)` when the pattern has too many paths or results.
pub fn create_trace_finder(
    nfa: &Nfa,
    has_carets: bool,
    options: &CompilerOptions,
) -> Result<Option<TraceFinder>, RegexError> {
    let max_paths = options.get_trace_finder_max_paths();
    // (entry, matches starting anywhere)
    let mut entries: SmallVec<[(NfaStateId, bool); 2]> = SmallVec::new();
    if has_carets || !nfa.has_unanchored_entry() {
        entries.push((nfa.anchored_entry[0], false));
    }
    if let Some(&u) = nfa.unanchored_entry.first() {
        entries.push((u, true));
    }

    let mut trie = TrieBuilder {
        nfa: Nfa::new(nfa.number_of_capture_groups, 0),
        children: HashMap::new(),
        finals: HashMap::new(),
    };
    let at_end = trie
        .nfa
        .add_state(NfaStateKind::Initial { anchored: true }, CodePointSet::empty());
    let inside = trie
        .nfa
        .add_state(NfaStateKind::Initial { anchored: false }, CodePointSet::empty());
    trie.nfa.anchored_entry.push(at_end);
    trie.nfa.unanchored_entry.push(inside);

    let mut results = Vec::new();
    for (entry, anywhere) in entries {
        let Some(paths) = enumerate_paths(nfa, entry, max_paths) else {
            info!("trace finder: more than {} paths, falling back", max_paths);
            return Ok(None);
        };
        for path in paths {
            if results.len() >= TRACE_FINDER_MAX_RESULTS {
                info!(
                    "trace finder: more than {} results, falling back",
                    TRACE_FINDER_MAX_RESULTS
                );
                return Ok(None);
            }
            let rank = results.len() as u8;
            let classes: Vec<&CodePointSet> = path[..path.len() - 1]
                .iter()
                .map(|&t| &nfa.state(nfa.transition(t).target).matcher)
                .collect();
            let last = nfa.state(nfa.transition(path[path.len() - 1]).target);
            trie.insert(at_end, &classes, !anywhere, rank);
            if !last.is_anchored_final() {
                trie.insert(inside, &classes, !anywhere, rank);
            }
            results.push(PreCalculatedResult::from_path(nfa, &path));
        }
    }
    debug!(
        "trace finder: {} results, trie of {} states",
        results.len(),
        trie.nfa.number_of_states()
    );

    match create_dfa(&trie.nfa, DfaConfig::TRACE_FINDER, options) {
        Ok(dfa) => Ok(Some(TraceFinder { dfa, results })),
        Err(RegexError::SizeLimit { message, .. }) => {
            info!("trace finder: {}, falling back", message);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfagen::create_nfa;
    use crate::syntax::Pattern;

    fn nfa_of(p: &Pattern) -> Nfa {
        let opts = CompilerOptions::default();
        let mut ast = p.to_ast(&opts).unwrap();
        ast.analyze();
        create_nfa(&ast, &opts).unwrap()
    }

    #[test]
    fn single_result_of_fixed_pattern() {
        // a(b)c
        let nfa = nfa_of(&Pattern::concat([
            Pattern::literal("a"),
            Pattern::capture(Pattern::literal("b")),
            Pattern::literal("c"),
        ]));
        let r = precalculate_single(&nfa).unwrap();
        assert_eq!(r.length, 3);
        assert_eq!(r.indices, vec![0, 3, 1, 2]);

        let mut regs = [0; 4];
        r.apply_from_end("xxabc", 5, &mut regs);
        assert_eq!(regs, [2, 5, 3, 4]);
    }

    #[test]
    fn byte_offsets_follow_utf8() {
        let nfa = nfa_of(&Pattern::concat([
            Pattern::capture(Pattern::literal("é")),
            Pattern::literal("b"),
        ]));
        let r = precalculate_single(&nfa).unwrap();
        let mut regs = [0; 4];
        r.apply_from_end("xéb", 4, &mut regs);
        assert_eq!(regs, [1, 4, 1, 3]);
    }

    #[test]
    fn alternatives_are_ranked_in_priority_order() {
        // (a)|(ab)|b
        let p = Pattern::alt([
            Pattern::capture(Pattern::literal("a")),
            Pattern::capture(Pattern::literal("ab")),
            Pattern::literal("b"),
        ]);
        let tf = create_trace_finder(&nfa_of(&p), false, &CompilerOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(tf.results.len(), 3);
        assert_eq!(tf.result(0).indices, vec![0, 1, 0, 1, -1, -1]);
        assert_eq!(tf.result(1).indices, vec![0, 2, -1, -1, 0, 2]);

        // reading "ab" backwards from its end: 'b' alone fits rank 2,
        // "ab" fits rank 1
        let dfa = &tf.dfa;
        let entry = dfa.state(dfa.unanchored_entry[0].unwrap());
        let after_b = dfa.state(entry.successor('b').unwrap());
        assert_eq!(after_b.pre_calc_unanchored, 2);
        let after_ab = dfa.state(after_b.successor('a').unwrap());
        assert_eq!(after_ab.pre_calc_unanchored, 1);
    }

    #[test]
    fn dollar_paths_only_at_end() {
        // (a)$|a
        let p = Pattern::alt([
            Pattern::concat([Pattern::capture(Pattern::literal("a")), Pattern::Dollar]),
            Pattern::literal("a"),
        ]);
        let tf = create_trace_finder(&nfa_of(&p), false, &CompilerOptions::default())
            .unwrap()
            .unwrap();
        let dfa = &tf.dfa;
        let at_end = dfa.state(dfa.anchored_entry[0].unwrap());
        let inside = dfa.state(dfa.unanchored_entry[0].unwrap());
        assert_eq!(dfa.state(at_end.successor('a').unwrap()).pre_calc_unanchored, 0);
        assert_eq!(dfa.state(inside.successor('a').unwrap()).pre_calc_unanchored, 1);
    }

    #[test]
    fn too_many_paths_bails_out() {
        let p = Pattern::alt([
            Pattern::capture(Pattern::literal("a")),
            Pattern::capture(Pattern::literal("b")),
            Pattern::capture(Pattern::literal("c")),
        ]);
        let opts = CompilerOptions::default().trace_finder_max_paths(2);
        assert!(create_trace_finder(&nfa_of(&p), false, &opts).unwrap().is_none());
    }
}
