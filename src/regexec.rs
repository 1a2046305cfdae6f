// regexec.rs - Automaton execution.
// The forward search automaton finds where the leftmost match ends. The
// start and the capture groups then come from the strategy chosen at
// compile time: a fixed layout, the trace finder, a capture group replay
// or the backward automaton.

use std::ops::Range;

use memchr::memchr;

use crate::cgtrans::{CgProgram, ProgramId, RESULT_SLOT};
use crate::dfagen::Dfa;
use crate::regcomp::{CaptureStrategy, CompiledRegex};
use crate::regint::*;
use crate::tracefinder::TraceFinder;

// ============================================================================
// Region
// ============================================================================

/// Byte offsets of every capture group of one match, `REGION_NOTPOS`
/// where a group did not participate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub beg: Vec<i32>,
    pub end: Vec<i32>,
}

impl Region {
    fn from_registers(regs: &[i32]) -> Self {
        Region {
            beg: regs.iter().step_by(2).copied().collect(),
            end: regs.iter().skip(1).step_by(2).copied().collect(),
        }
    }

    pub fn num_regs(&self) -> usize {
        self.beg.len()
    }

    /// Span of group `i`, `None` if it is unset or out of range.
    pub fn get(&self, i: usize) -> Option<Range<usize>> {
        let (b, e) = (*self.beg.get(i)?, *self.end.get(i)?);
        if b == REGION_NOTPOS || e == REGION_NOTPOS {
            return None;
        }
        Some(b as usize..e as usize)
    }
}

// ============================================================================
// Entry selection
// ============================================================================

/// Back up from `from` over up to `prefix_length` characters of context.
/// Returns the byte offset the automaton starts at and how many prefix
/// characters lie between it and `from`.
fn scan_start(input: &str, from: usize, prefix_length: usize) -> (usize, usize) {
    let mut start = from;
    let mut k = 0;
    for (i, _) in input[..from].char_indices().rev().take(prefix_length) {
        start = i;
        k += 1;
    }
    (start, k)
}

/// Anchored entries are only valid at the very start of the input.
fn entry_state(dfa: &Dfa, start: usize, k: usize) -> Option<(DfaStateId, Option<ProgramId>)> {
    let (states, programs) = if start == 0 {
        (&dfa.anchored_entry, &dfa.anchored_entry_programs)
    } else {
        (&dfa.unanchored_entry, &dfa.unanchored_entry_programs)
    };
    let state = states.get(k).copied().flatten()?;
    Some((state, programs.get(k).copied().flatten()))
}

// ============================================================================
// Forward search
// ============================================================================

/// End of the leftmost match starting at or after `from`.
pub fn forward_search(dfa: &Dfa, input: &str, from: usize) -> Option<usize> {
    let (start, k) = scan_start(input, from, dfa.prefix_length);
    let (mut state, _) = entry_state(dfa, start, k)?;
    let bytes = input.as_bytes();
    let mut pos = start;
    let mut last = None;
    loop {
        let s = dfa.state(state);
        if s.is_final() {
            last = Some(pos);
        }
        if pos == input.len() {
            if s.is_anchored_final() {
                last = Some(pos);
            }
            break;
        }
        if !s.is_final() {
            if let Some(c) = s.find_single_char.filter(char::is_ascii) {
                match memchr(c as u8, &bytes[pos..]) {
                    Some(i) => pos += i,
                    None => {
                        pos = input.len();
                        continue;
                    }
                }
            }
        }
        let Some(c) = input[pos..].chars().next() else {
            break;
        };
        match s.successor(c) {
            Some(next) => {
                state = next;
                pos += c.len_utf8();
            }
            None => break,
        }
    }
    last
}

// ============================================================================
// Backward search
// ============================================================================

/// Leftmost start at or after `from` of a match ending at `end`.
fn backward_search(dfa: &Dfa, input: &str, from: usize, end: usize) -> Option<usize> {
    let entries = if end == input.len() {
        &dfa.anchored_entry
    } else {
        &dfa.unanchored_entry
    };
    let mut state = entries.first().copied().flatten()?;
    let mut pos = end;
    let mut start = None;
    loop {
        let s = dfa.state(state);
        if s.is_final() || (pos == 0 && s.is_anchored_final()) {
            start = Some(pos);
        }
        if pos <= from {
            break;
        }
        let Some(c) = input[..pos].chars().next_back() else {
            break;
        };
        match s.successor(c) {
            Some(next) => {
                state = next;
                pos -= c.len_utf8();
            }
            None => break,
        }
    }
    start
}

/// Like `backward_search`, also reporting the rank of the best path
/// through the match.
fn trace_finder_search(tf: &TraceFinder, input: &str, from: usize, end: usize) -> Option<(usize, u8)> {
    let dfa = &tf.dfa;
    let entries = if end == input.len() {
        &dfa.anchored_entry
    } else {
        &dfa.unanchored_entry
    };
    let mut state = entries.first().copied().flatten()?;
    let mut pos = end;
    let mut found = None;
    loop {
        let s = dfa.state(state);
        let rank = if pos == 0 && s.pre_calc_anchored != NO_RESULT {
            s.pre_calc_anchored
        } else {
            s.pre_calc_unanchored
        };
        if rank != NO_RESULT {
            found = Some((pos, rank));
        }
        if pos <= from {
            break;
        }
        let Some(c) = input[..pos].chars().next_back() else {
            break;
        };
        match s.successor(c) {
            Some(next) => {
                state = next;
                pos -= c.len_utf8();
            }
            None => break,
        }
    }
    found
}

// ============================================================================
// Capture group replay
// ============================================================================

/// Register rows addressed through a logical to physical slot map, so
/// reordering moves indices instead of rows.
struct Registers {
    width: usize,
    rows: Vec<i32>,
    order: Vec<usize>,
    swap: Vec<usize>,
}

impl Registers {
    fn new(width: usize, max_slots: usize) -> Self {
        let mut order: Vec<usize> = (0..=RESULT_SLOT).collect();
        order[RESULT_SLOT] = max_slots;
        Registers {
            width,
            rows: vec![REGION_NOTPOS; (max_slots + 1) * width],
            order,
            swap: vec![0; RESULT_SLOT + 1],
        }
    }

    #[inline]
    fn row(&self, slot: u8) -> usize {
        self.order[slot as usize] * self.width
    }

    fn apply(&mut self, program: &CgProgram, pos: usize) {
        if let Some(reorder) = &program.reorder {
            for (d, &s) in reorder.iter().enumerate() {
                self.swap[d] = self.order[s as usize];
            }
            self.order[..reorder.len()].copy_from_slice(&self.swap[..reorder.len()]);
        }
        for &(s, d) in &program.copies {
            let (src, dst) = (self.row(s), self.row(d));
            self.rows.copy_within(src..src + self.width, dst);
        }
        for (slot, indices) in &program.index_updates {
            let row = self.row(*slot);
            for &i in indices {
                self.rows[row + i as usize] = pos as i32;
            }
        }
        for (slot, indices) in &program.index_clears {
            let row = self.row(*slot);
            for &i in indices {
                self.rows[row + i as usize] = REGION_NOTPOS;
            }
        }
    }

    fn result(&self) -> &[i32] {
        let row = self.order[RESULT_SLOT] * self.width;
        &self.rows[row..row + self.width]
    }
}

/// Replay the capture group automaton from `from` up to the known match
/// end and publish the registers of the final transition taken there.
fn capture_group_search(dfa: &Dfa, input: &str, from: usize, end: usize) -> Option<Vec<i32>> {
    let programs = dfa.cg.as_ref()?;
    let (start, k) = scan_start(input, from, dfa.prefix_length);
    let (mut state, entry_program) = entry_state(dfa, start, k)?;
    let mut regs = Registers::new(dfa.number_of_capture_groups * 2, programs.max_slots);
    if let Some(p) = entry_program {
        regs.apply(programs.program(p), start);
    }
    let mut pos = start;
    while pos < end {
        let s = dfa.state(state);
        let c = input[pos..].chars().next()?;
        let edge = s.edge_for(c)?;
        let lazy = s.cg.as_ref()?;
        pos += c.len_utf8();
        regs.apply(programs.program(lazy.partial[edge]), pos);
        state = s.successors[edge];
    }
    let s = dfa.state(state);
    let lazy = s.cg.as_ref()?;
    let program = if end == input.len() && s.is_anchored_final() {
        lazy.anchored_final_transition
    } else if s.is_final() {
        lazy.final_transition
    } else {
        None
    }?;
    regs.apply(programs.program(program), end);
    Some(regs.result().to_vec())
}

// ============================================================================
// Search
// ============================================================================

/// Leftmost match starting at or after byte offset `from`, which must lie
/// on a character boundary.
pub fn search(re: &CompiledRegex, input: &str, from: usize) -> Option<Region> {
    let end = forward_search(&re.forward, input, from)?;
    let width = re.number_of_capture_groups * 2;
    let regs = match &re.strategy {
        CaptureStrategy::Single(result) => {
            let mut regs = vec![REGION_NOTPOS; width];
            result.apply_from_end(input, end, &mut regs);
            regs
        }
        CaptureStrategy::TraceFinder(tf) => {
            let (start, rank) = trace_finder_search(tf, input, from, end)?;
            let mut regs = vec![REGION_NOTPOS; width];
            tf.result(rank).apply_from_start(input, start, &mut regs);
            regs
        }
        CaptureStrategy::CaptureGroups(dfa) => capture_group_search(dfa, input, from, end)?,
        CaptureStrategy::Backward(dfa) => {
            let start = backward_search(dfa, input, from, end)?;
            let mut regs = vec![REGION_NOTPOS; width];
            regs[0] = start as i32;
            regs[1] = end as i32;
            regs
        }
    };
    Some(Region::from_registers(&regs))
}

/// Whether any match starts at or after `from`.
pub fn is_match_at(re: &CompiledRegex, input: &str, from: usize) -> bool {
    forward_search(&re.forward, input, from).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CompilerOptions;
    use crate::regcomp::compile;
    use crate::syntax::Pattern;
    use smallvec::smallvec;

    fn spans(p: &Pattern, opts: &CompilerOptions, input: &str) -> Option<Vec<Option<Range<usize>>>> {
        let re = compile(p, opts).unwrap();
        let region = search(&re, input, 0)?;
        Some((0..region.num_regs()).map(|i| region.get(i)).collect())
    }

    #[test]
    fn scan_start_backs_up_over_characters() {
        assert_eq!(scan_start("aébc", 4, 2), (1, 2));
        assert_eq!(scan_start("abc", 1, 3), (0, 1));
        assert_eq!(scan_start("abc", 2, 0), (2, 0));
    }

    #[test]
    fn registers_reorder_then_copy_then_stamp() {
        let mut regs = Registers::new(2, 3);
        let mut p = CgProgram::default();
        p.index_updates.push((0, smallvec![0]));
        regs.apply(&p, 4);

        let mut p = CgProgram::default();
        p.reorder = Some(vec![1, 0].into_boxed_slice());
        p.copies.push((1, 2));
        p.index_updates.push((2, smallvec![1]));
        regs.apply(&p, 7);
        // slot 1 now holds the stamped row, slot 2 a copy finished at 7
        assert_eq!(&regs.rows[regs.row(1)..regs.row(1) + 2], &[4, -1]);
        assert_eq!(&regs.rows[regs.row(2)..regs.row(2) + 2], &[4, 7]);

        let mut p = CgProgram::default();
        p.copies.push((2, RESULT_SLOT as u8));
        regs.apply(&p, 7);
        assert_eq!(regs.result(), &[4, 7]);
    }

    #[test]
    fn forward_search_finds_leftmost_first() {
        let opts = CompilerOptions::default();
        let re = compile(&Pattern::alt([Pattern::literal("a"), Pattern::literal("ab")]), &opts).unwrap();
        assert_eq!(forward_search(&re.forward, "xab", 0), Some(2));
        let re = compile(&Pattern::plus(Pattern::literal("a")), &opts).unwrap();
        assert_eq!(forward_search(&re.forward, "baaab", 0), Some(4));
        assert_eq!(forward_search(&re.forward, "bbb", 0), None);
    }

    #[test]
    fn skip_ahead_respects_anchored_final() {
        let opts = CompilerOptions::default();
        // x$
        let re = compile(&Pattern::concat([Pattern::literal("x"), Pattern::Dollar]), &opts).unwrap();
        assert_eq!(forward_search(&re.forward, "axbbx", 0), Some(5));
        assert_eq!(forward_search(&re.forward, "axbb", 0), None);
    }

    #[test]
    fn backward_strategy_recovers_start() {
        let opts = CompilerOptions::default();
        let p = Pattern::alt([Pattern::literal("bc"), Pattern::literal("abcd")]);
        assert_eq!(spans(&p, &opts, "xabcd"), Some(vec![Some(1..5)]));
        assert_eq!(spans(&p, &opts, "xbc"), Some(vec![Some(1..3)]));
    }

    #[test]
    fn all_strategies_agree() {
        // (a|ab)(c|bcd)(d*)
        let p = Pattern::concat([
            Pattern::capture(Pattern::alt([Pattern::literal("a"), Pattern::literal("ab")])),
            Pattern::capture(Pattern::alt([Pattern::literal("c"), Pattern::literal("bcd")])),
            Pattern::capture(Pattern::star(Pattern::literal("d"))),
        ]);
        let expected = Some(vec![Some(1..6), Some(1..2), Some(2..5), Some(5..6)]);
        let with_tf = CompilerOptions::default();
        let without_tf = CompilerOptions::default().trace_finder(false);
        assert_eq!(spans(&p, &with_tf, "xabcdd"), expected);
        assert_eq!(spans(&p, &without_tf, "xabcdd"), expected);

        // loop-free variant goes through the trace finder
        let p = Pattern::concat([
            Pattern::capture(Pattern::alt([Pattern::literal("a"), Pattern::literal("ab")])),
            Pattern::capture(Pattern::alt([Pattern::literal("c"), Pattern::literal("bcd")])),
        ]);
        let expected = Some(vec![Some(1..5), Some(1..2), Some(2..5)]);
        assert_eq!(spans(&p, &with_tf, "xabcd"), expected);
        assert_eq!(spans(&p, &without_tf, "xabcd"), expected);
    }

    #[test]
    fn search_from_offset() {
        let opts = CompilerOptions::default();
        let re = compile(&Pattern::capture(Pattern::literal("ab")), &opts).unwrap();
        let region = search(&re, "abab", 1).unwrap();
        assert_eq!(region.get(0), Some(2..4));
        assert_eq!(region.get(1), Some(2..4));
        assert!(search(&re, "abab", 3).is_none());
        assert!(is_match_at(&re, "abab", 2));
    }
}
