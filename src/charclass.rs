// charclass.rs - Code point sets used as character-class matchers.
// Sorted, non-overlapping inclusive ranges over Unicode scalar values,
// with the set algebra needed by the automaton builders and the range
// partitioning used by subset construction.

use std::fmt;

use smallvec::SmallVec;

use crate::regint::MAX_CODE_POINT;

/// A set of code points stored as sorted, disjoint, non-adjacent ranges.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct CodePointSet {
    ranges: SmallVec<[(u32, u32); 2]>,
}

impl CodePointSet {
    pub fn empty() -> Self {
        CodePointSet::default()
    }

    /// Every code point (`.` in dot-all mode, prefix matchers, loop-back).
    pub fn full() -> Self {
        Self::range(0, MAX_CODE_POINT)
    }

    pub fn from_char(c: char) -> Self {
        Self::range(c as u32, c as u32)
    }

    pub fn range(lo: u32, hi: u32) -> Self {
        let mut ranges = SmallVec::new();
        if lo <= hi {
            ranges.push((lo, hi.min(MAX_CODE_POINT)));
        }
        CodePointSet { ranges }
    }

    /// Build from arbitrary (possibly overlapping, unsorted) ranges.
    pub fn from_ranges<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        let mut raw: SmallVec<[(u32, u32); 8]> = iter
            .into_iter()
            .filter(|&(lo, hi)| lo <= hi)
            .map(|(lo, hi)| (lo, hi.min(MAX_CODE_POINT)))
            .collect();
        raw.sort_unstable();
        let mut ranges: SmallVec<[(u32, u32); 2]> = SmallVec::new();
        for (lo, hi) in raw {
            match ranges.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => {
                    last.1 = last.1.max(hi);
                }
                _ => ranges.push((lo, hi)),
            }
        }
        CodePointSet { ranges }
    }

    pub fn from_chars(chars: &str) -> Self {
        Self::from_ranges(chars.chars().map(|c| (c as u32, c as u32)))
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn matches_everything(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0] == (0, MAX_CODE_POINT)
    }

    /// The only member, if the set holds exactly one code point.
    pub fn single_char(&self) -> Option<char> {
        match self.ranges.as_slice() {
            [(lo, hi)] if lo == hi => char::from_u32(*lo),
            _ => None,
        }
    }

    pub fn min(&self) -> Option<u32> {
        self.ranges.first().map(|r| r.0)
    }

    pub fn contains(&self, c: u32) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < c {
                    std::cmp::Ordering::Less
                } else if lo > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    #[inline]
    pub fn contains_char(&self, c: char) -> bool {
        self.contains(c as u32)
    }

    pub fn union(&self, other: &CodePointSet) -> CodePointSet {
        Self::from_ranges(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    pub fn intersect(&self, other: &CodePointSet) -> CodePointSet {
        let mut ranges = SmallVec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo <= hi {
                ranges.push((lo, hi));
            }
            if a_hi < b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        CodePointSet { ranges }
    }

    pub fn complement(&self) -> CodePointSet {
        let mut ranges = SmallVec::new();
        let mut next = 0u32;
        for &(lo, hi) in &self.ranges {
            if lo > next {
                ranges.push((next, lo - 1));
            }
            next = hi + 1;
        }
        if next <= MAX_CODE_POINT {
            ranges.push((next, MAX_CODE_POINT));
        }
        CodePointSet { ranges }
    }

    pub fn subtract(&self, other: &CodePointSet) -> CodePointSet {
        self.intersect(&other.complement())
    }

    pub fn intersects(&self, other: &CodePointSet) -> bool {
        !self.intersect(other).is_empty()
    }
}

impl fmt::Debug for CodePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for CodePointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches_everything() {
            return write!(f, "[.]");
        }
        if let Some(c) = self.single_char() {
            return write_code_point(f, c as u32);
        }
        write!(f, "[")?;
        for &(lo, hi) in &self.ranges {
            write_code_point(f, lo)?;
            if hi > lo {
                write!(f, "-")?;
                write_code_point(f, hi)?;
            }
        }
        write!(f, "]")
    }
}

fn write_code_point(f: &mut fmt::Formatter<'_>, c: u32) -> fmt::Result {
    match char::from_u32(c) {
        Some(ch) if ch.is_ascii_graphic() => write!(f, "{}", ch),
        _ => write!(f, "\\u{{{:x}}}", c),
    }
}

// ============================================================================
// Range partitioning
// ============================================================================

/// One cell of a partition: a set of code points and the indices of the
/// input classes that contain all of it.
#[derive(Clone, Debug)]
pub struct PartitionCell {
    pub set: CodePointSet,
    pub members: SmallVec<[usize; 4]>,
}

/// Split the union of `classes` into maximal disjoint intervals such that
/// every interval is either fully inside or fully outside each class, then
/// group intervals with identical membership into one cell.
///
/// Cells come out ordered by their smallest code point.
pub fn partition(classes: &[&CodePointSet]) -> Vec<PartitionCell> {
    let mut bounds: Vec<u32> = Vec::new();
    for class in classes {
        for &(lo, hi) in class.ranges() {
            bounds.push(lo);
            bounds.push(hi + 1);
        }
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut cells: Vec<PartitionCell> = Vec::new();
    let mut pending: Vec<(SmallVec<[usize; 4]>, SmallVec<[(u32, u32); 4]>)> = Vec::new();
    for w in bounds.windows(2) {
        let (lo, hi) = (w[0], w[1] - 1);
        let members: SmallVec<[usize; 4]> = classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.contains(lo))
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        match pending.iter_mut().find(|(m, _)| *m == members) {
            Some((_, ranges)) => ranges.push((lo, hi)),
            None => {
                let mut ranges = SmallVec::new();
                ranges.push((lo, hi));
                pending.push((members, ranges));
            }
        }
    }
    for (members, ranges) in pending {
        cells.push(PartitionCell {
            set: CodePointSet::from_ranges(ranges),
            members,
        });
    }
    cells
}
