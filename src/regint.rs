// regint.rs - Internal types and configuration constants.
// Node / state / transition identifiers, the compact bit set used for
// state membership and capture boundary indices, and the default
// ceilings enforced while compiling.

use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

// === Config Constants ===
pub const DEFAULT_MAX_PARSE_TREE_SIZE: u32 = 4000;
pub const DEFAULT_MAX_CAPTURE_GROUPS: u32 = 0x7fff;
pub const DEFAULT_MAX_NFA_SIZE: usize = 3500;
pub const DEFAULT_MAX_DFA_SIZE: usize = 2400;
pub const DEFAULT_TRACE_FINDER_MAX_PATHS: usize = 2048;

// === Internal Constants ===
/// Largest Unicode scalar value.
pub const MAX_CODE_POINT: u32 = 0x10ffff;
/// Marks an unset capture boundary in registers and regions.
pub const REGION_NOTPOS: i32 = -1;
/// Pre-calculated result rank meaning "no result admitted".
pub const NO_RESULT: u8 = 0xff;
/// Ranks are stored in a byte, `NO_RESULT` is reserved.
pub const TRACE_FINDER_MAX_RESULTS: usize = 254;
/// Reorder permutations are byte arrays; the final slot sits at `max_slots`.
pub const MAX_REGISTER_SLOTS: usize = 255;
/// Look-behind progress is tracked in a `u64` bitmask (bit 0 is the empty prefix).
pub const MAX_LOOK_BEHIND_LENGTH: usize = 63;
/// DFA state ids are 16 bit.
pub const MAX_DFA_STATE_ID: usize = u16::MAX as usize;

// === Identifiers ===

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub $repr);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Index of a node in the syntax tree arena.
    NodeId(u32)
);
define_id!(
    /// Index of an NFA state.
    NfaStateId(u32)
);
define_id!(
    /// Index of an NFA transition.
    TransitionId(u32)
);
define_id!(
    /// Index of a DFA state.
    DfaStateId(u16)
);
define_id!(
    /// Id of a lazy capture-group transition record, assigned in creation order.
    LazyTransitionId(u32)
);

// === CompactBitSet ===

/// Growable bit set over small non-negative integers.
///
/// Equality and hashing ignore trailing zero words, so two sets with the
/// same members compare equal regardless of how they grew.
#[derive(Clone, Default)]
pub struct CompactBitSet {
    words: SmallVec<[u64; 2]>,
}

impl CompactBitSet {
    pub fn new() -> Self {
        CompactBitSet::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        let mut words = SmallVec::new();
        words.resize(bits.div_ceil(64), 0);
        CompactBitSet { words }
    }

    /// Insert `i`; returns `false` if it was already present.
    pub fn insert(&mut self, i: usize) -> bool {
        let (w, b) = (i / 64, i % 64);
        if w >= self.words.len() {
            self.words.resize(w + 1, 0);
        }
        let had = self.words[w] & (1 << b) != 0;
        self.words[w] |= 1 << b;
        !had
    }

    pub fn remove(&mut self, i: usize) -> bool {
        let (w, b) = (i / 64, i % 64);
        if w >= self.words.len() {
            return false;
        }
        let had = self.words[w] & (1 << b) != 0;
        self.words[w] &= !(1 << b);
        had
    }

    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        let (w, b) = (i / 64, i % 64);
        w < self.words.len() && self.words[w] & (1 << b) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn union_with(&mut self, other: &CompactBitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    pub fn subtract(&mut self, other: &CompactBitSet) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= !*b;
        }
    }

    pub fn is_disjoint(&self, other: &CompactBitSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == 0)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let b = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(wi * 64 + b)
            })
        })
    }

    fn significant_words(&self) -> &[u64] {
        let mut n = self.words.len();
        while n > 0 && self.words[n - 1] == 0 {
            n -= 1;
        }
        &self.words[..n]
    }
}

impl PartialEq for CompactBitSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for CompactBitSet {}

impl Hash for CompactBitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl std::fmt::Debug for CompactBitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for CompactBitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = CompactBitSet::new();
        for i in iter {
            set.insert(i);
        }
        set
    }
}
