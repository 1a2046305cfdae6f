// syntax.rs - Structured pattern description.
//
// The compiler consumes a syntax tree, not pattern text. `Pattern` is the
// shape a front-end hands over; `to_ast` lowers it into the arena store,
// numbering capture groups by their opening position and expanding the
// quantifiers into plain and loop groups.

use crate::charclass::CodePointSet;
use crate::error::RegexError;
use crate::options::CompilerOptions;
use crate::regast::{PositionKind, RegexAst};
use crate::regint::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatKind {
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// `?`
    ZeroOrOne,
}

/// A parsed regular expression.
///
/// ```
/// use tregex::syntax::Pattern;
///
/// // (a)(b)?
/// let p = Pattern::concat([
///     Pattern::capture(Pattern::literal("a")),
///     Pattern::optional(Pattern::capture(Pattern::literal("b"))),
/// ]);
/// assert_eq!(p.capture_count(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Char(char),
    Class(CodePointSet),
    Any,
    Caret,
    Dollar,
    Concat(Vec<Pattern>),
    Alt(Vec<Pattern>),
    Group(Box<Pattern>),
    Capture(Box<Pattern>),
    Repeat {
        body: Box<Pattern>,
        kind: RepeatKind,
        greedy: bool,
    },
    LookAhead {
        body: Box<Pattern>,
        negated: bool,
    },
    LookBehind(Box<Pattern>),
    BackReference(u32),
}

impl Pattern {
    /// A literal string; a single character becomes a bare `Char`.
    pub fn literal(s: &str) -> Pattern {
        let mut chars: Vec<Pattern> = s.chars().map(Pattern::Char).collect();
        if chars.len() == 1 {
            chars.remove(0)
        } else {
            Pattern::Concat(chars)
        }
    }

    /// A class of the given characters, as in `[abc]`.
    pub fn class(chars: &str) -> Pattern {
        Pattern::Class(CodePointSet::from_chars(chars))
    }

    pub fn range(lo: char, hi: char) -> Pattern {
        Pattern::Class(CodePointSet::range(lo as u32, hi as u32))
    }

    pub fn concat<I: IntoIterator<Item = Pattern>>(items: I) -> Pattern {
        Pattern::Concat(items.into_iter().collect())
    }

    pub fn alt<I: IntoIterator<Item = Pattern>>(items: I) -> Pattern {
        Pattern::Alt(items.into_iter().collect())
    }

    pub fn group(p: Pattern) -> Pattern {
        Pattern::Group(Box::new(p))
    }

    pub fn capture(p: Pattern) -> Pattern {
        Pattern::Capture(Box::new(p))
    }

    pub fn repeat(p: Pattern, kind: RepeatKind, greedy: bool) -> Pattern {
        Pattern::Repeat {
            body: Box::new(p),
            kind,
            greedy,
        }
    }

    pub fn star(p: Pattern) -> Pattern {
        Self::repeat(p, RepeatKind::ZeroOrMore, true)
    }

    pub fn star_lazy(p: Pattern) -> Pattern {
        Self::repeat(p, RepeatKind::ZeroOrMore, false)
    }

    pub fn plus(p: Pattern) -> Pattern {
        Self::repeat(p, RepeatKind::OneOrMore, true)
    }

    pub fn plus_lazy(p: Pattern) -> Pattern {
        Self::repeat(p, RepeatKind::OneOrMore, false)
    }

    pub fn optional(p: Pattern) -> Pattern {
        Self::repeat(p, RepeatKind::ZeroOrOne, true)
    }

    pub fn optional_lazy(p: Pattern) -> Pattern {
        Self::repeat(p, RepeatKind::ZeroOrOne, false)
    }

    pub fn look_ahead(p: Pattern) -> Pattern {
        Pattern::LookAhead {
            body: Box::new(p),
            negated: false,
        }
    }

    pub fn negative_look_ahead(p: Pattern) -> Pattern {
        Pattern::LookAhead {
            body: Box::new(p),
            negated: true,
        }
    }

    pub fn look_behind(p: Pattern) -> Pattern {
        Pattern::LookBehind(Box::new(p))
    }

    /// Number of capture groups, not counting group 0.
    pub fn capture_count(&self) -> u32 {
        match self {
            Pattern::Capture(inner) => 1 + inner.capture_count(),
            Pattern::Concat(items) | Pattern::Alt(items) => {
                items.iter().map(Pattern::capture_count).sum()
            }
            Pattern::Group(inner) | Pattern::LookBehind(inner) => inner.capture_count(),
            Pattern::Repeat { body, .. } | Pattern::LookAhead { body, .. } => body.capture_count(),
            _ => 0,
        }
    }

    /// Lower into a fresh syntax tree store.
    pub fn to_ast(&self, options: &CompilerOptions) -> Result<RegexAst, RegexError> {
        let mut ast = RegexAst::new(options);
        ast.create_root()?;
        let root_group = ast.root_group();
        let mut lowering = Lowering {
            ast: &mut ast,
            next_capture: 1,
        };
        lowering.fill_group(root_group, self)?;
        Ok(ast)
    }
}

struct Lowering<'a> {
    ast: &'a mut RegexAst,
    next_capture: u32,
}

impl Lowering<'_> {
    /// One alternative per branch of a top-level `Alt`, otherwise one.
    fn fill_group(&mut self, group: NodeId, pattern: &Pattern) -> Result<(), RegexError> {
        match pattern {
            Pattern::Alt(branches) => {
                for branch in branches {
                    let seq = self.ast.create_sequence()?;
                    self.ast.add_alternative(group, seq);
                    self.add_terms(seq, branch)?;
                }
            }
            p => {
                let seq = self.ast.create_sequence()?;
                self.ast.add_alternative(group, seq);
                self.add_terms(seq, p)?;
            }
        }
        Ok(())
    }

    fn add_terms(&mut self, seq: NodeId, pattern: &Pattern) -> Result<(), RegexError> {
        let term = match pattern {
            Pattern::Char(c) => self.ast.create_character_class(CodePointSet::from_char(*c))?,
            Pattern::Class(set) => self.ast.create_character_class(set.clone())?,
            Pattern::Any => self.ast.create_character_class(CodePointSet::full())?,
            Pattern::Caret => self.ast.create_position_assertion(PositionKind::Caret)?,
            Pattern::Dollar => self.ast.create_position_assertion(PositionKind::Dollar)?,
            Pattern::Concat(items) => {
                for item in items {
                    self.add_terms(seq, item)?;
                }
                return Ok(());
            }
            Pattern::Alt(_) => {
                let g = self.ast.create_group()?;
                self.fill_group(g, pattern)?;
                g
            }
            Pattern::Group(inner) => {
                let g = self.ast.create_group()?;
                self.fill_group(g, inner)?;
                g
            }
            Pattern::Capture(inner) => {
                let number = self.next_capture;
                self.next_capture += 1;
                let g = self.ast.create_capture_group(number)?;
                self.fill_group(g, inner)?;
                g
            }
            Pattern::Repeat { body, kind, greedy } => {
                return self.add_repeat(seq, body, *kind, *greedy);
            }
            Pattern::LookAhead { body, negated } => {
                let la = self.ast.create_look_ahead(*negated)?;
                let g = self.ast.subtree_root(la).group;
                self.fill_group(g, body)?;
                la
            }
            Pattern::LookBehind(body) => {
                let lb = self.ast.create_look_behind()?;
                let g = self.ast.subtree_root(lb).group;
                self.fill_group(g, body)?;
                lb
            }
            Pattern::BackReference(n) => self.ast.create_back_reference(*n)?,
        };
        self.ast.add_term(seq, term);
        Ok(())
    }

    fn add_repeat(
        &mut self,
        seq: NodeId,
        body: &Pattern,
        kind: RepeatKind,
        greedy: bool,
    ) -> Result<(), RegexError> {
        match kind {
            RepeatKind::OneOrMore => {
                // x+ = x x*, both copies share capture group numbers
                let first_capture = self.next_capture;
                self.add_terms(seq, body)?;
                self.next_capture = first_capture;
                self.add_loop(seq, body, greedy)
            }
            RepeatKind::ZeroOrMore => self.add_loop(seq, body, greedy),
            RepeatKind::ZeroOrOne => {
                let g = self.ast.create_group()?;
                let body_seq = self.ast.create_sequence()?;
                self.add_terms(body_seq, body)?;
                let empty = self.ast.create_sequence()?;
                self.add_branches(g, body_seq, empty, greedy);
                self.ast.add_term(seq, g);
                Ok(())
            }
        }
    }

    fn add_loop(&mut self, seq: NodeId, body: &Pattern, greedy: bool) -> Result<(), RegexError> {
        let g = self.ast.create_group()?;
        let first_capture = self.next_capture;
        let body_seq = self.ast.create_sequence()?;
        self.add_terms(body_seq, body)?;
        let empty = self.ast.create_sequence()?;
        self.add_branches(g, body_seq, empty, greedy);
        self.ast.set_loop(g, first_capture..self.next_capture);
        self.ast.add_term(seq, g);
        Ok(())
    }

    fn add_branches(&mut self, group: NodeId, body: NodeId, empty: NodeId, greedy: bool) {
        if greedy {
            self.ast.add_alternative(group, body);
            self.ast.add_alternative(group, empty);
        } else {
            self.ast.add_alternative(group, empty);
            self.ast.add_alternative(group, body);
        }
    }
}
