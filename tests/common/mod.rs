// common/mod.rs - Reference matcher shared by the integration tests.
//
// A plain backtracking interpreter over `Pattern` with leftmost-first
// semantics. Loops clear the groups they enclose when a new iteration
// starts and refuse iterations that consume nothing. Look-aheads keep the
// groups of the body's first match.

#![allow(dead_code)]

use std::ops::Range;

use tregex::charclass::CodePointSet;
use tregex::prelude::*;

#[derive(Clone, Debug)]
enum Node {
    Set(CodePointSet),
    Caret,
    Dollar,
    Seq(Vec<Node>),
    Alt(Vec<Node>),
    Cap(usize, Box<Node>),
    Star {
        body: Box<Node>,
        greedy: bool,
        clears: Range<usize>,
    },
    Opt {
        body: Box<Node>,
        greedy: bool,
    },
    LookAhead(Box<Node>),
    LookBehind(Vec<CodePointSet>),
}

struct Lower {
    next_group: usize,
}

impl Lower {
    fn lower(&mut self, p: &Pattern) -> Node {
        match p {
            Pattern::Char(c) => Node::Set(CodePointSet::from_char(*c)),
            Pattern::Class(set) => Node::Set(set.clone()),
            Pattern::Any => Node::Set(CodePointSet::full()),
            Pattern::Caret => Node::Caret,
            Pattern::Dollar => Node::Dollar,
            Pattern::Concat(items) => Node::Seq(items.iter().map(|i| self.lower(i)).collect()),
            Pattern::Alt(items) => Node::Alt(items.iter().map(|i| self.lower(i)).collect()),
            Pattern::Group(inner) => self.lower(inner),
            Pattern::Capture(inner) => {
                let n = self.next_group;
                self.next_group += 1;
                Node::Cap(n, Box::new(self.lower(inner)))
            }
            Pattern::Repeat { body, kind, greedy } => {
                let first = self.next_group;
                let body = self.lower(body);
                let clears = first..self.next_group;
                let star = || Node::Star {
                    body: Box::new(body.clone()),
                    greedy: *greedy,
                    clears: clears.clone(),
                };
                match kind {
                    RepeatKind::ZeroOrMore => star(),
                    RepeatKind::OneOrMore => Node::Seq(vec![body.clone(), star()]),
                    RepeatKind::ZeroOrOne => Node::Opt {
                        body: Box::new(body.clone()),
                        greedy: *greedy,
                    },
                }
            }
            Pattern::LookAhead { body, negated } => {
                assert!(!negated, "reference matcher has no negative look-ahead");
                Node::LookAhead(Box::new(self.lower(body)))
            }
            Pattern::LookBehind(body) => {
                let mut classes = Vec::new();
                literal_classes(body, &mut classes);
                Node::LookBehind(classes)
            }
            Pattern::BackReference(_) => panic!("reference matcher has no back-references"),
        }
    }
}

fn literal_classes(p: &Pattern, out: &mut Vec<CodePointSet>) {
    match p {
        Pattern::Char(c) => out.push(CodePointSet::from_char(*c)),
        Pattern::Class(set) => out.push(set.clone()),
        Pattern::Any => out.push(CodePointSet::full()),
        Pattern::Concat(items) => items.iter().for_each(|i| literal_classes(i, out)),
        Pattern::Group(inner) => literal_classes(inner, out),
        other => panic!("look-behind body {:?} is not literal", other),
    }
}

type Cont<'k> = &'k mut dyn FnMut(usize, &mut Vec<i32>) -> bool;

struct Backtracker<'a> {
    input: &'a str,
}

impl Backtracker<'_> {
    fn m(&self, n: &Node, pos: usize, caps: &mut Vec<i32>, k: Cont<'_>) -> bool {
        match n {
            Node::Set(set) => match self.input[pos..].chars().next() {
                Some(c) if set.contains_char(c) => k(pos + c.len_utf8(), caps),
                _ => false,
            },
            Node::Caret => pos == 0 && k(pos, caps),
            Node::Dollar => pos == self.input.len() && k(pos, caps),
            Node::Seq(items) => self.seq(items, pos, caps, k),
            Node::Alt(alts) => {
                for alt in alts {
                    if self.m(alt, pos, caps, k) {
                        return true;
                    }
                }
                false
            }
            Node::Cap(g, body) => {
                let g = *g;
                self.m(body, pos, caps, &mut |end: usize, caps: &mut Vec<i32>| {
                    let old = (caps[2 * g], caps[2 * g + 1]);
                    caps[2 * g] = pos as i32;
                    caps[2 * g + 1] = end as i32;
                    if k(end, caps) {
                        return true;
                    }
                    caps[2 * g] = old.0;
                    caps[2 * g + 1] = old.1;
                    false
                })
            }
            Node::Star { body, greedy, clears } => {
                if *greedy {
                    self.iterate(body, *greedy, clears, pos, caps, k) || k(pos, caps)
                } else {
                    k(pos, caps) || self.iterate(body, *greedy, clears, pos, caps, k)
                }
            }
            Node::Opt { body, greedy } => {
                if *greedy {
                    self.m(body, pos, caps, k) || k(pos, caps)
                } else {
                    k(pos, caps) || self.m(body, pos, caps, k)
                }
            }
            Node::LookAhead(body) => {
                // the first match of the body wins and keeps its groups
                let mut inner = caps.clone();
                if !self.m(body, pos, &mut inner, &mut |_: usize, _: &mut Vec<i32>| true) {
                    return false;
                }
                let saved = std::mem::replace(caps, inner);
                if k(pos, caps) {
                    return true;
                }
                *caps = saved;
                false
            }
            Node::LookBehind(classes) => {
                let mut chars = self.input[..pos].chars().rev();
                let fits = classes
                    .iter()
                    .rev()
                    .all(|set| chars.next().is_some_and(|c| set.contains_char(c)));
                fits && k(pos, caps)
            }
        }
    }

    fn seq(&self, items: &[Node], pos: usize, caps: &mut Vec<i32>, k: Cont<'_>) -> bool {
        match items.split_first() {
            None => k(pos, caps),
            Some((first, rest)) => self.m(first, pos, caps, &mut |p: usize, caps: &mut Vec<i32>| {
                self.seq(rest, p, caps, k)
            }),
        }
    }

    fn iterate(
        &self,
        body: &Node,
        greedy: bool,
        clears: &Range<usize>,
        pos: usize,
        caps: &mut Vec<i32>,
        k: Cont<'_>,
    ) -> bool {
        let saved = caps.clone();
        for g in clears.clone() {
            caps[2 * g] = -1;
            caps[2 * g + 1] = -1;
        }
        let ok = self.m(body, pos, caps, &mut |p: usize, caps: &mut Vec<i32>| {
            if p == pos {
                return false;
            }
            if greedy {
                self.iterate(body, greedy, clears, p, caps, k) || k(p, caps)
            } else {
                k(p, caps) || self.iterate(body, greedy, clears, p, caps, k)
            }
        });
        if !ok {
            *caps = saved;
        }
        ok
    }
}

/// Group spans of the leftmost-first match at or after `from`.
pub fn reference_captures(p: &Pattern, input: &str, from: usize) -> Option<Vec<Option<Range<usize>>>> {
    let mut lower = Lower { next_group: 1 };
    let root = lower.lower(p);
    let groups = lower.next_group;
    let bt = Backtracker { input };
    for start in (from..=input.len()).filter(|&i| input.is_char_boundary(i)) {
        let mut caps = vec![-1; groups * 2];
        let mut found = None;
        let matched = bt.m(&root, start, &mut caps, &mut |end: usize, caps: &mut Vec<i32>| {
            found = Some((end, caps.clone()));
            true
        });
        if matched {
            let (end, mut caps) = found.unwrap();
            caps[0] = start as i32;
            caps[1] = end as i32;
            return Some(spans(&caps));
        }
    }
    None
}

fn spans(caps: &[i32]) -> Vec<Option<Range<usize>>> {
    caps.chunks(2)
        .map(|c| (c[0] >= 0 && c[1] >= 0).then(|| c[0] as usize..c[1] as usize))
        .collect()
}

/// Group spans reported by the compiled regex.
pub fn engine_captures(re: &Regex, input: &str, from: usize) -> Option<Vec<Option<Range<usize>>>> {
    let caps = re.captures_at(input, from).unwrap()?;
    Some(caps.iter().map(|m| m.map(|m| m.range())).collect())
}

/// Compare the engine with the reference on every input, with and
/// without the trace finder.
pub fn assert_agrees(p: &Pattern, inputs: &[&str]) {
    for opts in [CompilerOptions::default(), CompilerOptions::default().trace_finder(false)] {
        let re = Regex::with_options(p, &opts).unwrap();
        for input in inputs {
            assert_eq!(
                engine_captures(&re, input, 0),
                reference_captures(p, input, 0),
                "pattern {:?} on {:?} ({:?})",
                p,
                input,
                re
            );
        }
    }
}
