// compile_properties.rs - Structural properties of the compiled automata.

mod common;

use tregex::cgtrans::CgProgram;
use tregex::dfagen::Dfa;
use tregex::nfa::Nfa;
use tregex::prelude::*;
use tregex::regcomp::{compile, CaptureStrategy};
use tregex::regdump::{ast_to_string, dfa_to_dot, nfa_to_dot};
use tregex::regerror::*;
use tregex::regint::NfaStateId;

fn lit(s: &str) -> Pattern {
    Pattern::literal(s)
}

fn patterns() -> Vec<Pattern> {
    vec![
        lit("abc"),
        Pattern::alt([lit("a"), lit("ab")]),
        Pattern::alt([lit("ab"), lit("a")]),
        Pattern::star(Pattern::class("ab")),
        Pattern::concat([Pattern::plus(lit("a")), lit("b")]),
        Pattern::concat([Pattern::star_lazy(Pattern::Any), lit("c")]),
        Pattern::concat([Pattern::Caret, lit("ab")]),
        Pattern::concat([lit("ab"), Pattern::Dollar]),
        Pattern::alt([
            Pattern::concat([lit("a"), Pattern::Dollar]),
            lit("ab"),
        ]),
        Pattern::concat([
            Pattern::optional(lit("x")),
            Pattern::plus(Pattern::alt([lit("ab"), lit("b")])),
        ]),
        Pattern::concat([
            Pattern::capture(Pattern::star(Pattern::range('0', '9'))),
            Pattern::Char('.'),
            Pattern::capture(Pattern::plus(Pattern::range('0', '9'))),
        ]),
    ]
}

const INPUTS: &[&str] = &[
    "", "a", "ab", "abc", "ba", "aab", "abab", "xabb", "bbc", "cab", "12.5", ".5", "x1.2y",
];

/// Set simulation of the NFA: is there any accepting path from the entry
/// at input start, restarts included?
fn nfa_accepts(nfa: &Nfa, input: &str) -> bool {
    let targets = |s: NfaStateId| -> Vec<NfaStateId> {
        nfa.state(s).next.iter().map(|&t| nfa.transition(t).target).collect()
    };
    let mut current = targets(nfa.anchored_entry[0]);
    for c in input.chars() {
        if current.iter().any(|&s| nfa.state(s).is_final()) {
            return true;
        }
        let mut next: Vec<NfaStateId> = Vec::new();
        for &s in &current {
            let state = nfa.state(s);
            if state.is_matcher() && state.matcher.contains_char(c) {
                for t in targets(s) {
                    if !next.contains(&t) {
                        next.push(t);
                    }
                }
            }
        }
        current = next;
    }
    current
        .iter()
        .any(|&s| nfa.state(s).is_final() || nfa.state(s).is_anchored_final())
}

// === Subset construction ===

#[test]
fn dfa_accepts_what_the_nfa_accepts() {
    let opts = CompilerOptions::default();
    for p in patterns() {
        let re = compile(&p, &opts).unwrap();
        let regex = Regex::new(&p).unwrap();
        for input in INPUTS {
            assert_eq!(
                regex.is_match(input),
                nfa_accepts(&re.nfa, input),
                "pattern {:?} on {:?}",
                p,
                input
            );
        }
    }
}

#[test]
fn matches_agree_with_backtracking() {
    for p in patterns() {
        common::assert_agrees(&p, INPUTS);
    }
}

#[test]
fn compilation_is_deterministic() {
    let opts = CompilerOptions::default();
    for p in patterns() {
        let a = compile(&p, &opts).unwrap();
        let b = compile(&p, &opts).unwrap();
        assert_eq!(nfa_to_dot(&a.nfa), nfa_to_dot(&b.nfa));
        assert_eq!(dfa_to_dot(&a.forward), dfa_to_dot(&b.forward));
        match (&a.strategy, &b.strategy) {
            (CaptureStrategy::CaptureGroups(x), CaptureStrategy::CaptureGroups(y))
            | (CaptureStrategy::Backward(x), CaptureStrategy::Backward(y)) => {
                assert_eq!(dfa_to_dot(x), dfa_to_dot(y));
            }
            (CaptureStrategy::TraceFinder(x), CaptureStrategy::TraceFinder(y)) => {
                assert_eq!(dfa_to_dot(&x.dfa), dfa_to_dot(&y.dfa));
                assert_eq!(x.results, y.results);
            }
            (CaptureStrategy::Single(x), CaptureStrategy::Single(y)) => assert_eq!(x, y),
            _ => panic!("strategies differ for {:?}", p),
        }
    }
}

// === Priorities ===

#[test]
fn first_alternative_wins() {
    let re = Regex::new(&Pattern::alt([lit("a"), lit("ab")])).unwrap();
    assert_eq!(re.find("ab").unwrap().range(), 0..1);
    let re = Regex::new(&Pattern::alt([lit("ab"), lit("a")])).unwrap();
    assert_eq!(re.find("ab").unwrap().range(), 0..2);
}

#[test]
fn anchored_final_does_not_shadow_later_alternatives() {
    // a$|ab
    let re = Regex::new(&Pattern::alt([
        Pattern::concat([lit("a"), Pattern::Dollar]),
        lit("ab"),
    ]))
    .unwrap();
    assert_eq!(re.find("ab").unwrap().range(), 0..2);
    assert_eq!(re.find("a").unwrap().range(), 0..1);
}

#[test]
fn lazy_and_greedy_loops() {
    let greedy = Regex::new(&Pattern::plus(lit("a"))).unwrap();
    let lazy = Regex::new(&Pattern::plus_lazy(lit("a"))).unwrap();
    assert_eq!(greedy.find("baaa").unwrap().range(), 1..4);
    assert_eq!(lazy.find("baaa").unwrap().range(), 1..2);
}

// === Register programs ===

fn capture_dfa(p: &Pattern) -> Dfa {
    let re = compile(p, &CompilerOptions::default().trace_finder(false)).unwrap();
    match re.strategy {
        CaptureStrategy::CaptureGroups(dfa) => dfa,
        other => panic!("expected registers, got {}", other.name()),
    }
}

/// Programs of the edges taken while reading `input` from the anchored
/// entry, each with whether the edge loops back to its own state.
fn programs_along<'d>(dfa: &'d Dfa, input: &str) -> Vec<(&'d CgProgram, bool)> {
    let programs = dfa.cg.as_ref().unwrap();
    let mut state = dfa.anchored_entry[0].unwrap();
    let mut out = Vec::new();
    for c in input.chars() {
        let s = dfa.state(state);
        let e = s.edge_for(c).unwrap_or_else(|| panic!("no edge for {:?}", c));
        let lazy = s.cg.as_ref().unwrap();
        out.push((programs.program(lazy.partial[e]), s.successors[e] == state));
        state = s.successors[e];
    }
    out
}

#[test]
fn split_thread_costs_one_copy() {
    // (a)(b)(c)x*: after 'c' the loop and the final share one thread
    let p = Pattern::concat([
        Pattern::capture(lit("a")),
        Pattern::capture(lit("b")),
        Pattern::capture(lit("c")),
        Pattern::star(lit("x")),
    ]);
    let dfa = capture_dfa(&p);
    let steps = programs_along(&dfa, "abc");
    let (c_step, _) = steps[2];
    assert_eq!(c_step.copies.len(), 1, "{}", c_step);
    assert!(c_step.reorder.is_none(), "{}", c_step);
}

#[test]
fn single_threads_move_without_copies() {
    // ^(a)bcx*
    let p = Pattern::concat([
        Pattern::Caret,
        Pattern::capture(lit("a")),
        lit("bc"),
        Pattern::star(lit("x")),
    ]);
    let dfa = capture_dfa(&p);
    let steps = programs_along(&dfa, "abcxxx");
    for (program, _) in &steps[..2] {
        assert!(program.copies.is_empty(), "{}", program);
        assert!(program.reorder.is_none(), "{}", program);
    }
    // the looping thread keeps its slot; only the final slot is fed
    for &(program, self_loop) in &steps[3..] {
        assert!(self_loop);
        assert!(program.reorder.is_none(), "{}", program);
        assert_eq!(program.copies.as_slice(), &[(0, 1)]);
    }
    assert!(std::ptr::eq(steps[3].0, steps[5].0));
}

// === Prefix wrapping ===

#[test]
fn look_behind_prefix_length() {
    let opts = CompilerOptions::default();
    let p = Pattern::concat([Pattern::look_behind(lit("ab")), lit("c")]);
    let re = compile(&p, &opts).unwrap();
    assert_eq!(re.nfa.prefix_length, 2);
    assert!(ast_to_string(&re.ast).starts_with('~'));
    assert_eq!(re.forward.anchored_entry.len(), 3);
    assert_eq!(re.forward.unanchored_entry.len(), 3);
}

#[test]
fn leading_caret_is_not_wrapped() {
    let opts = CompilerOptions::default();
    let p = Pattern::concat([Pattern::Caret, Pattern::look_behind(lit("a")), lit("b")]);
    let re = compile(&p, &opts).unwrap();
    assert_eq!(re.nfa.prefix_length, 0);
    assert!(!ast_to_string(&re.ast).contains('~'));
    assert!(!Regex::new(&p).unwrap().is_match("ab"));
}

#[test]
fn look_behind_inside_pattern_needs_no_prefix() {
    let opts = CompilerOptions::default();
    let p = Pattern::concat([lit("ab"), Pattern::look_behind(lit("b")), lit("c")]);
    let re = compile(&p, &opts).unwrap();
    assert_eq!(re.nfa.prefix_length, 0);
}

// === Limits ===

#[test]
fn ceilings_raise_size_limit_errors() {
    let cases: Vec<(CompilerOptions, Pattern, i32)> = vec![
        (
            CompilerOptions::default().max_parse_tree_size(5),
            lit("abcdefgh"),
            TREGEX_ERR_TOO_BIG_PARSE_TREE,
        ),
        (
            CompilerOptions::default().max_capture_groups(2),
            Pattern::concat([Pattern::capture(lit("a")), Pattern::capture(lit("b"))]),
            TREGEX_ERR_TOO_MANY_CAPTURE_GROUPS,
        ),
        (
            CompilerOptions::default().max_nfa_size(3),
            lit("abcdef"),
            TREGEX_ERR_TOO_BIG_NFA,
        ),
        (
            CompilerOptions::default().max_dfa_size(3),
            lit("abcdef"),
            TREGEX_ERR_TOO_BIG_DFA,
        ),
    ];
    for (opts, p, code) in cases {
        let err = compile(&p, &opts).unwrap_err();
        assert!(matches!(err, RegexError::SizeLimit { .. }), "{:?}", err);
        assert_eq!(err.code(), code);
    }
}

#[test]
fn unsupported_look_behinds() {
    let opts = CompilerOptions::default();
    let complex = Pattern::concat([Pattern::look_behind(Pattern::star(lit("a"))), lit("b")]);
    assert_eq!(
        compile(&complex, &opts).unwrap_err().code(),
        TREGEX_ERR_UNSUPPORTED_COMPLEX_LOOK_BEHIND
    );
    let nested = Pattern::concat([
        Pattern::look_ahead(Pattern::concat([lit("a"), Pattern::look_behind(lit("a"))])),
        lit("a"),
    ]);
    assert_eq!(
        compile(&nested, &opts).unwrap_err().code(),
        TREGEX_ERR_UNSUPPORTED_NESTED_LOOK_BEHIND
    );
    let long: String = std::iter::repeat('a').take(64).collect();
    let long = Pattern::concat([Pattern::look_behind(lit(&long)), lit("b")]);
    assert_eq!(
        compile(&long, &opts).unwrap_err().code(),
        TREGEX_ERR_UNSUPPORTED_LONG_LOOK_BEHIND
    );
}
