// regdump.rs - Debug dumps.
// Graphviz export of NFAs and DFAs and a pattern-like rendering of the
// syntax tree, for inspecting what the compiler produced.

use std::fmt::{self, Write};

use crate::dfagen::Dfa;
use crate::nfa::{Nfa, NfaStateFlags, NfaStateKind};
use crate::regast::{NodeFlags, NodeKind, PositionKind, RegexAst};
use crate::regint::*;

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ============================================================================
// NFA
// ============================================================================

pub fn write_nfa_dot(out: &mut impl Write, nfa: &Nfa) -> fmt::Result {
    writeln!(out, "digraph nfa {{")?;
    writeln!(out, "\trankdir=LR;")?;
    for s in &nfa.states {
        let (shape, label) = match s.kind {
            NfaStateKind::Initial { anchored } => {
                let list = if anchored {
                    &nfa.anchored_entry
                } else {
                    &nfa.unanchored_entry
                };
                let k = list.iter().position(|&e| e == s.id).unwrap_or(0);
                ("box", format!("{}{}", if anchored { "A" } else { "U" }, k))
            }
            NfaStateKind::Matcher => ("circle", format!("{}: {}", s.id, s.matcher)),
            NfaStateKind::Final => ("doublecircle", "F".to_string()),
            NfaStateKind::AnchoredFinal => ("doublecircle", "F$".to_string()),
        };
        let mut label = label;
        if s.flags.contains(NfaStateFlags::LOOP_BACK) {
            label.push_str(" (restart)");
        }
        if s.flags.contains(NfaStateFlags::PREFIX) {
            label.push_str(" (prefix)");
        }
        if !s.possible_results.is_empty() {
            write!(label, " r{:?}", s.possible_results.as_slice())?;
        }
        writeln!(out, "\ts{} [shape={}, label=\"{}\"];", s.id, shape, escape(&label))?;
    }
    for s in &nfa.states {
        for (priority, &t) in s.next.iter().enumerate() {
            let t = nfa.transition(t);
            let mut label = priority.to_string();
            if !t.group_boundaries.is_empty() {
                write!(label, ": {}", t.group_boundaries)?;
            }
            writeln!(out, "\ts{} -> s{} [label=\"{}\"];", t.source, t.target, escape(&label))?;
        }
    }
    writeln!(out, "}}")
}

/// Graphviz text of `nfa`: entries as boxes, finals as double circles and
/// transitions labelled with their priority and capture boundaries.
pub fn nfa_to_dot(nfa: &Nfa) -> String {
    let mut out = String::new();
    let _ = write_nfa_dot(&mut out, nfa);
    out
}

// ============================================================================
// DFA
// ============================================================================

pub fn write_dfa_dot(out: &mut impl Write, dfa: &Dfa) -> fmt::Result {
    writeln!(out, "digraph \"{}\" {{", escape(dfa.config.name))?;
    writeln!(out, "\trankdir=LR;")?;
    for (kind, entries) in [("A", &dfa.anchored_entry), ("U", &dfa.unanchored_entry)] {
        for (k, entry) in entries.iter().enumerate() {
            if let Some(id) = entry {
                writeln!(out, "\t{}{} [shape=plaintext];", kind, k)?;
                writeln!(out, "\t{}{} -> d{};", kind, k, id)?;
            }
        }
    }
    for s in &dfa.states {
        let shape = if s.is_final() || s.is_anchored_final() {
            "doublecircle"
        } else {
            "circle"
        };
        let mut label = s.id.to_string();
        if s.is_anchored_final() {
            label.push('$');
        }
        if s.pre_calc_unanchored != NO_RESULT {
            write!(label, " r{}", s.pre_calc_unanchored)?;
        }
        if s.pre_calc_anchored != NO_RESULT {
            write!(label, " r^{}", s.pre_calc_anchored)?;
        }
        if let Some(c) = s.find_single_char {
            write!(label, " skip {:?}", c)?;
        }
        writeln!(out, "\td{} [shape={}, label=\"{}\"];", s.id, shape, escape(&label))?;
    }
    for s in &dfa.states {
        for (e, (matcher, succ)) in s.matchers.iter().zip(&s.successors).enumerate() {
            let mut label = matcher.to_string();
            if let (Some(lazy), Some(cg)) = (&s.cg, &dfa.cg) {
                let program = cg.program(lazy.partial[e]);
                if !program.is_empty() {
                    write!(label, " / {}", program.to_string().trim_end())?;
                }
            }
            writeln!(out, "\td{} -> d{} [label=\"{}\"];", s.id, succ, escape(&label))?;
        }
    }
    writeln!(out, "}}")
}

/// Graphviz text of `dfa`, with the register programs of capture group
/// automata on their edges.
pub fn dfa_to_dot(dfa: &Dfa) -> String {
    let mut out = String::new();
    let _ = write_dfa_dot(&mut out, dfa);
    out
}

// ============================================================================
// Syntax tree
// ============================================================================

fn write_node(out: &mut String, ast: &RegexAst, id: NodeId) {
    let node = ast.node(id);
    if node.flags.contains(NodeFlags::PREFIX) {
        out.push('~');
    }
    match &node.kind {
        NodeKind::Sequence(seq) => {
            for &t in &seq.terms {
                write_node(out, ast, t);
            }
        }
        NodeKind::Group(g) => {
            match g.group_number {
                Some(n) => {
                    let _ = write!(out, "({}:", n);
                }
                None => out.push_str("(?:"),
            }
            for (i, &alt) in g.alternatives.iter().enumerate() {
                if i > 0 {
                    out.push('|');
                }
                write_node(out, ast, alt);
            }
            out.push(')');
            if g.is_loop {
                out.push('*');
            }
        }
        NodeKind::CharacterClass(set) => {
            let _ = write!(out, "{}", set);
        }
        NodeKind::BackReference(n) => {
            let _ = write!(out, "\\{}", n);
        }
        NodeKind::PositionAssertion(PositionKind::Caret) => out.push('^'),
        NodeKind::PositionAssertion(PositionKind::Dollar) => out.push('$'),
        NodeKind::LookAhead(r) => {
            out.push_str(if r.negated { "(?!" } else { "(?=" });
            write_group_body(out, ast, r.group);
            out.push(')');
        }
        NodeKind::LookBehind(r) => {
            out.push_str("(?<=");
            write_group_body(out, ast, r.group);
            out.push(')');
        }
        NodeKind::MatchFound => {}
        NodeKind::Root(r) => write_group_body(out, ast, r.group),
    }
}

/// Alternatives of a subtree root group, without its parentheses.
fn write_group_body(out: &mut String, ast: &RegexAst, group: NodeId) {
    for (i, &alt) in ast.group(group).alternatives.iter().enumerate() {
        if i > 0 {
            out.push('|');
        }
        write_node(out, ast, alt);
    }
}

/// Pattern-like rendering of the tree. Capture groups print as `(n:..)`,
/// loop groups get a trailing `*` and prefix nodes a leading `~`. A
/// wrapped tree prints the prefix wrapper around the original root.
pub fn ast_to_string(ast: &RegexAst) -> String {
    let mut out = String::new();
    match ast.wrapped_root() {
        Some(w) => write_node(&mut out, ast, w.sequence),
        None => write_node(&mut out, ast, ast.root()),
    }
    out
}
