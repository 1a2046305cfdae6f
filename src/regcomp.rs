// regcomp.rs - Compilation pipeline.
// Pattern → syntax tree → (look-behind prefix) → NFA → forward search DFA,
// plus the automaton or table that recovers match starts and capture
// groups.
//
// Phases: check, analyze, prefix, NFA, pre-calculated results / trace
// finder, forward DFA, then either the capture group DFA or the backward
// DFA.

use log::debug;

use crate::dfagen::{create_dfa, Dfa, DfaConfig};
use crate::error::RegexError;
use crate::nfa::Nfa;
use crate::nfagen::{check_supported, create_nfa};
use crate::options::CompilerOptions;
use crate::regast::{RegexAst, RegexProperties};
use crate::syntax::Pattern;
use crate::tracefinder::{create_trace_finder, precalculate_single, PreCalculatedResult, TraceFinder};

/// How a match found by the forward automaton gets its start and groups.
#[derive(Clone, Debug)]
pub enum CaptureStrategy {
    /// Only one path exists; its layout is fixed relative to the end.
    Single(PreCalculatedResult),
    /// Finitely many paths, told apart by a backward trie automaton.
    TraceFinder(TraceFinder),
    /// Replays the match with registers.
    CaptureGroups(Dfa),
    /// Only group 0 exists and no look-arounds; runs back to the start.
    Backward(Dfa),
}

impl CaptureStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureStrategy::Single(_) => "single",
            CaptureStrategy::TraceFinder(_) => "trace finder",
            CaptureStrategy::CaptureGroups(_) => "capture groups",
            CaptureStrategy::Backward(_) => "backward",
        }
    }
}

/// Everything the executor needs, plus the intermediate forms for dumps.
#[derive(Clone, Debug)]
pub struct CompiledRegex {
    pub ast: RegexAst,
    pub nfa: Nfa,
    pub forward: Dfa,
    pub strategy: CaptureStrategy,
    pub number_of_capture_groups: usize,
    pub properties: RegexProperties,
}

/// Compile `pattern` with `options`.
pub fn compile(pattern: &Pattern, options: &CompilerOptions) -> Result<CompiledRegex, RegexError> {
    let ast = pattern.to_ast(options)?;
    compile_ast(ast, options)
}

/// Compile an already built syntax tree.
pub fn compile_ast(mut ast: RegexAst, options: &CompilerOptions) -> Result<CompiledRegex, RegexError> {
    debug!("compile: {} nodes", ast.number_of_nodes());
    ast.analyze();
    check_supported(&ast)?;
    ast.create_prefix()?;
    let props = ast.properties();
    debug!("compile: properties {:?}", props);

    let nfa = create_nfa(&ast, options)?;
    debug!(
        "compile: NFA with {} states, {} transitions",
        nfa.number_of_states(),
        nfa.number_of_transitions()
    );

    let forward = create_dfa(&nfa, DfaConfig::FORWARD_SEARCH, options)?;
    debug!("compile: forward DFA with {} states", forward.number_of_states());

    let strategy = select_strategy(&nfa, props, options)?;
    debug!("compile: {} strategy", strategy.name());

    Ok(CompiledRegex {
        number_of_capture_groups: ast.number_of_capture_groups(),
        properties: props,
        ast,
        nfa,
        forward,
        strategy,
    })
}

fn select_strategy(
    nfa: &Nfa,
    props: RegexProperties,
    options: &CompilerOptions,
) -> Result<CaptureStrategy, RegexError> {
    let loop_free = !props.intersects(RegexProperties::LOOPS) && !props.has_look_around();
    if loop_free && !props.contains(RegexProperties::ALTERNATIONS) {
        if let Some(result) = precalculate_single(nfa) {
            return Ok(CaptureStrategy::Single(result));
        }
    }
    if loop_free && props.contains(RegexProperties::CAPTURE_GROUPS) && options.is_trace_finder_enabled() {
        let has_carets = props.contains(RegexProperties::CARETS);
        if let Some(tf) = create_trace_finder(nfa, has_carets, options)? {
            return Ok(CaptureStrategy::TraceFinder(tf));
        }
    }
    if props.contains(RegexProperties::CAPTURE_GROUPS) || props.has_look_around() {
        let dfa = create_dfa(nfa, DfaConfig::CAPTURE_GROUPS, options)?;
        debug!(
            "compile: capture group DFA with {} states, {} programs",
            dfa.number_of_states(),
            dfa.cg.as_ref().map_or(0, |cg| cg.programs.len())
        );
        return Ok(CaptureStrategy::CaptureGroups(dfa));
    }
    let dfa = create_dfa(nfa, DfaConfig::BACKWARD, options)?;
    debug!("compile: backward DFA with {} states", dfa.number_of_states());
    Ok(CaptureStrategy::Backward(dfa))
}
