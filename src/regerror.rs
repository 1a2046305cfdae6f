// regerror.rs - Error codes and their messages.
//
// Every failure the compiler can report has a stable negative code.
// Codes in -300..-399 are unsupported constructs, -400..-499 are size
// limits. Internal invariant violations are not codes; they panic.

pub const TREGEX_NORMAL: i32 = 0;
pub const TREGEX_MISMATCH: i32 = -1;

pub const TREGEX_ERR_INVALID_ARGUMENT: i32 = -30;

// === Unsupported constructs ===
pub const TREGEX_ERR_UNSUPPORTED_BACK_REFERENCE: i32 = -301;
pub const TREGEX_ERR_UNSUPPORTED_NEGATIVE_LOOK_AHEAD: i32 = -302;
pub const TREGEX_ERR_UNSUPPORTED_COMPLEX_LOOK_BEHIND: i32 = -303;
pub const TREGEX_ERR_UNSUPPORTED_NESTED_LOOK_BEHIND: i32 = -304;
pub const TREGEX_ERR_UNSUPPORTED_LONG_LOOK_BEHIND: i32 = -305;

// === Size limits ===
pub const TREGEX_ERR_TOO_BIG_PARSE_TREE: i32 = -401;
pub const TREGEX_ERR_TOO_MANY_CAPTURE_GROUPS: i32 = -402;
pub const TREGEX_ERR_TOO_BIG_NFA: i32 = -403;
pub const TREGEX_ERR_TOO_BIG_DFA: i32 = -404;
pub const TREGEX_ERR_TOO_MANY_REGISTER_SLOTS: i32 = -405;

/// Human-readable message for an error code.
pub fn error_code_to_message(code: i32) -> &'static str {
    match code {
        TREGEX_NORMAL => "success",
        TREGEX_MISMATCH => "mismatch",
        TREGEX_ERR_INVALID_ARGUMENT => "invalid argument",
        TREGEX_ERR_UNSUPPORTED_BACK_REFERENCE => "back-references are not supported",
        TREGEX_ERR_UNSUPPORTED_NEGATIVE_LOOK_AHEAD => "negative look-ahead is not supported",
        TREGEX_ERR_UNSUPPORTED_COMPLEX_LOOK_BEHIND => {
            "look-behind body must be a fixed sequence of character classes"
        }
        TREGEX_ERR_UNSUPPORTED_NESTED_LOOK_BEHIND => {
            "look-behind inside another look-around assertion is not supported"
        }
        TREGEX_ERR_UNSUPPORTED_LONG_LOOK_BEHIND => "look-behind is too long",
        TREGEX_ERR_TOO_BIG_PARSE_TREE => "parse tree size limit exceeded",
        TREGEX_ERR_TOO_MANY_CAPTURE_GROUPS => "too many capture groups",
        TREGEX_ERR_TOO_BIG_NFA => "NFA size limit exceeded",
        TREGEX_ERR_TOO_BIG_DFA => "DFA size limit exceeded",
        TREGEX_ERR_TOO_MANY_REGISTER_SLOTS => {
            "too many concurrent NFA states for capture-group tracking"
        }
        _ => "undefined error code",
    }
}

pub fn is_unsupported_error(code: i32) -> bool {
    (-399..=-300).contains(&code)
}

pub fn is_size_limit_error(code: i32) -> bool {
    (-499..=-400).contains(&code)
}
