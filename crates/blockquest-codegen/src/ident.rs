//! Identifier sanitizing for emitted source.
//!
//! Block variable and procedure names are free text. Every name that reaches
//! the output goes through [`sanitize`], which maps it deterministically onto
//! a valid script identifier that cannot shadow a keyword or a runtime
//! builtin.

/// Words the script grammar or the runtime reserves.
pub const RESERVED: &[&str] = &[
    "api", "async", "await", "break", "case", "class", "const", "continue", "default", "do",
    "else", "false", "for", "function", "if", "in", "input", "isList", "isMap", "isNumber",
    "let", "Math", "new", "null", "of", "rangeContinues", "return", "switch", "this",
    "toNumber", "true", "typeof", "undefined", "var", "viz", "while",
];

/// Maps `raw` onto a safe identifier.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, a leading digit gets a `_`
/// prefix, and reserved words get a `_` suffix. An empty name becomes `_`.
pub fn sanitize(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        return "_".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if RESERVED.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

/// Name of the hidden counter for a `repeat` loop at nesting `depth`.
///
/// `$` never survives [`sanitize`], so counters cannot collide with user
/// variables.
pub fn repeat_counter(depth: usize) -> String {
    format!("$repeat{depth}")
}
