use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::models::BasePair;
use crate::UNKNOWN;

/// Number of decimals kept for every reactivity value.
pub const SIGNAL_DECIMALS: i32 = 4;

/// Code used for padding / unknown positions in both integer encodings.
pub const PAD_CODE: i64 = 0;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sequence normalizer
// ─────────────────────────────────────────────────────────────────────────────

/// Upper-cases, rewrites `T` to `U` and drops every whitespace character.
pub fn standardize_sequence(sequence: &str) -> String {
    sequence
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c.to_ascii_uppercase() {
            'T' => 'U',
            other => other,
        })
        .collect()
}

pub fn is_valid_alphabet(sequence: &str) -> bool {
    sequence.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'U'))
}

/// Characters of `sequence` that fall outside `{A, C, G, U}`, in first-seen order.
pub fn irregular_characters(sequence: &str) -> String {
    let mut seen = HashSet::new();
    sequence
        .chars()
        .filter(|c| !matches!(c, 'A' | 'C' | 'G' | 'U') && seen.insert(*c))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Structure / signal encoder
// ─────────────────────────────────────────────────────────────────────────────

/// Error returned when a dot-bracket string does not close every bracket it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnbalancedBrackets {
    pub open: usize,
    pub close: usize,
}

pub fn bracket_counts(dotbracket: &str) -> UnbalancedBrackets {
    UnbalancedBrackets {
        open: dotbracket.chars().filter(|&c| c == '(').count(),
        close: dotbracket.chars().filter(|&c| c == ')').count(),
    }
}

/// Turns dot-bracket notation into base pairs `(opening, closing)`, in closing order.
pub fn dotbracket_to_pairs(dotbracket: &str) -> Result<Vec<BasePair>, UnbalancedBrackets> {
    let mut stack = Vec::new();
    let mut pairs = Vec::new();
    for (i, c) in dotbracket.chars().enumerate() {
        match c {
            '(' => stack.push(i),
            ')' => match stack.pop() {
                Some(open) => pairs.push((open, i)),
                None => return Err(bracket_counts(dotbracket)),
            },
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(bracket_counts(dotbracket));
    }
    Ok(pairs)
}

/// Renders pairs as dot-bracket. Crossing pairs are still drawn with `(` / `)`.
pub fn pairs_to_dotbracket(pairs: &[BasePair], len: usize) -> String {
    let mut chars = vec!['.'; len];
    for &(i, j) in pairs {
        let (open, close) = if i < j { (i, j) } else { (j, i) };
        if close < len {
            chars[open] = '(';
            chars[close] = ')';
        }
    }
    chars.into_iter().collect()
}

/// A structure is well formed when every index is in range, no base pairs
/// with itself and no base appears in two pairs.
pub fn validate_pairs(pairs: &[BasePair], seq_len: usize) -> bool {
    let mut used = HashSet::with_capacity(pairs.len() * 2);
    pairs.iter().all(|&(i, j)| {
        i < seq_len && j < seq_len && i != j && used.insert(i) && used.insert(j)
    })
}

pub fn round_signal_value(value: f64) -> f64 {
    if value == UNKNOWN || !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(SIGNAL_DECIMALS);
    let rounded = (value * factor).round() / factor;
    // keeps -0.0 out of hashed dedup keys
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn format_signal(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| round_signal_value(v)).collect()
}

pub fn base_to_int(base: char) -> i64 {
    match base {
        'A' => 1,
        'C' => 2,
        'G' => 3,
        'U' | 'T' => 4,
        _ => PAD_CODE,
    }
}

pub fn dot_to_int(symbol: char) -> i64 {
    match symbol {
        '.' => 1,
        '(' => 2,
        ')' => 3,
        _ => PAD_CODE,
    }
}

pub fn embed_sequence(sequence: &str) -> Vec<i64> {
    sequence.chars().map(base_to_int).collect()
}

pub fn embed_dotbracket(dotbracket: &str) -> Vec<i64> {
    dotbracket.chars().map(dot_to_int).collect()
}
