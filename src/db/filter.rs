//! Destructive-statement denylist
//!
//! A lexical check, not a parser. It matches the keywords anywhere in the
//! text, so comments or quoting can get around it and harmless identifiers
//! such as `altered_at` trip it. Treat it as a guard against accidents, not
//! as a security boundary.

use once_cell::sync::Lazy;
use regex::Regex;

static DENYLIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)drop|truncate|alter").expect("denylist pattern is valid"));

/// Outcome of running a statement through the denylist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Allowed,
    Rejected(String),
}

/// Check a statement against the destructive keyword denylist
pub fn check_statement(sql: &str) -> FilterVerdict {
    match DENYLIST.find(sql) {
        Some(found) => FilterVerdict::Rejected(format!(
            "destructive keyword '{}' is not allowed",
            found.as_str().to_uppercase()
        )),
        None => FilterVerdict::Allowed,
    }
}
