//! Small text helpers shared by every parser.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits regex"));

static DOTTED_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("dotted version regex"));

/// Non-empty lines, trimmed, in order.
pub fn trimmed_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// First non-empty line, trimmed.
pub fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

/// Value of the first `Label: value` line whose label is exactly `label`.
/// Lines are expected to be trimmed already.
pub fn label_value<'a>(lines: &[&'a str], label: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == label).then(|| value.trim())
    })
}

/// First run of decimal digits anywhere in `text`.
pub fn first_integer(text: &str) -> Option<u32> {
    DIGITS.find(text)?.as_str().parse().ok()
}

/// First dotted-numeric token, e.g. `13.2.0` in `gcc (Ubuntu 13.2.0-4ubuntu3) 13.2.0`.
pub fn first_version(text: &str) -> Option<&str> {
    DOTTED_VERSION.find(text).map(|m| m.as_str())
}

/// Capture group 1 of the first match of `re`.
pub fn first_capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)?.get(1).map(|m| m.as_str().trim())
}

/// Parse `KEY=VALUE` lines (os-release style), stripping one layer of quotes.
/// Lines without `=` and comments are skipped.
pub fn key_value_lines(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), unquote(v.trim()).to_string()))
        .collect()
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = v.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    v
}
