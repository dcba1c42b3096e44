//! Best-effort field extraction from a single loosely formatted JSON line.
//!
//! This is not a JSON parser. A field is found by locating `"<name>"`, a
//! colon, and a double-quoted value; the first match wins and its contents
//! are returned verbatim, escape sequences included. Anything that does not
//! match reads as an empty value, so malformed lines degrade to "all fields
//! absent" instead of failing.

use std::collections::HashMap;

use regex::Regex;

fn string_pattern(name: &str) -> Option<Regex> {
    Regex::new(&format!(r#""{}"\s*:\s*"([^"]*)""#, regex::escape(name))).ok()
}

fn number_pattern(name: &str) -> Option<Regex> {
    Regex::new(&format!(r#""{}"\s*:\s*"?\s*([0-9]+)"#, regex::escape(name))).ok()
}

/// Extracts named string (and integer) fields out of a raw line.
///
/// Patterns for the names given to [`FieldExtractor::new`] are compiled once
/// and reused; other names are compiled on demand.
#[derive(Clone, Debug)]
pub struct FieldExtractor {
    strings: HashMap<String, Regex>,
    numbers: HashMap<String, Regex>,
}

impl FieldExtractor {
    pub fn new<'a, S, N>(string_fields: S, number_fields: N) -> Self
    where
        S: IntoIterator<Item = &'a str>,
        N: IntoIterator<Item = &'a str>,
    {
        let strings = string_fields
            .into_iter()
            .filter_map(|name| string_pattern(name).map(|re| (name.to_string(), re)))
            .collect();
        let numbers = number_fields
            .into_iter()
            .filter_map(|name| number_pattern(name).map(|re| (name.to_string(), re)))
            .collect();
        Self { strings, numbers }
    }

    /// Returns the first quoted value of `name`, or `""` when absent.
    pub fn extract<'l>(&self, line: &'l str, name: &str) -> &'l str {
        match self.strings.get(name) {
            Some(re) => first_group(re, line),
            None => string_pattern(name)
                .map(|re| first_group(&re, line))
                .unwrap_or(""),
        }
    }

    /// Returns the integer value of `name`, quoted or not.
    ///
    /// `None` covers both a missing field and digits that overflow `i64`.
    pub fn extract_number(&self, line: &str, name: &str) -> Option<i64> {
        let digits = match self.numbers.get(name) {
            Some(re) => first_group(re, line),
            None => number_pattern(name)
                .map(|re| first_group(&re, line))
                .unwrap_or(""),
        };
        digits.parse().ok()
    }
}

fn first_group<'l>(re: &Regex, line: &'l str) -> &'l str {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or("")
}
