//! Selection pattern compilation and evaluation.
//!
//! A pattern is `path-regex[:prop[:value]]`. The path part is a regular
//! expression anchored against absolute node paths. The optional property
//! clause tests presence (`:prop`), absence (`:!prop`), a value match
//! (`:prop:value`), or an inverted value match (`:prop:!value`). Numeric
//! values compare against cell contents; anything else is a regular
//! expression matched against string contents.
//!
//! A rule may carry several patterns as alternatives; evaluation unions
//! their per-pattern results in first-seen order, deduplicated by node
//! identity. Given a fixed tree the result is fully deterministic.

use std::collections::HashSet;

use regex::Regex;

use crate::error::LopError;
use crate::tree::{NodeId, PropValue, Tree};

enum ValueMatcher {
    Num(u32),
    Text(Regex),
}

struct Clause {
    path: Regex,
    prop: Option<String>,
    prop_negated: bool,
    value: Option<ValueMatcher>,
    value_negated: bool,
}

/// A compiled set of selection pattern alternatives.
pub struct Selector {
    clauses: Vec<Clause>,
}

fn pattern_err(pattern: &str, reason: impl ToString) -> LopError {
    LopError::Pattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value(raw: &str, pattern: &str) -> Result<(ValueMatcher, bool), LopError> {
    let (negated, body) = match raw.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    if body.is_empty() {
        return Err(pattern_err(pattern, "empty value clause"));
    }
    let matcher = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
            .map(ValueMatcher::Num)
            .map_err(|e| pattern_err(pattern, e))?
    } else if body.bytes().all(|b| b.is_ascii_digit()) {
        body.parse::<u32>()
            .map(ValueMatcher::Num)
            .map_err(|e| pattern_err(pattern, e))?
    } else {
        ValueMatcher::Text(Regex::new(body).map_err(|e| pattern_err(pattern, e))?)
    };
    Ok((matcher, negated))
}

impl Selector {
    /// Compile a set of pattern alternatives. Any malformed pattern fails
    /// the whole compilation with [`LopError::Pattern`].
    pub fn compile(patterns: &[&str]) -> Result<Selector, LopError> {
        let mut clauses = Vec::with_capacity(patterns.len());
        for &pattern in patterns {
            clauses.push(Self::compile_one(pattern)?);
        }
        if clauses.is_empty() {
            return Err(pattern_err("", "no selection patterns supplied"));
        }
        Ok(Selector { clauses })
    }

    fn compile_one(pattern: &str) -> Result<Clause, LopError> {
        let mut parts = pattern.splitn(3, ':');
        let path_part = parts.next().unwrap_or("");
        if path_part.is_empty() {
            return Err(pattern_err(pattern, "empty path matcher"));
        }
        let path = Regex::new(&format!("^{}$", path_part)).map_err(|e| pattern_err(pattern, e))?;

        let mut prop = None;
        let mut prop_negated = false;
        let mut value = None;
        let mut value_negated = false;

        if let Some(prop_part) = parts.next() {
            if prop_part.is_empty() {
                return Err(pattern_err(pattern, "empty property clause"));
            }
            match prop_part.strip_prefix('!') {
                Some(rest) if rest.is_empty() => {
                    return Err(pattern_err(pattern, "empty negated property clause"));
                }
                Some(rest) => {
                    prop = Some(rest.to_string());
                    prop_negated = true;
                }
                None => prop = Some(prop_part.to_string()),
            }
            if let Some(value_part) = parts.next() {
                if prop_negated {
                    return Err(pattern_err(
                        pattern,
                        "a value clause cannot follow a negated property",
                    ));
                }
                let (m, neg) = parse_value(value_part, pattern)?;
                value = Some(m);
                value_negated = neg;
            }
        }

        Ok(Clause {
            path,
            prop,
            prop_negated,
            value,
            value_negated,
        })
    }

    /// Evaluate against a tree, producing the ordered, deduplicated match
    /// set. Walks in pre-order per alternative, then unions alternatives
    /// in first-seen order.
    pub fn evaluate(&self, tree: &Tree) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for clause in &self.clauses {
            for id in tree.walk() {
                if clause_matches(clause, tree, id) && seen.insert(id) {
                    out.push(id);
                }
            }
        }
        out
    }
}

fn clause_matches(clause: &Clause, tree: &Tree, id: NodeId) -> bool {
    let path = match tree.path(id) {
        Ok(p) => p,
        Err(_) => return false,
    };
    if !clause.path.is_match(&path) {
        return false;
    }
    let prop_name = match &clause.prop {
        Some(p) => p,
        None => return true,
    };
    let node = match tree.node(id) {
        Ok(n) => n,
        Err(_) => return false,
    };
    let value = node.property(prop_name);
    if clause.prop_negated {
        return value.is_none();
    }
    let value = match value {
        Some(v) => v,
        None => return false,
    };
    match &clause.value {
        None => true,
        Some(matcher) => value_matches(matcher, value) != clause.value_negated,
    }
}

fn value_matches(matcher: &ValueMatcher, value: &PropValue) -> bool {
    match (matcher, value) {
        (ValueMatcher::Num(n), PropValue::Cells(cells)) => cells.contains(n),
        (ValueMatcher::Text(re), PropValue::Strings(strs)) => strs.iter().any(|s| re.is_match(s)),
        _ => false,
    }
}
