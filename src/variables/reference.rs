//! Variable reference grammar.
//!
//! A task spec refers to an output of another task with
//! `${VAR:<task-id>:<output-key>}`. The key may itself contain `:` to
//! address a nested value, as in `${VAR:db:endpoint:port}`.
//!
//! # Syntax
//!
//! - `${VAR:task:key}` - replaced with the output value
//! - `$${VAR:task:key}` - produces literal `${VAR:task:key}` in output
//! - any other `${...}` is left untouched
//!
//! # Example
//!
//! ```yaml
//! command: "psql -h ${VAR:db:host} -p ${VAR:db:port}"
//! ```

use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\$?)\{VAR:([\w\-\s.;]+):([\w\-\s:.;]+)\}").unwrap()
});

/// A reference to an output of another task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableRef {
    /// Id of the task producing the value.
    pub task: String,

    /// Output key, `:`-separated for nested values.
    pub key: String,
}

impl VariableRef {
    pub fn new(task: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for VariableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{VAR:{}:{}}}", self.task, self.key)
    }
}

/// A segment of a string containing references.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Reference: ${VAR:task:key}
    Reference(VariableRef),
}

/// Parse a string into literal and reference segments.
///
/// Adjacent literal text is merged, so a string with no references yields
/// at most one segment.
pub fn parse_references(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current_literal = String::new();
    let mut last = 0;

    for caps in REFERENCE.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        current_literal.push_str(&input[last..whole.start()]);
        last = whole.end();

        if is_escaped(&caps) {
            // $${VAR:...} -> literal ${VAR:...}
            current_literal.push_str(&whole.as_str()[1..]);
            continue;
        }

        if !current_literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
        }
        segments.push(Segment::Reference(VariableRef::new(&caps[2], &caps[3])));
    }

    current_literal.push_str(&input[last..]);
    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

fn is_escaped(caps: &Captures<'_>) -> bool {
    caps.get(1).is_some_and(|m| !m.as_str().is_empty())
}

/// Extract all references from a string.
pub fn extract_references(input: &str) -> BTreeSet<VariableRef> {
    parse_references(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Reference(r) => Some(r),
            _ => None,
        })
        .collect()
}

/// Check if a string contains any reference.
pub fn has_references(input: &str) -> bool {
    parse_references(input)
        .iter()
        .any(|seg| matches!(seg, Segment::Reference(_)))
}
