//! Rule-based field extractors for settlement statements.
//!
//! Each target field is extracted through an ordered cascade of named
//! rules. The first rule that matches wins; later rules exist purely as
//! degraded fallbacks for noisier renderings of the same layout. Naming
//! the rules makes the fallback order an explicit contract and lets the
//! winning rule be reported for debuggability.

pub mod amounts;
pub mod dates;
pub mod patterns;
pub mod plates;

use regex::Regex;
use rust_decimal::Decimal;

pub use amounts::parse_amount;

/// One named extraction rule: a pattern and the capture group holding
/// the value.
pub struct FieldRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub group: usize,
}

impl FieldRule {
    pub fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("invalid field rule pattern"),
            group: 1,
        }
    }

    pub fn with_group(mut self, group: usize) -> Self {
        self.group = group;
        self
    }

    /// Apply the rule, returning the captured text.
    pub fn find(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(self.group))
            .map(|m| m.as_str().to_string())
    }
}

/// A value extracted by a cascade, tagged with the winning rule's name.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch<T> {
    pub value: T,
    pub rule: &'static str,
}

/// Walk a cascade in order and return the first match.
pub fn first_match(rules: &[FieldRule], text: &str) -> Option<RuleMatch<String>> {
    rules.iter().find_map(|rule| {
        rule.find(text).map(|value| RuleMatch {
            value,
            rule: rule.name,
        })
    })
}

/// Walk a cascade and parse the first match as a monetary amount.
pub fn first_amount(rules: &[FieldRule], text: &str) -> Option<RuleMatch<Decimal>> {
    rules.iter().find_map(|rule| {
        rule.find(text)
            .and_then(|raw| parse_amount(&raw))
            .map(|value| RuleMatch {
                value,
                rule: rule.name,
            })
    })
}
