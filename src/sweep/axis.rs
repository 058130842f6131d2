//! Configuration axes and their label tokens.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maps a parameter value to a substring of the scenario name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Substring the parameter value must contain.
    pub needle: String,
    /// Token contributed to the scenario name.
    pub token: String,
}

impl LabelRule {
    /// Creates a rule.
    pub fn new(needle: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            token: token.into(),
        }
    }
}

/// How an axis turns a value into a name token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Labeler {
    /// The first rule whose needle occurs in the value wins.
    Table(Vec<LabelRule>),
    /// The value must carry exactly one integer `n`; the token is `<prefix>_<n>`.
    Numeric { prefix: String },
}

/// One configuration dimension of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis name, used for the unknown token.
    pub name: String,
    /// Allowed parameter values, passed verbatim to the simulator.
    pub values: Vec<String>,
    /// Value-to-token mapping.
    pub labeler: Labeler,
    /// Token used when no rule matches.
    pub unknown_token: String,
}

impl Axis {
    /// Creates an axis labelled through a substring table.
    pub fn table<V, S>(name: impl Into<String>, values: V, rules: &[(&str, &str)]) -> Self
    where
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        Self {
            unknown_token: format!("Unknown{}", name),
            values: values.into_iter().map(Into::into).collect(),
            labeler: Labeler::Table(
                rules
                    .iter()
                    .map(|(needle, token)| LabelRule::new(*needle, *token))
                    .collect(),
            ),
            name,
        }
    }

    /// Creates an axis labelled by the single integer in each value.
    pub fn numeric<V, S>(name: impl Into<String>, values: V, prefix: impl Into<String>) -> Self
    where
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        Self {
            unknown_token: format!("Unknown{}", name),
            values: values.into_iter().map(Into::into).collect(),
            labeler: Labeler::Numeric {
                prefix: prefix.into(),
            },
            name,
        }
    }

    /// Overrides the unknown token.
    pub fn with_unknown_token(mut self, token: impl Into<String>) -> Self {
        self.unknown_token = token.into();
        self
    }

    /// Returns the name token for a value. Never fails: a value no rule
    /// recognizes maps to the axis's unknown token.
    pub fn label(&self, value: &str) -> String {
        let token = match &self.labeler {
            Labeler::Table(rules) => rules
                .iter()
                .find(|rule| value.contains(&rule.needle))
                .map(|rule| rule.token.clone()),
            Labeler::Numeric { prefix } => {
                let numbers: Vec<&str> = integer_pattern()
                    .find_iter(value)
                    .map(|m| m.as_str())
                    .collect();
                match numbers.as_slice() {
                    [n] => Some(format!("{}_{}", prefix, n)),
                    _ => None,
                }
            }
        };

        match token {
            Some(t) if !t.is_empty() => t,
            _ => self.unknown_token.clone(),
        }
    }
}

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex for integers"))
}
