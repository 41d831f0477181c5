//! Per-call validation context and caller preferences.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Threaded through recursive validation. Never shared between calls.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub path: Vec<PathSegment>,
    /// Enclosing values, innermost first. `ancestors[0]` is the parent.
    pub ancestors: Vec<Value>,
}

impl State {
    pub fn root() -> Self {
        Self::default()
    }

    /// State for a child of `parent` reached through `segment`.
    pub fn child(&self, segment: PathSegment, parent: Value) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(parent);
        ancestors.extend(self.ancestors.iter().cloned());
        State { path, ancestors }
    }

    /// State for evaluating a condition. Conditions see the same path and
    /// ancestors as the value they guard, but run on their own copy so a
    /// failed test leaves nothing behind.
    pub fn entry(&self) -> Self {
        State { path: self.path.clone(), ancestors: self.ancestors.clone() }
    }

    /// Default label: the dotted path, or `value` at the root.
    pub fn label(&self) -> String {
        if self.path.is_empty() {
            return "value".to_string();
        }
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(k) => {
                    if !out.is_empty() { out.push('.'); }
                    out.push_str(k);
                }
                PathSegment::Index(_) => out.push_str(&segment.to_string()),
            }
        }
        out
    }

    pub fn key(&self) -> Option<String> {
        self.path.last().map(|s| match s {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        })
    }
}

/// How dates are rendered when a schema casts them to strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormatPref {
    #[default]
    Iso,
    Javascript,
    Date,
    Time,
    Utc,
    String,
}

/// Caller preferences, passed unchanged through every nested call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Enables coercion and casts.
    pub convert: bool,
    /// Stop at the first failure inside a node.
    pub abort_early: bool,
    /// Objects accept keys they do not declare.
    pub allow_unknown: bool,
    /// Target of `$name` references.
    pub context: IndexMap<String, Value>,
    pub date_format: DateFormatPref,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            convert: true,
            abort_early: true,
            allow_unknown: false,
            context: IndexMap::new(),
            date_format: DateFormatPref::Iso,
        }
    }
}

impl Preferences {
    pub fn strict() -> Self {
        Preferences { convert: false, ..Self::default() }
    }
}
