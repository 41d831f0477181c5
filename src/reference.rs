//! Symbolic pointers into the value being validated.
//!
//! Text forms:
//! - `a.b`: sibling (ancestor 1), then walk key `a`, key `b`
//! - `.a`: the value itself (ancestor 0)
//! - `...a`: grandparent (ancestor 2); each extra leading `.` climbs one
//! - `$a.b`: the preferences context
use std::fmt;
use std::str::FromStr;

use crate::errors::SchemaError;
use crate::state::{Preferences, State};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Value { ancestor: usize },
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    source: Source,
    path: Vec<String>,
}

impl Reference {
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::InvalidReference(text.to_string());

        let (source, rest) = if let Some(rest) = text.strip_prefix('$') {
            (Source::Context, rest)
        } else {
            let dots = text.bytes().take_while(|b| *b == b'.').count();
            let ancestor = if dots == 0 { 1 } else { dots - 1 };
            (Source::Value { ancestor }, &text[dots..])
        };

        let path: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('.').map(str::to_string).collect()
        };
        if path.iter().any(String::is_empty) {
            return Err(invalid());
        }
        // only a self reference may point at the whole value
        if path.is_empty() && source != (Source::Value { ancestor: 0 }) {
            return Err(invalid());
        }
        Ok(Reference { source, path })
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Ancestor distance for value references, `None` for context references.
    pub fn ancestor(&self) -> Option<usize> {
        match self.source {
            Source::Value { ancestor } => Some(ancestor),
            Source::Context => None,
        }
    }

    /// First path segment (the sibling key for ancestor-1 references).
    pub fn root(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }

    /// Resolve against the current value and its ancestors. Missing targets
    /// resolve to `None`.
    pub fn resolve(&self, value: Option<&Value>, state: &State, prefs: &Preferences) -> Option<Value> {
        match self.source {
            Source::Context => {
                let (first, rest) = self.path.split_first()?;
                walk(prefs.context.get(first)?, rest).cloned()
            }
            Source::Value { ancestor: 0 } => walk(value?, &self.path).cloned(),
            Source::Value { ancestor } => {
                walk(state.ancestors.get(ancestor - 1)?, &self.path).cloned()
            }
        }
    }
}

fn walk<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| node.get(segment))
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.path.join(".");
        match self.source {
            Source::Context => write!(f, "${joined}"),
            Source::Value { ancestor: 1 } => f.write_str(&joined),
            Source::Value { ancestor } => {
                write!(f, "{}{joined}", ".".repeat(ancestor + 1))
            }
        }
    }
}

impl FromStr for Reference {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PathSegment;
    use serde_json::json;

    #[test]
    fn parses_ancestor_prefixes() {
        assert_eq!(Reference::parse("a.b").unwrap().ancestor(), Some(1));
        assert_eq!(Reference::parse(".a").unwrap().ancestor(), Some(0));
        assert_eq!(Reference::parse("...a").unwrap().ancestor(), Some(2));
        assert_eq!(Reference::parse("$tenant").unwrap().ancestor(), None);
        assert!(Reference::parse("").is_err());
        assert!(Reference::parse("a..b").is_err());
    }

    #[test]
    fn display_is_the_parse_inverse() {
        for text in ["a.b", ".a", "...a", "$tenant.id", "."] {
            assert_eq!(Reference::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn resolves_siblings_and_context() {
        let parent = Value::from(json!({"a": {"b": 7}}));
        let state = State::root().child(PathSegment::Key("c".into()), parent);
        let mut prefs = Preferences::default();
        prefs.context.insert("tenant".into(), Value::from(json!({"id": "t1"})));

        let sibling = Reference::parse("a.b").unwrap();
        assert_eq!(sibling.resolve(None, &state, &prefs), Some(Value::Number(7.0)));

        let ctx = Reference::parse("$tenant.id").unwrap();
        assert_eq!(ctx.resolve(None, &state, &prefs), Some(Value::from("t1")));

        let missing = Reference::parse("...a").unwrap();
        assert_eq!(missing.resolve(None, &state, &prefs), None);

        let own = Reference::parse(".x").unwrap();
        let value = Value::from(json!({"x": true}));
        assert_eq!(own.resolve(Some(&value), &state, &prefs), Some(Value::Bool(true)));
    }
}
