use crate::reference::Reference;
use crate::state::{Preferences, State};
use crate::value::Value;

/// One member of an allowed-value set.
#[derive(Debug, Clone, PartialEq)]
pub enum Allowed {
    Literal(Value),
    /// Resolved against the value being validated at call time.
    Ref(Reference),
}

macro_rules! allowed_literal_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Allowed {
            fn from(v: $t) -> Self {
                Allowed::Literal(Value::from(v))
            }
        })*
    };
}

allowed_literal_from!(Value, bool, i32, i64, f64, &str, String);

impl From<Reference> for Allowed {
    fn from(r: Reference) -> Self {
        Allowed::Ref(r)
    }
}

/// Ordered value set; duplicates are kept and harmless.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<Allowed>,
}

impl Values {
    pub fn add(&mut self, entry: Allowed) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Allowed> {
        self.entries.iter()
    }

    pub fn refs(&self) -> impl Iterator<Item = &Reference> {
        self.entries.iter().filter_map(|e| match e {
            Allowed::Ref(r) => Some(r),
            Allowed::Literal(_) => None,
        })
    }

    pub fn has(&self, value: &Value, state: &State, prefs: &Preferences, insensitive: bool) -> bool {
        self.entries.iter().any(|entry| match entry {
            Allowed::Literal(v) => v.matches(value, insensitive),
            Allowed::Ref(r) => r
                .resolve(Some(value), state, prefs)
                .is_some_and(|resolved| resolved.matches(value, insensitive)),
        })
    }

    /// Display forms for `any.only` contexts.
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| match e {
                Allowed::Literal(v) => v.display(),
                Allowed::Ref(r) => format!("ref:{r}"),
            })
            .collect()
    }
}
