//! Variant registry.
//!
//! Each schema kind implements [`TypeDefinition`]; the generic pipeline in
//! `schema.rs` calls into it for the kind-specific steps and falls back to
//! the default methods everywhere else. Templates are built once and every
//! factory call clones one.
pub mod alternatives;
pub mod any;
pub mod array;
pub mod boolean;
pub mod date;
pub mod number;
pub mod object;
pub mod string;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::errors::{Failure, SchemaError};
use crate::schema::describe::{Description, RuleDescription};
use crate::schema::{CastTarget, Kind, Rule, Schema, Validation};
use crate::state::{Preferences, State};
use crate::value::Value;

pub trait TypeDefinition: Send + Sync {
    fn kind(&self) -> Kind;

    /// Install default flags and inner state on a fresh template.
    fn initialize(&self, _schema: &mut Schema) {}

    /// Best-effort conversion, only called when `prefs.convert` is set.
    fn coerce(&self, _schema: &Schema, value: Value, _state: &State, _prefs: &Preferences) -> Value {
        value
    }

    /// Base type check.
    fn validate(&self, _schema: &Schema, value: Value, _state: &State, _prefs: &Preferences) -> Validation {
        Validation::ok(Some(value))
    }

    fn rule(
        &self,
        _schema: &Schema,
        _rule: &Rule,
        _value: &Value,
        _state: &State,
        _prefs: &Preferences,
    ) -> Result<(), Failure> {
        Ok(())
    }

    fn casts(&self) -> &'static [CastTarget] {
        &[]
    }

    fn cast(&self, _value: &Value, _to: CastTarget, _prefs: &Preferences) -> Option<Value> {
        None
    }

    /// Re-register children after a structural edit.
    fn rebuild(&self, schema: Schema) -> Result<Schema, SchemaError> {
        Ok(schema)
    }

    /// Rebuild the node with every child schema passed through `f`.
    fn map_children(&self, schema: Schema, _f: &mut dyn FnMut(&Schema) -> Schema) -> Schema {
        schema
    }

    /// Hook run after the label flag is set.
    fn relabel(&self, schema: Schema, _name: &str) -> Schema {
        schema
    }

    fn child(&self, _schema: &Schema, _id: &str) -> Option<Schema> {
        None
    }

    fn modify(&self, _schema: &Schema, _id: &str, _replacement: &Schema) -> Result<Option<Schema>, SchemaError> {
        Ok(None)
    }

    fn describe(&self, _schema: &Schema, _desc: &mut Description) {}

    /// Replay the kind-specific parts of a description.
    fn build(&self, schema: Schema, _desc: &Description) -> Result<Schema, SchemaError> {
        Ok(schema)
    }

    fn build_rule(&self, schema: Schema, rule: &RuleDescription) -> Result<Schema, SchemaError> {
        Err(SchemaError::Description(format!(
            "{} schemas have no rule {:?}",
            schema.kind().as_str(),
            rule.name
        )))
    }
}

pub fn definition(kind: Kind) -> &'static dyn TypeDefinition {
    match kind {
        Kind::Any => &any::AnyType,
        Kind::Alternatives => &alternatives::AlternativesType,
        Kind::Array => &array::ArrayType,
        Kind::Boolean => &boolean::BooleanType,
        Kind::Date => &date::DateType,
        Kind::Number => &number::NumberType,
        Kind::Object => &object::ObjectType,
        Kind::String => &string::StringType,
    }
}

static TEMPLATES: Lazy<IndexMap<Kind, Schema>> = Lazy::new(|| {
    Kind::ALL
        .iter()
        .map(|kind| {
            let mut schema = Schema::bare(*kind);
            definition(*kind).initialize(&mut schema);
            (*kind, schema)
        })
        .collect()
});

/// A fresh node of `kind`.
pub fn template(kind: Kind) -> Schema {
    TEMPLATES.get(&kind).cloned().unwrap_or_else(|| {
        let mut schema = Schema::bare(kind);
        definition(kind).initialize(&mut schema);
        schema
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_matching_definition() {
        for kind in Kind::ALL {
            assert_eq!(definition(kind).kind(), kind);
            assert_eq!(template(kind).kind(), kind);
        }
    }

    #[test]
    fn templates_are_independent_copies() {
        let a = template(Kind::Boolean).truthy(["y"]).unwrap();
        let b = template(Kind::Boolean);
        assert_eq!(a.describe().truthy, Some(vec![Value::from("y")]));
        assert_eq!(b.describe().truthy, None);
    }
}
