use indexmap::IndexMap;
use tracing::trace;

use super::TypeDefinition;
use crate::errors::{ErrorContext, SchemaError};
use crate::schema::describe::Description;
use crate::schema::{Family, Inner, Kind, Schema, SchemaLike, Validation};
use crate::state::{PathSegment, Preferences, State};
use crate::value::Value;

/// A declared key.
#[derive(Debug, Clone)]
pub struct ObjectKey {
    pub name: String,
    pub schema: Schema,
}

pub struct ObjectType;

impl TypeDefinition for ObjectType {
    fn kind(&self) -> Kind {
        Kind::Object
    }

    fn initialize(&self, schema: &mut Schema) {
        schema.inner = Inner::Object(None);
    }

    fn validate(&self, schema: &Schema, value: Value, state: &State, prefs: &Preferences) -> Validation {
        let input = match value {
            Value::Object(input) => input,
            other => {
                let failure = schema.create_error("object.base", Some(&other), ErrorContext::default(), state);
                return Validation::failed(Some(other), failure);
            }
        };
        let Some(keys) = schema.declared_keys() else {
            return Validation::ok(Some(Value::Object(input)));
        };

        let mut target = input.clone();
        let mut errors = Vec::new();
        for key in ordered(keys) {
            let child_state = state.child(PathSegment::Key(key.name.clone()), Value::Object(target.clone()));
            let result = key.schema.validate_in(target.get(&key.name).cloned(), &child_state, prefs);
            if !result.is_ok() {
                errors.extend(result.errors);
                if prefs.abort_early {
                    return Validation { value: Some(Value::Object(target)), errors };
                }
                continue;
            }
            match result.value {
                Some(v) => {
                    target.insert(key.name.clone(), v);
                }
                None => {
                    target.shift_remove(&key.name);
                }
            }
        }

        if !schema.flags.unknown.unwrap_or(prefs.allow_unknown) {
            let parent = Value::Object(target.clone());
            for (name, unknown) in &input {
                if keys.iter().any(|k| &k.name == name) {
                    continue;
                }
                let child_state = state.child(PathSegment::Key(name.clone()), parent.clone());
                let context = ErrorContext { label: Some(child_state.label()), ..ErrorContext::default() };
                errors.push(schema.create_error("object.unknown", Some(unknown), context, &child_state));
                if prefs.abort_early {
                    break;
                }
            }
        }

        Validation { value: Some(Value::Object(target)), errors }
    }

    fn rebuild(&self, mut schema: Schema) -> Result<Schema, SchemaError> {
        let mut registrations = schema.registrations.clone();
        for key in schema.declared_keys().unwrap_or_default() {
            registrations.register_schema(&key.schema, Family::Parent);
        }
        schema.registrations = registrations;
        Ok(schema)
    }

    fn map_children(&self, mut schema: Schema, f: &mut dyn FnMut(&Schema) -> Schema) -> Schema {
        if let Inner::Object(Some(keys)) = &schema.inner {
            let mapped = keys.iter().map(|k| ObjectKey { name: k.name.clone(), schema: f(&k.schema) }).collect();
            schema.inner = Inner::Object(Some(mapped));
        }
        schema
    }

    fn child(&self, schema: &Schema, id: &str) -> Option<Schema> {
        let keys = schema.declared_keys()?;
        keys.iter().find(|k| identifies(k, id)).map(|k| k.schema.clone())
    }

    fn modify(&self, schema: &Schema, id: &str, replacement: &Schema) -> Result<Option<Schema>, SchemaError> {
        let Some(keys) = schema.declared_keys() else {
            return Ok(None);
        };
        let Some(index) = keys.iter().position(|k| identifies(k, id)) else {
            return Ok(None);
        };
        let mut keys = keys.to_vec();
        keys[index].schema = replacement.clone();
        let mut obj = schema.clone();
        obj.inner = Inner::Object(Some(keys));
        obj.rebuild().map(Some)
    }

    fn describe(&self, schema: &Schema, desc: &mut Description) {
        desc.keys = schema
            .declared_keys()
            .map(|keys| keys.iter().map(|k| (k.name.clone(), k.schema.describe())).collect::<IndexMap<_, _>>());
    }

    fn build(&self, schema: Schema, desc: &Description) -> Result<Schema, SchemaError> {
        let Some(keys) = &desc.keys else {
            return Ok(schema);
        };
        let children = keys
            .iter()
            .map(|(name, d)| Schema::build(d).map(|s| (name.clone(), s)))
            .collect::<Result<Vec<_>, _>>()?;
        schema.keys(children)
    }
}

fn identifies(key: &ObjectKey, id: &str) -> bool {
    key.name == id || key.schema.flags.id.as_deref() == Some(id)
}

/// Declaration order, except that a key runs after the siblings it
/// references. Keys caught in a cycle keep declaration order at the end.
fn ordered(keys: &[ObjectKey]) -> Vec<&ObjectKey> {
    let mut done = vec![false; keys.len()];
    let mut out = Vec::with_capacity(keys.len());

    let ready = |i: usize, done: &[bool]| {
        keys[i].schema.registrations().siblings().all(|dep| {
            dep == keys[i].name || keys.iter().zip(done).all(|(k, finished)| k.name != dep || *finished)
        })
    };

    while let Some(i) = (0..keys.len()).find(|&i| !done[i] && ready(i, &done)) {
        done[i] = true;
        out.push(&keys[i]);
    }
    if out.len() < keys.len() {
        trace!(remaining = keys.len() - out.len(), "cyclic sibling references");
        out.extend(keys.iter().zip(&done).filter(|(_, finished)| !**finished).map(|(k, _)| k));
    }
    out
}

impl Schema {
    /// Declare (or redeclare) keys. An object with no `keys` call accepts
    /// any key.
    pub fn keys<I, K, S>(&self, keys: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<SchemaLike>,
    {
        self.require_kind(Kind::Object, "keys")?;
        let mut list = self.declared_keys().map(<[ObjectKey]>::to_vec).unwrap_or_default();
        for (name, like) in keys {
            let name = name.into();
            let schema = Schema::cast_like(like);
            match list.iter_mut().find(|k| k.name == name) {
                Some(existing) => existing.schema = schema,
                None => list.push(ObjectKey { name, schema }),
            }
        }
        let mut obj = self.clone();
        obj.inner = Inner::Object(Some(list));
        obj.rebuild()
    }

    /// Accept (or reject) undeclared keys, overriding `prefs.allow_unknown`.
    pub fn unknown(&self, allow: bool) -> Result<Schema, SchemaError> {
        self.require_kind(Kind::Object, "unknown")?;
        let mut obj = self.clone();
        obj.flags.unknown = Some(allow);
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;
    use crate::state::Preferences;
    use serde_json::json;

    fn names(keys: &[ObjectKey]) -> Vec<&str> {
        ordered(keys).into_iter().map(|k| k.name.as_str()).collect()
    }

    #[test]
    fn keys_validate_and_coerce_children() {
        let schema = Schema::object().keys([("n", Schema::number()), ("b", Schema::boolean())]).unwrap();
        let result = schema.validate(json!({"n": "3", "b": "true"}));
        assert_eq!(result.value, Some(Value::from(json!({"n": 3, "b": true}))));
        assert_eq!(schema.validate(json!([])).code(), Some("object.base"));
    }

    #[test]
    fn child_errors_carry_their_path() {
        let schema = Schema::object().keys([("flag", Schema::boolean())]).unwrap();
        let result = schema.validate(json!({"flag": "maybe"}));
        let report = result.first_report().unwrap();
        assert_eq!(report.code, "boolean.base");
        assert_eq!(report.path, vec![PathSegment::Key("flag".into())]);
        assert_eq!(report.context.label.as_deref(), Some("flag"));
    }

    #[test]
    fn unknown_keys_follow_flag_then_preferences() {
        let schema = Schema::object().keys([("a", Schema::any())]).unwrap();
        assert_eq!(schema.validate(json!({"a": 1, "z": 2})).code(), Some("object.unknown"));

        let prefs = Preferences { allow_unknown: true, ..Preferences::default() };
        assert!(schema.validate_with(Some(Value::from(json!({"z": 2}))), &prefs).is_ok());
        assert!(schema.unknown(true).unwrap().validate(json!({"z": 2})).is_ok());
        assert!(Schema::object().validate(json!({"z": 2})).is_ok());
    }

    #[test]
    fn referenced_siblings_run_first() {
        let later = Schema::date().greater(Reference::parse("start").unwrap()).unwrap();
        let keys = Schema::object()
            .keys([("end", later), ("start", Schema::date()), ("note", Schema::date())])
            .unwrap();
        assert_eq!(names(keys.declared_keys().unwrap()), vec!["start", "end", "note"]);
    }

    #[test]
    fn cycles_fall_back_to_declaration_order() {
        let a = Schema::any().valid([Reference::parse("b").unwrap()]).unwrap();
        let b = Schema::any().valid([Reference::parse("a").unwrap()]).unwrap();
        let schema = Schema::object().keys([("a", a), ("b", b), ("c", Schema::any())]).unwrap();
        assert_eq!(names(schema.declared_keys().unwrap()), vec!["c", "a", "b"]);
    }

    #[test]
    fn redeclared_keys_replace_in_place() {
        let schema = Schema::object()
            .keys([("a", Schema::string()), ("b", Schema::any())])
            .unwrap()
            .keys([("a", Schema::number())])
            .unwrap();
        let keys = schema.declared_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].schema.kind(), Kind::Number);
    }

    #[test]
    fn modify_by_key_name() {
        let schema = Schema::object().keys([("a", Schema::string())]).unwrap();
        let modified = schema.modify("a", &Schema::number()).unwrap().unwrap();
        assert_eq!(modified.extract("a").unwrap().kind(), Kind::Number);
        assert!(schema.modify("b", &Schema::number()).unwrap().is_none());
        assert!(matches!(Schema::string().unknown(true), Err(SchemaError::UnsupportedRule { .. })));
    }
}
