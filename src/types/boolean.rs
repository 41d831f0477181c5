use super::TypeDefinition;
use crate::errors::{ErrorContext, SchemaError};
use crate::schema::describe::Description;
use crate::schema::{Allowed, CastTarget, Inner, Kind, Schema, Validation, Values};
use crate::state::{Preferences, State};
use crate::value::Value;

pub struct BooleanType;

impl TypeDefinition for BooleanType {
    fn kind(&self) -> Kind {
        Kind::Boolean
    }

    fn initialize(&self, schema: &mut Schema) {
        schema.flags.insensitive = Some(true);
        schema.inner = Inner::Boolean { truthy: Values::default(), falsy: Values::default() };
    }

    fn coerce(&self, schema: &Schema, value: Value, state: &State, prefs: &Preferences) -> Value {
        if matches!(value, Value::Bool(_)) {
            return value;
        }
        let insensitive = schema.flags.insensitive.unwrap_or(true);

        let value = match &value {
            Value::String(s) => {
                let normalized = if insensitive { s.to_lowercase() } else { s.clone() };
                match normalized.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => value,
                }
            }
            _ => value,
        };
        if matches!(value, Value::Bool(_)) {
            return value;
        }

        let Inner::Boolean { truthy, falsy } = &schema.inner else {
            return value;
        };
        if truthy.has(&value, state, prefs, insensitive) {
            Value::Bool(true)
        } else if falsy.has(&value, state, prefs, insensitive) {
            Value::Bool(false)
        } else {
            value
        }
    }

    fn validate(&self, schema: &Schema, value: Value, state: &State, _prefs: &Preferences) -> Validation {
        if matches!(value, Value::Bool(_)) {
            return Validation::ok(Some(value));
        }
        let failure = schema.create_error("boolean.base", Some(&value), ErrorContext::default(), state);
        Validation::failed(Some(value), failure)
    }

    fn casts(&self) -> &'static [CastTarget] {
        &[CastTarget::Number, CastTarget::String]
    }

    fn cast(&self, value: &Value, to: CastTarget, _prefs: &Preferences) -> Option<Value> {
        let b = value.as_bool()?;
        Some(match to {
            CastTarget::Number => Value::Number(if b { 1.0 } else { 0.0 }),
            CastTarget::String => Value::from(if b { "true" } else { "false" }),
        })
    }

    fn describe(&self, schema: &Schema, desc: &mut Description) {
        let Inner::Boolean { truthy, falsy } = &schema.inner else {
            return;
        };
        desc.truthy = describe_set(truthy);
        desc.falsy = describe_set(falsy);
    }

    fn build(&self, schema: Schema, desc: &Description) -> Result<Schema, SchemaError> {
        let mut obj = schema;
        if let Some(values) = &desc.truthy {
            obj = obj.truthy(values.iter().cloned())?;
        }
        if let Some(values) = &desc.falsy {
            obj = obj.falsy(values.iter().cloned())?;
        }
        Ok(obj)
    }
}

fn describe_set(values: &Values) -> Option<Vec<Value>> {
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .iter()
            .filter_map(|v| match v {
                Allowed::Literal(v) => Some(v.clone()),
                Allowed::Ref(_) => None,
            })
            .collect(),
    )
}

#[derive(Clone, Copy)]
enum Side {
    Truthy,
    Falsy,
}

impl Schema {
    /// Extra values coerced to `true`.
    pub fn truthy<I, V>(&self, values: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.extend_boolean_set(values, Side::Truthy)
    }

    /// Extra values coerced to `false`.
    pub fn falsy<I, V>(&self, values: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.extend_boolean_set(values, Side::Falsy)
    }

    fn extend_boolean_set<I, V>(&self, values: I, side: Side) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let rule = match side {
            Side::Truthy => "truthy",
            Side::Falsy => "falsy",
        };
        self.require_kind(Kind::Boolean, rule)?;

        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(SchemaError::MissingValues(rule));
        }
        if values.iter().any(|v| matches!(v, Value::Array(_))) {
            return Err(SchemaError::NestedValues(rule));
        }

        let mut obj = self.clone();
        if let Inner::Boolean { truthy, falsy } = &mut obj.inner {
            let set = match side {
                Side::Truthy => truthy,
                Side::Falsy => falsy,
            };
            for value in values {
                set.add(Allowed::Literal(value));
            }
        }
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::SchemaError;
    use crate::schema::{CastTarget, Schema};
    use crate::state::Preferences;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn canonical_tokens_coerce_case_insensitively_by_default() {
        let schema = Schema::boolean();
        assert_eq!(schema.validate("TRUE").value, Some(Value::Bool(true)));
        assert_eq!(schema.validate("false").value, Some(Value::Bool(false)));
        assert_eq!(schema.validate("yes").code(), Some("boolean.base"));
        assert_eq!(schema.insensitive(false).validate("TRUE").code(), Some("boolean.base"));
    }

    #[test]
    fn truthy_respects_insensitive_flag() {
        let relaxed = Schema::boolean().truthy(["Y"]).unwrap().insensitive(true);
        assert_eq!(relaxed.validate("y").value, Some(Value::Bool(true)));

        let strict = Schema::boolean().insensitive(false).truthy(["Y"]).unwrap();
        assert_eq!(strict.validate("y").code(), Some("boolean.base"));
        assert_eq!(strict.validate("Y").value, Some(Value::Bool(true)));
    }

    #[test]
    fn falsy_values_map_to_false_and_numbers_match_by_value() {
        let schema = Schema::boolean().truthy([1]).unwrap().falsy([0, 2]).unwrap();
        assert_eq!(schema.validate(1).value, Some(Value::Bool(true)));
        assert_eq!(schema.validate(json!(0)).value, Some(Value::Bool(false)));
        assert_eq!(schema.validate(3).code(), Some("boolean.base"));
    }

    #[test]
    fn no_coercion_without_convert() {
        let schema = Schema::boolean().truthy(["Y"]).unwrap();
        let result = schema.validate_with(Some(Value::from("Y")), &Preferences::strict());
        assert_eq!(result.code(), Some("boolean.base"));
    }

    #[test]
    fn set_builders_reject_misuse() {
        assert_eq!(
            Schema::boolean().truthy(Vec::<Value>::new()).unwrap_err(),
            SchemaError::MissingValues("truthy")
        );
        assert_eq!(
            Schema::boolean().falsy([Value::from(json!(["n"]))]).unwrap_err(),
            SchemaError::NestedValues("falsy")
        );
        assert!(matches!(
            Schema::date().truthy(["y"]),
            Err(SchemaError::UnsupportedRule { rule: "truthy", kind: "date" })
        ));
    }

    #[test]
    fn casts_to_number_and_string() {
        let numeric = Schema::boolean().cast(CastTarget::Number).unwrap();
        assert_eq!(numeric.validate(true).value, Some(Value::Number(1.0)));
        let text = Schema::boolean().cast(CastTarget::String).unwrap();
        assert_eq!(text.validate("FALSE").value, Some(Value::from("false")));
    }
}
