use once_cell::sync::Lazy;
use regex::Regex;

use super::TypeDefinition;
use crate::errors::ErrorContext;
use crate::schema::{Kind, Schema, Validation};
use crate::state::{Preferences, State};
use crate::value::Value;

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").expect("numeric pattern")
});

pub struct NumberType;

impl TypeDefinition for NumberType {
    fn kind(&self) -> Kind {
        Kind::Number
    }

    fn coerce(&self, _schema: &Schema, value: Value, _state: &State, _prefs: &Preferences) -> Value {
        match &value {
            Value::String(s) if NUMERIC.is_match(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Value::Number(n),
                _ => value,
            },
            _ => value,
        }
    }

    fn validate(&self, schema: &Schema, value: Value, state: &State, _prefs: &Preferences) -> Validation {
        if matches!(value, Value::Number(n) if n.is_finite()) {
            return Validation::ok(Some(value));
        }
        let failure = schema.create_error("number.base", Some(&value), ErrorContext::default(), state);
        Validation::failed(Some(value), failure)
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::Schema;
    use crate::state::Preferences;
    use crate::value::Value;

    #[test]
    fn numeric_strings_coerce_only_when_converting() {
        let schema = Schema::number();
        assert_eq!(schema.validate(" 4.5 ").value, Some(Value::Number(4.5)));
        assert_eq!(schema.validate("4x").code(), Some("number.base"));
        let strict = schema.validate_with(Some(Value::from("4")), &Preferences::strict());
        assert_eq!(strict.code(), Some("number.base"));
    }
}
