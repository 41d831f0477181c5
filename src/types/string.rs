use super::TypeDefinition;
use crate::errors::ErrorContext;
use crate::schema::{Kind, Schema, Validation};
use crate::state::{Preferences, State};
use crate::value::Value;

pub struct StringType;

impl TypeDefinition for StringType {
    fn kind(&self) -> Kind {
        Kind::String
    }

    fn validate(&self, schema: &Schema, value: Value, state: &State, _prefs: &Preferences) -> Validation {
        if matches!(value, Value::String(_)) {
            return Validation::ok(Some(value));
        }
        let failure = schema.create_error("string.base", Some(&value), ErrorContext::default(), state);
        Validation::failed(Some(value), failure)
    }
}
