use super::TypeDefinition;
use crate::errors::{ErrorContext, SchemaError};
use crate::schema::describe::Description;
use crate::schema::{Family, Inner, Kind, Schema, SchemaLike, Validation};
use crate::state::{PathSegment, Preferences, State};
use crate::value::Value;

pub struct ArrayType;

impl TypeDefinition for ArrayType {
    fn kind(&self) -> Kind {
        Kind::Array
    }

    fn initialize(&self, schema: &mut Schema) {
        schema.inner = Inner::Array(Vec::new());
    }

    fn validate(&self, schema: &Schema, value: Value, state: &State, prefs: &Preferences) -> Validation {
        let elements = match value {
            Value::Array(xs) => xs,
            other if schema.flags.single == Some(true) => vec![other],
            other => {
                let failure = schema.create_error("array.base", Some(&other), ErrorContext::default(), state);
                return Validation::failed(Some(other), failure);
            }
        };
        let items = schema.declared_items();
        if items.is_empty() {
            return Validation::ok(Some(Value::Array(elements)));
        }

        let parent = Value::Array(elements.clone());
        let mut out = Vec::with_capacity(elements.len());
        let mut errors = Vec::new();
        for (index, element) in elements.into_iter().enumerate() {
            let child_state = state.child(PathSegment::Index(index), parent.clone());

            let mut failures = Vec::new();
            let mut accepted = None;
            for item in items {
                let result = item.validate_in(Some(element.clone()), &child_state, prefs);
                if result.is_ok() {
                    accepted = Some(result.value);
                    break;
                }
                failures.extend(result.errors);
            }

            match accepted {
                Some(Some(v)) => out.push(v),
                Some(None) => {}
                None if items.len() == 1 => errors.extend(failures),
                None => {
                    let context = ErrorContext {
                        label: Some(child_state.label()),
                        details: Some(failures),
                        ..ErrorContext::default()
                    };
                    errors.push(schema.create_error("array.includes", Some(&element), context, &child_state));
                }
            }
            if !errors.is_empty() && prefs.abort_early {
                break;
            }
        }

        if errors.is_empty() {
            Validation::ok(Some(Value::Array(out)))
        } else {
            Validation { value: Some(parent), errors }
        }
    }

    fn rebuild(&self, mut schema: Schema) -> Result<Schema, SchemaError> {
        let mut registrations = schema.registrations.clone();
        for item in schema.declared_items() {
            registrations.register_schema(item, Family::Parent);
        }
        schema.registrations = registrations;
        Ok(schema)
    }

    fn map_children(&self, mut schema: Schema, f: &mut dyn FnMut(&Schema) -> Schema) -> Schema {
        let mapped: Vec<Schema> = schema.declared_items().iter().map(|item| f(item)).collect();
        schema.inner = Inner::Array(mapped);
        schema
    }

    fn child(&self, schema: &Schema, id: &str) -> Option<Schema> {
        schema.declared_items().iter().find(|item| item.flags.id.as_deref() == Some(id)).cloned()
    }

    fn modify(&self, schema: &Schema, id: &str, replacement: &Schema) -> Result<Option<Schema>, SchemaError> {
        let Some(index) = schema.declared_items().iter().position(|item| item.flags.id.as_deref() == Some(id)) else {
            return Ok(None);
        };
        let mut items = schema.declared_items().to_vec();
        items[index] = replacement.clone();
        let mut obj = schema.clone();
        obj.inner = Inner::Array(items);
        obj.flags.array_items = obj.declared_items().iter().any(Schema::is_array_like);
        obj.rebuild().map(Some)
    }

    fn describe(&self, schema: &Schema, desc: &mut Description) {
        if !schema.declared_items().is_empty() {
            desc.items = Some(schema.declared_items().iter().map(Schema::describe).collect());
        }
    }

    fn build(&self, schema: Schema, desc: &Description) -> Result<Schema, SchemaError> {
        let Some(items) = &desc.items else {
            return Ok(schema);
        };
        let items = items.iter().map(Schema::build).collect::<Result<Vec<_>, _>>()?;
        schema.items(items)
    }
}

impl Schema {
    /// Allowed element schemas; each element must match one of them.
    pub fn items<I, S>(&self, items: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<SchemaLike>,
    {
        self.require_kind(Kind::Array, "items")?;
        let mut obj = self.clone();
        let mut list = self.declared_items().to_vec();
        for like in items {
            let item = Schema::cast_like(like);
            if item.is_array_like() {
                if obj.flags.single == Some(true) {
                    return Err(SchemaError::ArrayItemWithSingle);
                }
                obj.flags.array_items = true;
            }
            list.push(item);
        }
        obj.inner = Inner::Array(list);
        obj.rebuild()
    }

    /// Wrap a non-array value in a one-element array before validating.
    pub fn single(&self, enabled: bool) -> Result<Schema, SchemaError> {
        self.require_kind(Kind::Array, "single")?;
        if enabled && self.flags.array_items {
            return Err(SchemaError::ArrayItemWithSingle);
        }
        let mut obj = self.clone();
        obj.flags.single = Some(enabled);
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Failure;
    use crate::types::alternatives::WhenOptions;
    use serde_json::json;

    #[test]
    fn elements_match_any_item() {
        let schema = Schema::array().items([Schema::number(), Schema::boolean()]).unwrap();
        let result = schema.validate(json!(["1", true]));
        assert_eq!(result.value, Some(Value::from(json!([1, true]))));

        let result = schema.validate(json!([1, "x"]));
        let report = result.first_report().unwrap();
        assert_eq!(report.code, "array.includes");
        assert_eq!(report.path, vec![PathSegment::Index(1)]);
        assert_eq!(report.context.details.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn a_single_item_reports_its_own_error() {
        let schema = Schema::array().items([Schema::boolean()]).unwrap();
        let result = schema.validate(json!([true, "no"]));
        assert_eq!(result.code(), Some("boolean.base"));
        assert!(matches!(&result.errors[0], Failure::Report(r) if r.context.label.as_deref() == Some("[1]")));
    }

    #[test]
    fn single_wraps_scalars() {
        let schema = Schema::array().single(true).unwrap().items([Schema::string()]).unwrap();
        assert_eq!(schema.validate("x").value, Some(Value::from(json!(["x"]))));
        assert_eq!(Schema::array().validate("x").code(), Some("array.base"));
    }

    #[test]
    fn single_conflicts_with_array_items() {
        let nested = Schema::array().items([Schema::array()]).unwrap();
        assert_eq!(nested.single(true).unwrap_err(), SchemaError::ArrayItemWithSingle);

        let alt = Schema::alternatives()
            .when(Schema::string(), WhenOptions::new().then(Schema::string()).otherwise(Schema::array()))
            .unwrap();
        let single = Schema::array().single(true).unwrap();
        assert_eq!(single.items([alt]).unwrap_err(), SchemaError::ArrayItemWithSingle);
        assert!(single.items([Schema::string()]).is_ok());
    }
}
