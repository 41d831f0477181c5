//! Plain descriptors for schema nodes.
//!
//! `describe` and `build` are inverses up to normalization: describing the
//! result of `build(describe(s))` gives back the same descriptor.
use chrono::SecondsFormat;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Allowed, CastTarget, Flags, Kind, Presence, Rule, RuleArgs, Schema};
use crate::errors::SchemaError;
use crate::reference::Reference;
use crate::types::{self, date::DateBound, date::DateFormat};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Description {
    #[serde(rename = "type")]
    pub kind: Kind,
    #[serde(skip_serializing_if = "FlagsDescription::is_empty")]
    pub flags: FlagsDescription,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<AllowedDescription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<MatchDescription>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truthy: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub falsy: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<IndexMap<String, Description>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Description>>,
}

/// Flags that differ from the kind's template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlagsDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<CastTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insensitive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DateFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single: Option<bool>,
}

/// `{ "ref": "..." }`, `{ "value": ... }`, or a bare literal. Object literals
/// are always written in the `value` form so they never read back as a ref.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum AllowedDescription {
    Ref {
        #[serde(rename = "ref")]
        reference: String,
    },
    Wrapped {
        value: Value,
    },
    Literal(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleDescription {
    pub name: String,
    pub args: RuleArgsDescription,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleArgsDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<BoundDescription>,
}

/// `"now"`, a date literal, or `{ "ref": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundDescription {
    Ref {
        #[serde(rename = "ref")]
        reference: String,
    },
    Text(String),
}

/// One alternatives entry. Exactly one of `schema`, `ref` or `peek` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Description>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peek: Option<Description>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is: Option<Description>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub then: Option<Description>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Description>,
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERSIONS
// ————————————————————————————————————————————————————————————————————————————

fn changed<T: PartialEq + Clone>(value: &T, template: &T) -> Option<T> {
    (value != template).then(|| value.clone())
}

impl FlagsDescription {
    pub fn is_empty(&self) -> bool {
        self == &FlagsDescription::default()
    }

    fn diff(flags: &Flags, template: &Flags) -> Self {
        FlagsDescription {
            id: changed(&flags.id, &template.id).flatten(),
            label: changed(&flags.label, &template.label).flatten(),
            presence: changed(&flags.presence, &template.presence),
            only: changed(&flags.only, &template.only),
            error: changed(&flags.error, &template.error).flatten(),
            cast: changed(&flags.cast, &template.cast).flatten(),
            insensitive: changed(&flags.insensitive, &template.insensitive).flatten(),
            format: changed(&flags.format, &template.format).flatten(),
            unknown: changed(&flags.unknown, &template.unknown).flatten(),
            single: changed(&flags.single, &template.single).flatten(),
        }
    }

    /// Set flags directly; only the kind-specific ones are checked.
    fn apply(&self, schema: Schema) -> Result<Schema, SchemaError> {
        let mut obj = match self.cast {
            Some(to) => schema.cast(to)?,
            None => schema,
        };
        if self.format.is_some() {
            obj.require_kind(Kind::Date, "format")?;
        }
        if self.unknown.is_some() {
            obj.require_kind(Kind::Object, "unknown")?;
        }
        if self.single.is_some() {
            obj.require_kind(Kind::Array, "single")?;
        }

        let flags = &mut obj.flags;
        if self.id.is_some() {
            flags.id = self.id.clone();
        }
        if self.label.is_some() {
            flags.label = self.label.clone();
        }
        if let Some(presence) = self.presence {
            flags.presence = presence;
        }
        if let Some(only) = self.only {
            flags.only = only;
        }
        if self.error.is_some() {
            flags.error = self.error.clone();
        }
        if self.insensitive.is_some() {
            flags.insensitive = self.insensitive;
        }
        if self.format.is_some() {
            flags.format = self.format;
        }
        if self.unknown.is_some() {
            flags.unknown = self.unknown;
        }
        if self.single.is_some() {
            flags.single = self.single;
        }
        Ok(obj)
    }
}

impl From<&Allowed> for AllowedDescription {
    fn from(entry: &Allowed) -> Self {
        match entry {
            Allowed::Literal(v @ Value::Object(_)) => AllowedDescription::Wrapped { value: v.clone() },
            Allowed::Literal(v) => AllowedDescription::Literal(v.clone()),
            Allowed::Ref(r) => AllowedDescription::Ref { reference: r.to_string() },
        }
    }
}

impl AllowedDescription {
    fn to_allowed(&self) -> Result<Allowed, SchemaError> {
        Ok(match self {
            AllowedDescription::Literal(v) | AllowedDescription::Wrapped { value: v } => Allowed::Literal(v.clone()),
            AllowedDescription::Ref { reference } => Allowed::Ref(Reference::parse(reference)?),
        })
    }
}

impl From<&DateBound> for BoundDescription {
    fn from(bound: &DateBound) -> Self {
        match bound {
            DateBound::Now => BoundDescription::Text("now".to_string()),
            DateBound::Instant(d) => BoundDescription::Text(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            DateBound::Ref(r) => BoundDescription::Ref { reference: r.to_string() },
        }
    }
}

impl From<&Rule> for RuleDescription {
    fn from(rule: &Rule) -> Self {
        let RuleArgs::Compare { date, .. } = &rule.args;
        RuleDescription {
            name: rule.name.to_string(),
            args: RuleArgsDescription { date: Some(BoundDescription::from(date)) },
            message: rule.message.clone(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DESCRIBE / BUILD
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub fn describe(&self) -> Description {
        let template = types::template(self.kind);
        let mut desc = Description {
            kind: self.kind,
            flags: FlagsDescription::diff(&self.flags, &template.flags),
            allow: self.allowed.iter().map(AllowedDescription::from).collect(),
            rules: self.rules.iter().map(RuleDescription::from).collect(),
            ..Description::default()
        };
        types::definition(self.kind).describe(self, &mut desc);
        desc
    }

    /// Reconstruct a node: flags, allowed values, the kind's own state, then
    /// rules.
    pub fn build(desc: &Description) -> Result<Schema, SchemaError> {
        let definition = types::definition(desc.kind);
        let mut obj = desc.flags.apply(Schema::of(desc.kind))?;
        for entry in &desc.allow {
            obj = obj.with_allowed(entry.to_allowed()?, false);
        }
        obj = definition.build(obj, desc)?;
        for rule in &desc.rules {
            obj = definition.build_rule(obj, rule)?;
        }
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::alternatives::{SwitchCase, WhenOptions};
    use serde_json::json;

    #[test]
    fn template_flags_are_not_described() {
        let desc = Schema::boolean().describe();
        assert!(desc.flags.is_empty());
        let desc = Schema::boolean().insensitive(false).describe();
        assert_eq!(desc.flags.insensitive, Some(false));
        assert_eq!(serde_json::to_value(&Schema::string().describe()).unwrap(), json!({"type": "string"}));
    }

    #[test]
    fn descriptions_serialize_in_the_match_shape() {
        let schema = Schema::alternatives()
            .when("kind", WhenOptions::new().is("a").then(Schema::string()))
            .unwrap();
        let expected = json!({
            "type": "alternatives",
            "matches": [{
                "ref": "kind",
                "is": {"type": "any", "flags": {"presence": "required", "only": true}, "allow": ["a"]},
                "then": {"type": "string"}
            }]
        });
        assert_eq!(serde_json::to_value(schema.describe()).unwrap(), expected);
    }

    #[test]
    fn json_descriptions_build_live_schemas() {
        let desc: Description = serde_json::from_value(json!({
            "type": "object",
            "keys": {
                "start": {"type": "date", "flags": {"format": "iso"}},
                "end": {
                    "type": "date",
                    "rules": [{"name": "greater", "args": {"date": {"ref": "start"}}, "message": "ends too soon"}]
                },
                "flag": {"type": "boolean", "truthy": ["Y"], "allow": [null]}
            }
        }))
        .unwrap();
        let schema = Schema::build(&desc).unwrap();

        assert!(schema
            .validate(json!({"start": "2020-01-01T00:00:00Z", "end": "2020-02-01", "flag": "y"}))
            .is_ok());
        let early = schema.validate(json!({"start": "2020-01-01T00:00:00Z", "end": "2019-01-01"}));
        assert_eq!(early.first_report().unwrap().message, "ends too soon");
        assert!(schema.validate(json!({"flag": null})).is_ok());
    }

    #[test]
    fn build_rejects_bad_descriptions() {
        let unknown_rule = Description {
            kind: Kind::Boolean,
            rules: vec![RuleDescription { name: "min".into(), ..RuleDescription::default() }],
            ..Description::default()
        };
        assert!(matches!(Schema::build(&unknown_rule), Err(SchemaError::Description(_))));

        let bad_format: Result<Description, _> =
            serde_json::from_value(json!({"type": "date", "flags": {"format": "rfc"}}));
        assert!(bad_format.is_err());

        let misplaced = Description {
            kind: Kind::String,
            flags: FlagsDescription { format: Some(DateFormat::Iso), ..FlagsDescription::default() },
            ..Description::default()
        };
        assert!(matches!(Schema::build(&misplaced), Err(SchemaError::UnsupportedRule { .. })));

        let empty_match = Description {
            kind: Kind::Alternatives,
            matches: Some(vec![MatchDescription::default()]),
            ..Description::default()
        };
        assert!(matches!(Schema::build(&empty_match), Err(SchemaError::Description(_))));
    }

    #[test]
    fn object_literals_survive_json_as_literals() {
        let schema = Schema::any().valid([Value::from(json!({"ref": "x"}))]).unwrap();
        let desc = schema.describe();
        assert_eq!(serde_json::to_value(&desc.allow).unwrap(), json!([{"value": {"ref": "x"}}]));

        let parsed: Description = serde_json::from_str(&serde_json::to_string(&desc).unwrap()).unwrap();
        assert_eq!(parsed, desc);
        let rebuilt = Schema::build(&parsed).unwrap();
        assert!(rebuilt.validate(json!({"ref": "x"})).is_ok());
        assert_eq!(rebuilt.validate(json!({"x": 1})).code(), Some("any.only"));

        let written: Description =
            serde_json::from_value(json!({"type": "any", "allow": [{"ref": "x"}, {"ref": "y", "extra": 1}, 3]}))
                .unwrap();
        assert!(matches!(written.allow[0], AllowedDescription::Ref { .. }));
        assert!(matches!(written.allow[1], AllowedDescription::Literal(Value::Object(_))));
        assert_eq!(written.allow[2], AllowedDescription::Literal(Value::Number(3.0)));
    }

    #[test]
    fn describe_is_idempotent_through_json() {
        let schema = Schema::object()
            .keys([
                ("when", Schema::date().timestamp(Some("unix")).unwrap().max("now").unwrap()),
                (
                    "choice",
                    Schema::alternatives()
                        .when(
                            "when",
                            WhenOptions::switch([
                                SwitchCase::new(0, Schema::boolean().falsy(["N"]).unwrap()),
                                SwitchCase::new(1, Schema::array().items([Schema::number()]).unwrap())
                                    .otherwise(Schema::any().forbidden()),
                            ]),
                        )
                        .unwrap(),
                ),
            ])
            .unwrap()
            .unknown(true)
            .unwrap();
        let first = schema.describe();
        let text = serde_json::to_string(&first).unwrap();
        let parsed: Description = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, first);
        assert_eq!(Schema::build(&parsed).unwrap().describe(), first);
    }
}
