pub mod parse;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::TypeDefinition;
use crate::errors::{ErrorContext, Failure, SchemaError};
use crate::reference::Reference;
use crate::schema::describe::{BoundDescription, RuleDescription};
use crate::schema::{CastTarget, Kind, Rule, RuleArgs, Schema, Validation};
use crate::state::{DateFormatPref, Preferences, State};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    Iso,
    Javascript,
    Unix,
}

impl DateFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DateFormat::Iso => "iso",
            DateFormat::Javascript => "javascript",
            DateFormat::Unix => "unix",
        }
    }
}

impl FromStr for DateFormat {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iso" => Ok(DateFormat::Iso),
            "javascript" => Ok(DateFormat::Javascript),
            "unix" => Ok(DateFormat::Unix),
            other => Err(SchemaError::UnknownDateFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gte,
    Lte,
    Gt,
    Lt,
}

impl Operator {
    pub fn compare(self, a: i64, b: i64) -> bool {
        match self {
            Operator::Gte => a >= b,
            Operator::Lte => a <= b,
            Operator::Gt => a > b,
            Operator::Lt => a < b,
        }
    }

    fn for_rule(name: &str) -> Option<(&'static str, Operator)> {
        match name {
            "min" => Some(("min", Operator::Gte)),
            "max" => Some(("max", Operator::Lte)),
            "greater" => Some(("greater", Operator::Gt)),
            "less" => Some(("less", Operator::Lt)),
            _ => None,
        }
    }
}

/// A comparison bound after construction-time normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum DateBound {
    /// The instant the rule runs.
    Now,
    Instant(DateTime<Utc>),
    Ref(Reference),
}

/// What callers pass to `min`/`max`/`greater`/`less`.
#[derive(Debug, Clone)]
pub enum Limit {
    Now,
    Value(Value),
    Ref(Reference),
}

impl From<&str> for Limit {
    fn from(s: &str) -> Self {
        if s == "now" { Limit::Now } else { Limit::Value(Value::from(s)) }
    }
}

impl From<Value> for Limit {
    fn from(v: Value) -> Self { Limit::Value(v) }
}

impl From<i64> for Limit {
    fn from(n: i64) -> Self { Limit::Value(Value::from(n)) }
}

impl From<DateTime<Utc>> for Limit {
    fn from(d: DateTime<Utc>) -> Self { Limit::Value(Value::Date(d)) }
}

impl From<Reference> for Limit {
    fn from(r: Reference) -> Self { Limit::Ref(r) }
}

impl Limit {
    fn normalize(self) -> Result<DateBound, SchemaError> {
        match self {
            Limit::Now => Ok(DateBound::Now),
            Limit::Ref(r) => Ok(DateBound::Ref(r)),
            Limit::Value(v) => parse::parse(&v, None)
                .map(DateBound::Instant)
                .ok_or_else(|| SchemaError::InvalidDate(v.display())),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DEFINITION
// ————————————————————————————————————————————————————————————————————————————

pub struct DateType;

impl TypeDefinition for DateType {
    fn kind(&self) -> Kind {
        Kind::Date
    }

    fn coerce(&self, schema: &Schema, value: Value, _state: &State, _prefs: &Preferences) -> Value {
        if !matches!(value, Value::Number(_) | Value::String(_)) {
            return value;
        }
        match parse::parse(&value, schema.flags.format) {
            Some(d) => {
                trace!(from = %value.display(), "coerced to date");
                Value::Date(d)
            }
            None => value,
        }
    }

    fn validate(&self, schema: &Schema, value: Value, state: &State, prefs: &Preferences) -> Validation {
        if matches!(value, Value::Date(_)) {
            return Validation::ok(Some(value));
        }
        let code = if !prefs.convert {
            "date.strict".to_string()
        } else {
            match schema.flags.format {
                None => "date.base".to_string(),
                Some(DateFormat::Iso) => "date.isoDate".to_string(),
                Some(format) => format!("date.timestamp.{}", format.as_str()),
            }
        };
        let failure = schema.create_error(&code, Some(&value), ErrorContext::default(), state);
        Validation::failed(Some(value), failure)
    }

    fn rule(
        &self,
        schema: &Schema,
        rule: &Rule,
        value: &Value,
        state: &State,
        prefs: &Preferences,
    ) -> Result<(), Failure> {
        let RuleArgs::Compare { operator, date } = &rule.args;
        let Some(instant) = value.as_date() else {
            return Ok(());
        };

        let (to, limit) = match date {
            DateBound::Now => (Utc::now().timestamp_millis(), Value::from("now")),
            DateBound::Instant(d) => (d.timestamp_millis(), Value::Date(*d)),
            DateBound::Ref(r) => {
                let resolved = r.resolve(Some(value), state, prefs);
                match resolved.as_ref().and_then(|v| parse::parse(v, None)) {
                    Some(d) => (d.timestamp_millis(), Value::Date(d)),
                    None => {
                        let context = ErrorContext { reference: Some(r.to_string()), ..ErrorContext::default() };
                        return Err(schema.create_error("date.ref", resolved.as_ref(), context, state));
                    }
                }
            }
        };

        if operator.compare(instant.timestamp_millis(), to) {
            return Ok(());
        }
        let context = ErrorContext { limit: Some(limit), ..ErrorContext::default() };
        Err(schema.create_error(&format!("date.{}", rule.name), Some(value), context, state))
    }

    fn casts(&self) -> &'static [CastTarget] {
        &[CastTarget::Number, CastTarget::String]
    }

    fn cast(&self, value: &Value, to: CastTarget, prefs: &Preferences) -> Option<Value> {
        let d = value.as_date()?;
        Some(match to {
            CastTarget::Number => Value::Number(d.timestamp_millis() as f64),
            CastTarget::String => Value::String(render(d, prefs.date_format)),
        })
    }

    fn build_rule(&self, schema: Schema, rule: &RuleDescription) -> Result<Schema, SchemaError> {
        let bound = rule
            .args
            .date
            .as_ref()
            .ok_or_else(|| SchemaError::Description(format!("rule {:?} is missing args.date", rule.name)))?;
        let limit = match bound {
            BoundDescription::Ref { reference } => Limit::Ref(Reference::parse(reference)?),
            BoundDescription::Text(text) => Limit::from(text.as_str()),
        };
        let mut obj = schema.compare(&rule.name, limit)?;
        if let Some(message) = &rule.message {
            if let Some(last) = obj.rules.last_mut() {
                last.message = Some(message.clone());
            }
        }
        Ok(obj)
    }
}

fn render(d: &DateTime<Utc>, format: DateFormatPref) -> String {
    match format {
        DateFormatPref::Iso => d.to_rfc3339_opts(SecondsFormat::Millis, true),
        DateFormatPref::Javascript | DateFormatPref::String => {
            d.format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)").to_string()
        }
        DateFormatPref::Date => d.format("%a %b %d %Y").to_string(),
        DateFormatPref::Time => d.format("%H:%M:%S GMT+0000 (Coordinated Universal Time)").to_string(),
        DateFormatPref::Utc => d.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDERS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// One of `iso`, `javascript`, `unix`.
    pub fn format(&self, format: &str) -> Result<Schema, SchemaError> {
        self.require_kind(Kind::Date, "format")?;
        let format = DateFormat::from_str(format)?;
        let mut obj = self.clone();
        obj.flags.format = Some(format);
        Ok(obj)
    }

    pub fn iso(&self) -> Result<Schema, SchemaError> {
        self.format("iso")
    }

    /// `javascript` (milliseconds) or `unix` (seconds).
    pub fn timestamp(&self, kind: Option<&str>) -> Result<Schema, SchemaError> {
        let kind = kind.unwrap_or("javascript");
        if !matches!(kind, "javascript" | "unix") {
            return Err(SchemaError::UnknownTimestampType(kind.to_string()));
        }
        self.format(kind)
    }

    pub fn min(&self, limit: impl Into<Limit>) -> Result<Schema, SchemaError> {
        self.compare("min", limit.into())
    }

    pub fn max(&self, limit: impl Into<Limit>) -> Result<Schema, SchemaError> {
        self.compare("max", limit.into())
    }

    pub fn greater(&self, limit: impl Into<Limit>) -> Result<Schema, SchemaError> {
        self.compare("greater", limit.into())
    }

    pub fn less(&self, limit: impl Into<Limit>) -> Result<Schema, SchemaError> {
        self.compare("less", limit.into())
    }

    fn compare(&self, name: &str, limit: Limit) -> Result<Schema, SchemaError> {
        let (name, operator) = Operator::for_rule(name)
            .ok_or_else(|| SchemaError::Description(format!("unknown date rule {name:?}")))?;
        self.require_kind(Kind::Date, name)?;
        let date = limit.normalize()?;
        Ok(self.push_rule(Rule { name, args: RuleArgs::Compare { operator, date }, message: None }))
    }
}
