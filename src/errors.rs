//! Construction errors (builder misuse) and validation failures (data).
//!
//! The two never mix: builder calls return `Result<Schema, SchemaError>`,
//! validation always returns a [`crate::Validation`] carrying [`Failure`]s.
use serde::Serialize;
use thiserror::Error;

use crate::state::PathSegment;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("missing alternative schemas")]
    MissingSchemas,
    #[error("unreachable condition: a previous branch already ended the switch")]
    UnreachableCondition,
    #[error("invalid condition: {0}")]
    InvalidCondition(String),
    #[error("cannot combine \"switch\" with \"is\"")]
    SwitchWithIs,
    #[error("cannot combine \"switch\" with \"then\"")]
    SwitchWithThen,
    #[error("options must have at least one of \"then\", \"otherwise\", or \"switch\"")]
    MissingBranch,
    #[error("\"is\" can not be used with a schema condition")]
    IsWithSchemaCondition,
    #[error("\"switch\" can not be used with a schema condition")]
    SwitchWithSchemaCondition,
    #[error("missing \"is\" or \"switch\" option")]
    MissingIsOrSwitch,
    #[error("switch statement missing \"is\"")]
    SwitchMissingIs,
    #[error("switch statement missing \"then\"")]
    SwitchMissingThen,
    #[error("only the last switch entry may specify \"otherwise\"")]
    UnexpectedOtherwise,
    #[error("cannot specify \"otherwise\" inside and outside a \"switch\"")]
    DuplicateOtherwise,
    #[error("unknown date format: {0}")]
    UnknownDateFormat(String),
    #[error("\"type\" must be one of \"javascript, unix\", got {0}")]
    UnknownTimestampType(String),
    #[error("cannot call {0} without values")]
    MissingValues(&'static str),
    #[error("cannot call {0} with a nested array value")]
    NestedValues(&'static str),
    #[error("invalid date format: {0}")]
    InvalidDate(String),
    #[error("cannot set alternative schemas inside a ruleset")]
    InsideRuleset,
    #[error("cannot start a new ruleset without closing the previous one")]
    RulesetAlreadyOpen,
    #[error("no active ruleset to apply rule options to")]
    NoActiveRuleset,
    #[error("rule {rule} is not supported by {kind} schemas")]
    UnsupportedRule { rule: &'static str, kind: &'static str },
    #[error("{kind} schemas cannot be cast to {to}")]
    UnsupportedCast { kind: &'static str, to: &'static str },
    #[error("cannot specify array item with single rule")]
    ArrayItemWithSingle,
    #[error("invalid reference {0:?}")]
    InvalidReference(String),
    #[error("schema has no child with id {0:?}")]
    UnknownId(String),
    #[error("invalid description: {0}")]
    Description(String),
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// Structured report produced by a schema node.
    Report(Report),
    /// Replacement installed with `Schema::error`; carries no code.
    Override(OverrideError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// `<type>.<subcode>`, e.g. `date.isoDate`.
    pub code: String,
    pub message: String,
    pub path: Vec<PathSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub context: ErrorContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideError {
    pub message: String,
    pub path: Vec<PathSegment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<Failure>>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Report {
    pub fn new(code: &str, value: Option<Value>, context: ErrorContext, path: Vec<PathSegment>) -> Self {
        let message = default_message(code, &context);
        Report { code: code.to_string(), message, path, value, context }
    }

    /// Splits the code into its type prefix and the remainder.
    pub fn kind_and_subcode(&self) -> (&str, &str) {
        self.code.split_once('.').unwrap_or((self.code.as_str(), ""))
    }

    /// A plain "wrong type" failure (`<type>.base`).
    pub fn is_base(&self) -> bool {
        self.kind_and_subcode().1 == "base"
    }
}

impl Failure {
    pub fn code(&self) -> Option<&str> {
        match self {
            Failure::Report(r) => Some(&r.code),
            Failure::Override(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Failure::Report(r) => &r.message,
            Failure::Override(o) => &o.message,
        }
    }

    pub fn path(&self) -> &[PathSegment] {
        match self {
            Failure::Report(r) => &r.path,
            Failure::Override(o) => &o.path,
        }
    }

    pub fn as_report(&self) -> Option<&Report> {
        match self {
            Failure::Report(r) => Some(r),
            Failure::Override(_) => None,
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// ------------------------------- Messages --------------------------------- //

fn default_message(code: &str, ctx: &ErrorContext) -> String {
    let label = ctx.label.as_deref().unwrap_or("value");
    let limit = ctx.limit.as_ref().map(Value::display).unwrap_or_default();
    match code {
        "any.required" => format!("\"{label}\" is required"),
        "any.unknown" => format!("\"{label}\" is not allowed"),
        "any.only" => {
            let valids = ctx.valids.as_deref().unwrap_or_default().join(", ");
            format!("\"{label}\" must be one of [{valids}]")
        }
        "alternatives.base" | "alternatives.match" => {
            format!("\"{label}\" does not match any of the allowed types")
        }
        "alternatives.types" => {
            let types = ctx.types.as_deref().unwrap_or_default().join(", ");
            format!("\"{label}\" must be one of [{types}]")
        }
        "array.base" => format!("\"{label}\" must be an array"),
        "array.includes" => format!("\"{label}\" does not match any of the allowed types"),
        "boolean.base" => format!("\"{label}\" must be a boolean"),
        "date.base" => format!("\"{label}\" must be a valid date"),
        "date.strict" => format!("\"{label}\" must be a valid date"),
        "date.isoDate" => format!("\"{label}\" must be in ISO 8601 date format"),
        "date.timestamp.javascript" => {
            format!("\"{label}\" must be a valid timestamp or number of milliseconds")
        }
        "date.timestamp.unix" => format!("\"{label}\" must be a valid timestamp or number of seconds"),
        "date.min" => format!("\"{label}\" must be greater than or equal to \"{limit}\""),
        "date.max" => format!("\"{label}\" must be less than or equal to \"{limit}\""),
        "date.greater" => format!("\"{label}\" must be greater than \"{limit}\""),
        "date.less" => format!("\"{label}\" must be less than \"{limit}\""),
        "date.ref" => {
            let reference = ctx.reference.as_deref().unwrap_or_default();
            format!("\"{label}\" date references \"{reference}\" which must have a valid date format")
        }
        "number.base" => format!("\"{label}\" must be a number"),
        "object.base" => format!("\"{label}\" must be of type object"),
        "object.unknown" => format!("\"{label}\" is not allowed"),
        "string.base" => format!("\"{label}\" must be a string"),
        other => format!("\"{label}\" failed {other}"),
    }
}

// ------------------------------- Tests ------------------------------------ //
