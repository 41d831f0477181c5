//! Immutable schema nodes and the validation pipeline they share.
//!
//! Every builder call takes `&self` and returns a new node; a `Schema` owns
//! all of its inner state, so a derived node never aliases its parent.
pub mod describe;
pub mod registrations;
pub mod values;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::{ErrorContext, Failure, OverrideError, Report, SchemaError};
use crate::reference::Reference;
use crate::state::{Preferences, State};
use crate::types::{self, alternatives::Match, date, object::ObjectKey};
use crate::value::Value;

pub use registrations::{Family, Registrations};
pub use values::{Allowed, Values};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Any,
    Alternatives,
    Array,
    Boolean,
    Date,
    Number,
    Object,
    String,
}

impl Kind {
    pub const ALL: [Kind; 8] = [
        Kind::Any,
        Kind::Alternatives,
        Kind::Array,
        Kind::Boolean,
        Kind::Date,
        Kind::Number,
        Kind::Object,
        Kind::String,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Any => "any",
            Kind::Alternatives => "alternatives",
            Kind::Array => "array",
            Kind::Boolean => "boolean",
            Kind::Date => "date",
            Kind::Number => "number",
            Kind::Object => "object",
            Kind::String => "string",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Optional,
    Required,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastTarget {
    Number,
    String,
}

impl CastTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            CastTarget::Number => "number",
            CastTarget::String => "string",
        }
    }
}

/// Flag table. Underscore-style internal flags are crate-private and never
/// described.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flags {
    pub id: Option<String>,
    pub label: Option<String>,
    pub presence: Presence,
    /// Only values from the allowed set pass.
    pub only: bool,
    /// Replacement message for any failure of this node.
    pub error: Option<String>,
    pub cast: Option<CastTarget>,
    pub insensitive: Option<bool>,
    pub format: Option<date::DateFormat>,
    pub unknown: Option<bool>,
    pub single: Option<bool>,
    pub(crate) ended_switch: bool,
    pub(crate) array_items: bool,
}

/// A rule invocation recorded on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: &'static str,
    pub args: RuleArgs,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleArgs {
    Compare { operator: date::Operator, date: date::DateBound },
}

impl Rule {
    pub fn reference(&self) -> Option<&Reference> {
        match &self.args {
            RuleArgs::Compare { date: date::DateBound::Ref(r), .. } => Some(r),
            RuleArgs::Compare { .. } => None,
        }
    }
}

/// Options applied to every rule added since `ruleset()`.
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    pub message: Option<String>,
}

impl RuleOptions {
    pub fn message(message: impl Into<String>) -> Self {
        RuleOptions { message: Some(message.into()) }
    }
}

pub type Adjuster = Arc<dyn Fn(Schema) -> Schema + Send + Sync>;

/// A deferred edit applied by `tailor`.
#[derive(Clone)]
pub struct Alteration {
    pub target: String,
    pub adjuster: Adjuster,
}

impl fmt::Debug for Alteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alteration").field("target", &self.target).finish_non_exhaustive()
    }
}

/// Variant-specific state.
#[derive(Debug, Clone, Default)]
pub enum Inner {
    #[default]
    Empty,
    Alternatives(Vec<Match>),
    Array(Vec<Schema>),
    Boolean { truthy: Values, falsy: Values },
    /// `None` until `keys` is called: any key passes.
    Object(Option<Vec<ObjectKey>>),
}

#[derive(Debug, Clone)]
pub struct Schema {
    kind: Kind,
    pub(crate) flags: Flags,
    pub(crate) allowed: Values,
    pub(crate) inner: Inner,
    pub(crate) rules: Vec<Rule>,
    pub(crate) alterations: Vec<Alteration>,
    pub(crate) registrations: Registrations,
    pub(crate) ruleset: Option<usize>,
}

/// Anything a builder accepts where a schema is expected.
#[derive(Debug, Clone)]
pub enum SchemaLike {
    Schema(Schema),
    Ref(Reference),
    Value(Value),
}

impl From<Schema> for SchemaLike {
    fn from(s: Schema) -> Self { SchemaLike::Schema(s) }
}

impl From<&Schema> for SchemaLike {
    fn from(s: &Schema) -> Self { SchemaLike::Schema(s.clone()) }
}

impl From<Reference> for SchemaLike {
    fn from(r: Reference) -> Self { SchemaLike::Ref(r) }
}

impl From<Value> for SchemaLike {
    fn from(v: Value) -> Self { SchemaLike::Value(v) }
}

impl From<serde_json::Value> for SchemaLike {
    fn from(v: serde_json::Value) -> Self { SchemaLike::Value(Value::from(v)) }
}

impl From<&str> for SchemaLike {
    fn from(v: &str) -> Self { SchemaLike::Value(Value::from(v)) }
}

impl From<bool> for SchemaLike {
    fn from(v: bool) -> Self { SchemaLike::Value(Value::Bool(v)) }
}

impl From<i64> for SchemaLike {
    fn from(v: i64) -> Self { SchemaLike::Value(Value::from(v)) }
}

impl From<i32> for SchemaLike {
    fn from(v: i32) -> Self { SchemaLike::Value(Value::from(v)) }
}

impl From<f64> for SchemaLike {
    fn from(v: f64) -> Self { SchemaLike::Value(Value::Number(v)) }
}

/// Result of one validation call. `errors` is empty on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
    pub value: Option<Value>,
    pub errors: Vec<Failure>,
}

impl Validation {
    pub fn ok(value: Option<Value>) -> Self {
        Validation { value, errors: Vec::new() }
    }

    pub fn failed(value: Option<Value>, failure: Failure) -> Self {
        Validation { value, errors: vec![failure] }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Code of the first failure, if any.
    pub fn code(&self) -> Option<&str> {
        self.errors.first().and_then(Failure::code)
    }

    pub fn first_report(&self) -> Option<&Report> {
        self.errors.first().and_then(Failure::as_report)
    }

    pub fn into_result(self) -> Result<Option<Value>, Vec<Failure>> {
        if self.errors.is_empty() { Ok(self.value) } else { Err(self.errors) }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FACTORIES & ACCESSORS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Uninitialized node; only the registry should call this.
    pub(crate) fn bare(kind: Kind) -> Self {
        Schema {
            kind,
            flags: Flags::default(),
            allowed: Values::default(),
            inner: Inner::Empty,
            rules: Vec::new(),
            alterations: Vec::new(),
            registrations: Registrations::default(),
            ruleset: None,
        }
    }

    pub fn of(kind: Kind) -> Self { types::template(kind) }
    pub fn any() -> Self { Self::of(Kind::Any) }
    pub fn alternatives() -> Self { Self::of(Kind::Alternatives) }
    pub fn array() -> Self { Self::of(Kind::Array) }
    pub fn boolean() -> Self { Self::of(Kind::Boolean) }
    pub fn date() -> Self { Self::of(Kind::Date) }
    pub fn number() -> Self { Self::of(Kind::Number) }
    pub fn object() -> Self { Self::of(Kind::Object) }
    pub fn string() -> Self { Self::of(Kind::String) }

    pub fn kind(&self) -> Kind { self.kind }
    pub fn flags(&self) -> &Flags { &self.flags }
    pub fn rules(&self) -> &[Rule] { &self.rules }
    pub fn allowed(&self) -> &Values { &self.allowed }
    pub fn registrations(&self) -> &Registrations { &self.registrations }

    /// True while a `ruleset()` is open.
    pub fn in_ruleset(&self) -> bool {
        self.ruleset.is_some()
    }

    /// Coerce anything schema-like into a node. Plain values become an
    /// `any` that only accepts that value; references likewise.
    pub fn cast_like(like: impl Into<SchemaLike>) -> Schema {
        match like.into() {
            SchemaLike::Schema(s) => s,
            SchemaLike::Ref(r) => Schema::any().with_allowed(Allowed::Ref(r), true),
            SchemaLike::Value(v) => Schema::any().with_allowed(Allowed::Literal(v), true),
        }
    }

    fn with_flags(&self, edit: impl FnOnce(&mut Flags)) -> Schema {
        let mut obj = self.clone();
        edit(&mut obj.flags);
        obj
    }

    fn with_allowed(mut self, entry: Allowed, only: bool) -> Schema {
        if let Allowed::Ref(r) = &entry {
            self.registrations.register_ref(r, Family::Sibling);
        }
        self.allowed.add(entry);
        self.flags.only |= only;
        self
    }

    pub(crate) fn require_kind(&self, kind: Kind, rule: &'static str) -> Result<(), SchemaError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(SchemaError::UnsupportedRule { rule, kind: self.kind.as_str() })
        }
    }

    pub(crate) fn push_rule(&self, rule: Rule) -> Schema {
        let mut obj = self.clone();
        if let Some(r) = rule.reference() {
            obj.registrations.register_ref(r, Family::Sibling);
        }
        obj.rules.push(rule);
        obj
    }
}

// ————————————————————————————————————————————————————————————————————————————
// GENERIC BUILDERS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub fn id(&self, id: impl Into<String>) -> Schema {
        let id = id.into();
        self.with_flags(|f| f.id = Some(id))
    }

    pub fn label(&self, name: impl Into<String>) -> Schema {
        let name = name.into();
        let obj = self.with_flags(|f| f.label = Some(name.clone()));
        types::definition(self.kind).relabel(obj, &name)
    }

    pub fn presence(&self, presence: Presence) -> Schema {
        self.with_flags(|f| f.presence = presence)
    }

    pub fn required(&self) -> Schema { self.presence(Presence::Required) }
    pub fn optional(&self) -> Schema { self.presence(Presence::Optional) }
    pub fn forbidden(&self) -> Schema { self.presence(Presence::Forbidden) }

    /// Case-insensitive matching for textual values (allowed sets, boolean
    /// coercion).
    pub fn insensitive(&self, enabled: bool) -> Schema {
        self.with_flags(|f| f.insensitive = Some(enabled))
    }

    /// Replace every failure of this node with a plain message.
    pub fn error(&self, message: impl Into<String>) -> Schema {
        let message = message.into();
        self.with_flags(|f| f.error = Some(message))
    }

    pub fn cast(&self, to: CastTarget) -> Result<Schema, SchemaError> {
        if !types::definition(self.kind).casts().contains(&to) {
            return Err(SchemaError::UnsupportedCast { kind: self.kind.as_str(), to: to.as_str() });
        }
        Ok(self.with_flags(|f| f.cast = Some(to)))
    }

    /// Extra accepted values; other values still go through type checks.
    pub fn allow<I, A>(&self, values: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Allowed>,
    {
        self.add_allowed(values, false, "allow")
    }

    /// Accept only the listed values.
    pub fn valid<I, A>(&self, values: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Allowed>,
    {
        self.add_allowed(values, true, "valid")
    }

    fn add_allowed<I, A>(&self, values: I, only: bool, rule: &'static str) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Allowed>,
    {
        let mut obj = self.clone();
        let mut any = false;
        for value in values {
            obj = obj.with_allowed(value.into(), only);
            any = true;
        }
        if !any {
            return Err(SchemaError::MissingValues(rule));
        }
        Ok(obj)
    }

    /// Register an edit that `tailor(target)` applies later.
    pub fn alter(
        &self,
        target: impl Into<String>,
        adjuster: impl Fn(Schema) -> Schema + Send + Sync + 'static,
    ) -> Schema {
        let mut obj = self.clone();
        obj.alterations.push(Alteration { target: target.into(), adjuster: Arc::new(adjuster) });
        obj
    }

    /// Apply registered alterations for `targets`, here and in every child.
    pub fn tailor(&self, targets: &[&str]) -> Result<Schema, SchemaError> {
        let mut obj = self.clone();
        for alteration in &self.alterations {
            if targets.contains(&alteration.target.as_str()) {
                obj = (alteration.adjuster)(obj);
            }
        }

        let mut failure = None;
        let obj = types::definition(obj.kind).map_children(obj, &mut |child| {
            match child.tailor(targets) {
                Ok(tailored) => tailored,
                Err(e) => {
                    failure.get_or_insert(e);
                    child.clone()
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        obj.rebuild()
    }

    /// Open a ruleset: rule options passed to `rule()` apply to every rule
    /// added until then.
    pub fn ruleset(&self) -> Result<Schema, SchemaError> {
        if self.in_ruleset() {
            return Err(SchemaError::RulesetAlreadyOpen);
        }
        let mut obj = self.clone();
        obj.ruleset = Some(obj.rules.len());
        Ok(obj)
    }

    pub fn rule(&self, options: RuleOptions) -> Result<Schema, SchemaError> {
        let Some(start) = self.ruleset else {
            return Err(SchemaError::NoActiveRuleset);
        };
        let mut obj = self.clone();
        for rule in &mut obj.rules[start..] {
            if let Some(message) = &options.message {
                rule.message = Some(message.clone());
            }
        }
        obj.ruleset = None;
        Ok(obj)
    }

    /// Locate a descendant by a dotted path of ids.
    pub fn extract(&self, path: &str) -> Option<Schema> {
        let (id, rest) = match path.split_once('.') {
            Some((id, rest)) => (id, Some(rest)),
            None => (path, None),
        };
        let child = types::definition(self.kind).child(self, id)?;
        match rest {
            Some(rest) => child.extract(rest),
            None => Some(child),
        }
    }

    /// Replace the descendant at `path` with `adjuster(descendant)`.
    pub fn fork<F>(&self, path: &str, adjuster: F) -> Result<Schema, SchemaError>
    where
        F: FnOnce(Schema) -> Schema,
    {
        let (id, rest) = match path.split_once('.') {
            Some((id, rest)) => (id, Some(rest)),
            None => (path, None),
        };
        let child = types::definition(self.kind)
            .child(self, id)
            .ok_or_else(|| SchemaError::UnknownId(id.to_string()))?;
        let replacement = match rest {
            Some(rest) => child.fork(rest, adjuster)?,
            None => adjuster(child),
        };
        self.modify(id, &replacement)?.ok_or_else(|| SchemaError::UnknownId(id.to_string()))
    }

    /// Replace the first direct child whose id is `id`. `Ok(None)` when no
    /// child carries that id.
    pub fn modify(&self, id: &str, replacement: &Schema) -> Result<Option<Schema>, SchemaError> {
        types::definition(self.kind).modify(self, id, replacement)
    }

    /// Reset dependency bookkeeping and let the variant re-register its
    /// children. Called after every structural edit.
    pub(crate) fn rebuild(mut self) -> Result<Schema, SchemaError> {
        let mut registrations = Registrations::default();
        for r in self.allowed.refs() {
            registrations.register_ref(r, Family::Sibling);
        }
        for rule in &self.rules {
            if let Some(r) = rule.reference() {
                registrations.register_ref(r, Family::Sibling);
            }
        }
        self.registrations = registrations;

        let mut obj = types::definition(self.kind).rebuild(self)?;
        obj.ruleset = None;
        Ok(obj)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Validate with default preferences.
    pub fn validate(&self, value: impl Into<Value>) -> Validation {
        self.validate_with(Some(value.into()), &Preferences::default())
    }

    pub fn validate_with(&self, value: Option<Value>, prefs: &Preferences) -> Validation {
        self.validate_in(value, &State::root(), prefs)
    }

    /// Recursive entry point used by containers and alternatives.
    pub fn validate_in(&self, value: Option<Value>, state: &State, prefs: &Preferences) -> Validation {
        trace!(kind = self.kind.as_str(), path = %state.label(), "validate");
        let outcome = self.run(value, state, prefs);
        match &self.flags.error {
            Some(message) if !outcome.errors.is_empty() => Validation::failed(
                outcome.value,
                Failure::Override(OverrideError { message: message.clone(), path: state.path.clone() }),
            ),
            _ => outcome,
        }
    }

    /// Pass/fail only; used for conditions, whose failures are never reported.
    pub fn structural_match(&self, value: Option<Value>, state: &State, prefs: &Preferences) -> bool {
        if prefs.abort_early {
            return self.validate_in(value, state, prefs).is_ok();
        }
        let prefs = Preferences { abort_early: true, ..prefs.clone() };
        self.validate_in(value, state, &prefs).is_ok()
    }

    pub fn create_error(
        &self,
        code: &str,
        value: Option<&Value>,
        mut context: ErrorContext,
        state: &State,
    ) -> Failure {
        if context.label.is_none() {
            context.label = Some(self.flags.label.clone().unwrap_or_else(|| state.label()));
        }
        if context.key.is_none() {
            context.key = state.key();
        }
        Failure::Report(Report::new(code, value.cloned(), context, state.path.clone()))
    }

    fn run(&self, value: Option<Value>, state: &State, prefs: &Preferences) -> Validation {
        let definition = types::definition(self.kind);

        let Some(mut value) = value else {
            return match self.flags.presence {
                Presence::Required => Validation::failed(
                    None,
                    self.create_error("any.required", None, ErrorContext::default(), state),
                ),
                Presence::Optional | Presence::Forbidden => Validation::ok(None),
            };
        };

        if self.flags.presence == Presence::Forbidden {
            let failure = self.create_error("any.unknown", Some(&value), ErrorContext::default(), state);
            return Validation::failed(Some(value), failure);
        }

        if prefs.convert {
            value = definition.coerce(self, value, state, prefs);
        }

        let insensitive = self.flags.insensitive.unwrap_or(false);
        if self.allowed.has(&value, state, prefs, insensitive) {
            return Validation::ok(Some(value));
        }
        if self.flags.only {
            let context = ErrorContext { valids: Some(self.allowed.labels()), ..ErrorContext::default() };
            let failure = self.create_error("any.only", Some(&value), context, state);
            return Validation::failed(Some(value), failure);
        }

        let base = definition.validate(self, value, state, prefs);
        if !base.errors.is_empty() {
            return base;
        }
        let Some(value) = base.value else {
            return Validation::ok(None);
        };

        let mut errors = Vec::new();
        for rule in &self.rules {
            if let Err(failure) = definition.rule(self, rule, &value, state, prefs) {
                errors.push(with_rule_message(failure, rule));
                if prefs.abort_early {
                    break;
                }
            }
        }
        if !errors.is_empty() {
            return Validation { value: Some(value), errors };
        }

        let value = match self.flags.cast {
            Some(to) if prefs.convert => definition.cast(&value, to, prefs).unwrap_or(value),
            _ => value,
        };
        Validation::ok(Some(value))
    }
}

fn with_rule_message(failure: Failure, rule: &Rule) -> Failure {
    match (failure, &rule.message) {
        (Failure::Report(mut report), Some(message)) => {
            report.message = message.clone();
            Failure::Report(report)
        }
        (failure, _) => failure,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INNER ACCESS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub fn matches(&self) -> &[Match] {
        match &self.inner {
            Inner::Alternatives(matches) => matches,
            _ => &[],
        }
    }

    pub fn declared_items(&self) -> &[Schema] {
        match &self.inner {
            Inner::Array(items) => items,
            _ => &[],
        }
    }

    pub fn declared_keys(&self) -> Option<&[ObjectKey]> {
        match &self.inner {
            Inner::Object(keys) => keys.as_deref(),
            _ => None,
        }
    }

    /// Array-shaped for the purpose of the alternatives "array items" hint.
    pub fn is_array_like(&self) -> bool {
        self.kind == Kind::Array || self.flags.array_items
    }
}

// ------------------------------- Tests ------------------------------------ //
