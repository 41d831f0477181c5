//! Alternatives: an ordered list of plain or conditional branches.
//!
//! Validation walks the branches in declaration order. Plain branches win on
//! the first clean result; conditional branches test a referenced (or the
//! current) value against a condition schema and hand the whole value to
//! `then` or `otherwise`. Failures that survive the walk are classified,
//! from most to least specific, as the single error verbatim,
//! `alternatives.types`, or `alternatives.match`.
use tracing::{debug, trace};

use super::TypeDefinition;
use crate::errors::{ErrorContext, Failure, Report, SchemaError};
use crate::reference::Reference;
use crate::schema::describe::{Description, MatchDescription};
use crate::schema::{Family, Inner, Kind, Schema, SchemaLike, Validation};
use crate::state::{Preferences, State};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// MATCH ENTRIES
// ————————————————————————————————————————————————————————————————————————————

/// One branch.
#[derive(Debug, Clone)]
pub enum Match {
    /// Unconditional candidate.
    Plain { schema: Schema },
    Conditional(Conditional),
}

#[derive(Debug, Clone)]
pub struct Conditional {
    pub test: ConditionTest,
    pub then: Option<Schema>,
    pub otherwise: Option<Schema>,
}

/// Where a conditional branch gets its input and what it checks it against.
#[derive(Debug, Clone)]
pub enum ConditionTest {
    /// Resolve `reference` and match the result against `is`.
    Ref { reference: Reference, is: Schema },
    /// Match the value itself against the schema.
    Peek(Schema),
}

/// Schema-valued positions of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Schema,
    Peek,
    Is,
    Then,
    Otherwise,
}

impl Slot {
    /// Traversal order for every structural walk.
    pub const ALL: [Slot; 5] = [Slot::Schema, Slot::Peek, Slot::Is, Slot::Then, Slot::Otherwise];

    /// Positions whose schema governs the value itself.
    const GOVERNING: [Slot; 3] = [Slot::Schema, Slot::Then, Slot::Otherwise];
}

impl Match {
    pub fn slot(&self, slot: Slot) -> Option<&Schema> {
        match (self, slot) {
            (Match::Plain { schema }, Slot::Schema) => Some(schema),
            (Match::Plain { .. }, _) => None,
            (Match::Conditional(c), Slot::Peek) => match &c.test {
                ConditionTest::Peek(peek) => Some(peek),
                ConditionTest::Ref { .. } => None,
            },
            (Match::Conditional(c), Slot::Is) => match &c.test {
                ConditionTest::Ref { is, .. } => Some(is),
                ConditionTest::Peek(_) => None,
            },
            (Match::Conditional(c), Slot::Then) => c.then.as_ref(),
            (Match::Conditional(c), Slot::Otherwise) => c.otherwise.as_ref(),
            (Match::Conditional(_), Slot::Schema) => None,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut Schema> {
        match (self, slot) {
            (Match::Plain { schema }, Slot::Schema) => Some(schema),
            (Match::Plain { .. }, _) => None,
            (Match::Conditional(c), Slot::Peek) => match &mut c.test {
                ConditionTest::Peek(peek) => Some(peek),
                ConditionTest::Ref { .. } => None,
            },
            (Match::Conditional(c), Slot::Is) => match &mut c.test {
                ConditionTest::Ref { is, .. } => Some(is),
                ConditionTest::Peek(_) => None,
            },
            (Match::Conditional(c), Slot::Then) => c.then.as_mut(),
            (Match::Conditional(c), Slot::Otherwise) => c.otherwise.as_mut(),
            (Match::Conditional(_), Slot::Schema) => None,
        }
    }

    /// The condition reference, for `ref` entries.
    pub fn reference(&self) -> Option<&Reference> {
        match self {
            Match::Conditional(Conditional { test: ConditionTest::Ref { reference, .. }, .. }) => Some(reference),
            _ => None,
        }
    }

    /// A new entry with every populated slot passed through `f`.
    fn map_slots(&self, f: &mut dyn FnMut(&Schema) -> Schema) -> Match {
        let mut entry = self.clone();
        for slot in Slot::ALL {
            if let Some(schema) = entry.slot_mut(slot) {
                *schema = f(schema);
            }
        }
        entry
    }

    fn describe(&self) -> MatchDescription {
        match self {
            Match::Plain { schema } => MatchDescription { schema: Some(schema.describe()), ..MatchDescription::default() },
            Match::Conditional(c) => {
                let mut desc = MatchDescription::default();
                match &c.test {
                    ConditionTest::Ref { reference, is } => {
                        desc.reference = Some(reference.to_string());
                        desc.is = Some(is.describe());
                    }
                    ConditionTest::Peek(peek) => desc.peek = Some(peek.describe()),
                }
                desc.then = c.then.as_ref().map(Schema::describe);
                desc.otherwise = c.otherwise.as_ref().map(Schema::describe);
                desc
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER INPUTS
// ————————————————————————————————————————————————————————————————————————————

/// First argument of `when`.
#[derive(Debug, Clone)]
pub enum Condition {
    Ref(Reference),
    /// Reference text, parsed by `when`.
    Path(String),
    /// Peek the value itself.
    Schema(Schema),
}

impl From<Reference> for Condition {
    fn from(r: Reference) -> Self { Condition::Ref(r) }
}

impl From<&str> for Condition {
    fn from(path: &str) -> Self { Condition::Path(path.to_string()) }
}

impl From<String> for Condition {
    fn from(path: String) -> Self { Condition::Path(path) }
}

impl From<Schema> for Condition {
    fn from(s: Schema) -> Self { Condition::Schema(s) }
}

impl From<&Schema> for Condition {
    fn from(s: &Schema) -> Self { Condition::Schema(s.clone()) }
}

#[derive(Debug, Clone, Default)]
pub struct WhenOptions {
    pub is: Option<SchemaLike>,
    pub then: Option<SchemaLike>,
    pub otherwise: Option<SchemaLike>,
    pub switch: Option<Vec<SwitchCase>>,
}

impl WhenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switch(cases: impl IntoIterator<Item = SwitchCase>) -> Self {
        WhenOptions { switch: Some(cases.into_iter().collect()), ..Self::default() }
    }

    pub fn is(mut self, is: impl Into<SchemaLike>) -> Self {
        self.is = Some(is.into());
        self
    }

    pub fn then(mut self, then: impl Into<SchemaLike>) -> Self {
        self.then = Some(then.into());
        self
    }

    pub fn otherwise(mut self, otherwise: impl Into<SchemaLike>) -> Self {
        self.otherwise = Some(otherwise.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwitchCase {
    pub is: Option<SchemaLike>,
    pub then: Option<SchemaLike>,
    pub otherwise: Option<SchemaLike>,
}

impl SwitchCase {
    pub fn new(is: impl Into<SchemaLike>, then: impl Into<SchemaLike>) -> Self {
        SwitchCase { is: Some(is.into()), then: Some(then.into()), otherwise: None }
    }

    pub fn otherwise(mut self, otherwise: impl Into<SchemaLike>) -> Self {
        self.otherwise = Some(otherwise.into());
        self
    }
}

/// Condition input after validation of the `when` arguments.
enum Source {
    Ref(Reference),
    Peek(Schema),
}

// ————————————————————————————————————————————————————————————————————————————
// DEFINITION
// ————————————————————————————————————————————————————————————————————————————

pub struct AlternativesType;

impl TypeDefinition for AlternativesType {
    fn kind(&self) -> Kind {
        Kind::Alternatives
    }

    fn initialize(&self, schema: &mut Schema) {
        schema.inner = Inner::Alternatives(Vec::new());
    }

    fn validate(&self, schema: &Schema, value: Value, state: &State, prefs: &Preferences) -> Validation {
        let mut errors = Vec::new();

        for (index, entry) in schema.matches().iter().enumerate() {
            let conditional = match entry {
                Match::Plain { schema: branch } => {
                    let result = branch.validate_in(Some(value.clone()), state, prefs);
                    if result.is_ok() {
                        debug!(branch = index, path = %state.label(), "alternative matched");
                        return result;
                    }
                    errors.extend(result.errors);
                    continue;
                }
                Match::Conditional(c) => c,
            };

            let (test, input) = match &conditional.test {
                ConditionTest::Ref { reference, is } => (is, reference.resolve(Some(&value), state, prefs)),
                ConditionTest::Peek(peek) => (peek, Some(value.clone())),
            };
            let matched = test.structural_match(input, &state.entry(), prefs);
            trace!(branch = index, matched, "condition evaluated");

            let governing = if matched { &conditional.then } else { &conditional.otherwise };
            if let Some(branch) = governing {
                debug!(branch = index, then = matched, path = %state.label(), "conditional branch selected");
                return branch.validate_in(Some(value), state, prefs);
            }
        }

        aggregate(schema, value, errors, state)
    }

    fn rebuild(&self, mut schema: Schema) -> Result<Schema, SchemaError> {
        if schema.in_ruleset() {
            return Err(SchemaError::InsideRuleset);
        }

        let mut registrations = schema.registrations.clone();
        let mut array_items = false;
        for entry in schema.matches() {
            if let Some(reference) = entry.reference() {
                registrations.register_ref(reference, Family::Sibling);
            }
            for slot in Slot::ALL {
                if let Some(child) = entry.slot(slot) {
                    registrations.register_schema(child, Family::Sibling);
                }
            }
            array_items |= Slot::GOVERNING
                .iter()
                .any(|slot| entry.slot(*slot).is_some_and(|s| s.kind() == Kind::Array));
        }
        schema.registrations = registrations;
        schema.flags.array_items = array_items;
        Ok(schema)
    }

    fn map_children(&self, mut schema: Schema, f: &mut dyn FnMut(&Schema) -> Schema) -> Schema {
        if let Inner::Alternatives(matches) = &schema.inner {
            let mapped = matches.iter().map(|entry| entry.map_slots(f)).collect();
            schema.inner = Inner::Alternatives(mapped);
        }
        schema
    }

    fn relabel(&self, schema: Schema, name: &str) -> Schema {
        self.map_children(schema, &mut |child| child.label(name))
    }

    fn child(&self, schema: &Schema, id: &str) -> Option<Schema> {
        schema
            .matches()
            .iter()
            .flat_map(|entry| Slot::ALL.iter().filter_map(move |slot| entry.slot(*slot)))
            .find(|child| child.flags.id.as_deref() == Some(id))
            .cloned()
    }

    fn modify(&self, schema: &Schema, id: &str, replacement: &Schema) -> Result<Option<Schema>, SchemaError> {
        for (index, entry) in schema.matches().iter().enumerate() {
            for slot in Slot::ALL {
                if !entry.slot(slot).is_some_and(|s| s.flags.id.as_deref() == Some(id)) {
                    continue;
                }
                let mut obj = schema.clone();
                if let Inner::Alternatives(matches) = &mut obj.inner {
                    if let Some(target) = matches[index].slot_mut(slot) {
                        *target = replacement.clone();
                    }
                }
                return obj.rebuild().map(Some);
            }
        }
        Ok(None)
    }

    fn describe(&self, schema: &Schema, desc: &mut Description) {
        desc.matches = Some(schema.matches().iter().map(Match::describe).collect());
    }

    fn build(&self, schema: Schema, desc: &Description) -> Result<Schema, SchemaError> {
        let mut obj = schema;
        for entry in desc.matches.iter().flatten() {
            if let Some(branch) = &entry.schema {
                obj = obj.try_([Schema::build(branch)?])?;
                continue;
            }
            let condition = match (&entry.reference, &entry.peek) {
                (Some(reference), _) => Condition::Ref(Reference::parse(reference)?),
                (None, Some(peek)) => Condition::Schema(Schema::build(peek)?),
                (None, None) => {
                    return Err(SchemaError::Description(
                        "match entries need one of \"schema\", \"ref\" or \"peek\"".to_string(),
                    ));
                }
            };
            let slot = |desc: &Option<Description>| -> Result<Option<SchemaLike>, SchemaError> {
                desc.as_ref().map(|d| Schema::build(d).map(SchemaLike::from)).transpose()
            };
            let options = WhenOptions {
                is: slot(&entry.is)?,
                then: slot(&entry.then)?,
                otherwise: slot(&entry.otherwise)?,
                switch: None,
            };
            obj = obj.when(condition, options)?;
        }
        Ok(obj)
    }
}

fn aggregate(schema: &Schema, value: Value, errors: Vec<Failure>, state: &State) -> Validation {
    match errors.len() {
        0 => {
            debug!(path = %state.label(), "no alternative applied");
            let failure = schema.create_error("alternatives.base", Some(&value), ErrorContext::default(), state);
            return Validation::failed(Some(value), failure);
        }
        1 => return Validation { value: Some(value), errors },
        _ => {}
    }

    if !errors.iter().all(|e| e.as_report().is_some_and(Report::is_base)) {
        debug!(path = %state.label(), failures = errors.len(), "alternatives failed with mixed reasons");
        let context = ErrorContext { details: Some(errors), ..ErrorContext::default() };
        let failure = schema.create_error("alternatives.match", Some(&value), context, state);
        return Validation::failed(Some(value), failure);
    }

    let types: Vec<String> = errors
        .iter()
        .filter_map(Failure::as_report)
        .map(|report| report.kind_and_subcode().0.to_string())
        .collect();
    debug!(path = %state.label(), ?types, "alternatives failed on type");
    let context = ErrorContext { types: Some(types), ..ErrorContext::default() };
    let failure = schema.create_error("alternatives.types", Some(&value), context, state);
    Validation::failed(Some(value), failure)
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDERS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Append plain branches, tried in order.
    pub fn try_<I, S>(&self, schemas: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<SchemaLike>,
    {
        self.require_kind(Kind::Alternatives, "try")?;
        let entries: Vec<Match> =
            schemas.into_iter().map(|s| Match::Plain { schema: Schema::cast_like(s) }).collect();
        if entries.is_empty() {
            return Err(SchemaError::MissingSchemas);
        }
        if self.flags.ended_switch {
            return Err(SchemaError::UnreachableCondition);
        }
        self.append_matches(entries, false)
    }

    /// Append a conditional branch, or one branch per `switch` case.
    pub fn when(&self, condition: impl Into<Condition>, options: WhenOptions) -> Result<Schema, SchemaError> {
        self.require_kind(Kind::Alternatives, "when")?;
        if self.flags.ended_switch {
            return Err(SchemaError::UnreachableCondition);
        }
        let source = match condition.into() {
            Condition::Ref(r) => Source::Ref(r),
            Condition::Path(path) => {
                Source::Ref(Reference::parse(&path).map_err(|_| SchemaError::InvalidCondition(path.clone()))?)
            }
            Condition::Schema(s) => Source::Peek(s),
        };
        let peek = matches!(source, Source::Peek(_));

        let WhenOptions { is, then, otherwise, switch } = options;
        if switch.is_some() && is.is_some() {
            return Err(SchemaError::SwitchWithIs);
        }
        if switch.is_some() && then.is_some() {
            return Err(SchemaError::SwitchWithThen);
        }
        if switch.is_none() && then.is_none() && otherwise.is_none() {
            return Err(SchemaError::MissingBranch);
        }
        if peek && is.is_some() {
            return Err(SchemaError::IsWithSchemaCondition);
        }
        if peek && switch.is_some() {
            return Err(SchemaError::SwitchWithSchemaCondition);
        }
        if !peek && is.is_none() && switch.is_none() {
            return Err(SchemaError::MissingIsOrSwitch);
        }

        let mut ended = false;
        let Some(cases) = switch else {
            let entry = normalize(&source, is, then, otherwise, &mut ended);
            return self.append_matches(vec![entry], ended);
        };

        let count = cases.len();
        let mut outer_otherwise = otherwise;
        let mut entries = Vec::with_capacity(count);
        for (i, case) in cases.into_iter().enumerate() {
            let is = case.is.ok_or(SchemaError::SwitchMissingIs)?;
            let then = case.then.ok_or(SchemaError::SwitchMissingThen)?;
            let last = i + 1 == count;
            let otherwise = if !last {
                if case.otherwise.is_some() {
                    return Err(SchemaError::UnexpectedOtherwise);
                }
                None
            } else {
                if outer_otherwise.is_some() && case.otherwise.is_some() {
                    return Err(SchemaError::DuplicateOtherwise);
                }
                outer_otherwise.take().or(case.otherwise)
            };
            entries.push(normalize(&source, Some(is), Some(then), otherwise, &mut ended));
        }
        self.append_matches(entries, ended)
    }

    fn append_matches(&self, entries: Vec<Match>, ended: bool) -> Result<Schema, SchemaError> {
        let mut obj = self.clone();
        match &mut obj.inner {
            Inner::Alternatives(matches) => matches.extend(entries),
            inner => *inner = Inner::Alternatives(entries),
        }
        obj.flags.ended_switch |= ended;
        obj.rebuild()
    }
}

fn normalize(
    source: &Source,
    is: Option<SchemaLike>,
    then: Option<SchemaLike>,
    otherwise: Option<SchemaLike>,
    ended: &mut bool,
) -> Match {
    let then = then.map(Schema::cast_like);
    let otherwise = otherwise.map(Schema::cast_like);
    if then.is_some() && otherwise.is_some() {
        *ended = true;
    }
    let test = match source {
        Source::Peek(peek) => ConditionTest::Peek(peek.clone()),
        Source::Ref(reference) => ConditionTest::Ref { reference: reference.clone(), is: condition_schema(is) },
    };
    Match::Conditional(Conditional { test, then, otherwise })
}

/// Literal `is` values must be present to match; schemas and references
/// are taken as given.
fn condition_schema(is: Option<SchemaLike>) -> Schema {
    match is {
        Some(SchemaLike::Value(v)) => Schema::cast_like(v).required(),
        Some(like) => Schema::cast_like(like),
        None => Schema::any().required(),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CastTarget, RuleOptions};
    use serde_json::json;

    fn keyed(alternatives: Schema) -> Schema {
        Schema::object()
            .keys([("a", SchemaLike::from(Schema::any())), ("b", SchemaLike::from(alternatives))])
            .unwrap()
    }

    #[test]
    fn first_listed_branch_wins() {
        let text_first = Schema::alternatives().try_([Schema::string(), Schema::number()]).unwrap();
        assert_eq!(text_first.validate("5").value, Some(Value::from("5")));

        let number_first = Schema::alternatives().try_([Schema::number(), Schema::string()]).unwrap();
        assert_eq!(number_first.validate("5").value, Some(Value::Number(5.0)));
        assert_eq!(number_first.validate("x").value, Some(Value::from("x")));
    }

    #[test]
    fn base_mismatches_list_types_in_branch_order() {
        let schema = Schema::alternatives().try_([Schema::boolean(), Schema::date(), Schema::boolean()]).unwrap();
        let result = schema.validate(json!({}));
        assert_eq!(result.code(), Some("alternatives.types"));
        let types = result.first_report().unwrap().context.types.clone();
        assert_eq!(types, Some(vec!["boolean".into(), "date".into(), "boolean".into()]));
    }

    #[test]
    fn single_failure_is_returned_verbatim() {
        let schema = Schema::alternatives().try_([Schema::date().min("2020-01-01T00:00:00Z").unwrap()]).unwrap();
        assert_eq!(schema.validate("2019-01-01T00:00:00Z").code(), Some("date.min"));
    }

    #[test]
    fn mixed_failures_carry_details() {
        let schema = Schema::alternatives()
            .try_([Schema::boolean(), Schema::date().min("2020-01-01T00:00:00Z").unwrap()])
            .unwrap();
        let result = schema.validate("2019-01-01T00:00:00Z");
        assert_eq!(result.code(), Some("alternatives.match"));
        let details = result.first_report().unwrap().context.details.clone().unwrap();
        let codes: Vec<_> = details.iter().filter_map(Failure::code).collect();
        assert_eq!(codes, vec!["boolean.base", "date.min"]);
    }

    #[test]
    fn override_errors_force_a_composite() {
        let schema = Schema::alternatives().try_([Schema::boolean().error("nope"), Schema::date()]).unwrap();
        assert_eq!(schema.validate(json!({})).code(), Some("alternatives.match"));
    }

    #[test]
    fn unmatched_condition_without_otherwise_is_base() {
        let schema = Schema::alternatives()
            .when(Schema::boolean(), WhenOptions::new().then(Schema::boolean()))
            .unwrap();
        assert!(schema.validate("true").is_ok());
        assert_eq!(schema.validate("x").code(), Some("alternatives.base"));
    }

    #[test]
    fn then_and_otherwise_govern_exclusively() {
        let schema = keyed(
            Schema::alternatives()
                .when("a", WhenOptions::new().is(true).then(Schema::string()).otherwise(Schema::number()))
                .unwrap(),
        );
        assert!(schema.validate(json!({"a": true, "b": "x"})).is_ok());
        assert_eq!(schema.validate(json!({"a": true, "b": {}})).code(), Some("string.base"));
        assert!(schema.validate(json!({"a": false, "b": 5})).is_ok());
        assert_eq!(schema.validate(json!({"a": false, "b": "x"})).code(), Some("number.base"));
        assert_eq!(schema.validate(json!({"b": "x"})).code(), Some("number.base"));
    }

    #[test]
    fn literal_is_requires_presence() {
        let schema = keyed(
            Schema::alternatives()
                .when("a", WhenOptions::new().is(Value::Null).then(Schema::string()).otherwise(Schema::number()))
                .unwrap(),
        );
        assert!(schema.validate(json!({"a": null, "b": "x"})).is_ok());
        assert!(schema.validate(json!({"b": 1})).is_ok());
    }

    #[test]
    fn fallthrough_when_then_is_absent() {
        let schema = keyed(
            Schema::alternatives()
                .when("a", WhenOptions::new().is(1).otherwise(Schema::string()))
                .unwrap()
                .try_([Schema::boolean()])
                .unwrap(),
        );
        assert!(schema.validate(json!({"a": 2, "b": "x"})).is_ok());
        assert!(schema.validate(json!({"a": 1, "b": true})).is_ok());
        assert_eq!(schema.validate(json!({"a": 1, "b": "x"})).code(), Some("boolean.base"));
    }

    #[test]
    fn switch_matches_chained_conditions() {
        let switched = keyed(
            Schema::alternatives()
                .when(
                    "a",
                    WhenOptions::switch([
                        SwitchCase::new(1, Schema::string()),
                        SwitchCase::new(2, Schema::number()).otherwise(Schema::boolean()),
                    ]),
                )
                .unwrap(),
        );
        let chained = keyed(
            Schema::alternatives()
                .when("a", WhenOptions::new().is(1).then(Schema::string()))
                .unwrap()
                .when("a", WhenOptions::new().is(2).then(Schema::number()).otherwise(Schema::boolean()))
                .unwrap(),
        );
        for a in [json!(1), json!(2), json!(3)] {
            for b in [json!("x"), json!(5), json!(true), json!([])] {
                let input = json!({"a": a, "b": b});
                let left = switched.validate(input.clone());
                let right = chained.validate(input);
                assert_eq!(left.code(), right.code());
                assert_eq!(left.value, right.value);
            }
        }
    }

    #[test]
    fn when_rejects_malformed_options() {
        let alt = Schema::alternatives();
        let case = || SwitchCase::new(1, Schema::string());
        assert_eq!(
            alt.when("a", WhenOptions::switch([case()]).is(1)).unwrap_err(),
            SchemaError::SwitchWithIs
        );
        assert_eq!(
            alt.when("a", WhenOptions::switch([case()]).then(Schema::any())).unwrap_err(),
            SchemaError::SwitchWithThen
        );
        assert_eq!(alt.when("a", WhenOptions::new().is(1)).unwrap_err(), SchemaError::MissingBranch);
        assert_eq!(
            alt.when(Schema::string(), WhenOptions::new().is(1).then(Schema::any())).unwrap_err(),
            SchemaError::IsWithSchemaCondition
        );
        assert_eq!(
            alt.when(Schema::string(), WhenOptions::switch([case()])).unwrap_err(),
            SchemaError::SwitchWithSchemaCondition
        );
        assert_eq!(
            alt.when("a", WhenOptions::new().then(Schema::any())).unwrap_err(),
            SchemaError::MissingIsOrSwitch
        );
        assert_eq!(
            alt.when("a..b", WhenOptions::new().is(1).then(Schema::any())).unwrap_err(),
            SchemaError::InvalidCondition("a..b".into())
        );
    }

    #[test]
    fn switch_cases_are_checked() {
        let alt = Schema::alternatives();
        let missing_is = SwitchCase { then: Some(Schema::any().into()), ..SwitchCase::default() };
        assert_eq!(alt.when("a", WhenOptions::switch([missing_is])).unwrap_err(), SchemaError::SwitchMissingIs);
        let missing_then = SwitchCase { is: Some(SchemaLike::from(1)), ..SwitchCase::default() };
        assert_eq!(
            alt.when("a", WhenOptions::switch([missing_then])).unwrap_err(),
            SchemaError::SwitchMissingThen
        );
        let early = SwitchCase::new(1, Schema::any()).otherwise(Schema::any());
        assert_eq!(
            alt.when("a", WhenOptions::switch([early, SwitchCase::new(2, Schema::any())])).unwrap_err(),
            SchemaError::UnexpectedOtherwise
        );
        let last = SwitchCase::new(1, Schema::any()).otherwise(Schema::any());
        assert_eq!(
            alt.when("a", WhenOptions::switch([last]).otherwise(Schema::any())).unwrap_err(),
            SchemaError::DuplicateOtherwise
        );
    }

    #[test]
    fn two_way_split_ends_the_switch() {
        let ended = Schema::alternatives()
            .when("a", WhenOptions::new().is(1).then(Schema::string()).otherwise(Schema::number()))
            .unwrap();
        assert_eq!(ended.try_([Schema::any()]).unwrap_err(), SchemaError::UnreachableCondition);
        assert_eq!(
            ended.when("a", WhenOptions::new().is(2).then(Schema::any())).unwrap_err(),
            SchemaError::UnreachableCondition
        );
        assert_eq!(Schema::alternatives().try_(Vec::<Schema>::new()).unwrap_err(), SchemaError::MissingSchemas);
    }

    #[test]
    fn structural_edits_are_rejected_inside_a_ruleset() {
        let open = Schema::alternatives().ruleset().unwrap();
        assert_eq!(open.try_([Schema::any()]).unwrap_err(), SchemaError::InsideRuleset);
        let closed = open.rule(RuleOptions::default()).unwrap();
        assert!(closed.try_([Schema::any()]).is_ok());
    }

    #[test]
    fn modify_replaces_exactly_one_slot() {
        let schema = Schema::alternatives()
            .try_([Schema::string().id("s"), Schema::number().id("n")])
            .unwrap()
            .when(Schema::boolean().id("s"), WhenOptions::new().then(Schema::string().id("s")))
            .unwrap();
        let before = schema.describe().matches.unwrap();
        let modified = schema.modify("s", &Schema::boolean()).unwrap().unwrap();
        let after = modified.describe().matches.unwrap();

        assert_eq!(after[0].schema, Some(Schema::boolean().describe()));
        assert_eq!(after[1], before[1]);
        assert_eq!(after[2], before[2]);
        assert!(schema.modify("missing", &Schema::boolean()).unwrap().is_none());
        assert_eq!(schema.describe().matches.unwrap(), before);
    }

    #[test]
    fn extract_and_fork_reach_branch_slots() {
        let schema = Schema::alternatives().try_([Schema::string().id("s")]).unwrap();
        assert_eq!(schema.extract("s").unwrap().kind(), Kind::String);
        let forked = schema.fork("s", |s| s.required()).unwrap();
        assert_eq!(forked.extract("s").unwrap().flags().presence, crate::schema::Presence::Required);
        assert!(matches!(schema.fork("x", |s| s), Err(SchemaError::UnknownId(_))));
    }

    #[test]
    fn label_reaches_every_branch() {
        let schema = Schema::alternatives().try_([Schema::boolean()]).unwrap().label("flag");
        let result = schema.validate("x");
        assert_eq!(result.first_report().unwrap().context.label.as_deref(), Some("flag"));
    }

    #[test]
    fn tailor_rebuilds_branches() {
        let schema = Schema::alternatives()
            .try_([Schema::boolean().alter("numeric", |s| s.cast(CastTarget::Number).unwrap_or(s))])
            .unwrap();
        let tailored = schema.tailor(&["numeric"]).unwrap();
        assert_eq!(tailored.validate(true).value, Some(Value::Number(1.0)));
        assert_eq!(schema.validate(true).value, Some(Value::Bool(true)));
    }

    #[test]
    fn label_reaches_condition_and_branch_slots() {
        let peeked = Schema::alternatives()
            .when(Schema::string(), WhenOptions::new().then(Schema::string()).otherwise(Schema::number()))
            .unwrap()
            .label("L");
        let entry = &peeked.describe().matches.unwrap()[0];
        for slot in [&entry.peek, &entry.then, &entry.otherwise] {
            assert_eq!(slot.as_ref().unwrap().flags.label.as_deref(), Some("L"));
        }

        let referenced = Schema::alternatives()
            .when("a", WhenOptions::new().is(1).then(Schema::string()))
            .unwrap()
            .label("L");
        let entry = &referenced.describe().matches.unwrap()[0];
        assert_eq!(entry.is.as_ref().unwrap().flags.label.as_deref(), Some("L"));
        assert_eq!(entry.then.as_ref().unwrap().flags.label.as_deref(), Some("L"));
    }

    #[test]
    fn tailor_reaches_then_branches() {
        let numeric = Schema::boolean().alter("numeric", |s| s.cast(CastTarget::Number).unwrap_or(s));
        let schema = keyed(
            Schema::alternatives()
                .when("a", WhenOptions::new().is(1).then(numeric).otherwise(Schema::string()))
                .unwrap(),
        );
        let tailored = schema.tailor(&["numeric"]).unwrap();
        let result = tailored.validate(json!({"a": 1, "b": true}));
        assert_eq!(result.value, Some(Value::from(json!({"a": 1, "b": 1}))));
        let untouched = schema.validate(json!({"a": 1, "b": true}));
        assert_eq!(untouched.value, Some(Value::from(json!({"a": 1, "b": true}))));
    }

    #[test]
    fn branch_references_register_as_sibling_dependencies() {
        let after_start = Schema::alternatives()
            .when(
                "kind",
                WhenOptions::new()
                    .is("range")
                    .then(Schema::date().greater(Reference::parse("start").unwrap()).unwrap()),
            )
            .unwrap();
        let own: Vec<_> = after_start.registrations().siblings().collect();
        assert!(own.contains(&"start"));

        let schema = Schema::object()
            .keys([
                ("end", SchemaLike::from(after_start)),
                ("start", SchemaLike::from(Schema::date())),
                ("kind", SchemaLike::from(Schema::string())),
            ])
            .unwrap();
        let ok = schema.validate(json!({"end": "2020-02-01", "start": "2020-01-01", "kind": "range"}));
        assert_eq!(ok.code(), None);
        let early = schema.validate(json!({"end": "2019-02-01", "start": "2020-01-01", "kind": "range"}));
        assert_eq!(early.code(), Some("date.greater"));
    }

    #[test]
    fn array_branches_set_the_items_hint() {
        let plain = Schema::alternatives().try_([Schema::string()]).unwrap();
        assert!(!plain.flags().array_items);
        let with_array = plain.try_([Schema::array()]).unwrap();
        assert!(with_array.flags().array_items);
        let replaced = Schema::alternatives()
            .try_([Schema::array().id("list")])
            .unwrap()
            .modify("list", &Schema::string())
            .unwrap()
            .unwrap();
        assert!(!replaced.flags().array_items);
    }

    #[test]
    fn references_register_as_sibling_dependencies() {
        let schema = Schema::alternatives()
            .when("a.b", WhenOptions::new().is(1).then(Schema::any()))
            .unwrap();
        let siblings: Vec<_> = schema.registrations().siblings().collect();
        assert_eq!(siblings, vec!["a"]);
    }

    #[test]
    fn describe_build_round_trip_is_stable() {
        let schema = Schema::alternatives()
            .try_([Schema::boolean().truthy(["Y"]).unwrap()])
            .unwrap()
            .when(
                "a",
                WhenOptions::switch([
                    SwitchCase::new(1, Schema::date().iso().unwrap()),
                    SwitchCase::new(2, Schema::number()).otherwise(Schema::string()),
                ]),
            )
            .unwrap()
            .label("choice");
        let first = schema.describe();
        let rebuilt = Schema::build(&first).unwrap();
        assert_eq!(rebuilt.describe(), first);

        let peek = Schema::alternatives()
            .when(Schema::string(), WhenOptions::new().then(Schema::string()).otherwise(Schema::date()))
            .unwrap();
        let desc = peek.describe();
        assert_eq!(Schema::build(&desc).unwrap().describe(), desc);
    }
}
