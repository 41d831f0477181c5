//! Runtime schema description and validation.
//!
//! Schemas are immutable trees built with fluent calls
//! (`Schema::alternatives().try_([...])`, `Schema::date().iso()`, ...) and
//! applied to a [`Value`] to get either a normalized value or structured
//! [`Failure`]s. Builder misuse is a [`SchemaError`] at the call that caused
//! it and never shows up in a validation result.
pub mod errors;
pub mod path_de;
pub mod reference;
pub mod schema;
pub mod state;
pub mod types;
pub mod value;

pub use errors::{ErrorContext, Failure, OverrideError, Report, SchemaError};
pub use reference::Reference;
pub use schema::describe::Description;
pub use schema::{CastTarget, Kind, Presence, RuleOptions, Schema, SchemaLike, Validation};
pub use state::{DateFormatPref, PathSegment, Preferences, State};
pub use types::alternatives::{Condition, SwitchCase, WhenOptions};
pub use types::date::{DateFormat, Limit};
pub use value::Value;
