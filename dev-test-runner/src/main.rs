//! Runs the JSON fixture suites under `fixtures/`.
//!
//! ```text
//! cargo run -p dev-test-runner -- [FIXTURE_DIR] [CASE_FILTER_REGEX]
//! ```
//!
//! A suite is `{name, schema, prefs?, cases: [{value?, valid, code?, output?}]}`.
//! An omitted `value` is validated as absent, which is not the same as `null`.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use json_vet::{Description, Preferences, Schema, Value};
use regex::Regex;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Suite {
    name: String,
    schema: Description,
    #[serde(default)]
    prefs: Preferences,
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    #[serde(default, deserialize_with = "present")]
    value: Option<serde_json::Value>,
    valid: bool,
    code: Option<String>,
    #[serde(default, deserialize_with = "present")]
    output: Option<serde_json::Value>,
}

fn present<'de, D: Deserializer<'de>>(de: D) -> Result<Option<serde_json::Value>, D::Error> {
    serde_json::Value::deserialize(de).map(Some)
}

/// Returns one message per failing case.
fn run_case(schema: &Schema, prefs: &Preferences, case: &Case) -> Option<String> {
    let result = schema.validate_with(case.value.clone().map(Value::from), prefs);
    if result.is_ok() != case.valid {
        let errors = result.errors.iter().map(ToString::to_string).collect::<Vec<_>>();
        return Some(format!("expected valid={} but got errors {errors:?}", case.valid));
    }
    if let Some(code) = case.code.as_deref() {
        if result.code() != Some(code) {
            return Some(format!("expected code {code} but got {:?}", result.code()));
        }
    }
    if let Some(expected) = case.output.as_ref() {
        let actual = result.value.as_ref().map(serde_json::Value::from);
        if actual.as_ref() != Some(expected) {
            return Some(format!("expected output {expected} but got {actual:?}"));
        }
    }
    None
}

fn fixture_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    files.retain(|p| p.extension().is_some_and(|ext| ext == "json"));
    files.sort();
    Ok(files)
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures"));
    let filter = match args.next().map(|raw| Regex::new(&raw)).transpose() {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("invalid filter: {error}");
            return ExitCode::FAILURE;
        }
    };

    let files = match fixture_files(&dir) {
        Ok(files) => files,
        Err(error) => {
            eprintln!("cannot read fixtures in {}: {error}", dir.display());
            return ExitCode::FAILURE;
        }
    };

    let (mut passed, mut failed) = (0usize, 0usize);
    for path in files {
        let suite = match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|src| json_vet::path_de::from_str_with_path::<Suite>(&src).map_err(|e| e.to_string()))
        {
            Ok(suite) => suite,
            Err(error) => {
                eprintln!("FAIL {}: {error}", path.display());
                failed += 1;
                continue;
            }
        };
        let schema = match Schema::build(&suite.schema) {
            Ok(schema) => schema,
            Err(error) => {
                eprintln!("FAIL {}: schema does not build: {error}", suite.name);
                failed += 1;
                continue;
            }
        };
        let prefs = &suite.prefs;

        for (index, case) in suite.cases.iter().enumerate() {
            let label = format!("{}/{index}", suite.name);
            if filter.as_ref().is_some_and(|re| !re.is_match(&label)) {
                continue;
            }
            match run_case(&schema, prefs, case) {
                None => passed += 1,
                Some(message) => {
                    eprintln!("FAIL {label}: {message}");
                    failed += 1;
                }
            }
        }
    }

    println!("{passed} passed, {failed} failed");
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
