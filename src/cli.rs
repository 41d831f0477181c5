//! CLI: validate JSON/NDJSON documents against a schema description, or
//! normalize a description.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use json_vet::{Failure, Preferences, Schema, Validation, Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate documents against a schema description
#[derive(Parser, Debug)]
#[command(name = "json-vet", version)]
pub struct CommandLineInterface {
    /// debug-level logging on stderr (overrides JSON_VET_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate every input document and report failures
    Validate(ValidateOut),
    /// build a description and print its normalized form
    Describe(DescribeOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is validated
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct ValidateOut {
    /// schema description (.json)
    #[arg(long, short)]
    schema: PathBuf,

    #[command(flatten)]
    input_settings: InputSettings,

    /// disable coercion and casts
    #[arg(long)]
    no_convert: bool,

    /// collect every failure inside a node instead of stopping at the first
    #[arg(long)]
    all_errors: bool,

    /// accept object keys the schema does not declare
    #[arg(long)]
    allow_unknown: bool,

    /// `$name` reference targets, as name=JSON (bare text is a string)
    #[arg(long = "context", value_parser = parse_context_pair)]
    context: Vec<(String, serde_json::Value)>,

    /// output .json report file (stdout summary only if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    /// schema description (.json)
    #[arg(long, short)]
    schema: PathBuf,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One input document after NDJSON splitting, pointer selection and jq.
#[derive(Debug)]
struct Document {
    source: String,
    value: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Outcome {
    source: String,
    valid: bool,
    #[serde(flatten)]
    result: Validation,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;

        let mut out = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;

            let mut parsed = Vec::new();
            if self.ndjson {
                for (line_no, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let value = serde_json::from_str::<serde_json::Value>(line).with_context(|| {
                        format!("failed to parse NDJSON line {} of {source_path_str}", line_no + 1)
                    })?;
                    parsed.push((format!("{source_path_str}:{}", line_no + 1), value));
                }
            } else {
                let value = serde_json::from_str::<serde_json::Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file {source_path_str}"))?;
                parsed.push((source_path_str.clone(), value));
            }

            for (source, value) in parsed {
                self.select(source, value, &mut out)?;
            }
        }
        debug!(documents = out.len(), "inputs loaded");
        Ok(out)
    }

    fn select(&self, source: String, value: serde_json::Value, out: &mut Vec<Document>) -> Result<()> {
        let value = match self.json_pointer.as_deref() {
            None => value,
            Some(pointer) => value
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| anyhow!("JSON pointer {pointer} matched nothing in {source}"))?,
        };
        match self.jq_expr.as_ref() {
            None => out.push(Document { source, value }),
            Some(jq_expr) => {
                let results = crate::jq_exec::run_jaq(jq_expr, &value)
                    .with_context(|| format!("failed to apply jq expression to {source}"))?;
                for (index, value) in results.into_iter().enumerate() {
                    out.push(Document { source: format!("{source}#{index}"), value });
                }
            }
        }
        Ok(())
    }
}

impl ValidateOut {
    fn preferences(&self) -> Preferences {
        Preferences {
            convert: !self.no_convert,
            abort_early: !self.all_errors,
            allow_unknown: self.allow_unknown,
            context: self.context.iter().map(|(k, v)| (k.clone(), Value::from(v.clone()))).collect(),
            ..Preferences::default()
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Validate(target) => {
                let schema = load_schema(&target.schema)?;
                let prefs = target.preferences();
                let documents = target.input_settings.load_documents()?;
                info!(documents = documents.len(), schema = %target.schema.display(), "validating");

                let outcomes: Vec<Outcome> = documents
                    .par_iter()
                    .map(|doc| {
                        let result = schema.validate_with(Some(Value::from(doc.value.clone())), &prefs);
                        Outcome { source: doc.source.clone(), valid: result.is_ok(), result }
                    })
                    .collect();

                print_summary(&outcomes);
                if let Some(out) = target.out.as_ref() {
                    write_output(Some(out), &serde_json::to_string_pretty(&outcomes)?)?;
                }

                let failed = outcomes.iter().filter(|o| !o.valid).count();
                Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
            Command::Describe(target) => {
                let schema = load_schema(&target.schema)?;
                let desc = serde_json::to_string_pretty(&schema.describe())?;
                write_output(target.out.as_deref(), &desc)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_schema(path: &Path) -> Result<Schema> {
    json_vet::path_de::load_schema(path).with_context(|| format!("failed to load schema {}", path.display()))
}

fn print_summary(outcomes: &[Outcome]) {
    for outcome in outcomes {
        if outcome.valid {
            println!("{} {}", "✓".green(), outcome.source);
            continue;
        }
        println!("{} {}", "✗".red().bold(), outcome.source);
        for failure in &outcome.result.errors {
            println!("    {}", describe_failure(failure));
        }
    }
    let failed = outcomes.iter().filter(|o| !o.valid).count();
    let line = format!("{} documents, {failed} invalid", outcomes.len());
    if failed == 0 {
        println!("{}", line.green());
    } else {
        println!("{}", line.yellow());
    }
}

fn describe_failure(failure: &Failure) -> String {
    let path = failure.path().iter().map(ToString::to_string).collect::<Vec<_>>().join(".");
    let at = if path.is_empty() { String::new() } else { format!(" at {path}") };
    match failure.code() {
        Some(code) => format!("{}{at}: {}", code.cyan(), failure.message()),
        None => format!("{}{at}", failure.message()),
    }
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{text}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
}

fn parse_context_pair(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected name=value, got {raw:?}"))?;
    if name.is_empty() {
        return Err(format!("empty context name in {raw:?}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern)? {
            out.push(entry?);
        }
        if out.len() == before {
            bail!("glob pattern matched no files: {pattern}");
        }
    }

    Ok(out)
}
