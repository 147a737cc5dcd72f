//! Identifier extraction from database snapshot dumps.
//!
//! Snapshots arrive as console captures: sometimes a clean JSON array,
//! sometimes an array buried in surrounding prose, sometimes too mangled for
//! either. The strategies cover that spectrum, and `auto` walks them in
//! order until one yields identifiers. A snapshot nobody can parse reports
//! zero identifiers rather than failing the run.

use std::{collections::BTreeSet, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cli::ExtractionStrategy;

/// Lowercase hex UUID, 8-4-4-4-12.
const UUID_PATTERN: &str =
    r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

static UUID_RE: OnceLock<Regex> = OnceLock::new();

fn uuid_regex() -> &'static Regex {
    UUID_RE.get_or_init(|| Regex::new(UUID_PATTERN).expect("UUID pattern compiles"))
}

/// Extract the identifier set from snapshot text using the given strategy.
pub fn extract_ids(text: &str, strategy: ExtractionStrategy) -> BTreeSet<String> {
    match strategy {
        ExtractionStrategy::StrictJson => strict_json(text).unwrap_or_default(),
        ExtractionStrategy::DelimitedJson => delimited_json(text).unwrap_or_default(),
        ExtractionStrategy::Pattern => pattern(text),
        ExtractionStrategy::Auto => strict_json(text)
            .or_else(|| delimited_json(text))
            .unwrap_or_else(|| pattern(text)),
    }
}

/// Parse the whole text as a JSON array of identifier strings or of objects
/// carrying an `"id"` string.
fn strict_json(text: &str) -> Option<BTreeSet<String>> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    ids_from_value(&value)
}

/// Parse the slice between the first `[` and the last `]`, recovering arrays
/// embedded in console prose.
fn delimited_json(text: &str) -> Option<BTreeSet<String>> {
    let slice = delimited_slice(text)?;
    let value: Value = serde_json::from_str(slice).ok()?;
    ids_from_value(&value)
}

fn delimited_slice(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Collect every UUID-shaped substring, canonicalized through `uuid`.
fn pattern(text: &str) -> BTreeSet<String> {
    uuid_regex()
        .find_iter(text)
        .filter_map(|m| Uuid::try_parse(m.as_str()).ok())
        .map(|id| id.to_string())
        .collect()
}

fn ids_from_value(value: &Value) -> Option<BTreeSet<String>> {
    let items = value.as_array()?;
    let mut ids = BTreeSet::new();
    for item in items {
        let id = match item {
            Value::String(s) => s.as_str(),
            Value::Object(fields) => fields.get("id")?.as_str()?,
            _ => return None,
        };
        ids.insert(id.trim().to_string());
    }
    Some(ids)
}

/// One row fetched back for ghost analysis.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GhostRecord {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
}

/// Parse ghost rows from a query-result dump, tolerating surrounding prose
/// the same way identifier extraction does.
pub fn parse_ghost_records(text: &str) -> Result<Vec<GhostRecord>> {
    let slice = delimited_slice(text)
        .ok_or_else(|| anyhow!("No JSON array found in ghost data"))?;
    serde_json::from_str(slice).context("Parsing ghost records JSON")
}

/// Parse an explicit identifier list: a JSON array of strings.
pub fn parse_id_list(text: &str) -> Result<Vec<String>> {
    let ids: Vec<String> =
        serde_json::from_str(text.trim()).context("Parsing identifier list JSON")?;
    Ok(ids.into_iter().map(|id| id.trim().to_string()).collect())
}
