//! Header standardization and manual header templates.
//!
//! Raw extracts arrive with inconsistent column names (mixed case, stray
//! whitespace, punctuation). Names are normalized once, when the header is
//! frozen, so every later lookup uses the same stable identifiers.

use crate::error::{Result, SimError};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static NON_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));

/// Normalize a raw header into unique SQL-friendly identifiers.
///
/// Names are trimmed and lower-cased, runs of other characters become a
/// single `_`, blank names become `column_<n>` and repeats gain a numeric
/// suffix.
pub fn standardize_header<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut header = Vec::with_capacity(raw.len());

    for (i, name) in raw.iter().enumerate() {
        let lowered = name.as_ref().trim().to_lowercase();
        let cleaned = NON_IDENTIFIER.replace_all(&lowered, "_");
        let mut base = cleaned.trim_matches('_').to_string();
        if base.is_empty() {
            base = format!("column_{}", i + 1);
        }

        let mut candidate = base.clone();
        let mut suffix = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        if candidate != name.as_ref() {
            debug!("Standardized column '{}' -> '{}'", name.as_ref(), candidate);
        }
        header.push(candidate);
    }

    header
}

/// Read a header template: a CSV whose `column` field lists the names
/// for a raw file that has no header row of its own.
pub fn read_manual_header(path: &Path) -> Result<Vec<String>> {
    let context = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let position = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == "column")
        .ok_or_else(|| {
            SimError::schema(&context, "header template must contain a `column` field")
        })?;

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record?;
        match record.get(position) {
            Some(name) if !name.trim().is_empty() => names.push(name.trim().to_string()),
            _ => warn!("Skipping blank header entry in {}", context),
        }
    }

    if names.is_empty() {
        return Err(SimError::schema(&context, "header template lists no columns"));
    }

    debug!("Loaded {} manual header names from {}", names.len(), context);
    Ok(names)
}
