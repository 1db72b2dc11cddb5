//! Column map import.
//!
//! A column map is a CSV with `column` and `metatype` fields. Each
//! metatype marker names the semantic group the column belongs to; the
//! importer partitions column names by group and collects every
//! non-ignored column under `all`.

use crate::constants::{COLUMN_MAP_FILE_NAME, metatypes};
use crate::error::{Result, SimError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Column names partitioned by semantic group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    groups: BTreeMap<String, Vec<String>>,
}

impl ColumnMap {
    /// Columns of a group; unknown groups are empty
    pub fn group(&self, name: &str) -> &[String] {
        self.groups.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn numeric(&self) -> &[String] {
        self.group(metatypes::NUMERIC)
    }

    pub fn categorical(&self) -> &[String] {
        self.group(metatypes::CATEGORICAL)
    }

    pub fn label(&self) -> &[String] {
        self.group(metatypes::LABEL)
    }

    pub fn ignored(&self) -> &[String] {
        self.group(metatypes::IGNORED)
    }

    pub fn all(&self) -> &[String] {
        self.group(metatypes::ALL)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

/// Resolve a column map location: a `.csv` path is used as-is, anything
/// else is treated as a directory holding `col_map.csv`.
pub fn resolve_column_map_path(location: &Path) -> PathBuf {
    let is_csv = location
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        location.to_path_buf()
    } else {
        location.join(COLUMN_MAP_FILE_NAME)
    }
}

/// Import a column map, extending the default markers (`N`, `C`, `Y`,
/// `X`) with `custom_markers` (marker → group name).
pub fn import_column_map(
    location: &Path,
    custom_markers: &HashMap<String, String>,
) -> Result<ColumnMap> {
    let path = resolve_column_map_path(location);
    let context = path.display().to_string();

    let mut markers: HashMap<String, String> = metatypes::DEFAULT_MARKERS
        .iter()
        .map(|(marker, group)| (marker.to_string(), group.to_string()))
        .collect();
    markers.extend(custom_markers.clone());

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for group in [
        metatypes::NUMERIC,
        metatypes::CATEGORICAL,
        metatypes::LABEL,
        metatypes::IGNORED,
        metatypes::ALL,
    ] {
        groups.insert(group.to_string(), Vec::new());
    }
    for group in custom_markers.values() {
        groups.entry(group.clone()).or_default();
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)?;

    let headers = reader.headers()?.clone();
    let column_pos = headers.iter().position(|h| h == "column").ok_or_else(|| {
        SimError::schema(&context, "column map must contain a field named \"column\"")
    })?;
    let metatype_pos = headers.iter().position(|h| h == "metatype").ok_or_else(|| {
        SimError::schema(&context, "column map must contain a field named \"metatype\"")
    })?;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let column = record.get(column_pos).unwrap_or_default().to_string();
        let marker = record.get(metatype_pos).unwrap_or_default();

        let group = markers.get(marker).ok_or_else(|| {
            SimError::schema(
                &context,
                format!(
                    "unknown metatype marker '{}' for column '{}' (row {})",
                    marker,
                    column,
                    line + 1
                ),
            )
        })?;

        if group == metatypes::ALL {
            return Err(SimError::schema(
                &context,
                format!("marker '{}' cannot map to the reserved group 'all'", marker),
            ));
        }
        groups.entry(group.clone()).or_default().push(column.clone());
        // `all` holds every column whose group is not `ignored`
        if group != metatypes::IGNORED {
            groups.entry(metatypes::ALL.to_string()).or_default().push(column);
        }
    }

    debug!(
        "Imported column map {} ({} columns, {} ignored)",
        context,
        groups[metatypes::ALL].len(),
        groups[metatypes::IGNORED].len()
    );

    Ok(ColumnMap { groups })
}
