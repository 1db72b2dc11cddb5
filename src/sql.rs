//! SQL statement text builders.
//!
//! Pure string templating over column collections. Column order in the
//! output always matches input order; identifiers are not validated.

use crate::constants::columns;
use crate::schema::{CENBLOCKS, VOTERS};

/// `INSERT INTO table (a, b, c) ` with a trailing space so a SELECT can follow
pub fn build_insert<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    format!("INSERT INTO {} ({}) ", table, join(columns))
}

/// `SELECT a, b FROM table[ GROUP BY x, y];`
pub fn build_select<S: AsRef<str>, G: AsRef<str>>(
    table: &str,
    columns: &[S],
    group_by: Option<&[G]>,
) -> String {
    let group_by = match group_by {
        Some(groups) if !groups.is_empty() => format!(" GROUP BY {}", join(groups)),
        _ => String::new(),
    };
    format!("SELECT {} FROM {}{};", join(columns), table, group_by)
}

/// `CREATE TABLE table (a INTEGER, b VARCHAR);`
pub fn build_create<N: AsRef<str>, T: AsRef<str>>(table: &str, column_types: &[(N, T)]) -> String {
    let definitions: Vec<String> = column_types
        .iter()
        .map(|(name, sql_type)| format!("{} {}", name.as_ref(), sql_type.as_ref()))
        .collect();
    format!("CREATE TABLE {} ({});", table, definitions.join(", "))
}

/// Statement populating `cenblocks` from the prepared raw table.
///
/// Rows are grouped by block; donor counts and donation totals are
/// summed, every other column takes its maximum.
pub fn populate_cenblocks(source_table: &str) -> String {
    let target_columns = CENBLOCKS.insertable_columns();
    let select_columns: Vec<String> = target_columns
        .iter()
        .map(|name| match *name {
            columns::BLOCK_GEOID => name.to_string(),
            columns::TOTAL_DONORS => format!("SUM({})", columns::IS_DONOR),
            columns::DONATION_TOTAL => format!("SUM({})", columns::DONATION_SUM),
            other => format!("MAX({})", other),
        })
        .collect();

    let insert = build_insert(CENBLOCKS.name, &target_columns);
    let select = build_select(source_table, &select_columns, Some(&[columns::BLOCK_GEOID][..]));
    format!("{} {}", insert, select)
}

/// Statement populating `voters` with the distinct voter rows of the raw table
pub fn populate_voters(source_table: &str) -> String {
    let voter_columns = VOTERS.insertable_columns();
    let insert = build_insert(VOTERS.name, &voter_columns);
    let select = build_select(source_table, &voter_columns, Some(voter_columns.as_slice()));
    format!("{} {}", insert, select)
}

fn join<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}
