//! SQL generation for `INSERT ... ON DUPLICATE KEY UPDATE`.
//!
//! Converts an escaped column list, a chunk of rendered value tuples and the
//! update-clause inputs into executable MySQL statements.

use crate::escape::SqlEscaper;
use crate::value::SqlValue;

/// Escape an exclusion list for comparison against escaped column names.
///
/// Empty and duplicate entries are dropped; first-seen order is kept.
pub fn prepare_exclusions<E, S>(escaper: &E, exclude: &[S]) -> Vec<String>
where
    E: SqlEscaper + ?Sized,
    S: AsRef<str>,
{
    let mut prepared: Vec<String> = Vec::new();
    for name in exclude {
        let name = name.as_ref();
        if name.trim().is_empty() {
            continue;
        }
        let escaped = escaper.escape_identifier(name);
        if !prepared.contains(&escaped) {
            prepared.push(escaped);
        }
    }
    prepared
}

/// Compose the assignment list that follows `ON DUPLICATE KEY UPDATE`.
///
/// `columns` are already escaped. Each one not in `exclude` becomes
/// `col=VALUES(col)`; every extra field is appended after them as
/// `key= value`, even if it repeats a column.
pub fn compose_update_clause<E, S>(
    escaper: &E,
    columns: &[String],
    extra: &[(String, SqlValue)],
    exclude: &[S],
) -> String
where
    E: SqlEscaper + ?Sized,
    S: AsRef<str>,
{
    let exclude = prepare_exclusions(escaper, exclude);

    let mut assignments: Vec<String> = columns
        .iter()
        .filter(|col| !exclude.contains(col))
        .map(|col| format!("{}=VALUES({})", col, col))
        .collect();

    for (key, value) in extra {
        assignments.push(format!(
            "{}= {}",
            escaper.escape_identifier(key),
            escaper.escape_value(value)
        ));
    }

    assignments.join(", ")
}

/// Build one upsert statement for a chunk of rows.
///
/// `table` is already protected and `update_clause` already composed.
pub fn build_upsert(table: &str, columns: &[String], rows: &[String], update_clause: &str) -> String {
    let mut sql = String::from("INSERT INTO ");
    sql.push_str(table);

    sql.push_str(" (");
    sql.push_str(&columns.join(","));
    sql.push(')');

    sql.push_str(" VALUES ");
    sql.push_str(&rows.join(","));

    sql.push_str(" ON DUPLICATE KEY UPDATE ");
    sql.push_str(update_clause);

    sql
}
