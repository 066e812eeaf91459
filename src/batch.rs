//! Batched `INSERT ... ON DUPLICATE KEY UPDATE`.
//!
//! [`UpsertBatch`] resolves the target table, loads rows into a
//! [`StagingBuffer`], splits them into chunks of [`NUMBER_PER_BATCH_INSERT`]
//! and executes one statement per chunk, in order.
//!
//! ```rust,ignore
//! use upsert_batch::prelude::*;
//!
//! let mut db = UpsertDb::connect("mysql://localhost/shop").await?;
//! let mut staging = StagingBuffer::new();
//! let rows = vec![
//!     Row::new().set("id", 1).set("name", "a"),
//!     Row::new().set("id", 2).set("name", "b"),
//! ];
//!
//! UpsertBatch::new("users")
//!     .extra("updated_at", SqlValue::raw("NOW()"))
//!     .exclude(["created_at"])
//!     .execute(&mut db, &mut staging, Some(rows.as_slice()))
//!     .await?;
//! ```

use crate::engine::QueryExecutor;
use crate::error::{UpsertError, UpsertResult};
use crate::escape::SqlEscaper;
use crate::staging::{Row, StagingBuffer};
use crate::transpiler::{build_upsert, compose_update_clause};
use crate::value::SqlValue;

/// Number of rows written by a single statement.
pub const NUMBER_PER_BATCH_INSERT: usize = 150;

/// Builder for a batched upsert into one table.
#[derive(Debug, Clone)]
pub struct UpsertBatch {
    table: String,
    extra_update_fields: Vec<(String, SqlValue)>,
    exclude_from_update: Vec<String>,
    batch_size: usize,
}

/// Outcome of a completed upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Statements executed.
    pub statements: usize,
    /// Rows sent across all statements.
    pub rows: usize,
    /// Sum of affected-row counts reported by the executor.
    pub rows_affected: u64,
}

impl Default for UpsertBatch {
    fn default() -> Self {
        Self {
            table: String::new(),
            extra_update_fields: Vec::new(),
            exclude_from_update: Vec::new(),
            batch_size: NUMBER_PER_BATCH_INSERT,
        }
    }
}

impl UpsertBatch {
    /// Target `table`. An empty name falls back to the staging buffer's
    /// default table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Append an assignment to every update clause, e.g. `modified_at`.
    pub fn extra(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.extra_update_fields.push((column.into(), value.into()));
        self
    }

    /// Append several extra update assignments, in order.
    pub fn extras<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        self.extra_update_fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Columns left out of the generated `col=VALUES(col)` assignments.
    pub fn exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_from_update
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Override the chunk size. Zero is treated as one.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn extra_update_fields(&self) -> &[(String, SqlValue)] {
        &self.extra_update_fields
    }

    pub fn exclude_from_update(&self) -> &[String] {
        &self.exclude_from_update
    }

    /// Resolve and protect the target table.
    pub fn resolve_table<E: SqlEscaper + ?Sized>(
        &self,
        escaper: &E,
        staging: &StagingBuffer,
    ) -> UpsertResult<String> {
        let table = match self.table.trim() {
            "" => staging.default_table().ok_or(UpsertError::NoTable)?,
            table => table,
        };
        Ok(escaper.protect_table(table))
    }

    /// The assignment list shared by every statement of this upsert.
    pub fn update_clause<E: SqlEscaper + ?Sized>(
        &self,
        escaper: &E,
        columns: &[String],
    ) -> UpsertResult<String> {
        let clause = compose_update_clause(
            escaper,
            columns,
            &self.extra_update_fields,
            &self.exclude_from_update,
        );
        if clause.is_empty() {
            return Err(UpsertError::EmptyUpdateClause);
        }
        Ok(clause)
    }

    /// Lazily generate one statement per chunk of staged rows.
    ///
    /// Fails up front when the table cannot be resolved, nothing is
    /// staged, or the update clause would be empty.
    pub fn statements<'s, E: SqlEscaper + ?Sized>(
        &self,
        escaper: &E,
        staging: &'s StagingBuffer,
    ) -> UpsertResult<Statements<'s>> {
        let table = self.resolve_table(escaper, staging)?;
        if staging.is_empty() {
            return Err(UpsertError::NoValidData);
        }
        let update_clause = self.update_clause(escaper, staging.keys())?;

        Ok(Statements {
            table,
            columns: staging.keys(),
            chunks: staging.rows().chunks(self.batch_size),
            update_clause,
        })
    }

    /// Load `data` (if given), execute every chunk in order, then clear the
    /// staging buffer.
    ///
    /// Statements are executed one at a time; the next chunk is built only
    /// after the previous statement returns. A failing statement stops the
    /// upsert: earlier chunks stay committed and the staging buffer is left
    /// as it was.
    pub async fn execute<D>(
        &self,
        db: &mut D,
        staging: &mut StagingBuffer,
        data: Option<&[Row]>,
    ) -> UpsertResult<UpsertReport>
    where
        D: QueryExecutor + SqlEscaper,
    {
        // Table first so a missing table wins over missing data.
        self.resolve_table(&*db, staging)?;

        if let Some(rows) = data {
            staging.set_insert_batch(rows, &*db)?;
        }

        let mut report = UpsertReport::default();
        let statements = self.statements(&*db, staging)?;
        let total = statements.len();

        for (index, (rows, sql)) in statements.enumerate() {
            tracing::debug!(chunk = index + 1, total, rows, "executing upsert chunk");
            report.rows_affected += db.execute(&sql).await?;
            report.statements += 1;
            report.rows += rows;
        }

        staging.reset_write();

        tracing::info!(
            statements = report.statements,
            rows = report.rows,
            rows_affected = report.rows_affected,
            "upsert complete"
        );
        Ok(report)
    }
}

/// Iterator over the statements of one upsert, yielding
/// `(rows_in_chunk, sql)` pairs in staging order.
#[derive(Debug)]
pub struct Statements<'s> {
    table: String,
    columns: &'s [String],
    chunks: std::slice::Chunks<'s, String>,
    update_clause: String,
}

impl Statements<'_> {
    /// The protected table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The update clause shared by all statements.
    pub fn update_clause(&self) -> &str {
        &self.update_clause
    }
}

impl Iterator for Statements<'_> {
    type Item = (usize, String);

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.chunks.next()?;
        let sql = build_upsert(&self.table, self.columns, rows, &self.update_clause);
        Some((rows.len(), sql))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Statements<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DryRun;
    use crate::escape::MysqlEscaper;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| Row::new().set("id", i as i64).set("name", format!("n{}", i)))
            .collect()
    }

    #[test]
    fn test_resolve_table_falls_back_to_from() {
        let e = MysqlEscaper::new();
        let mut staging = StagingBuffer::new();
        staging.from("accounts");
        let table = UpsertBatch::new("").resolve_table(&e, &staging).unwrap();
        assert_eq!(table, "`accounts`");
    }

    #[test]
    fn test_resolve_table_missing() {
        let e = MysqlEscaper::new();
        let err = UpsertBatch::new("").resolve_table(&e, &StagingBuffer::new());
        assert!(matches!(err, Err(UpsertError::NoTable)));
    }

    #[test]
    fn test_statements_chunk_counts() {
        let e = MysqlEscaper::new();
        let mut staging = StagingBuffer::new();
        staging.set_insert_batch(&rows(301), &e).unwrap();

        let sizes: Vec<usize> = UpsertBatch::new("t")
            .statements(&e, &staging)
            .unwrap()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(sizes, vec![150, 150, 1]);
    }

    #[test]
    fn test_statements_len_is_ceiling() {
        let e = MysqlEscaper::new();
        let mut staging = StagingBuffer::new();
        for (n, expected) in [(1, 1), (150, 1), (151, 2), (300, 2), (450, 3)] {
            staging.set_insert_batch(&rows(n), &e).unwrap();
            let stmts = UpsertBatch::new("t").statements(&e, &staging).unwrap();
            assert_eq!(stmts.len(), expected, "rows = {}", n);
        }
    }

    #[test]
    fn test_custom_batch_size() {
        let e = MysqlEscaper::new();
        let mut staging = StagingBuffer::new();
        staging.set_insert_batch(&rows(5), &e).unwrap();
        let stmts = UpsertBatch::new("t").batch_size(2).statements(&e, &staging).unwrap();
        assert_eq!(stmts.map(|(n, _)| n).collect::<Vec<_>>(), vec![2, 2, 1]);
    }

    #[test]
    fn test_empty_update_clause_rejected() {
        let e = MysqlEscaper::new();
        let mut staging = StagingBuffer::new();
        staging.set_insert_batch(&rows(1), &e).unwrap();
        let err = UpsertBatch::new("t")
            .exclude(["id", "name"])
            .statements(&e, &staging)
            .unwrap_err();
        assert!(matches!(err, UpsertError::EmptyUpdateClause));
    }

    #[tokio::test]
    async fn test_execute_resets_staging() {
        let mut dry = DryRun::new();
        let mut staging = StagingBuffer::new();
        staging.from("users");
        let data = rows(3);

        let report = UpsertBatch::new("")
            .execute(&mut dry, &mut staging, Some(data.as_slice()))
            .await
            .unwrap();

        assert_eq!(report.statements, 1);
        assert_eq!(report.rows, 3);
        assert!(staging.is_empty());
        assert_eq!(staging.default_table(), None);
        assert!(dry.statements()[0].starts_with("INSERT INTO `users` (id,name) VALUES "));
    }

    #[tokio::test]
    async fn test_execute_without_rows_fails() {
        let mut dry = DryRun::new();
        let mut staging = StagingBuffer::new();
        let err = UpsertBatch::new("users")
            .execute(&mut dry, &mut staging, None)
            .await
            .unwrap_err();
        assert!(matches!(err, UpsertError::NoValidData));
        assert!(dry.statements().is_empty());
    }
}
