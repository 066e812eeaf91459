use pretty_assertions::assert_eq;
use upsert_batch::engine::ExecFuture;
use upsert_batch::parser::parse_columns;
use upsert_batch::prelude::*;

fn numbered_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| Row::new().set("id", i as i64).set("name", format!("user{}", i)))
        .collect()
}

/// Splits `INSERT ... VALUES a,b,c ON DUPLICATE ...` back into its tuples.
fn tuples(sql: &str) -> Vec<String> {
    let start = sql.find(" VALUES ").unwrap() + " VALUES ".len();
    let end = sql.find(" ON DUPLICATE KEY UPDATE ").unwrap();
    sql[start..end]
        .split("),(")
        .map(|t| t.trim_matches(|c| c == '(' || c == ')').to_string())
        .collect()
}

#[tokio::test]
async fn test_users_scenario() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    let rows = vec![
        Row::new().set("id", 1).set("name", "a").set("score", 10),
        Row::new().set("id", 2).set("name", "b").set("score", 20),
    ];

    let report = UpsertBatch::new("users")
        .extra("updated_at", SqlValue::raw("NOW()"))
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap();

    assert_eq!(report.statements, 1);
    assert_eq!(
        dry.statements(),
        [
            "INSERT INTO `users` (id,name,score) VALUES (1,'a',10),(2,'b',20) \
             ON DUPLICATE KEY UPDATE id=VALUES(id), name=VALUES(name), score=VALUES(score), updated_at= NOW()"
        ]
    );
}

#[tokio::test]
async fn test_301_rows_three_statements_in_order() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    let rows = numbered_rows(301);

    let report = UpsertBatch::new("users")
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap();

    assert_eq!(report.statements, 3);
    assert_eq!(report.rows, 301);

    let sizes: Vec<usize> = dry.statements().iter().map(|s| tuples(s).len()).collect();
    assert_eq!(sizes, vec![150, 150, 1]);

    let all: Vec<String> = dry.statements().iter().flat_map(|s| tuples(s)).collect();
    let expected: Vec<String> = (0..301).map(|i| format!("{},'user{}'", i, i)).collect();
    assert_eq!(all, expected);
}

#[tokio::test]
async fn test_statement_count_is_ceiling_of_rows() {
    for n in [1usize, 149, 150, 151, 299, 300, 301, 1000] {
        let mut dry = DryRun::new();
        let mut staging = StagingBuffer::new();
        let rows = numbered_rows(n);
        UpsertBatch::new("t")
            .execute(&mut dry, &mut staging, Some(rows.as_slice()))
            .await
            .unwrap();

        assert_eq!(dry.statements().len(), n.div_ceil(NUMBER_PER_BATCH_INSERT), "rows = {}", n);
        let total: usize = dry.statements().iter().map(|s| tuples(s).len()).sum();
        assert_eq!(total, n);
    }
}

#[tokio::test]
async fn test_exclusion_removes_column_from_update() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    let rows = vec![Row::new().set("id", 1).set("name", "a")];

    UpsertBatch::new("users")
        .exclude(["id"])
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap();

    assert!(dry.statements()[0].ends_with("ON DUPLICATE KEY UPDATE name=VALUES(name)"));
}

#[tokio::test]
async fn test_quoted_exclusion_from_cli_list() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    let rows = vec![Row::new().set("id", 1).set("name", "a")];
    let exclude = parse_columns("`id`").unwrap();

    UpsertBatch::new("users")
        .exclude(exclude)
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap();

    assert!(dry.statements()[0].ends_with("ON DUPLICATE KEY UPDATE name=VALUES(name)"));
}

#[tokio::test]
async fn test_injected_names_stay_single_identifiers() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    let rows = vec![Row::new().set("`a`,`b`", 1)];

    UpsertBatch::new("`users` WHERE 1; DROP TABLE t; -- `")
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap();

    assert_eq!(
        dry.statements(),
        [
            "INSERT INTO ```users`` WHERE 1; DROP TABLE t; -- ``` (```a``,``b```) VALUES (1) \
             ON DUPLICATE KEY UPDATE ```a``,``b```=VALUES(```a``,``b```)"
        ]
    );
}

#[tokio::test]
async fn test_missing_table_reported_before_data() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();

    let err = UpsertBatch::new("")
        .execute(&mut dry, &mut staging, None)
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::NoTable));
    assert_eq!(err.message_key(), "db_must_set_table");
}

#[tokio::test]
async fn test_empty_data_reports_no_valid_data() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    let rows: Vec<Row> = Vec::new();

    let err = UpsertBatch::new("users")
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::NoValidData));
    assert_eq!(err.message_key(), "db_must_use_set");
}

#[tokio::test]
async fn test_uses_previously_staged_rows_and_default_table() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    staging.from("scores");
    staging
        .set_insert_batch(&[Row::new().set("id", 5).set("score", 1)], &dry)
        .unwrap();

    UpsertBatch::new("")
        .exclude(["id"])
        .execute(&mut dry, &mut staging, None)
        .await
        .unwrap();

    assert_eq!(
        dry.statements(),
        ["INSERT INTO `scores` (id,score) VALUES (5,1) ON DUPLICATE KEY UPDATE score=VALUES(score)"]
    );
    assert!(staging.is_empty());
}

#[tokio::test]
async fn test_everything_excluded_fails_fast() {
    let mut dry = DryRun::new();
    let mut staging = StagingBuffer::new();
    let rows = vec![Row::new().set("id", 1)];

    let err = UpsertBatch::new("users")
        .exclude(["id"])
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::EmptyUpdateClause));
    assert!(dry.statements().is_empty());
}

#[tokio::test]
async fn test_quoted_identifier_style() {
    let mut dry = DryRun::with_escaper(MysqlEscaper::with_style(IdentifierStyle::Always));
    let mut staging = StagingBuffer::new();
    let rows = vec![Row::new().set("id", 1).set("order", 2)];

    UpsertBatch::new("shop.orders")
        .exclude(["id"])
        .extra("touched", true)
        .execute(&mut dry, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap();

    assert_eq!(
        dry.statements(),
        [
            "INSERT INTO `shop`.`orders` (`id`,`order`) VALUES (1,2) \
             ON DUPLICATE KEY UPDATE `order`=VALUES(`order`), `touched`= 1"
        ]
    );
}

/// Fails on the n-th statement.
struct FailingExecutor {
    inner: DryRun,
    fail_at: usize,
}

impl SqlEscaper for FailingExecutor {
    fn escape_identifier(&self, name: &str) -> String {
        self.inner.escape_identifier(name)
    }

    fn protect_table(&self, name: &str) -> String {
        self.inner.protect_table(name)
    }

    fn escape_value(&self, value: &SqlValue) -> String {
        self.inner.escape_value(value)
    }
}

impl QueryExecutor for FailingExecutor {
    fn execute<'a>(&'a mut self, sql: &'a str) -> ExecFuture<'a> {
        if self.inner.statements().len() + 1 == self.fail_at {
            return Box::pin(async { Err(UpsertError::Execution("Duplicate entry".into())) });
        }
        self.inner.execute(sql)
    }
}

#[tokio::test]
async fn test_failing_chunk_stops_and_keeps_staging() {
    let mut db = FailingExecutor {
        inner: DryRun::new(),
        fail_at: 2,
    };
    let mut staging = StagingBuffer::new();
    let rows = numbered_rows(400);

    let err = UpsertBatch::new("users")
        .execute(&mut db, &mut staging, Some(rows.as_slice()))
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::Execution(_)));
    assert_eq!(db.inner.statements().len(), 1);
    assert_eq!(staging.row_count(), 400);
}
