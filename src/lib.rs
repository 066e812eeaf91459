//! # upsert-batch
//!
//! Batched `INSERT ... ON DUPLICATE KEY UPDATE` for MySQL.
//!
//! Rows are staged, split into chunks of [`NUMBER_PER_BATCH_INSERT`] and
//! written with one upsert statement per chunk.
//!
//! ## Quick Example
//!
//! ```
//! use upsert_batch::prelude::*;
//!
//! let escaper = MysqlEscaper::new();
//! let mut staging = StagingBuffer::new();
//! staging
//!     .set_insert_batch(
//!         &[
//!             Row::new().set("id", 1).set("name", "a").set("score", 10),
//!             Row::new().set("id", 2).set("name", "b").set("score", 20),
//!         ],
//!         &escaper,
//!     )
//!     .unwrap();
//!
//! let sql: Vec<String> = UpsertBatch::new("users")
//!     .extra("updated_at", SqlValue::raw("NOW()"))
//!     .statements(&escaper, &staging)
//!     .unwrap()
//!     .map(|(_, sql)| sql)
//!     .collect();
//!
//! assert_eq!(
//!     sql[0],
//!     "INSERT INTO `users` (id,name,score) VALUES (1,'a',10),(2,'b',20) \
//!      ON DUPLICATE KEY UPDATE id=VALUES(id), name=VALUES(name), score=VALUES(score), updated_at= NOW()"
//! );
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod escape;
pub mod logger;
pub mod parser;
pub mod staging;
pub mod transpiler;
pub mod value;

pub use batch::{NUMBER_PER_BATCH_INSERT, UpsertBatch, UpsertReport};

pub mod prelude {
    pub use crate::batch::{NUMBER_PER_BATCH_INSERT, Statements, UpsertBatch, UpsertReport};
    pub use crate::config::Config;
    pub use crate::engine::{DryRun, QueryExecutor, UpsertDb};
    pub use crate::error::*;
    pub use crate::escape::{IdentifierStyle, MysqlEscaper, SqlEscaper};
    pub use crate::staging::{Row, StagingBuffer};
    pub use crate::value::SqlValue;
}
