//! Aggregation pipelines over document collections.
//!
//! ```text
//! Root collection
//!       ↓
//! Limit                    (types.rs)
//!       ↓
//! Join → Flatten  (×n)     (executor.rs, hash join per stage)
//!       ↓
//! AddFields / GroupBy      (eval.rs expressions, accumulators)
//!       ↓
//! Project                  → flat output documents
//! ```
//!
//! Queries are built as data with the [`Pipeline`] builder and executed
//! against an immutable [`crate::db::Dataset`].
pub mod doc;
pub mod error;
pub mod eval;
pub mod executor;
pub mod types;

pub use error::{PipelineError, PipelineResult};
pub use executor::{ExecutionStats, PipelineOutput};
pub use types::{Accumulator, ExecOptions, Expr, NumericPolicy, Pipeline, Stage};
