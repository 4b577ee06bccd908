//! Step Registry & Versioning, Pipeline Runner, and Backfill Engine (spec
//! components C5, C6, C8).
//!
//! ## Modules
//! - `registry` - explicit step registration, version hashing, topological
//!   execution order
//! - `context` - `Context`, `StepResult`, `PipelineConfig`
//! - `runner` - `run_pipeline`
//! - `backfill` - staleness detection and re-running stale steps in bulk
//! - `error` - `PipelineError`

pub mod backfill;
pub mod context;
pub mod error;
pub mod registry;
pub mod runner;

pub use backfill::{
    backfill_counts, backfill_queue, run_backfill, run_backfill_all, status_report, BackfillError, BackfillItem,
    BackfillSummary, QUARANTINE_THRESHOLD,
};
pub use context::{Context, PipelineConfig, StepResult};
pub use error::{PipelineError, PipelineResult};
pub use registry::{version_hash_of_source, Step, StepMetadata, StepRegistry};
pub use runner::run_pipeline;
