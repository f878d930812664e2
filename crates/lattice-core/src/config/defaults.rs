//! Built-in default values for the engine configuration.

/// Default directory for the graph store (relative to the working directory).
pub const DEFAULT_DATA_DIR: &str = ".lattice/graph";

/// Maximum number of retries after a transient write conflict.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base backoff delay before the first retry, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Backoff multiplier applied per retry (100ms -> 200ms -> 400ms).
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Overall deadline for one hybrid query, in milliseconds.
pub const DEFAULT_OVERALL_DEADLINE_MS: u64 = 1000;

/// Per-source timeout inside the overall deadline, in milliseconds.
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 400;

/// Merge weight for the vector index source.
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.5;

/// Merge weight for the graph store source.
pub const DEFAULT_GRAPH_WEIGHT: f32 = 0.3;

/// Merge weight for the quality scoring source.
pub const DEFAULT_QUALITY_WEIGHT: f32 = 0.2;

/// Additive bonus per corroborating source beyond the first.
pub const DEFAULT_CORROBORATION_BONUS: f32 = 0.05;

/// How many candidates to request from each source before merging.
pub const DEFAULT_CANDIDATE_POOL: usize = 50;

/// Default number of merged results to return.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Maximum number of ingest batches allowed in flight at once.
pub const DEFAULT_MAX_INFLIGHT_BATCHES: usize = 2;

/// Target number of items per ingest batch.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// How many orphan paths to include verbatim in a reconcile report.
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;
