//! Lattice core: a content-addressed knowledge graph engine.
//!
//! The engine ingests extracted document/code entities and relationships
//! into a persistent graph, keeps the containment hierarchy consistent
//! under concurrent idempotent writes, and answers queries by fanning out
//! across heterogeneous retrieval sources and merging the results into a
//! single ranked response.
//!
//! # Components
//!
//! - [`graph::ident`] - deterministic, content-addressed entity identifiers
//! - [`graph::MutationLayer`] - idempotent node/edge upserts with bounded
//!   retry on transient write conflicts
//! - [`graph::TreeReconciler`] - detects and repairs containment orphans
//! - [`search::HybridSearcher`] - concurrent multi-source retrieval with
//!   weighted score merging under a latency budget
//! - [`ingest::IngestPipeline`] - the extraction-feed boundary with bounded
//!   in-flight batches and post-batch reconciliation

pub mod config;
pub mod graph;
pub mod ingest;
pub mod search;

pub use config::{ConfigError, EngineConfig, IngestConfig, RetryConfig, SearchConfig, StoreConfig};
pub use graph::{
    BatchSummary, EdgeUpsert, EntityType, GraphEngine, GraphError, GraphStats, GraphStore,
    IdFormat, IdValidation, ItemError, MutationLayer, NodeKind, NodeRef, NodeUpsert,
    ReconcileReport, RelRef, RelationshipType, TreeReconciler,
};
pub use ingest::{
    DocumentBatch, IngestPipeline, IngestReport, NodeIdentity, NodeInput, RelationshipInput,
};
pub use search::{
    GraphHit, GraphSearch, HybridSearcher, MergedHit, QualityScorer, QueryEmbedder, ScoredId,
    SearchError, SearchFilters, SearchMode, SearchResponse, SourceError, StoreGraphSource,
    VectorIndex,
};
