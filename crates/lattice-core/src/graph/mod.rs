//! The content-addressed knowledge graph.
//!
//! This module owns the graph side of the engine:
//!
//! - [`ident`] - canonical entity id generation and validation
//! - [`GraphStore`] - the embedded store (SurrealDB over RocksDB)
//! - [`MutationLayer`] - idempotent, conflict-tolerant upserts
//! - [`TreeReconciler`] - containment-orphan detection and repair
//! - [`GraphEngine`] - facade wiring the layers together
//!
//! # Storage
//!
//! Nodes live in one table per kind, keyed by canonical id; relationships
//! live in one table per type, keyed by `[source_id, target_id]`. All
//! writes are merge-by-identity, so repeated ingestion of unchanged
//! content converges instead of duplicating.

mod error;
mod mutation;
mod reconcile;
mod retry;
mod store;

pub mod ident;
pub mod models;

pub use error::GraphError;
pub use ident::{IdFormat, IdValidation};
pub use models::{EdgeUpsert, EntityType, NodeKind, NodeRef, NodeUpsert, RelRef, RelationshipType};
pub use mutation::{BatchSummary, ItemError, MutationLayer};
pub use reconcile::{ReconcileReport, TreeReconciler};
pub use retry::RetryPolicy;
pub use store::{EdgeRow, GraphStats, GraphStore, NodeRow};

use std::path::Path;
use std::sync::Arc;

use crate::config::EngineConfig;

/// Facade over the graph layers, wired from one immutable config.
pub struct GraphEngine {
    store: Arc<GraphStore>,
    mutation: Arc<MutationLayer>,
    reconciler: Arc<TreeReconciler>,
}

impl GraphEngine {
    /// Open the store at the configured location, initializing the schema
    /// on first use.
    pub async fn open(config: &EngineConfig) -> Result<Self, GraphError> {
        Self::open_at(&config.store.data_path(), config).await
    }

    /// Open the store at an explicit path.
    pub async fn open_at(path: &Path, config: &EngineConfig) -> Result<Self, GraphError> {
        let store = Arc::new(GraphStore::open(path).await?);
        if !store.is_initialized().await? {
            store.initialize_schema().await?;
        }

        let mutation = Arc::new(MutationLayer::new(Arc::clone(&store), &config.retry));
        let reconciler = Arc::new(TreeReconciler::new(
            Arc::clone(&store),
            Arc::clone(&mutation),
            config.ingest.sample_limit,
        ));

        Ok(Self {
            store,
            mutation,
            reconciler,
        })
    }

    /// The underlying store, for read paths.
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// The mutation layer.
    pub fn mutation(&self) -> &Arc<MutationLayer> {
        &self.mutation
    }

    /// The tree reconciler.
    pub fn reconciler(&self) -> &Arc<TreeReconciler> {
        &self.reconciler
    }

    /// On-demand repair pass for one project.
    pub async fn repair_project(&self, project_name: &str) -> Result<ReconcileReport, GraphError> {
        self.reconciler.reconcile_project(project_name).await
    }

    /// Node and edge counts.
    pub async fn stats(&self) -> Result<GraphStats, GraphError> {
        self.store.stats().await
    }
}
