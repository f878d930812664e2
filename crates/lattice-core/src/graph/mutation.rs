//! Idempotent graph mutation layer.
//!
//! Converges the graph toward a described state: every write is a
//! merge-by-identity upsert, so applying the same input twice leaves one
//! node or edge behind. Entity ids are validated before any write reaches
//! the store, transient commit conflicts are retried with bounded backoff,
//! and batches are applied per-item so a single bad record never blocks
//! the rest of a document.
//!
//! The layer is stateless between calls; all coordination between
//! concurrent writers is delegated to the store's own concurrency control.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::error::GraphError;
use super::ident;
use super::models::{EdgeUpsert, NodeKind, NodeRef, NodeUpsert, RelRef, RelationshipType};
use super::retry::RetryPolicy;
use super::store::GraphStore;
use crate::config::RetryConfig;

/// One failed item inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    /// The item the failure belongs to: an entity id, or
    /// `source -TYPE-> target` for relationships.
    pub item: String,
    /// Cause, as reported by validation or the store.
    pub error: String,
}

/// Outcome of applying one batch of nodes and relationships.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub stored: usize,
    pub failed: usize,
    pub errors: Vec<ItemError>,
    pub duration_ms: u64,
}

impl BatchSummary {
    /// Fold another summary into this one.
    pub fn absorb(&mut self, other: BatchSummary) {
        self.stored += other.stored;
        self.failed += other.failed;
        self.errors.extend(other.errors);
        self.duration_ms += other.duration_ms;
    }
}

/// Idempotent upsert operations against the graph store.
pub struct MutationLayer {
    store: Arc<GraphStore>,
    retry: RetryPolicy,
}

impl MutationLayer {
    pub fn new(store: Arc<GraphStore>, retry_config: &RetryConfig) -> Self {
        Self {
            store,
            retry: RetryPolicy::new(retry_config),
        }
    }

    /// Access to the underlying store, for read paths.
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Validate then merge a node. Invalid ids fail fast; nothing is
    /// written for them.
    pub async fn upsert_node(
        &self,
        kind: NodeKind,
        entity_id: &str,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Result<NodeRef, GraphError> {
        let check = ident::validate(entity_id, kind);
        if !check.is_valid {
            return Err(GraphError::Validation {
                id: entity_id.to_string(),
                format: check.detected_format,
                message: check
                    .error
                    .unwrap_or_else(|| "entity id rejected".to_string()),
            });
        }

        let node = NodeUpsert {
            kind,
            entity_id: entity_id.to_string(),
            properties,
        };
        self.retry.run(|| self.store.upsert_node_raw(&node)).await
    }

    /// Validate both endpoints, probe that they exist, then merge the
    /// edge. A missing endpoint is a structural error and is not retried.
    pub async fn upsert_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        rel_type: RelationshipType,
        confidence_score: f32,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Result<RelRef, GraphError> {
        let source_kind = self.endpoint_kind(source_id)?;
        let target_kind = self.endpoint_kind(target_id)?;

        if !self.store.node_exists(source_kind, source_id).await? {
            return Err(GraphError::Structural(format!(
                "relationship source `{}` does not exist",
                source_id
            )));
        }
        if !self.store.node_exists(target_kind, target_id).await? {
            return Err(GraphError::Structural(format!(
                "relationship target `{}` does not exist",
                target_id
            )));
        }

        let edge = EdgeUpsert {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            rel_type,
            confidence_score,
            properties,
        };
        self.retry.run(|| self.store.upsert_edge_raw(&edge)).await
    }

    fn endpoint_kind(&self, id: &str) -> Result<NodeKind, GraphError> {
        ident::kind_for_id(id).ok_or_else(|| GraphError::Validation {
            id: id.to_string(),
            format: ident::detect_format(id),
            message: format!("`{}` is not a canonical or stub entity id", id),
        })
    }

    /// Apply one extracted batch: every item upserted independently, nodes
    /// before relationships so endpoints created in the same batch are
    /// visible to the edge probes. Item order within each group is
    /// concurrent and undefined.
    pub async fn apply_batch(
        &self,
        nodes: Vec<NodeUpsert>,
        relationships: Vec<EdgeUpsert>,
    ) -> BatchSummary {
        let started = Instant::now();
        let mut summary = BatchSummary::default();

        let node_outcomes = join_all(nodes.into_iter().map(|node| async move {
            let label = node.entity_id.clone();
            let result = self
                .upsert_node(node.kind, &node.entity_id, node.properties)
                .await;
            (label, result.map(|_| ()))
        }))
        .await;

        let edge_outcomes = join_all(relationships.into_iter().map(|edge| async move {
            let label = format!(
                "{} -{}-> {}",
                edge.source_id, edge.rel_type, edge.target_id
            );
            let result = self
                .upsert_relationship(
                    &edge.source_id,
                    &edge.target_id,
                    edge.rel_type,
                    edge.confidence_score,
                    edge.properties,
                )
                .await;
            (label, result.map(|_| ()))
        }))
        .await;

        for (item, result) in node_outcomes.into_iter().chain(edge_outcomes) {
            match result {
                Ok(()) => summary.stored += 1,
                Err(err) => {
                    summary.failed += 1;
                    summary.errors.push(ItemError {
                        item,
                        error: err.to_string(),
                    });
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        summary
    }
}
