//! Retrieval source contracts.
//!
//! Each source is an opaque remote collaborator with its own availability
//! characteristics; the orchestrator only sees these narrow traits. The
//! embedding service is a seam of its own so that an embed failure fails
//! the vector source, never the whole query.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::models::EntityType;
use crate::graph::{GraphStore, RelationshipType};

/// Failure reported by a retrieval source.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A candidate returned by a source: canonical id plus normalized score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub entity_id: String,
    pub score: f32,
}

impl ScoredId {
    pub fn new(entity_id: impl Into<String>, score: f32) -> Self {
        Self {
            entity_id: entity_id.into(),
            score,
        }
    }
}

/// A graph-store candidate, optionally carrying related entities the
/// traversal surfaced alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphHit {
    pub entity_id: String,
    pub score: f32,
    #[serde(default)]
    pub related: Vec<String>,
}

/// Filters a graph search may honor.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub project: Option<String>,
    pub entity_type: Option<EntityType>,
}

/// Embedding service for query text.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed(&self, query: &str) -> Result<Vec<f32>, SourceError>;
}

/// Vector similarity index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredId>, SourceError>;
}

/// Graph-store text/traversal search.
#[async_trait]
pub trait GraphSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> Result<Vec<GraphHit>, SourceError>;
}

/// Quality scoring service: rates one entity in [0, 1].
#[async_trait]
pub trait QualityScorer: Send + Sync {
    async fn score(&self, entity_id: &str) -> Result<f32, SourceError>;
}

/// Graph search backed by the local store: substring matching on entity
/// names and file paths, with 1-hop RELATES neighbors attached.
pub struct StoreGraphSource {
    store: Arc<GraphStore>,
}

impl StoreGraphSource {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GraphSearch for StoreGraphSource {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> Result<Vec<GraphHit>, SourceError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .store
            .text_match_nodes(&needle, filters.project.as_deref(), k)
            .await
            .map_err(|e| SourceError(e.to_string()))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(wanted) = filters.entity_type {
                let actual = row.entity_type.as_deref().and_then(EntityType::parse);
                if actual != Some(wanted) {
                    continue;
                }
            }

            let name = row.name.as_deref().unwrap_or("").to_lowercase();
            let score = if name == needle {
                1.0
            } else if name.contains(&needle) {
                0.7
            } else {
                // Matched on path only.
                0.4
            };

            let related = self
                .store
                .edges_from(RelationshipType::Relates, &row.entity_id)
                .await
                .map(|edges| edges.into_iter().map(|e| e.target_id).take(5).collect())
                .unwrap_or_default();

            hits.push(GraphHit {
                entity_id: row.entity_id,
                score,
                related,
            });
        }

        Ok(hits)
    }
}
