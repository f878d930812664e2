//! Hybrid retrieval orchestration.
//!
//! A query fans out concurrently to the configured retrieval sources -
//! vector index, graph store, quality scorer - each under its own timeout
//! inside one overall deadline. A source that errors or runs out of time
//! contributes nothing and is recorded as failed; it never fails the
//! query. Only when every candidate source fails does the call return an
//! error, so callers can always tell "no matches" apart from "the
//! backends were down".
//!
//! Candidates from all sources are merged by canonical entity id with
//! per-source weights and a corroboration bonus; see [`merge`].

mod merge;
mod sources;

pub use merge::{merge_results, MergedHit, SourceResult};
pub use sources::{
    GraphHit, GraphSearch, QualityScorer, QueryEmbedder, ScoredId, SearchFilters, SourceError,
    StoreGraphSource, VectorIndex,
};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SearchConfig;

/// Name of the vector index source in reports.
pub const SOURCE_VECTOR: &str = "vector";

/// Name of the graph store source in reports.
pub const SOURCE_GRAPH: &str = "graph";

/// Name of the quality scoring source in reports.
pub const SOURCE_QUALITY: &str = "quality";

/// Which sources participate in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    All,
    VectorOnly,
    GraphOnly,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "hybrid" => Ok(SearchMode::All),
            "vector" | "vector-only" => Ok(SearchMode::VectorOnly),
            "graph" | "graph-only" => Ok(SearchMode::GraphOnly),
            other => Err(format!("unknown search mode `{}`", other)),
        }
    }
}

/// Search errors. Partial source failures are not errors - they surface
/// through [`SearchResponse::degraded`] instead.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("all retrieval sources failed: {}", sources.join(", "))]
    AllSourcesFailed { sources: Vec<String> },

    #[error("no candidate sources configured for mode {mode:?}")]
    NoSources { mode: SearchMode },
}

/// The merged answer to one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<MergedHit>,
    pub sources_queried: Vec<String>,
    pub sources_failed: Vec<String>,
    /// Distinct candidates seen before truncation.
    pub total_candidates: usize,
    pub latency_ms: u64,
    /// True when at least one participating source failed.
    pub degraded: bool,
}

/// One source's outcome during fan-out.
struct SourceOutcome {
    name: &'static str,
    weight: f32,
    result: Result<Vec<ScoredId>, String>,
}

/// Concurrent multi-source retrieval with weighted merging.
pub struct HybridSearcher {
    config: SearchConfig,
    embedder: Option<Arc<dyn QueryEmbedder>>,
    vector: Option<Arc<dyn VectorIndex>>,
    graph: Option<Arc<dyn GraphSearch>>,
    quality: Option<Arc<dyn QualityScorer>>,
    filters: SearchFilters,
}

impl HybridSearcher {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            embedder: None,
            vector: None,
            graph: None,
            quality: None,
            filters: SearchFilters::default(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn QueryEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_vector(mut self, vector: Arc<dyn VectorIndex>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_graph(mut self, graph: Arc<dyn GraphSearch>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_quality(mut self, quality: Arc<dyn QualityScorer>) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Run one query. Candidate sources fan out concurrently; the quality
    /// scorer then rates the candidate union inside the remaining
    /// deadline. Results are merged, deduplicated and truncated to
    /// `max_results`.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        mode: SearchMode,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let deadline = Duration::from_millis(self.config.overall_deadline_ms);
        let k = self.config.candidate_pool.max(max_results);

        let vector_active =
            matches!(mode, SearchMode::All | SearchMode::VectorOnly) && self.vector.is_some();
        let graph_active =
            matches!(mode, SearchMode::All | SearchMode::GraphOnly) && self.graph.is_some();
        let quality_active = matches!(mode, SearchMode::All) && self.quality.is_some();

        if !vector_active && !graph_active {
            return Err(SearchError::NoSources { mode });
        }

        let vector_fut = async {
            if !vector_active {
                return None;
            }
            Some(SourceOutcome {
                name: SOURCE_VECTOR,
                weight: self.config.vector_weight,
                result: self.query_vector(query, k, started, deadline).await,
            })
        };
        let graph_fut = async {
            if !graph_active {
                return None;
            }
            Some(SourceOutcome {
                name: SOURCE_GRAPH,
                weight: self.config.graph_weight,
                result: self.query_graph(query, k, started, deadline).await,
            })
        };

        let (vector_outcome, graph_outcome) = tokio::join!(vector_fut, graph_fut);
        let mut outcomes: Vec<SourceOutcome> =
            [vector_outcome, graph_outcome].into_iter().flatten().collect();

        // The scorer cannot enumerate candidates; it rates the union the
        // candidate sources produced, within whatever deadline is left.
        let candidates: BTreeSet<String> = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flat_map(|hits| hits.iter().map(|h| h.entity_id.clone()))
            .collect();

        if quality_active && !candidates.is_empty() {
            outcomes.push(SourceOutcome {
                name: SOURCE_QUALITY,
                weight: self.config.quality_weight,
                result: self.query_quality(&candidates, started, deadline).await,
            });
        }

        let mut sources_queried = Vec::new();
        let mut sources_failed = Vec::new();
        let mut source_results = Vec::new();

        for outcome in outcomes {
            sources_queried.push(outcome.name.to_string());
            match outcome.result {
                Ok(hits) => source_results.push(SourceResult {
                    source: outcome.name.to_string(),
                    weight: outcome.weight,
                    hits,
                }),
                Err(cause) => {
                    warn!(source = outcome.name, cause, "retrieval source failed");
                    sources_failed.push(outcome.name.to_string());
                }
            }
        }

        if source_results.is_empty() {
            return Err(SearchError::AllSourcesFailed {
                sources: sources_failed,
            });
        }

        let merged = merge_results(
            &source_results,
            self.config.corroboration_bonus,
            usize::MAX,
        );
        let total_candidates = merged.len();
        let mut results = merged;
        results.truncate(max_results);

        let degraded = !sources_failed.is_empty();
        let response = SearchResponse {
            results,
            sources_queried,
            sources_failed,
            total_candidates,
            latency_ms: started.elapsed().as_millis() as u64,
            degraded,
        };

        debug!(
            query,
            candidates = response.total_candidates,
            returned = response.results.len(),
            degraded = response.degraded,
            latency_ms = response.latency_ms,
            "hybrid search complete"
        );

        Ok(response)
    }

    /// Per-source budget: the configured timeout, shrunk to whatever is
    /// left of the overall deadline.
    fn source_budget(&self, started: Instant, deadline: Duration) -> Duration {
        let remaining = deadline.saturating_sub(started.elapsed());
        Duration::from_millis(self.config.source_timeout_ms).min(remaining)
    }

    async fn query_vector(
        &self,
        query: &str,
        k: usize,
        started: Instant,
        deadline: Duration,
    ) -> Result<Vec<ScoredId>, String> {
        let vector = match &self.vector {
            Some(v) => v,
            None => return Err("vector index not configured".to_string()),
        };
        let embedder = match &self.embedder {
            Some(e) => e,
            None => return Err("no query embedder configured".to_string()),
        };

        let budget = self.source_budget(started, deadline);
        let call = async {
            let embedding = embedder.embed(query).await.map_err(|e| e.to_string())?;
            vector.search(&embedding, k).await.map_err(|e| e.to_string())
        };

        match tokio::time::timeout(budget, call).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {}ms", budget.as_millis())),
        }
    }

    async fn query_graph(
        &self,
        query: &str,
        k: usize,
        started: Instant,
        deadline: Duration,
    ) -> Result<Vec<ScoredId>, String> {
        let graph = match &self.graph {
            Some(g) => g,
            None => return Err("graph source not configured".to_string()),
        };

        let budget = self.source_budget(started, deadline);
        let call = async {
            graph
                .search(query, &self.filters, k)
                .await
                .map_err(|e| e.to_string())
        };

        match tokio::time::timeout(budget, call).await {
            Ok(Ok(hits)) => Ok(hits
                .into_iter()
                .map(|h| ScoredId::new(h.entity_id, h.score))
                .collect()),
            Ok(Err(cause)) => Err(cause),
            Err(_) => Err(format!("timed out after {}ms", budget.as_millis())),
        }
    }

    async fn query_quality(
        &self,
        candidates: &BTreeSet<String>,
        started: Instant,
        deadline: Duration,
    ) -> Result<Vec<ScoredId>, String> {
        let scorer = match &self.quality {
            Some(s) => s,
            None => return Err("quality scorer not configured".to_string()),
        };

        let budget = self.source_budget(started, deadline);
        let call = join_all(candidates.iter().map(|id| async move {
            match scorer.score(id).await {
                Ok(score) => Some(ScoredId::new(id.clone(), score.clamp(0.0, 1.0))),
                Err(cause) => {
                    debug!(entity_id = %id, %cause, "quality score unavailable");
                    None
                }
            }
        }));

        match tokio::time::timeout(budget, call).await {
            Ok(scored) => Ok(scored.into_iter().flatten().collect()),
            Err(_) => Err(format!("timed out after {}ms", budget.as_millis())),
        }
    }
}
