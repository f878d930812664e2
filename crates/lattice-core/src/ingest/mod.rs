//! Ingest pipeline: the extraction-feed boundary.
//!
//! Upstream extraction supplies one [`DocumentBatch`] per document: node
//! records described by their identity material and relationship records
//! described by endpoint identities. The pipeline resolves identities to
//! canonical ids, applies everything through the mutation layer with
//! per-item success/failure, and runs a reconciliation pass over each
//! touched project afterwards.
//!
//! Backpressure: at most `max_inflight_batches` documents are processed
//! concurrently, bounding load on the store. A reconcile failure is
//! logged and reported, never raised - the batch's node and relationship
//! data has already committed by then.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::graph::models::{EdgeUpsert, NodeKind, NodeUpsert, RelationshipType};
use crate::graph::{ident, BatchSummary, GraphError, MutationLayer, ReconcileReport, TreeReconciler};

/// Identity material for one node record, as supplied by extraction.
///
/// A closed union: the canonicalizer derives the entity id from the
/// variant, so the feed never invents id strings of its own (except via
/// [`NodeIdentity::Canonical`], which is validated like any other input).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeIdentity {
    /// A project root, keyed by name.
    Project { name: String },
    /// A directory, keyed by (project, path).
    Directory { project: String, path: String },
    /// A file with extractable content, keyed by its content hash.
    FileContent {
        project: String,
        #[serde(default)]
        path: Option<String>,
        content_hash: String,
    },
    /// A file whose content was unavailable; weaker metadata identity.
    FileMetadata {
        project: String,
        path: String,
        size: u64,
        mtime_epoch: i64,
    },
    /// An extracted entity, keyed by (name, owning file hash).
    Entity {
        project: String,
        name: String,
        owning_file_hash: String,
    },
    /// An external symbol with no extractable definition.
    Stub { name: String },
    /// A pre-canonicalized id; validated on write like everything else.
    Canonical { kind: NodeKind, entity_id: String },
}

impl NodeIdentity {
    /// The node kind this identity produces.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeIdentity::Project { .. } => NodeKind::Project,
            NodeIdentity::Directory { .. } => NodeKind::Directory,
            NodeIdentity::FileContent { .. } | NodeIdentity::FileMetadata { .. } => NodeKind::File,
            NodeIdentity::Entity { .. } | NodeIdentity::Stub { .. } => NodeKind::Entity,
            NodeIdentity::Canonical { kind, .. } => *kind,
        }
    }

    /// Canonical id for this identity.
    pub fn entity_id(&self) -> String {
        match self {
            NodeIdentity::Project { name } => ident::project_id(name),
            NodeIdentity::Directory { project, path } => ident::directory_id(project, path),
            NodeIdentity::FileContent { content_hash, .. } => ident::file_id(content_hash),
            NodeIdentity::FileMetadata {
                path, size, mtime_epoch, ..
            } => ident::file_id_from_metadata(path, *size, *mtime_epoch),
            NodeIdentity::Entity {
                name, owning_file_hash, ..
            } => ident::entity_id(name, owning_file_hash),
            NodeIdentity::Stub { name } => ident::stub_id(name),
            NodeIdentity::Canonical { entity_id, .. } => entity_id.clone(),
        }
    }

    /// The project this identity is scoped to, when it names one.
    pub fn project(&self) -> Option<&str> {
        match self {
            NodeIdentity::Project { name } => Some(name),
            NodeIdentity::Directory { project, .. }
            | NodeIdentity::FileContent { project, .. }
            | NodeIdentity::FileMetadata { project, .. }
            | NodeIdentity::Entity { project, .. } => Some(project),
            NodeIdentity::Stub { .. } | NodeIdentity::Canonical { .. } => None,
        }
    }

    /// Properties derived from the identity itself. These are
    /// authoritative and overwrite anything the feed supplied under the
    /// same keys.
    fn base_properties(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut props = serde_json::Map::new();
        let mut put = |k: &str, v: String| {
            props.insert(k.to_string(), serde_json::Value::String(v));
        };

        match self {
            NodeIdentity::Project { name } => {
                put("project_name", name.clone());
                put("name", name.clone());
            }
            NodeIdentity::Directory { project, path } => {
                put("project_name", project.clone());
                put("path", path.trim_matches('/').to_string());
                if let Some(name) = path.trim_matches('/').rsplit('/').next() {
                    put("name", name.to_string());
                }
            }
            NodeIdentity::FileContent {
                project,
                path,
                content_hash,
            } => {
                put("project_name", project.clone());
                put("content_hash", content_hash.clone());
                if let Some(path) = path {
                    put("path", path.trim_matches('/').to_string());
                }
            }
            NodeIdentity::FileMetadata { project, path, .. } => {
                put("project_name", project.clone());
                put("path", path.trim_matches('/').to_string());
            }
            NodeIdentity::Entity {
                project,
                name,
                owning_file_hash,
            } => {
                put("project_name", project.clone());
                put("name", name.clone());
                put("file_hash", owning_file_hash.clone());
            }
            NodeIdentity::Stub { name } => {
                put("name", name.clone());
                put("entity_type", "reference".to_string());
            }
            NodeIdentity::Canonical { .. } => {}
        }

        props
    }
}

/// One node record from the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInput {
    #[serde(flatten)]
    pub identity: NodeIdentity,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl NodeInput {
    /// Resolve to a concrete write.
    pub fn resolve(&self) -> NodeUpsert {
        let mut properties = self.properties.clone();
        properties.extend(self.identity.base_properties());
        NodeUpsert {
            kind: self.identity.kind(),
            entity_id: self.identity.entity_id(),
            properties,
        }
    }
}

fn default_confidence() -> f32 {
    1.0
}

/// One relationship record from the feed, endpoints given as identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipInput {
    pub source: NodeIdentity,
    pub target: NodeIdentity,
    pub rel_type: RelationshipType,
    #[serde(default = "default_confidence")]
    pub confidence_score: f32,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl RelationshipInput {
    /// Resolve to a concrete write.
    pub fn resolve(&self) -> EdgeUpsert {
        EdgeUpsert {
            source_id: self.source.entity_id(),
            target_id: self.target.entity_id(),
            rel_type: self.rel_type,
            confidence_score: self.confidence_score,
            properties: self.properties.clone(),
        }
    }
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentBatch {
    /// Source document label, for reporting.
    pub document: String,
    #[serde(default)]
    pub nodes: Vec<NodeInput>,
    #[serde(default)]
    pub relationships: Vec<RelationshipInput>,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: String,
    pub document: String,
    pub summary: BatchSummary,
    /// One report per touched project; empty if reconciliation failed.
    pub reconcile: Vec<ReconcileReport>,
}

/// Applies extraction feeds with bounded concurrency.
pub struct IngestPipeline {
    mutation: Arc<MutationLayer>,
    reconciler: Arc<TreeReconciler>,
    limiter: Arc<Semaphore>,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        mutation: Arc<MutationLayer>,
        reconciler: Arc<TreeReconciler>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            mutation,
            reconciler,
            limiter: Arc::new(Semaphore::new(config.max_inflight_batches.max(1))),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Ingest one document: upsert its records per-item, then reconcile
    /// every project the document touched.
    pub async fn ingest_document(&self, batch: DocumentBatch) -> Result<IngestReport, GraphError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| GraphError::Database("ingest limiter closed".to_string()))?;

        let batch_id = Uuid::new_v4().to_string();

        let nodes: Vec<NodeUpsert> = batch.nodes.iter().map(NodeInput::resolve).collect();
        let edges: Vec<EdgeUpsert> = batch
            .relationships
            .iter()
            .map(RelationshipInput::resolve)
            .collect();

        let mut projects: Vec<String> = batch
            .nodes
            .iter()
            .filter_map(|n| n.identity.project().map(str::to_string))
            .collect();
        projects.sort();
        projects.dedup();

        let mut summary = BatchSummary::default();
        for chunk in nodes.chunks(self.batch_size) {
            summary.absorb(self.mutation.apply_batch(chunk.to_vec(), Vec::new()).await);
        }
        for chunk in edges.chunks(self.batch_size) {
            summary.absorb(self.mutation.apply_batch(Vec::new(), chunk.to_vec()).await);
        }

        info!(
            batch_id = %batch_id,
            document = %batch.document,
            stored = summary.stored,
            failed = summary.failed,
            "document batch applied"
        );

        // Best-effort: the data above has committed, so a reconcile
        // failure degrades the report instead of failing the run.
        let mut reconcile = Vec::new();
        for project in &projects {
            match self.reconciler.reconcile_project(project).await {
                Ok(report) => reconcile.push(report),
                Err(err) => {
                    warn!(project = %project, error = %err, "post-batch reconcile failed");
                }
            }
        }

        Ok(IngestReport {
            batch_id,
            document: batch.document,
            summary,
            reconcile,
        })
    }

    /// Ingest many documents; the in-flight cap bounds concurrency.
    pub async fn ingest_all(
        &self,
        batches: Vec<DocumentBatch>,
    ) -> Vec<Result<IngestReport, GraphError>> {
        futures::future::join_all(batches.into_iter().map(|b| self.ingest_document(b))).await
    }
}
