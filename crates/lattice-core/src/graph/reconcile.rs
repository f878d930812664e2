//! Containment-tree reconciliation.
//!
//! The hierarchy invariant: every FILE and DIRECTORY node belongs to one
//! project and is reachable from that project's root through a chain of
//! CONTAINS edges. A node scoped to a project with zero incoming CONTAINS
//! edges is an orphan, and this pass repairs it by rebuilding the
//! directory chain from the node's stored path.
//!
//! Detection deliberately avoids relationship-pattern predicates inside
//! filter clauses (restricted query dialects reject pattern-as-boolean
//! expressions there): node ids and incoming-edge targets are fetched with
//! two plain selects and the difference is computed here.
//!
//! Repair goes through the mutation layer, so every step is an idempotent
//! upsert; running the pass twice over the same orphan set is a no-op the
//! second time. Reconciliation is a best-effort consistency pass: a
//! per-item failure is logged and counted, and never aborts a run whose
//! node and relationship data has already committed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::GraphError;
use super::ident;
use super::models::{NodeKind, RelationshipType};
use super::mutation::MutationLayer;
use super::store::GraphStore;

/// Outcome of one reconciliation pass over a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub project: String,
    pub orphans_detected: usize,
    pub orphans_repaired: usize,
    pub orphans_remaining: usize,
    /// The first few orphan paths, for operator logs.
    pub samples: Vec<String>,
    pub duration_ms: u64,
}

/// A detected orphan node.
#[derive(Debug, Clone)]
struct Orphan {
    kind: NodeKind,
    entity_id: String,
    path: Option<String>,
}

/// Detects and repairs containment orphans for one project at a time.
pub struct TreeReconciler {
    store: Arc<GraphStore>,
    mutation: Arc<MutationLayer>,
    sample_limit: usize,
}

impl TreeReconciler {
    pub fn new(store: Arc<GraphStore>, mutation: Arc<MutationLayer>, sample_limit: usize) -> Self {
        Self {
            store,
            mutation,
            sample_limit,
        }
    }

    /// Run one detection + repair pass for a project.
    pub async fn reconcile_project(&self, project_name: &str) -> Result<ReconcileReport, GraphError> {
        let started = Instant::now();
        let orphans = self.find_orphans(project_name).await?;

        let mut report = ReconcileReport {
            project: project_name.to_string(),
            orphans_detected: orphans.len(),
            samples: orphans
                .iter()
                .take(self.sample_limit)
                .map(|o| o.path.clone().unwrap_or_else(|| o.entity_id.clone()))
                .collect(),
            ..ReconcileReport::default()
        };

        for orphan in &orphans {
            match self.repair_orphan(project_name, orphan).await {
                Ok(()) => report.orphans_repaired += 1,
                Err(err) => {
                    warn!(
                        project = project_name,
                        entity_id = %orphan.entity_id,
                        path = orphan.path.as_deref().unwrap_or("<none>"),
                        error = %err,
                        "orphan repair failed"
                    );
                }
            }
        }

        report.orphans_remaining = report.orphans_detected - report.orphans_repaired;
        report.duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            project = project_name,
            detected = report.orphans_detected,
            repaired = report.orphans_repaired,
            remaining = report.orphans_remaining,
            "reconcile pass complete"
        );

        Ok(report)
    }

    /// FILE and DIRECTORY nodes of the project with no incoming CONTAINS
    /// edge from anywhere.
    async fn find_orphans(&self, project_name: &str) -> Result<Vec<Orphan>, GraphError> {
        let mut candidates = Vec::new();
        for kind in [NodeKind::Directory, NodeKind::File] {
            for row in self.store.project_nodes(kind, project_name).await? {
                candidates.push(Orphan {
                    kind,
                    entity_id: row.entity_id,
                    path: row.path,
                });
            }
        }

        let ids: Vec<String> = candidates.iter().map(|o| o.entity_id.clone()).collect();
        let contained: HashSet<String> = self
            .store
            .contains_targets_among(&ids)
            .await?
            .into_iter()
            .collect();

        let mut orphans: Vec<Orphan> = candidates
            .into_iter()
            .filter(|o| !contained.contains(&o.entity_id))
            .collect();
        // Deterministic repair and sample order.
        orphans.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        Ok(orphans)
    }

    /// Rebuild the directory chain above one orphan and attach it.
    async fn repair_orphan(&self, project_name: &str, orphan: &Orphan) -> Result<(), GraphError> {
        let path = orphan.path.as_deref().ok_or_else(|| {
            GraphError::Structural(format!(
                "orphan `{}` has no stored path to rebuild from",
                orphan.entity_id
            ))
        })?;

        let project_node_id = ident::project_id(project_name);
        self.mutation
            .upsert_node(
                NodeKind::Project,
                &project_node_id,
                props(&[("project_name", project_name), ("name", project_name)]),
            )
            .await?;

        // Ancestor directories: every proper prefix of the path.
        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let ancestors = segments.len().saturating_sub(1);

        let mut parent_id = project_node_id;
        let mut prefix = String::new();
        for segment in segments.iter().take(ancestors) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            let dir_id = ident::directory_id(project_name, &prefix);
            self.mutation
                .upsert_node(
                    NodeKind::Directory,
                    &dir_id,
                    props(&[
                        ("project_name", project_name),
                        ("path", prefix.as_str()),
                        ("name", segment),
                    ]),
                )
                .await?;
            self.link_contains(&parent_id, &dir_id, project_name).await?;
            parent_id = dir_id;
        }

        // Root-level orphans hang directly off the project node.
        self.link_contains(&parent_id, &orphan.entity_id, project_name)
            .await?;

        debug!(
            project = project_name,
            kind = %orphan.kind,
            entity_id = %orphan.entity_id,
            path,
            "orphan reattached"
        );

        Ok(())
    }

    async fn link_contains(
        &self,
        parent_id: &str,
        child_id: &str,
        project_name: &str,
    ) -> Result<(), GraphError> {
        self.mutation
            .upsert_relationship(
                parent_id,
                child_id,
                RelationshipType::Contains,
                1.0,
                props(&[("project_name", project_name)]),
            )
            .await?;
        Ok(())
    }
}

fn props(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}
