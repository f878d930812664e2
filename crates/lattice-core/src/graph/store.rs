//! SurrealDB embedded store for the knowledge graph.
//!
//! Storage layout: one table per node kind (`project`, `directory`,
//! `file`, `entity`) and one table per relationship type (`contains`,
//! `imports`, `defines`, `calls`, `relates`). Node records are keyed by
//! their canonical entity id; edge records are keyed by the composite
//! `[source_id, target_id]`, so a `(source, target, type)` triple always
//! maps to exactly one record and re-creation merges instead of
//! duplicating.
//!
//! Store errors are classified at this boundary: commit conflicts from the
//! storage engine's concurrency control become
//! [`GraphError::TransientConflict`], everything else
//! [`GraphError::Database`].

use std::path::Path;

use serde::Deserialize;
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;

use super::error::GraphError;
use super::models::{EdgeUpsert, NodeKind, NodeRef, NodeUpsert, RelRef, RelationshipType};

/// Error-message signatures the storage engine uses for retryable
/// concurrency failures.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "read or write conflict",
    "can be retried",
    "resource busy",
    "timed out",
];

impl From<surrealdb::Error> for GraphError {
    fn from(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if TRANSIENT_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
            GraphError::TransientConflict(message)
        } else {
            GraphError::Database(message)
        }
    }
}

/// A node row as read back from the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRow {
    pub entity_id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
}

/// An edge row as read back from the store.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeRow {
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub confidence_score: Option<f32>,
}

/// Node and edge counts across the whole graph.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GraphStats {
    pub projects: usize,
    pub directories: usize,
    pub files: usize,
    pub entities: usize,
    pub contains: usize,
    pub imports: usize,
    pub defines: usize,
    pub calls: usize,
    pub relates: usize,
}

/// Database connection for the knowledge graph.
pub struct GraphStore {
    db: Surreal<Db>,
}

impl GraphStore {
    /// Open or create a store at the given path.
    pub async fn open(path: &Path) -> Result<Self, GraphError> {
        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns("lattice").use_db("graph").await?;

        Ok(Self { db })
    }

    /// Initialize tables, fields and indexes.
    pub async fn initialize_schema(&self) -> Result<(), GraphError> {
        for kind in NodeKind::ALL {
            let t = kind.table_name();
            self.db
                .query(format!(
                    r#"
                    DEFINE TABLE {t} SCHEMALESS;
                    DEFINE FIELD entity_id ON {t} TYPE string;
                    DEFINE FIELD created_at ON {t} DEFAULT time::now() READONLY;
                    DEFINE FIELD updated_at ON {t} VALUE time::now();
                    DEFINE INDEX {t}_entity_id ON {t} FIELDS entity_id UNIQUE;
                    DEFINE INDEX {t}_project ON {t} FIELDS project_name;
                    "#
                ))
                .await?
                .check()?;
        }

        for rel in RelationshipType::ALL {
            let t = rel.table_name();
            self.db
                .query(format!(
                    r#"
                    DEFINE TABLE {t} SCHEMALESS;
                    DEFINE FIELD source_id ON {t} TYPE string;
                    DEFINE FIELD target_id ON {t} TYPE string;
                    DEFINE FIELD confidence_score ON {t} TYPE float DEFAULT 1.0;
                    DEFINE FIELD created_at ON {t} DEFAULT time::now() READONLY;
                    DEFINE FIELD updated_at ON {t} VALUE time::now();
                    DEFINE INDEX {t}_pair ON {t} FIELDS source_id, target_id UNIQUE;
                    DEFINE INDEX {t}_target ON {t} FIELDS target_id;
                    "#
                ))
                .await?
                .check()?;
        }

        self.db
            .query(
                r#"
                DEFINE TABLE metadata SCHEMALESS;
                UPSERT metadata:schema MERGE { initialized: true, schema_version: '1.0' };
                "#,
            )
            .await?
            .check()?;

        Ok(())
    }

    /// Check if the store has been initialized.
    pub async fn is_initialized(&self) -> Result<bool, GraphError> {
        let result: Option<serde_json::Value> = self
            .db
            .query("SELECT initialized FROM metadata:schema")
            .await?
            .take(0)?;

        Ok(result.is_some())
    }

    /// Merge-by-identity write for a node. The record id is the canonical
    /// entity id, so repeating the call converges on one record.
    pub async fn upsert_node_raw(&self, node: &NodeUpsert) -> Result<NodeRef, GraphError> {
        let mut props = node.properties.clone();
        props.insert(
            "entity_id".to_string(),
            serde_json::Value::String(node.entity_id.clone()),
        );

        self.db
            .query(format!(
                "UPSERT type::thing('{}', $id) MERGE $props",
                node.kind.table_name()
            ))
            .bind(("id", node.entity_id.clone()))
            .bind(("props", serde_json::Value::Object(props)))
            .await?
            .check()?;

        Ok(NodeRef {
            kind: node.kind,
            entity_id: node.entity_id.clone(),
        })
    }

    /// Merge-by-identity write for an edge, keyed by `[source, target]`
    /// within the relationship type's table.
    pub async fn upsert_edge_raw(&self, edge: &EdgeUpsert) -> Result<RelRef, GraphError> {
        let mut props = edge.properties.clone();
        props.insert(
            "source_id".to_string(),
            serde_json::Value::String(edge.source_id.clone()),
        );
        props.insert(
            "target_id".to_string(),
            serde_json::Value::String(edge.target_id.clone()),
        );
        let confidence = edge.confidence_score.clamp(0.0, 1.0);
        props.insert("confidence_score".to_string(), serde_json::json!(confidence));

        self.db
            .query(format!(
                "UPSERT type::thing('{}', [$source, $target]) MERGE $props",
                edge.rel_type.table_name()
            ))
            .bind(("source", edge.source_id.clone()))
            .bind(("target", edge.target_id.clone()))
            .bind(("props", serde_json::Value::Object(props)))
            .await?
            .check()?;

        Ok(RelRef {
            source_id: edge.source_id.clone(),
            target_id: edge.target_id.clone(),
            rel_type: edge.rel_type,
        })
    }

    /// Cheap existence probe against a single record.
    pub async fn node_exists(&self, kind: NodeKind, entity_id: &str) -> Result<bool, GraphError> {
        let found: Option<String> = self
            .db
            .query(format!(
                "SELECT VALUE entity_id FROM type::thing('{}', $id)",
                kind.table_name()
            ))
            .bind(("id", entity_id.to_string()))
            .await?
            .take(0)?;

        Ok(found.is_some())
    }

    /// Fetch a single node row.
    pub async fn get_node(
        &self,
        kind: NodeKind,
        entity_id: &str,
    ) -> Result<Option<NodeRow>, GraphError> {
        let row: Option<NodeRow> = self
            .db
            .query(format!(
                "SELECT entity_id, project_name, path, name, entity_type FROM type::thing('{}', $id)",
                kind.table_name()
            ))
            .bind(("id", entity_id.to_string()))
            .await?
            .take(0)?;

        Ok(row)
    }

    /// All nodes of a kind scoped to one project.
    pub async fn project_nodes(
        &self,
        kind: NodeKind,
        project_name: &str,
    ) -> Result<Vec<NodeRow>, GraphError> {
        let rows: Vec<NodeRow> = self
            .db
            .query(format!(
                "SELECT entity_id, project_name, path, name, entity_type FROM {} WHERE project_name = $project",
                kind.table_name()
            ))
            .bind(("project", project_name.to_string()))
            .await?
            .take(0)?;

        Ok(rows)
    }

    /// Target ids of CONTAINS edges pointing at any of the given nodes.
    ///
    /// Kept as a plain select over edge rows so orphan detection never
    /// leans on relationship-pattern predicates inside a filter clause;
    /// the caller computes the set difference.
    pub async fn contains_targets_among(&self, ids: &[String]) -> Result<Vec<String>, GraphError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let targets: Vec<String> = self
            .db
            .query("SELECT VALUE target_id FROM contains WHERE target_id INSIDE $ids")
            .bind(("ids", ids.to_vec()))
            .await?
            .take(0)?;

        Ok(targets)
    }

    /// Whether a `(source, target)` edge exists in the type's table.
    pub async fn edge_exists(
        &self,
        rel_type: RelationshipType,
        source_id: &str,
        target_id: &str,
    ) -> Result<bool, GraphError> {
        let found: Option<String> = self
            .db
            .query(format!(
                "SELECT VALUE source_id FROM type::thing('{}', [$source, $target])",
                rel_type.table_name()
            ))
            .bind(("source", source_id.to_string()))
            .bind(("target", target_id.to_string()))
            .await?
            .take(0)?;

        Ok(found.is_some())
    }

    /// Outgoing edges of one type from a node.
    pub async fn edges_from(
        &self,
        rel_type: RelationshipType,
        source_id: &str,
    ) -> Result<Vec<EdgeRow>, GraphError> {
        let rows: Vec<EdgeRow> = self
            .db
            .query(format!(
                "SELECT source_id, target_id, confidence_score FROM {} WHERE source_id = $source",
                rel_type.table_name()
            ))
            .bind(("source", source_id.to_string()))
            .await?
            .take(0)?;

        Ok(rows)
    }

    /// Entity and file nodes whose name or path contains the query text.
    pub async fn text_match_nodes(
        &self,
        query_lower: &str,
        project_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NodeRow>, GraphError> {
        let mut out = Vec::new();

        for kind in [NodeKind::Entity, NodeKind::File] {
            let filter = match project_name {
                Some(_) => "project_name = $project AND",
                None => "",
            };
            let sql = format!(
                "SELECT entity_id, project_name, path, name, entity_type FROM {} \
                 WHERE {} (string::contains(string::lowercase(name ?? ''), $q) \
                 OR string::contains(string::lowercase(path ?? ''), $q)) \
                 LIMIT {}",
                kind.table_name(),
                filter,
                limit
            );

            let mut query = self.db.query(sql).bind(("q", query_lower.to_string()));
            if let Some(project) = project_name {
                query = query.bind(("project", project.to_string()));
            }

            let rows: Vec<NodeRow> = query.await?.take(0)?;
            out.extend(rows);
            if out.len() >= limit {
                out.truncate(limit);
                break;
            }
        }

        Ok(out)
    }

    /// Remove a node. Cleanup-only operation; normal ingestion never
    /// deletes. Edges referencing the node are removed with it.
    pub async fn delete_node(&self, kind: NodeKind, entity_id: &str) -> Result<(), GraphError> {
        self.db
            .query(format!("DELETE type::thing('{}', $id)", kind.table_name()))
            .bind(("id", entity_id.to_string()))
            .await?
            .check()?;

        for rel in RelationshipType::ALL {
            self.db
                .query(format!(
                    "DELETE {} WHERE source_id = $id OR target_id = $id",
                    rel.table_name()
                ))
                .bind(("id", entity_id.to_string()))
                .await?
                .check()?;
        }

        Ok(())
    }

    async fn count_table(&self, table: &str) -> Result<usize, GraphError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let result: Option<CountResult> = self
            .db
            .query(format!("SELECT count() FROM {} GROUP ALL", table))
            .await?
            .take(0)?;

        Ok(result.map(|r| r.count as usize).unwrap_or(0))
    }

    /// Node and edge counts for the whole store.
    pub async fn stats(&self) -> Result<GraphStats, GraphError> {
        Ok(GraphStats {
            projects: self.count_table("project").await?,
            directories: self.count_table("directory").await?,
            files: self.count_table("file").await?,
            entities: self.count_table("entity").await?,
            contains: self.count_table("contains").await?,
            imports: self.count_table("imports").await?,
            defines: self.count_table("defines").await?,
            calls: self.count_table("calls").await?,
            relates: self.count_table("relates").await?,
        })
    }
}
