use lattice_core::graph::ident;
use lattice_core::{EngineConfig, GraphEngine, GraphError, NodeKind, RelationshipType};
use serde_json::json;
use tempfile::TempDir;

async fn open_engine() -> (GraphEngine, TempDir) {
    let temp = TempDir::new().unwrap();
    let config = EngineConfig::default();
    let engine = GraphEngine::open_at(&temp.path().join("graph"), &config)
        .await
        .unwrap();
    (engine, temp)
}

fn props(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_upsert_node_is_idempotent() {
    let (engine, _temp) = open_engine().await;
    let file_id = ident::file_id_from_content(b"fn main() {}\n");

    for _ in 0..2 {
        let node_ref = engine
            .mutation()
            .upsert_node(
                NodeKind::File,
                &file_id,
                props(json!({ "project_name": "demo", "path": "src/main.rs" })),
            )
            .await
            .unwrap();
        assert_eq!(node_ref.entity_id, file_id);
    }

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.files, 1);
}

#[tokio::test]
async fn test_upsert_node_merges_properties() {
    let (engine, _temp) = open_engine().await;
    let file_id = ident::file_id_from_content(b"body");

    engine
        .mutation()
        .upsert_node(
            NodeKind::File,
            &file_id,
            props(json!({ "project_name": "demo", "path": "src/a.rs" })),
        )
        .await
        .unwrap();
    engine
        .mutation()
        .upsert_node(
            NodeKind::File,
            &file_id,
            props(json!({ "project_name": "demo", "language": "rust" })),
        )
        .await
        .unwrap();

    let row = engine
        .store()
        .get_node(NodeKind::File, &file_id)
        .await
        .unwrap()
        .unwrap();
    // Earlier properties survive a merge that does not mention them.
    assert_eq!(row.path.as_deref(), Some("src/a.rs"));
}

#[tokio::test]
async fn test_upsert_relationship_is_idempotent() {
    let (engine, _temp) = open_engine().await;
    let project_id = ident::project_id("demo");
    let file_id = ident::file_id_from_content(b"x");

    engine
        .mutation()
        .upsert_node(
            NodeKind::Project,
            &project_id,
            props(json!({ "project_name": "demo", "name": "demo" })),
        )
        .await
        .unwrap();
    engine
        .mutation()
        .upsert_node(
            NodeKind::File,
            &file_id,
            props(json!({ "project_name": "demo", "path": "main.py" })),
        )
        .await
        .unwrap();

    for _ in 0..2 {
        engine
            .mutation()
            .upsert_relationship(
                &project_id,
                &file_id,
                RelationshipType::Contains,
                1.0,
                props(json!({ "project_name": "demo" })),
            )
            .await
            .unwrap();
    }

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.contains, 1);
    assert!(engine
        .store()
        .edge_exists(RelationshipType::Contains, &project_id, &file_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_invalid_id_is_rejected_before_any_write() {
    let (engine, _temp) = open_engine().await;

    let result = engine
        .mutation()
        .upsert_node(
            NodeKind::File,
            "file_placeholder_0",
            props(json!({ "project_name": "demo" })),
        )
        .await;
    assert!(matches!(result, Err(GraphError::Validation { .. })));

    let result = engine
        .mutation()
        .upsert_node(
            NodeKind::File,
            "file:demo:src/main.py",
            props(json!({ "project_name": "demo" })),
        )
        .await;
    assert!(matches!(result, Err(GraphError::Validation { .. })));

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.files, 0);
}

#[tokio::test]
async fn test_missing_endpoint_is_structural_not_retried() {
    let (engine, _temp) = open_engine().await;
    let project_id = ident::project_id("demo");
    let ghost = ident::file_id_from_content(b"never stored");

    engine
        .mutation()
        .upsert_node(
            NodeKind::Project,
            &project_id,
            props(json!({ "project_name": "demo" })),
        )
        .await
        .unwrap();

    let result = engine
        .mutation()
        .upsert_relationship(
            &project_id,
            &ghost,
            RelationshipType::Contains,
            1.0,
            props(json!({})),
        )
        .await;
    assert!(matches!(result, Err(GraphError::Structural(_))));

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.contains, 0);
}

#[tokio::test]
async fn test_batch_isolates_bad_items() {
    use lattice_core::NodeUpsert;

    let (engine, _temp) = open_engine().await;

    let good_a = NodeUpsert {
        kind: NodeKind::File,
        entity_id: ident::file_id_from_content(b"a"),
        properties: props(json!({ "project_name": "demo", "path": "a.py" })),
    };
    let good_b = NodeUpsert {
        kind: NodeKind::File,
        entity_id: ident::file_id_from_content(b"b"),
        properties: props(json!({ "project_name": "demo", "path": "b.py" })),
    };
    let bad = NodeUpsert {
        kind: NodeKind::File,
        entity_id: "file_placeholder_9".to_string(),
        properties: props(json!({ "project_name": "demo" })),
    };

    let summary = engine
        .mutation()
        .apply_batch(vec![good_a, bad, good_b], Vec::new())
        .await;

    assert_eq!(summary.stored, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].item, "file_placeholder_9");

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.files, 2);
}

#[tokio::test]
async fn test_concurrent_upserts_converge_to_one_node() {
    let (engine, _temp) = open_engine().await;
    let file_id = ident::file_id_from_content(b"shared module");
    let mutation = engine.mutation().clone();

    let mut handles = Vec::new();
    for worker in 0..8 {
        let mutation = mutation.clone();
        let file_id = file_id.clone();
        handles.push(tokio::spawn(async move {
            mutation
                .upsert_node(
                    NodeKind::File,
                    &file_id,
                    serde_json::json!({
                        "project_name": "demo",
                        "path": "vendor/shared.py",
                        "seen_by": worker,
                    })
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                )
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.files, 1);
}
