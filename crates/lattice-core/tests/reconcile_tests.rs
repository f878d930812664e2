use lattice_core::graph::ident;
use lattice_core::{EngineConfig, GraphEngine, NodeKind, RelationshipType};
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

async fn store_orphan_file(engine: &GraphEngine, project: &str, path: &str) -> String {
    let file_id = ident::file_id_from_content(path.as_bytes());
    engine
        .mutation()
        .upsert_node(
            NodeKind::File,
            &file_id,
            props(json!({ "project_name": project, "path": path })),
        )
        .await
        .unwrap();
    file_id
}

#[tokio::test]
async fn test_repair_builds_full_directory_chain() {
    let (engine, _temp) = open_engine().await;
    let file_id = store_orphan_file(&engine, "demo", "a/b/c/file.py").await;

    let report = engine.repair_project("demo").await.unwrap();
    assert_eq!(report.orphans_detected, 1);
    assert_eq!(report.orphans_repaired, 1);
    assert_eq!(report.orphans_remaining, 0);
    assert_eq!(report.samples, vec!["a/b/c/file.py".to_string()]);

    // Exactly the three ancestor directories exist.
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.directories, 3);
    assert_eq!(stats.projects, 1);

    let project_id = ident::project_id("demo");
    let dir_a = ident::directory_id("demo", "a");
    let dir_ab = ident::directory_id("demo", "a/b");
    let dir_abc = ident::directory_id("demo", "a/b/c");

    for (parent, child) in [
        (project_id.as_str(), dir_a.as_str()),
        (dir_a.as_str(), dir_ab.as_str()),
        (dir_ab.as_str(), dir_abc.as_str()),
        (dir_abc.as_str(), file_id.as_str()),
    ] {
        assert!(
            engine
                .store()
                .edge_exists(RelationshipType::Contains, parent, child)
                .await
                .unwrap(),
            "missing CONTAINS {} -> {}",
            parent,
            child
        );
    }
}

#[tokio::test]
async fn test_repair_is_idempotent() {
    let (engine, _temp) = open_engine().await;
    store_orphan_file(&engine, "demo", "a/b/c/file.py").await;

    let first = engine.repair_project("demo").await.unwrap();
    assert_eq!(first.orphans_repaired, 1);

    let second = engine.repair_project("demo").await.unwrap();
    assert_eq!(second.orphans_detected, 0);
    assert_eq!(second.orphans_repaired, 0);
    assert_eq!(second.orphans_remaining, 0);

    // No extra nodes or edges from the second pass.
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.directories, 3);
    assert_eq!(stats.contains, 4);
}

#[tokio::test]
async fn test_root_level_orphan_attaches_to_project() {
    let (engine, _temp) = open_engine().await;
    let file_id = store_orphan_file(&engine, "demo", "main.py").await;

    let report = engine.repair_project("demo").await.unwrap();
    assert_eq!(report.orphans_repaired, 1);

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.directories, 0);
    assert!(engine
        .store()
        .edge_exists(
            RelationshipType::Contains,
            &ident::project_id("demo"),
            &file_id
        )
        .await
        .unwrap());
}

#[tokio::test]
async fn test_orphan_directory_is_repaired_too() {
    let (engine, _temp) = open_engine().await;
    let dir_id = ident::directory_id("demo", "x/y");
    engine
        .mutation()
        .upsert_node(
            NodeKind::Directory,
            &dir_id,
            props(json!({ "project_name": "demo", "path": "x/y", "name": "y" })),
        )
        .await
        .unwrap();

    let report = engine.repair_project("demo").await.unwrap();
    // `x` is created during repair, so only the pre-existing node counts
    // as detected.
    assert_eq!(report.orphans_detected, 1);
    assert_eq!(report.orphans_repaired, 1);

    let dir_x = ident::directory_id("demo", "x");
    assert!(engine
        .store()
        .edge_exists(
            RelationshipType::Contains,
            &ident::project_id("demo"),
            &dir_x
        )
        .await
        .unwrap());
    assert!(engine
        .store()
        .edge_exists(RelationshipType::Contains, &dir_x, &dir_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_nodes_reached_by_contains_are_not_orphans() {
    let (engine, _temp) = open_engine().await;
    let project_id = ident::project_id("demo");
    let file_id = store_orphan_file(&engine, "demo", "linked.py").await;

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
        .upsert_relationship(
            &project_id,
            &file_id,
            RelationshipType::Contains,
            1.0,
            props(json!({ "project_name": "demo" })),
        )
        .await
        .unwrap();

    let report = engine.repair_project("demo").await.unwrap();
    assert_eq!(report.orphans_detected, 0);
}

#[tokio::test]
async fn test_reconcile_scopes_to_one_project() {
    let (engine, _temp) = open_engine().await;
    store_orphan_file(&engine, "alpha", "src/a.py").await;
    store_orphan_file(&engine, "beta", "src/b.py").await;

    let report = engine.repair_project("alpha").await.unwrap();
    assert_eq!(report.orphans_detected, 1);

    // Beta's orphan is untouched.
    let report = engine.repair_project("beta").await.unwrap();
    assert_eq!(report.orphans_detected, 1);
}

#[tokio::test]
async fn test_shared_ancestors_are_merged_not_duplicated() {
    let (engine, _temp) = open_engine().await;
    store_orphan_file(&engine, "demo", "src/app/one.py").await;
    store_orphan_file(&engine, "demo", "src/app/two.py").await;

    let report = engine.repair_project("demo").await.unwrap();
    assert_eq!(report.orphans_repaired, 2);

    // src and src/app are shared by both chains.
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.directories, 2);
}
