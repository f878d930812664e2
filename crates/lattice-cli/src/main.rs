use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lattice_core::graph::ident;
use lattice_core::{
    DocumentBatch, EngineConfig, GraphEngine, HybridSearcher, IngestPipeline, NodeKind,
    SearchFilters, SearchMode, SearchResponse, StoreGraphSource,
};

#[derive(Parser)]
#[command(name = "lattice")]
#[command(about = "Content-addressed knowledge graph engine", long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON reports instead of human-readable summaries
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the graph store and initialize its schema
    Init,
    /// Apply a JSON extraction feed to the graph
    Ingest {
        /// Feed file: one document batch, or an array of them
        feed: PathBuf,
    },
    /// Detect and repair containment orphans for one project
    Repair {
        /// Project name to reconcile
        project: String,
    },
    /// Validate an entity id against a node kind
    ValidateId {
        /// The id to classify
        id: String,
        /// PROJECT, DIRECTORY, FILE or ENTITY
        #[arg(long)]
        kind: NodeKind,
    },
    /// Query the graph and rank the merged results
    Search {
        query: String,
        /// Source subset: all, vector or graph
        #[arg(long, default_value = "graph")]
        mode: SearchMode,
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Restrict matches to one project
        #[arg(long)]
        project: Option<String>,
    },
    /// Print node and edge counts
    Stats,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => EngineConfig::load().context("loading configuration"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lattice_core=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Ingest { feed } => cmd_ingest(&config, &feed, cli.json).await,
        Commands::Repair { project } => cmd_repair(&config, &project, cli.json).await,
        Commands::ValidateId { id, kind } => cmd_validate_id(&id, kind, cli.json),
        Commands::Search {
            query,
            mode,
            limit,
            project,
        } => cmd_search(&config, &query, mode, limit, project, cli.json).await,
        Commands::Stats => cmd_stats(&config, cli.json).await,
    }
}

async fn cmd_init(config: &EngineConfig) -> anyhow::Result<()> {
    let engine = GraphEngine::open(config).await?;
    let stats = engine.stats().await?;

    println!("Graph store ready at {}", config.store.data_dir);
    println!(
        "  {} projects, {} directories, {} files, {} entities",
        stats.projects, stats.directories, stats.files, stats.entities
    );
    Ok(())
}

async fn cmd_ingest(config: &EngineConfig, feed: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(feed)
        .with_context(|| format!("reading feed {}", feed.display()))?;
    let batches: Vec<DocumentBatch> = match serde_json::from_str::<Vec<DocumentBatch>>(&raw) {
        Ok(batches) => batches,
        Err(_) => vec![serde_json::from_str(&raw)
            .with_context(|| format!("parsing feed {}", feed.display()))?],
    };

    let engine = GraphEngine::open(config).await?;
    let pipeline = IngestPipeline::new(
        engine.mutation().clone(),
        engine.reconciler().clone(),
        &config.ingest,
    );

    let outcomes = pipeline.ingest_all(batches).await;

    let mut reports = Vec::new();
    let mut failed_documents = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(err) => {
                eprintln!("error: document batch failed: {}", err);
                failed_documents += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!(
                "{}: {} stored, {} failed ({}ms)",
                report.document, report.summary.stored, report.summary.failed,
                report.summary.duration_ms
            );
            for item in &report.summary.errors {
                println!("  failed {}: {}", item.item, item.error);
            }
            for reconcile in &report.reconcile {
                println!(
                    "  reconcile {}: {} detected, {} repaired, {} remaining",
                    reconcile.project,
                    reconcile.orphans_detected,
                    reconcile.orphans_repaired,
                    reconcile.orphans_remaining
                );
            }
        }
    }

    if failed_documents > 0 {
        anyhow::bail!("{} document batch(es) failed", failed_documents);
    }
    Ok(())
}

async fn cmd_repair(config: &EngineConfig, project: &str, json: bool) -> anyhow::Result<()> {
    let engine = GraphEngine::open(config).await?;
    let report = engine.repair_project(project).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Reconciled {}: {} detected, {} repaired, {} remaining ({}ms)",
            report.project,
            report.orphans_detected,
            report.orphans_repaired,
            report.orphans_remaining,
            report.duration_ms
        );
        for path in &report.samples {
            println!("  - {}", path);
        }
    }

    if report.orphans_remaining > 0 {
        anyhow::bail!("{} orphan(s) could not be repaired", report.orphans_remaining);
    }
    Ok(())
}

fn cmd_validate_id(id: &str, kind: NodeKind, json: bool) -> anyhow::Result<()> {
    let validation = ident::validate(id, kind);

    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else if validation.is_valid {
        println!("{} is a valid {} id ({})", id, kind, validation.detected_format);
    } else {
        println!(
            "{} is not valid for kind {} ({}): {}",
            id,
            kind,
            validation.detected_format,
            validation.error.as_deref().unwrap_or("rejected")
        );
    }

    if !validation.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_search(
    config: &EngineConfig,
    query: &str,
    mode: SearchMode,
    limit: usize,
    project: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = GraphEngine::open(config).await?;

    let searcher = HybridSearcher::new(config.search.clone())
        .with_graph(Arc::new(StoreGraphSource::new(engine.store().clone())))
        .with_filters(SearchFilters {
            project,
            entity_type: None,
        });

    let response = searcher.search(query, limit, mode).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_search_response(query, &response);
    }
    Ok(())
}

fn print_search_response(query: &str, response: &SearchResponse) {
    if response.results.is_empty() {
        println!("No matches for '{}'", query);
    }
    for (rank, hit) in response.results.iter().enumerate() {
        println!(
            "{:2}. {} (score {:.3}, {} source{})",
            rank + 1,
            hit.entity_id,
            hit.score,
            hit.source_count,
            if hit.source_count == 1 { "" } else { "s" }
        );
    }
    println!(
        "{} candidate(s) from {} in {}ms",
        response.total_candidates,
        response.sources_queried.join(", "),
        response.latency_ms
    );
    if response.degraded {
        eprintln!("warning: sources failed: {}", response.sources_failed.join(", "));
    }
}

async fn cmd_stats(config: &EngineConfig, json: bool) -> anyhow::Result<()> {
    let engine = GraphEngine::open(config).await?;
    let stats = engine.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Nodes:");
        println!("  projects    {}", stats.projects);
        println!("  directories {}", stats.directories);
        println!("  files       {}", stats.files);
        println!("  entities    {}", stats.entities);
        println!("Relationships:");
        println!("  contains    {}", stats.contains);
        println!("  imports     {}", stats.imports);
        println!("  defines     {}", stats.defines);
        println!("  calls       {}", stats.calls);
        println!("  relates     {}", stats.relates);
    }
    Ok(())
}
