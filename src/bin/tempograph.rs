//! Command-line front end: loads vertex and edge CSV files and answers one
//! query against them.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tempograph::{EngineConfig, GraphProcessor, SubgraphRequest};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tempograph",
    version,
    about = "Query snapshot-scoped weighted graphs loaded from CSV",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    input: InputArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Json,
        help = "Output format for responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct InputArgs {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "CSV file with vertex,weight,snapshot columns"
    )]
    vertices: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "CSV file with vertex_from,vertex_to,snapshot columns"
    )]
    edges: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "TEMPOGRAPH_CONFIG",
        help = "Engine configuration file (TOML)"
    )]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List snapshot labels in chronological order
    Snapshots,
    /// Reach summary and total weight of a snapshot
    GraphMetrics {
        #[arg(long)]
        snapshot: String,
        #[arg(long, help = "Root node; defaults to the first root candidate")]
        root: Option<String>,
    },
    /// Extract a depth-bounded subgraph with weights and metrics
    Subgraph {
        #[arg(long)]
        snapshot: String,
        #[arg(long, help = "Root node; defaults to the first root candidate")]
        root: Option<String>,
        #[arg(long, help = "Maximum BFS depth; defaults to the configured depth")]
        depth: Option<usize>,
        #[arg(long, conflicts_with = "depth", help = "Follow edges without a depth bound")]
        unbounded: bool,
    },
    /// Own and subgraph weight of one node
    Weight {
        #[arg(long)]
        snapshot: String,
        #[arg(long)]
        node: String,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.input.config.clone())?;
    let processor = GraphProcessor::new(config)?;

    let (Some(vertices), Some(edges)) = (&cli.input.vertices, &cli.input.edges) else {
        return Err("both --vertices and --edges are required".into());
    };
    processor.load_csv(vertices, edges)?;

    match cli.command {
        Command::Snapshots => {
            let labels = processor.snapshots();
            emit(cli.format, &labels, || {
                for label in &labels {
                    println!("{label}");
                }
            })?;
        }
        Command::GraphMetrics { snapshot, root } => {
            let metrics = processor.graph_metrics(&snapshot, root.as_deref())?;
            emit(cli.format, &metrics, || {
                println!(
                    "root={} nodes={} edges={} max_depth={} total_weight={}",
                    metrics.reach.root_node,
                    metrics.reach.total_nodes,
                    metrics.reach.total_edges,
                    metrics.reach.max_depth,
                    metrics.total_weight
                );
            })?;
        }
        Command::Subgraph {
            snapshot,
            root,
            depth,
            unbounded,
        } => {
            let mut request = SubgraphRequest::new(snapshot);
            if let Some(root) = root {
                request = request.root(root);
            }
            if unbounded {
                request = request.unbounded();
            } else if let Some(depth) = depth {
                request = request.depth(depth);
            }
            let entry = processor.subgraph(&request)?;
            let report = &*entry.value;
            emit(cli.format, report, || {
                println!(
                    "root={} nodes={} edges={} depth_reached={}",
                    report.root_id,
                    report.metrics.total_nodes,
                    report.metrics.total_edges,
                    report.metrics.max_depth
                );
                for node in &report.nodes {
                    println!(
                        "  {} weight={} subgraph_weight={}",
                        node.id, node.weight, node.subgraph_weight
                    );
                }
                for warning in &report.warnings {
                    println!("warning: {warning}");
                }
            })?;
        }
        Command::Weight { snapshot, node } => {
            let summary = processor.node_weight(&snapshot, &node)?;
            emit(cli.format, &summary, || {
                println!(
                    "node_weight={} subgraph_weight={}",
                    summary.node_weight, summary.subgraph_weight
                );
            })?;
        }
    }

    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize + ?Sized,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
