//! CLI entry point for the Chainstorm graph store.
//!
//! Each invocation loads the snapshot under the configured data path, runs a
//! single operation, prints the result as JSON on stdout, and writes the
//! snapshot back when the operation mutated the graph.

mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use chainstorm_core::{
    data_from_value, Data, Edge, EdgeId, GraphHandler, GraphItem, Node, StoreConfig,
};
use chainstorm_local::InMemoryGraph;

#[derive(Parser)]
#[command(name = "chainstorm")]
#[command(about = "In-memory property graph with JSON snapshot persistence")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: chainstorm).
    #[arg(short, long, default_value = "chainstorm", global = true)]
    config: String,

    /// Override the snapshot directory.
    #[arg(long, global = true)]
    data_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print node and edge counts.
    Stats,
    /// Look up a node or edge by identifier.
    Get { id: String },
    /// Look up a node by name.
    Node { name: String },
    /// Find nodes by name, or edges by relationship, matching a regex.
    Search {
        pattern: String,
        /// Match edge relationships instead of node names.
        #[arg(long)]
        edges: bool,
    },
    /// Nodes with an edge pointing at NAME.
    FromNodes {
        name: String,
        /// Only follow these edge identifiers (repeatable).
        #[arg(long = "edge")]
        edges: Vec<String>,
    },
    /// Nodes NAME has an edge pointing at.
    ToNodes {
        name: String,
        /// Only follow these edge identifiers (repeatable).
        #[arg(long = "edge")]
        edges: Vec<String>,
    },
    /// Edges incident to NAME.
    Edges {
        name: String,
        #[arg(long, value_enum, default_value_t = EdgeDirection::All)]
        direction: EdgeDirection,
    },
    /// Breadth-first levels reachable from NAME along out-edges.
    Related {
        name: String,
        /// Emit at most this many levels.
        #[arg(long)]
        max: Option<usize>,
        /// Only follow these edge identifiers (repeatable).
        #[arg(long = "edge")]
        edges: Vec<String>,
    },
    /// Breadth-first paths from NAME with cumulative weight in [MIN, MAX].
    Weighted {
        name: String,
        #[arg(long)]
        min: i64,
        #[arg(long)]
        max: i64,
    },
    /// Every maximal simple path from NAME.
    Paths { name: String },
    /// Insert a node.
    AddNode {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: Option<String>,
        /// JSON object of data fields.
        #[arg(long)]
        data: Option<String>,
    },
    /// Insert an edge between two nodes given by name.
    AddEdge {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        relationship: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 0)]
        weight: i64,
        #[arg(long)]
        id: Option<String>,
        /// JSON object of data fields.
        #[arg(long)]
        data: Option<String>,
    },
    /// Apply a node or edge read as JSON from stdin.
    Apply {
        #[arg(value_enum)]
        mode: ApplyMode,
    },
    /// Delete a node by name, with its incident edges.
    DeleteNode { name: String },
    /// Delete an edge by identifier.
    DeleteEdge { id: String },
    /// Delete whichever record owns the identifier.
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum EdgeDirection {
    In,
    Out,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum ApplyMode {
    Add,
    Replace,
    Update,
    Merge,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = StoreConfig::load(&cli.config)?;
    if let Some(path) = cli.data_path.clone() {
        config.data_path = path;
    }
    logging::init(&config.log)?;

    let graph = InMemoryGraph::from_config(&config);
    graph
        .connect()
        .with_context(|| format!("loading snapshot from {}", config.data_path.display()))?;

    let mutated = run(&graph, cli.command)?;
    tracing::debug!(mutated, "Command finished");
    if mutated {
        graph.disconnect()?;
    }
    Ok(())
}

/// Run one command. Returns whether the graph was mutated.
fn run(graph: &InMemoryGraph, command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Stats => print(&graph.stats())?,
        Command::Get { id } => print(&graph.get_item_by_id(&id)?)?,
        Command::Node { name } => print(&graph.get_node(&name)?)?,
        Command::Search { pattern, edges } => {
            if edges {
                print(&graph.get_edges_by_regex(&pattern)?)?
            } else {
                print(&graph.get_nodes_by_regex(&pattern)?)?
            }
        }
        Command::FromNodes { name, edges } if edges.is_empty() => {
            print(&graph.get_from_nodes(&name)?)?
        }
        Command::FromNodes { name, edges } => {
            print(&graph.get_from_nodes_in_edges(&name, &edge_ids(edges))?)?
        }
        Command::ToNodes { name, edges } if edges.is_empty() => {
            print(&graph.get_to_nodes(&name)?)?
        }
        Command::ToNodes { name, edges } => {
            print(&graph.get_to_nodes_in_edges(&name, &edge_ids(edges))?)?
        }
        Command::Edges { name, direction } => match direction {
            EdgeDirection::In => print(&graph.get_in_edges(&name)?)?,
            EdgeDirection::Out => print(&graph.get_out_edges(&name)?)?,
            EdgeDirection::All => print(&graph.get_all_related_edges(&name)?)?,
        },
        Command::Related { name, max, edges } => {
            let levels = match (max, edges.is_empty()) {
                (Some(max), true) => graph.get_all_related_nodes_in_range(&name, max)?,
                (None, false) => {
                    graph.get_all_related_nodes_in_edge_slice(&name, &edge_ids(edges))?
                }
                (None, true) => graph.get_all_related_nodes(&name)?,
                (Some(_), false) => anyhow::bail!("--max and --edge cannot be combined"),
            };
            print(&levels)?
        }
        Command::Weighted { name, min, max } => {
            print(&graph.bfs_with_weight_range(&name, min, max)?)?
        }
        Command::Paths { name } => print(&graph.dfs_with_complete_paths(&name)?)?,
        Command::AddNode {
            collection,
            name,
            id,
            data,
        } => {
            let mut node = Node::new(collection, name).with_data(parse_data(data.as_deref())?);
            if let Some(id) = id {
                node = node.with_id(id);
            }
            print(&graph.add_node(node)?)?;
            return Ok(true);
        }
        Command::AddEdge {
            collection,
            relationship,
            from,
            to,
            weight,
            id,
            data,
        } => {
            let from = graph.get_node(&from)?.id;
            let to = graph.get_node(&to)?.id;
            let mut edge = Edge::new(collection, relationship, from, to)
                .with_weight(weight)
                .with_data(parse_data(data.as_deref())?);
            if let Some(id) = id {
                edge = edge.with_id(id);
            }
            print(&graph.add_edge(edge)?)?;
            return Ok(true);
        }
        Command::Apply { mode } => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let item: GraphItem =
                serde_json::from_str(&input).context("stdin is not a node or edge document")?;
            tracing::debug!(
                kind = %item.kind(),
                id = item.id(),
                collection = item.collection(),
                "Applying item"
            );
            match mode {
                ApplyMode::Add => print(&graph.add_item(item)?)?,
                ApplyMode::Replace => graph.replace_item(item)?,
                ApplyMode::Update => graph.update_item(item)?,
                ApplyMode::Merge => graph.merge_item(item)?,
            }
            return Ok(true);
        }
        Command::DeleteNode { name } => {
            graph.delete_node(&name)?;
            return Ok(true);
        }
        Command::DeleteEdge { id } => {
            graph.delete_edge(&EdgeId(id))?;
            return Ok(true);
        }
        Command::Delete { id } => {
            graph.delete_item_by_id(&id)?;
            return Ok(true);
        }
    }
    Ok(false)
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn edge_ids(raw: Vec<String>) -> Vec<EdgeId> {
    raw.into_iter().map(EdgeId).collect()
}

fn parse_data(raw: Option<&str>) -> anyhow::Result<Data> {
    match raw {
        None => Ok(Data::new()),
        Some(raw) => {
            let value = serde_json::from_str(raw).context("--data is not valid JSON")?;
            Ok(data_from_value(value)?)
        }
    }
}
