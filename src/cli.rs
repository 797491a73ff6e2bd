//! CLI commands for turngraph.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use crate::expand::{EdgeExpander, ExpansionConfig};
use crate::formats::GraphFile;
use crate::graph::RoutingGraph;
use crate::profile::{SigmoidTurnPenalty, SpeedProfile};

#[derive(Parser)]
#[command(name = "turngraph")]
#[command(about = "Turn-expanded routing graph construction", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Expand a node-based graph artifact into an edge-based graph
    Expand {
        /// Input graph artifact (.nbx)
        graph: PathBuf,

        /// Output directory for the expansion streams
        #[arg(short, long)]
        outdir: PathBuf,

        /// Speed-profile JSON (penalties and hook switch)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Also write the segment-lookup and fixed-penalty streams
        #[arg(long)]
        segment_lookup: bool,
    },

    /// Print statistics of a graph artifact
    Info {
        /// Input graph artifact (.nbx)
        graph: PathBuf,
    },
}

pub fn run_expand(
    graph_path: PathBuf,
    outdir: PathBuf,
    profile_path: Option<PathBuf>,
    segment_lookup: bool,
) -> Result<()> {
    let start_time = Instant::now();

    println!("Starting edge expansion");
    println!("  Graph: {}", graph_path.display());
    println!("  Output: {}", outdir.display());
    println!();

    let profile = match &profile_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading profile {}", path.display()))?;
            serde_json::from_str::<SpeedProfile>(&raw)
                .with_context(|| format!("parsing profile {}", path.display()))?
        }
        None => SpeedProfile::default(),
    };

    println!("Loading graph artifact...");
    let mut artifact = GraphFile::read(&graph_path)?;
    println!(
        "  ✓ Loaded {} nodes, {} directed edges, {} restrictions",
        artifact.graph.num_nodes(),
        artifact.graph.num_edges(),
        artifact.restrictions.len()
    );

    std::fs::create_dir_all(&outdir)?;
    let config = ExpansionConfig {
        original_edges_path: outdir.join("original_edges.bin"),
        segment_lookup_path: outdir.join("segment_lookup.bin"),
        edge_penalties_path: outdir.join("edge_penalties.bin"),
        generate_segment_lookup: segment_lookup,
    };

    println!("Expanding turns...");
    let penalty_fn = SigmoidTurnPenalty::default();
    let expander = EdgeExpander::new(
        &mut artifact.graph,
        &artifact.geometry,
        &artifact.restrictions,
        &artifact.barrier_nodes,
        &artifact.traffic_signals,
        &artifact.query_nodes,
        profile,
        Some(&penalty_fn),
    );
    let output = expander.run(&config)?;
    println!("  ✓ Wrote {}", config.original_edges_path.display());
    if segment_lookup {
        println!("  ✓ Wrote {}", config.segment_lookup_path.display());
        println!("  ✓ Wrote {}", config.edge_penalties_path.display());
    }

    println!();
    println!("✅ Edge expansion complete!");
    println!("  Expanded nodes: {}", output.expanded_nodes.len());
    println!("  Expanded edges: {}", output.expanded_edges.len());
    println!(
        "  Node-based edges visited: {}",
        output.stats.node_based_edges
    );
    println!(
        "  Skipped: {} restricted turns, {} U-turns, {} barrier turns",
        output.stats.restricted_turns,
        output.stats.skipped_uturns,
        output.stats.skipped_barrier_turns
    );
    println!("  Time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

pub fn run_info(graph_path: PathBuf) -> Result<()> {
    let artifact = GraphFile::read(&graph_path)?;
    let graph = &artifact.graph;

    let mut forward_edges = 0u64;
    let mut roundabout_edges = 0u64;
    for edge in 0..graph.num_edges() {
        let data = graph.edge_data(edge);
        if !data.reversed {
            forward_edges += 1;
        }
        if data.roundabout {
            roundabout_edges += 1;
        }
    }

    println!("Graph artifact: {}", graph_path.display());
    println!("  Nodes: {}", graph.num_nodes());
    println!("  Directed edges: {}", graph.num_edges());
    println!("  Routable directions: {forward_edges}");
    println!("  Roundabout directions: {roundabout_edges}");
    println!("  Restrictions: {}", artifact.restrictions.len());
    println!("  Barrier nodes: {}", artifact.barrier_nodes.len());
    println!("  Traffic signals: {}", artifact.traffic_signals.len());

    Ok(())
}
