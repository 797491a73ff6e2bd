//! Turngraph: turn-expanded routing graph construction
//!
//! Converts a node-based road graph (vertices = junctions, edges = road
//! segments) into an edge-based graph (vertices = directed road
//! segments, edges = permitted turns), the preprocessing step that lets
//! turn penalties and turn restrictions live as plain edge weights.
//!
//! The expansion runs in three stages over the node-based graph:
//! - Renumbering: every routable directed edge gets a dense forward id
//! - Node generation: one expanded node per compressed geometry segment
//!   of every undirected road
//! - Edge generation: per intersection, classify the possible turns,
//!   post-process the instruction set, and emit one expanded edge per
//!   surviving turn while streaming the per-turn records
//!
//! Everything around the core - the graph artifact, restriction index,
//! speed profile and turn-penalty hook - is an input surface; map
//! parsing and pathfinding live elsewhere.

pub mod cli;
pub mod compressed;
pub mod expand;
pub mod formats;
pub mod geo;
pub mod graph;
pub mod guidance;
pub mod profile;
pub mod restrictions;

pub use compressed::{CompressedEdgeContainer, SegmentEntry};
pub use expand::{
    EdgeExpander, ExpandedEdge, ExpandedNode, ExpansionConfig, ExpansionOutput, ExpansionStats,
    TurnCandidate,
};
pub use geo::QueryNode;
pub use graph::{
    EdgeData, EdgeId, InputEdge, NodeBasedGraph, NodeId, RoadClass, RoutingGraph, TravelMode,
};
pub use guidance::{DirectionModifier, TurnInstruction, TurnType};
pub use profile::{SigmoidTurnPenalty, SpeedProfile, TurnPenaltyFunction};
pub use restrictions::RestrictionMap;
