//! Edge expansion: turns a node-based road graph into an edge-based one.
//!
//! Vertices of the expanded graph are directed road segments, edges are
//! the permitted turns between them. The step runs in three stages:
//! renumbering the forward edges, generating one expanded node per
//! compressed geometry segment, and emitting one expanded edge per
//! surviving turn candidate while streaming the per-turn records.

use anyhow::Result;
use rustc_hash::FxHashSet;
use std::path::PathBuf;

use crate::compressed::CompressedEdgeContainer;
use crate::formats::edge_penalties::EdgePenaltyWriter;
use crate::formats::original_edges::{OriginalEdgeData, OriginalEdgeWriter};
use crate::formats::segment_lookup::SegmentLookupWriter;
use crate::geo::{great_circle_distance, QueryNode};
use crate::graph::{
    EdgeId, EdgeWeight, NodeId, RoutingGraph, INVALID_COMPONENTID, INVALID_EDGE_WEIGHT,
    SPECIAL_EDGEID, TravelMode,
};
use crate::guidance::{is_uturn, STRAIGHT_ANGLE};
use crate::profile::{SpeedProfile, TurnPenaltyFunction};
use crate::restrictions::RestrictionMap;

mod candidates;
mod postprocess;

pub use candidates::TurnCandidate;

/// Output file locations for one expansion run.
#[derive(Debug, Clone)]
pub struct ExpansionConfig {
    pub original_edges_path: PathBuf,
    pub segment_lookup_path: PathBuf,
    pub edge_penalties_path: PathBuf,
    /// Write the segment-lookup and fixed-penalty streams too.
    pub generate_segment_lookup: bool,
}

/// One expanded node: the i-th geometry segment of an undirected road,
/// carrying the forward and reverse edge ids it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandedNode {
    pub forward_edge_id: EdgeId,
    pub reverse_edge_id: EdgeId,
    pub u: NodeId,
    pub v: NodeId,
    pub name_id: u32,
    pub forward_geometry_position: u32,
    pub reverse_geometry_position: u32,
    pub component_id: u32,
    pub segment_index: u32,
    pub forward_travel_mode: TravelMode,
    pub reverse_travel_mode: TravelMode,
}

/// One expanded edge: a permitted turn between two forward edge ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandedEdge {
    pub source: EdgeId,
    pub target: EdgeId,
    pub sequential_id: u32,
    pub weight: EdgeWeight,
    pub forward: bool,
    pub backward: bool,
}

/// Counters reported after a run. Not errors: pruned turns are part of
/// the expansion semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    pub node_based_edges: u64,
    pub original_edges: u32,
    pub restricted_turns: u64,
    pub skipped_uturns: u64,
    pub skipped_barrier_turns: u64,
}

/// Everything handed back to the caller by move after a run.
#[derive(Debug)]
pub struct ExpansionOutput {
    pub expanded_nodes: Vec<ExpandedNode>,
    pub node_weights: Vec<EdgeWeight>,
    pub is_startpoint: Vec<bool>,
    pub expanded_edges: Vec<ExpandedEdge>,
    pub max_edge_id: EdgeId,
    pub stats: ExpansionStats,
}

pub struct EdgeExpander<'a, G: RoutingGraph> {
    graph: &'a mut G,
    geometry: &'a CompressedEdgeContainer,
    restrictions: &'a RestrictionMap,
    barrier_nodes: &'a FxHashSet<NodeId>,
    traffic_signals: &'a FxHashSet<NodeId>,
    query_nodes: &'a [QueryNode],
    profile: SpeedProfile,
    penalty_fn: Option<&'a dyn TurnPenaltyFunction>,

    max_edge_id: EdgeId,
    expanded_nodes: Vec<ExpandedNode>,
    node_weights: Vec<EdgeWeight>,
    is_startpoint: Vec<bool>,
    expanded_edges: Vec<ExpandedEdge>,
    stats: ExpansionStats,
}

impl<'a, G: RoutingGraph> EdgeExpander<'a, G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: &'a mut G,
        geometry: &'a CompressedEdgeContainer,
        restrictions: &'a RestrictionMap,
        barrier_nodes: &'a FxHashSet<NodeId>,
        traffic_signals: &'a FxHashSet<NodeId>,
        query_nodes: &'a [QueryNode],
        profile: SpeedProfile,
        penalty_fn: Option<&'a dyn TurnPenaltyFunction>,
    ) -> Self {
        Self {
            graph,
            geometry,
            restrictions,
            barrier_nodes,
            traffic_signals,
            query_nodes,
            profile,
            penalty_fn,
            max_edge_id: 0,
            expanded_nodes: Vec::new(),
            node_weights: Vec::new(),
            is_startpoint: Vec::new(),
            expanded_edges: Vec::new(),
            stats: ExpansionStats::default(),
        }
    }

    /// Runs the full expansion and hands out the in-memory results.
    pub fn run(mut self, config: &ExpansionConfig) -> Result<ExpansionOutput> {
        self.max_edge_id = self.renumber_edges().wrapping_sub(1);
        self.generate_expanded_nodes();
        self.generate_expanded_edges(config)?;

        debug_assert_eq!(self.expanded_nodes.len(), self.is_startpoint.len());
        debug_assert_eq!(
            self.node_weights.len(),
            self.max_edge_id.wrapping_add(1) as usize
        );

        Ok(ExpansionOutput {
            expanded_nodes: self.expanded_nodes,
            node_weights: self.node_weights,
            is_startpoint: self.is_startpoint,
            expanded_edges: self.expanded_edges,
            max_edge_id: self.max_edge_id,
            stats: self.stats,
        })
    }

    /// Assigns a dense forward id to every non-reversed edge, walking
    /// the nodes in id order. Seeds the per-expanded-node weight with
    /// the U-turn penalty: a loop over the street is the cheapest way
    /// to come back. Returns the number of ids handed out.
    fn renumber_edges(&mut self) -> u32 {
        let u_turn_penalty = self.profile.u_turn_penalty;
        let mut numbered_edges = 0u32;
        for node in 0..self.graph.num_nodes() {
            for edge in self.graph.adjacent_edges(node) {
                let data = self.graph.edge_data_mut(edge);
                if data.reversed {
                    continue;
                }
                data.edge_id = numbered_edges;
                let weight = data.distance.saturating_add_signed(u_turn_penalty);
                self.node_weights.push(weight);
                numbered_edges += 1;
            }
        }
        numbered_edges
    }

    /// Emits one expanded node per geometry segment of every undirected
    /// edge pair. Pairs are visited once via the `u < v` side.
    fn generate_expanded_nodes(&mut self) {
        for node_u in 0..self.graph.num_nodes() {
            for edge in self.graph.adjacent_edges(node_u) {
                let node_v = self.graph.target(edge);
                if node_u > node_v {
                    continue;
                }
                // lead with the routable direction
                if self.graph.edge_data(edge).edge_id == SPECIAL_EDGEID {
                    self.insert_expanded_node(node_v, node_u);
                } else {
                    self.insert_expanded_node(node_u, node_v);
                }
            }
        }
        tracing::debug!(
            nodes = self.expanded_nodes.len(),
            "generated expanded nodes"
        );
    }

    fn insert_expanded_node(&mut self, node_u: NodeId, node_v: NodeId) {
        let forward_edge = self.graph.find_edge(node_u, node_v);
        debug_assert_ne!(forward_edge, SPECIAL_EDGEID);
        let forward_data = *self.graph.edge_data(forward_edge);

        let reverse_edge = self.graph.find_edge(node_v, node_u);
        debug_assert_ne!(reverse_edge, SPECIAL_EDGEID);
        let reverse_data = *self.graph.edge_data(reverse_edge);

        if forward_data.edge_id == SPECIAL_EDGEID && reverse_data.edge_id == SPECIAL_EDGEID {
            return;
        }
        // a street passable in one direction only never allows the loop
        if forward_data.edge_id != SPECIAL_EDGEID && reverse_data.edge_id == SPECIAL_EDGEID {
            self.node_weights[forward_data.edge_id as usize] = INVALID_EDGE_WEIGHT;
        }

        let forward_geometry = self.geometry.bucket(forward_edge);
        let reverse_geometry = self.geometry.bucket(reverse_edge);
        debug_assert_eq!(forward_geometry.len(), reverse_geometry.len());
        debug_assert!(!forward_geometry.is_empty());
        let geometry_size = forward_geometry.len();

        let mut source_coordinate = node_u;
        for i in 0..geometry_size {
            debug_assert_eq!(
                source_coordinate,
                reverse_geometry[geometry_size - 1 - i].node_id
            );
            let target_coordinate = forward_geometry[i].node_id;
            debug_assert_ne!(target_coordinate, source_coordinate);
            debug_assert!(self.query_nodes[source_coordinate as usize]
                .coordinate()
                .is_valid());

            self.expanded_nodes.push(ExpandedNode {
                forward_edge_id: forward_data.edge_id,
                reverse_edge_id: reverse_data.edge_id,
                u: source_coordinate,
                v: target_coordinate,
                name_id: forward_data.name_id,
                forward_geometry_position: self.geometry.position(forward_edge),
                reverse_geometry_position: self.geometry.position(reverse_edge),
                component_id: INVALID_COMPONENTID,
                segment_index: i as u32,
                forward_travel_mode: forward_data.travel_mode,
                reverse_travel_mode: reverse_data.travel_mode,
            });
            self.is_startpoint
                .push(forward_data.startpoint || reverse_data.startpoint);
            source_coordinate = target_coordinate;
        }
        debug_assert_eq!(source_coordinate, node_v);
    }

    /// Walks every (incoming edge, intersection) pair, classifies the
    /// outgoing turns and appends an expanded edge per surviving one,
    /// streaming the parallel original-edge record.
    fn generate_expanded_edges(&mut self, config: &ExpansionConfig) -> Result<()> {
        let mut edge_writer = OriginalEdgeWriter::create(&config.original_edges_path)?;
        let mut segment_writer = if config.generate_segment_lookup {
            Some(SegmentLookupWriter::create(&config.segment_lookup_path)?)
        } else {
            None
        };
        let mut penalty_writer = if config.generate_segment_lookup {
            Some(EdgePenaltyWriter::create(&config.edge_penalties_path)?)
        } else {
            None
        };

        for node_u in 0..self.graph.num_nodes() {
            for via_edge in self.graph.adjacent_edges(node_u) {
                if self.graph.edge_data(via_edge).reversed {
                    continue;
                }
                self.stats.node_based_edges += 1;

                let mut turn_candidates = self.turn_candidates(node_u, via_edge);
                self.optimize_candidates(via_edge, &mut turn_candidates);
                self.suppress_turns(via_edge, &mut turn_candidates);

                let node_v = self.graph.target(via_edge);

                for turn in &turn_candidates {
                    if !turn.valid {
                        continue;
                    }

                    let data1 = *self.graph.edge_data(via_edge);
                    let data2 = *self.graph.edge_data(turn.edge);
                    debug_assert_ne!(data1.edge_id, data2.edge_id);
                    debug_assert!(!data1.reversed);
                    debug_assert!(!data2.reversed);
                    debug_assert_ne!(data1.edge_id, SPECIAL_EDGEID);
                    debug_assert_ne!(data2.edge_id, SPECIAL_EDGEID);

                    let mut weight = data1.distance;
                    if self.traffic_signals.contains(&node_v) {
                        weight =
                            weight.saturating_add_signed(self.profile.traffic_signal_penalty);
                    }
                    let turn_penalty = self.turn_penalty(turn.angle);
                    if is_uturn(turn.instruction) {
                        weight = weight.saturating_add_signed(self.profile.u_turn_penalty);
                    }
                    weight = weight.saturating_add_signed(turn_penalty);

                    edge_writer.push(OriginalEdgeData {
                        via_geometry_position: self.geometry.position(via_edge),
                        name_id: data1.name_id,
                        instruction: turn.instruction,
                        travel_mode: data1.travel_mode,
                    })?;

                    self.expanded_edges.push(ExpandedEdge {
                        source: data1.edge_id,
                        target: data2.edge_id,
                        sequential_id: self.expanded_edges.len() as u32,
                        weight,
                        forward: true,
                        backward: false,
                    });

                    // the expanded weight is based on the source road, so
                    // stream its segments keyed to this expanded edge
                    if let (Some(segments), Some(penalties)) =
                        (segment_writer.as_mut(), penalty_writer.as_mut())
                    {
                        penalties.push(weight.saturating_sub(data1.distance))?;

                        let bucket = self.geometry.bucket(via_edge);
                        segments.begin_edge(
                            bucket.len() as u32 + 1,
                            self.query_nodes[node_u as usize].node_id,
                        )?;
                        let mut previous = node_u;
                        for entry in bucket {
                            let from = self.query_nodes[previous as usize];
                            let to = self.query_nodes[entry.node_id as usize];
                            let segment_length =
                                great_circle_distance(from.coordinate(), to.coordinate());
                            segments.push_segment(to.node_id, segment_length, entry.weight)?;
                            previous = entry.node_id;
                        }
                    }
                }
            }
        }

        if let Some(writer) = segment_writer {
            writer.finish()?;
        }
        if let Some(writer) = penalty_writer {
            writer.finish()?;
        }
        // the count patch at offset 0 is the last write of the run
        self.stats.original_edges = edge_writer.finish()?;

        tracing::debug!(
            expanded_edges = self.expanded_edges.len(),
            restricted_turns = self.stats.restricted_turns,
            skipped_uturns = self.stats.skipped_uturns,
            skipped_barrier_turns = self.stats.skipped_barrier_turns,
            "generated expanded edges"
        );
        Ok(())
    }

    /// Asks the user hook for the turn penalty of a deviation from
    /// straight. A failing hook is logged and costs nothing.
    fn turn_penalty(&self, angle: f64) -> i32 {
        if !self.profile.has_turn_penalty_function {
            return 0;
        }
        let Some(penalty_fn) = self.penalty_fn else {
            return 0;
        };
        match penalty_fn.turn_penalty(STRAIGHT_ANGLE - angle) {
            Ok(penalty) => penalty as i32,
            Err(err) => {
                tracing::warn!("turn penalty function failed: {err}");
                0
            }
        }
    }
}
