//! Turn-candidate construction for one (incoming edge, intersection)
//! pair: enumerate the outgoing edges, prune forbidden moves, compute
//! the geometric angle and a first instruction for each.

use crate::geo::{compute_angle, representative_coordinate};
use crate::graph::{EdgeId, NodeId, RoutingGraph};
use crate::guidance::{
    angular_deviation, enters_roundabout, get_turn_direction, turn_confidence, DirectionModifier,
    TurnInstruction, TurnType, NARROW_TURN_ANGLE,
};

use super::EdgeExpander;

/// The incoming side of the angle is measured against the road behind
/// the junction.
const INVERT: bool = true;

/// One possible continuation at an intersection. Invalid candidates are
/// kept through post-processing so neighbors stay meaningful, and only
/// dropped when emitting edges.
#[derive(Debug, Clone, Copy)]
pub struct TurnCandidate {
    pub edge: EdgeId,
    pub valid: bool,
    /// Turn angle in [0, 360); 180 is straight through.
    pub angle: f64,
    pub instruction: TurnInstruction,
    pub confidence: f64,
}

impl<'a, G: RoutingGraph> EdgeExpander<'a, G> {
    /// Builds the sorted candidate list for the turn node of `via_edge`
    /// when approached from `from_node`.
    pub(crate) fn turn_candidates(
        &mut self,
        from_node: NodeId,
        via_edge: EdgeId,
    ) -> Vec<TurnCandidate> {
        let mut candidates = Vec::new();
        let turn_node = self.graph.target(via_edge);
        let only_turn_target = self.restrictions.only_turn_target(from_node, turn_node);
        let is_barrier_node = self.barrier_nodes.contains(&turn_node);

        let mut has_non_roundabout = false;
        let mut has_roundabout_entry = false;

        for onto_edge in self.graph.adjacent_edges(turn_node) {
            let mut turn_is_valid = true;
            if self.graph.edge_data(onto_edge).reversed {
                turn_is_valid = false;
            }
            let to_node = self.graph.target(onto_edge);

            if turn_is_valid {
                if let Some(only_to) = only_turn_target {
                    if to_node != only_to {
                        // governed by an only-turn, and this is not it
                        self.stats.restricted_turns += 1;
                        turn_is_valid = false;
                    }
                }
            }

            if turn_is_valid {
                if is_barrier_node {
                    // a barrier lets you turn around, nothing else
                    if from_node != to_node {
                        self.stats.skipped_barrier_turns += 1;
                        turn_is_valid = false;
                    }
                } else if from_node == to_node && self.graph.out_degree(turn_node) > 1 {
                    // U-turns stay legal at dead ends and where at most
                    // one bidirectional street leaves the junction
                    let mut bidirectional_edges = 0;
                    for edge in self.graph.adjacent_edges(turn_node) {
                        let target = self.graph.target(edge);
                        let reverse_edge = self.graph.find_edge(target, turn_node);
                        if !self.graph.edge_data(reverse_edge).reversed {
                            bidirectional_edges += 1;
                        }
                    }
                    if bidirectional_edges > 1 {
                        self.stats.skipped_uturns += 1;
                        turn_is_valid = false;
                    }
                }
            }

            // individual bans apply outside only-turn allowances
            if only_turn_target.is_none()
                && self.restrictions.is_restricted(from_node, turn_node, to_node)
            {
                self.stats.restricted_turns += 1;
                turn_is_valid = false;
            }

            let first_coordinate = representative_coordinate(
                from_node,
                turn_node,
                via_edge,
                INVERT,
                self.geometry,
                self.query_nodes,
            );
            let third_coordinate = representative_coordinate(
                turn_node,
                to_node,
                onto_edge,
                !INVERT,
                self.geometry,
                self.query_nodes,
            );
            let angle = compute_angle(
                first_coordinate,
                self.query_nodes[turn_node as usize].coordinate(),
                third_coordinate,
            );

            let instruction =
                self.analyze_turn(from_node, via_edge, turn_node, onto_edge, to_node, angle);

            if turn_is_valid && !enters_roundabout(instruction) {
                has_non_roundabout = true;
            } else if turn_is_valid {
                has_roundabout_entry = true;
            }

            let mut confidence = turn_confidence(angle, instruction);
            if !turn_is_valid {
                // invalid turns should lose conflict tie-breaks
                confidence *= 0.8;
            }

            candidates.push(TurnCandidate {
                edge: onto_edge,
                valid: turn_is_valid,
                angle,
                instruction,
                confidence,
            });
        }

        // an entry into a roundabout that also has plain exits is itself
        // a countable exit
        if has_non_roundabout && has_roundabout_entry {
            for candidate in &mut candidates {
                if enters_roundabout(candidate.instruction) {
                    match candidate.instruction.turn_type {
                        TurnType::EnterRotary => {
                            candidate.instruction.turn_type = TurnType::EnterRotaryAtExit;
                        }
                        TurnType::EnterRoundabout => {
                            candidate.instruction.turn_type = TurnType::EnterRoundaboutAtExit;
                        }
                        _ => {}
                    }
                }
            }
        }

        candidates.sort_by(|a, b| a.angle.total_cmp(&b.angle).then_with(|| a.edge.cmp(&b.edge)));

        prune_invalid_duplicates(&mut candidates);
        candidates
    }

    /// First classification of a turn from its endpoints and angle:
    /// U-turns, roundabout transitions and ramps ahead of plain turns.
    fn analyze_turn(
        &self,
        node_u: NodeId,
        edge1: EdgeId,
        node_v: NodeId,
        edge2: EdgeId,
        node_w: NodeId,
        angle: f64,
    ) -> TurnInstruction {
        let data1 = self.graph.edge_data(edge1);
        let data2 = self.graph.edge_data(edge2);

        if node_u == node_w {
            return TurnInstruction::new(TurnType::Turn, DirectionModifier::UTurn);
        }

        if data1.roundabout && data2.roundabout {
            // with a single continuation there is nothing to announce
            if self.graph.directed_out_degree(node_v) == 1 {
                return TurnInstruction::no_turn();
            }
            return TurnInstruction::remain_roundabout(get_turn_direction(angle));
        }
        if !data1.roundabout && data2.roundabout {
            return TurnInstruction::enter_roundabout(get_turn_direction(angle));
        }
        if data1.roundabout && !data2.roundabout {
            return TurnInstruction::exit_roundabout(get_turn_direction(angle));
        }

        if !data1.road_class.is_ramp() && data2.road_class.is_ramp() {
            return TurnInstruction::new(TurnType::Ramp, get_turn_direction(angle));
        }

        TurnInstruction::new(TurnType::Turn, get_turn_direction(angle))
    }
}

/// Drops invalid candidates that sit within `NARROW_TURN_ANGLE` of a
/// valid cyclic neighbor; they are spurious duplicates of that choice.
fn prune_invalid_duplicates(candidates: &mut Vec<TurnCandidate>) {
    fn is_invalid_equivalent(candidates: &[TurnCandidate], this: usize, valid: usize) -> bool {
        candidates[valid].valid
            && !candidates[this].valid
            && angular_deviation(candidates[this].angle, candidates[valid].angle)
                < NARROW_TURN_ANGLE
    }

    let mut index = 0;
    while index < candidates.len() {
        let n = candidates.len();
        let left = (index + 1) % n;
        let right = (index + n - 1) % n;
        if is_invalid_equivalent(candidates, index, right)
            || is_invalid_equivalent(candidates, index, left)
        {
            candidates.remove(index);
        } else {
            index += 1;
        }
    }
}
