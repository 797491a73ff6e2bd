//! Post-processing of the sorted candidate list of one intersection:
//! fork and end-of-road detection, ramp continuation cleanup, conflict
//! resolution between same-modifier turns, and suppression of turns a
//! rider would follow without instruction.
//!
//! All passes rely on the candidates being sorted by angle, with the
//! U-turn (when present) at index 0. Neighbor lookups wrap around the
//! intersection cyclically.

use crate::graph::{EdgeId, RoutingGraph, SPECIAL_EDGEID};
use crate::guidance::{
    angular_deviation, can_be_suppressed, is_basic, is_conflict, is_on_roundabout, is_sharp_turn,
    is_slight_modifier, is_slight_turn, is_uturn, get_turn_direction, mirror_direction_modifier,
    resolve, resolve_transitive, DirectionModifier, TurnInstruction, TurnType,
    DISTINCTION_RATIO, FUZZY_STRAIGHT_ANGLE, MAXIMAL_ALLOWED_NO_TURN_DEVIATION,
    NARROW_TURN_ANGLE, STRAIGHT_ANGLE,
};

use super::{EdgeExpander, TurnCandidate};

const RESOLVE_TO_RIGHT: bool = true;
const RESOLVE_TO_LEFT: bool = false;

impl<'a, G: RoutingGraph> EdgeExpander<'a, G> {
    /// Fork / end-of-road detection, ramp cleanup and the conflict pass.
    /// Requires candidates sorted by angle.
    pub(crate) fn optimize_candidates(
        &self,
        via_edge: EdgeId,
        candidates: &mut Vec<TurnCandidate>,
    ) {
        debug_assert!(
            candidates.windows(2).all(|pair| pair[0].angle <= pair[1].angle),
            "turn candidates not sorted by angle"
        );
        if candidates.len() <= 1 {
            return;
        }

        if let Some(turn_type) = self.check_fork_and_end(via_edge, candidates) {
            handle_fork_and_end(turn_type, candidates);
            return;
        }

        self.optimize_ramps(via_edge, candidates);

        let n = candidates.len();
        let left_of = |index: usize| (index + 1) % n;
        let right_of = |index: usize| (index + n - 1) % n;

        // a street with separated parking strips can offer several
        // u-turn-labelled candidates; spread them out
        if is_uturn(candidates[0].instruction) && candidates[0].angle == 0.0 {
            if is_uturn(candidates[left_of(0)].instruction) {
                candidates[left_of(0)].instruction.direction_modifier =
                    DirectionModifier::SharpLeft;
            }
            if is_uturn(candidates[right_of(0)].instruction) {
                candidates[right_of(0)].instruction.direction_modifier =
                    DirectionModifier::SharpRight;
            }
        }

        let keep_straight = |angle: f64| (angle - STRAIGHT_ANGLE).abs() < 5.0;

        let mut turn_index = 0;
        while turn_index < n {
            let turn = candidates[turn_index];
            if !is_basic(turn.instruction.turn_type)
                || is_uturn(turn.instruction)
                || is_on_roundabout(turn.instruction)
            {
                turn_index += 1;
                continue;
            }

            let left = candidates[left_of(turn_index)];
            if turn.angle == left.angle {
                let location = self.query_nodes[self.graph.target(via_edge) as usize];
                tracing::debug!(
                    lat = location.lat,
                    lon = location.lon,
                    "conflicting turn angles, identical road duplicated?"
                );
            }
            if !is_conflict(turn.instruction, left.instruction) {
                turn_index += 1;
                continue;
            }

            // maximal contiguous run of candidates conflicting with the seed
            let conflict_begin = turn_index;
            let mut conflict_end = left_of(turn_index);
            let mut conflict_size = 2;
            while is_conflict(candidates[left_of(conflict_end)].instruction, turn.instruction)
                && conflict_size < n
            {
                conflict_end = left_of(conflict_end);
                conflict_size += 1;
            }
            let next_index = if conflict_end < conflict_begin {
                n
            } else {
                conflict_end
            };

            let left_of_end = left_of(conflict_end);
            let right_of_begin = right_of(conflict_begin);

            'conflict: {
                if conflict_size == 2 {
                    if candidates[conflict_begin].instruction.direction_modifier
                        == DirectionModifier::Straight
                        && candidates[left_of_end].instruction.direction_modifier
                            != DirectionModifier::SlightLeft
                        && candidates[right_of_begin].instruction.direction_modifier
                            != DirectionModifier::SlightRight
                    {
                        let mut resolved_count = 0;
                        if !keep_straight(candidates[conflict_end].angle)
                            && !resolve_at(candidates, conflict_end, left_of_end, RESOLVE_TO_LEFT)
                        {
                            tracing::debug!("failed to resolve conflict");
                        } else {
                            resolved_count += 1;
                        }
                        if !keep_straight(candidates[conflict_begin].angle)
                            && !resolve_at(
                                candidates,
                                conflict_begin,
                                right_of_begin,
                                RESOLVE_TO_RIGHT,
                            )
                        {
                            tracing::debug!("failed to resolve conflict");
                        } else {
                            resolved_count += 1;
                        }
                        if resolved_count >= 1
                            && (!keep_straight(candidates[conflict_begin].angle)
                                || !keep_straight(candidates[conflict_end].angle))
                        {
                            break 'conflict;
                        }
                    }

                    // shift the less plausible side first
                    if candidates[conflict_begin].confidence
                        < candidates[conflict_end].confidence
                    {
                        if resolve_at(candidates, conflict_begin, right_of_begin, RESOLVE_TO_RIGHT)
                            || resolve_at(candidates, conflict_end, left_of_end, RESOLVE_TO_LEFT)
                        {
                            break 'conflict;
                        }
                    } else if resolve_at(candidates, conflict_end, left_of_end, RESOLVE_TO_LEFT)
                        || resolve_at(candidates, conflict_begin, right_of_begin, RESOLVE_TO_RIGHT)
                    {
                        break 'conflict;
                    }

                    let seed = candidates[conflict_begin].instruction;
                    if is_slight_turn(seed) || is_sharp_turn(seed) {
                        let to_the_right = seed.direction_modifier
                            == DirectionModifier::SlightRight
                            || seed.direction_modifier == DirectionModifier::SharpLeft;
                        if to_the_right {
                            resolve_transitive_at(
                                candidates,
                                conflict_begin,
                                right_of_begin,
                                right_of(right_of_begin),
                                RESOLVE_TO_RIGHT,
                            );
                        } else {
                            resolve_transitive_at(
                                candidates,
                                conflict_end,
                                left_of_end,
                                left_of(left_of_end),
                                RESOLVE_TO_LEFT,
                            );
                        }
                    }
                } else {
                    // regions of three or more: free the outermost two and
                    // tolerate what remains inside
                    if conflict_size > 3 {
                        let location =
                            self.query_nodes[self.graph.target(via_edge) as usize];
                        tracing::debug!(
                            lat = location.lat,
                            lon = location.lon,
                            size = conflict_size,
                            "conflict larger than size three"
                        );
                    }
                    if !resolve_at(candidates, conflict_begin, right_of_begin, RESOLVE_TO_RIGHT) {
                        let seed = candidates[conflict_begin].instruction;
                        if is_slight_turn(seed) {
                            resolve_transitive_at(
                                candidates,
                                conflict_begin,
                                right_of_begin,
                                right_of(right_of_begin),
                                RESOLVE_TO_RIGHT,
                            );
                        } else if is_sharp_turn(seed) {
                            resolve_transitive_at(
                                candidates,
                                conflict_end,
                                left_of_end,
                                left_of(left_of_end),
                                RESOLVE_TO_LEFT,
                            );
                        }
                    }
                    if !resolve_at(candidates, conflict_end, left_of_end, RESOLVE_TO_LEFT) {
                        let seed = candidates[conflict_begin].instruction;
                        if is_slight_turn(seed) {
                            resolve_transitive_at(
                                candidates,
                                conflict_end,
                                left_of_end,
                                left_of(left_of_end),
                                RESOLVE_TO_LEFT,
                            );
                        } else if is_sharp_turn(seed) {
                            resolve_transitive_at(
                                candidates,
                                conflict_begin,
                                right_of_begin,
                                right_of(right_of_begin),
                                RESOLVE_TO_RIGHT,
                            );
                        }
                    }
                }
            }

            turn_index = next_index + 1;
        }
    }

    /// Recognizes the two three-way special cases: a Y-fork of two
    /// near-straight roads of one class, and the T-intersection where
    /// the incoming road ends.
    fn check_fork_and_end(
        &self,
        via_edge: EdgeId,
        candidates: &[TurnCandidate],
    ) -> Option<TurnType> {
        if candidates.len() != 3
            || candidates[0].instruction.direction_modifier != DirectionModifier::UTurn
        {
            return None;
        }

        if is_on_roundabout(candidates[1].instruction) {
            debug_assert!(is_on_roundabout(candidates[2].instruction));
            return None;
        }
        debug_assert!(!is_on_roundabout(candidates[2].instruction));

        let road_classes = [
            self.graph.edge_data(via_edge).road_class,
            self.graph.edge_data(candidates[1].edge).road_class,
            self.graph.edge_data(candidates[2].edge).road_class,
        ];

        if angular_deviation(candidates[1].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
            && angular_deviation(candidates[2].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
        {
            if road_classes[0] != road_classes[1] || road_classes[1] != road_classes[2] {
                return None;
            }
            if candidates[1].valid && candidates[2].valid {
                return Some(TurnType::Fork);
            }
        } else if angular_deviation(candidates[1].angle, 90.0) < NARROW_TURN_ANGLE
            && angular_deviation(candidates[2].angle, 270.0) < NARROW_TURN_ANGLE
        {
            return Some(TurnType::EndOfRoad);
        }

        None
    }

    /// Suppresses the straight continuation of a ramp onto its own
    /// name, and straightens slight ramp modifiers to point away from
    /// the continuation.
    fn optimize_ramps(&self, via_edge: EdgeId, candidates: &mut [TurnCandidate]) {
        let in_data = *self.graph.edge_data(via_edge);

        let mut continue_edge = SPECIAL_EDGEID;
        for candidate in candidates.iter_mut() {
            if candidate.instruction.direction_modifier == DirectionModifier::UTurn {
                continue;
            }
            if self.graph.edge_data(candidate.edge).name_id == in_data.name_id {
                continue_edge = candidate.edge;
                if angular_deviation(candidate.angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
                    && in_data.road_class.is_ramp()
                {
                    candidate.instruction.turn_type = TurnType::Suppressed;
                }
                break;
            }
        }

        if continue_edge != SPECIAL_EDGEID {
            let mut to_the_right = true;
            for candidate in candidates.iter_mut() {
                if candidate.edge == continue_edge {
                    to_the_right = false;
                    continue;
                }
                if candidate.instruction.turn_type != TurnType::Ramp {
                    continue;
                }
                if is_slight_modifier(candidate.instruction.direction_modifier) {
                    candidate.instruction.direction_modifier = if to_the_right {
                        DirectionModifier::SlightRight
                    } else {
                        DirectionModifier::SlightLeft
                    };
                }
            }
        }
    }

    /// The suppression pass: collapse continuations a rider would take
    /// anyway, rename obvious transitions, and nudge straight turns off
    /// an obvious same-name continuation.
    pub(crate) fn suppress_turns(&self, via_edge: EdgeId, candidates: &mut [TurnCandidate]) {
        if candidates.len() == 3 {
            let class1 = self.graph.edge_data(candidates[1].edge).road_class;
            let class2 = self.graph.edge_data(candidates[2].edge).road_class;
            let via_name = self.graph.edge_data(via_edge).name_id;

            if class1.is_low_priority() && !class2.is_low_priority() {
                if angular_deviation(candidates[2].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE {
                    if self.graph.edge_data(candidates[2].edge).name_id == via_name {
                        candidates[2].instruction = TurnInstruction::no_turn();
                    } else {
                        candidates[2].instruction.turn_type = TurnType::NewName;
                    }
                    return;
                }
            } else if class2.is_low_priority() && !class1.is_low_priority() {
                if angular_deviation(candidates[1].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE {
                    if self.graph.edge_data(candidates[1].edge).name_id == via_name {
                        candidates[1].instruction = TurnInstruction::no_turn();
                    } else {
                        candidates[1].instruction.turn_type = TurnType::NewName;
                    }
                    return;
                }
            }
        }

        debug_assert!(
            candidates.windows(2).all(|pair| pair[0].angle <= pair[1].angle),
            "turn candidates not sorted by angle"
        );

        let n = candidates.len();
        if n == 0 {
            return;
        }
        let left_of = |index: usize| (index + 1) % n;
        let right_of = |index: usize| (index + n - 1) % n;

        let in_data = *self.graph.edge_data(via_edge);

        let mut has_obvious_with_same_name = false;
        let mut obvious_with_same_name_angle = 0.0;
        for index in 0..n {
            if self.graph.edge_data(candidates[index].edge).name_id == in_data.name_id
                && self.is_obvious_choice(via_edge, index, candidates)
            {
                has_obvious_with_same_name = true;
                obvious_with_same_name_angle = candidates[index].angle;
                break;
            }
        }

        for index in 0..n {
            if !is_basic(candidates[index].instruction.turn_type) {
                continue;
            }

            let out_data = *self.graph.edge_data(candidates[index].edge);
            if out_data.name_id == in_data.name_id
                && in_data.name_id != 0
                && candidates[index].instruction.direction_modifier != DirectionModifier::UTurn
                && !has_obvious_with_same_name
            {
                candidates[index].instruction.turn_type = TurnType::Continue;
            }

            if !candidates[index].valid || is_uturn(candidates[index].instruction) {
                continue;
            }

            let left = candidates[left_of(index)];
            let right = candidates[right_of(index)];

            // nearly straight and nothing else close to straight: call it straight
            if (!is_slight_modifier(get_turn_direction(left.angle)) || !left.valid)
                && (!is_slight_modifier(get_turn_direction(right.angle)) || !right.valid)
                && angular_deviation(candidates[index].angle, STRAIGHT_ANGLE)
                    < FUZZY_STRAIGHT_ANGLE
            {
                candidates[index].instruction.direction_modifier = DirectionModifier::Straight;
            }

            // mode changes always stay announced
            if in_data.travel_mode != out_data.travel_mode {
                continue;
            }

            if self.is_obvious_choice(via_edge, index, candidates) {
                if in_data.name_id == out_data.name_id {
                    candidates[index].instruction.turn_type = TurnType::Suppressed;
                } else if !has_obvious_with_same_name {
                    if in_data.road_class.is_ramp() && !out_data.road_class.is_ramp() {
                        // leaving a ramp onto the actual road
                        candidates[index].instruction.turn_type = TurnType::Merge;
                        candidates[index].instruction.direction_modifier =
                            mirror_direction_modifier(
                                candidates[index].instruction.direction_modifier,
                            );
                    } else if can_be_suppressed(candidates[index].instruction.turn_type) {
                        candidates[index].instruction.turn_type = TurnType::NewName;
                    }
                } else if candidates[index].angle < obvious_with_same_name_angle {
                    candidates[index].instruction.direction_modifier =
                        DirectionModifier::SlightRight;
                } else {
                    candidates[index].instruction.direction_modifier =
                        DirectionModifier::SlightLeft;
                }
            } else if candidates[index].instruction.direction_modifier
                == DirectionModifier::Straight
                && has_obvious_with_same_name
            {
                if candidates[index].angle < obvious_with_same_name_angle {
                    candidates[index].instruction.direction_modifier =
                        DirectionModifier::SlightRight;
                } else {
                    candidates[index].instruction.direction_modifier =
                        DirectionModifier::SlightLeft;
                }
            }
        }
    }

    /// A candidate a rider can follow without instruction: the unique
    /// natural continuation by class, geometry or name.
    fn is_obvious_choice(
        &self,
        via_edge: EdgeId,
        turn_index: usize,
        candidates: &[TurnCandidate],
    ) -> bool {
        let n = candidates.len();
        let candidate = &candidates[turn_index];
        let in_data = self.graph.edge_data(via_edge);
        let out_data = self.graph.edge_data(candidate.edge);
        let left = &candidates[(turn_index + 1) % n];
        let right = &candidates[(turn_index + n - 1) % n];

        if !out_data.road_class.is_low_priority() {
            let mut is_only_normal_road = true;
            for (index, other) in candidates.iter().enumerate() {
                if index == turn_index || other.angle == 0.0 {
                    continue;
                }
                if !self.graph.edge_data(other.edge).road_class.is_low_priority() {
                    is_only_normal_road = false;
                    break;
                }
            }
            if is_only_normal_road {
                return true;
            }
        }

        n == 1
            || (n == 2 && is_uturn(left.instruction))
            || angular_deviation(candidate.angle, STRAIGHT_ANGLE)
                < MAXIMAL_ALLOWED_NO_TURN_DEVIATION
            || has_valid_ratio(left, candidate, right)
            || (in_data.name_id != 0
                && in_data.name_id == out_data.name_id
                && angular_deviation(candidate.angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE / 2.0)
    }
}

/// A turn dominates its neighbors when it is near straight and the
/// neighbors deviate at least `DISTINCTION_RATIO` times further.
fn has_valid_ratio(left: &TurnCandidate, center: &TurnCandidate, right: &TurnCandidate) -> bool {
    let angle_left = if left.angle > STRAIGHT_ANGLE {
        angular_deviation(left.angle, STRAIGHT_ANGLE)
    } else {
        STRAIGHT_ANGLE
    };
    let angle_right = if right.angle < STRAIGHT_ANGLE {
        angular_deviation(right.angle, STRAIGHT_ANGLE)
    } else {
        STRAIGHT_ANGLE
    };
    let self_angle = angular_deviation(center.angle, STRAIGHT_ANGLE);

    angular_deviation(center.angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
        && if center.angle < STRAIGHT_ANGLE {
            angle_right > self_angle && angle_left / self_angle > DISTINCTION_RATIO
        } else {
            angle_left > self_angle && angle_right / self_angle > DISTINCTION_RATIO
        }
}

fn handle_fork_and_end(turn_type: TurnType, candidates: &mut [TurnCandidate]) {
    candidates[1].instruction.turn_type = turn_type;
    candidates[1].instruction.direction_modifier = if turn_type == TurnType::Fork {
        DirectionModifier::SlightRight
    } else {
        DirectionModifier::Right
    };
    candidates[2].instruction.turn_type = turn_type;
    candidates[2].instruction.direction_modifier = if turn_type == TurnType::Fork {
        DirectionModifier::SlightLeft
    } else {
        DirectionModifier::Left
    };
}

/// Index-based wrapper around [`resolve`]; the neighbor is read at call
/// time so chained resolutions observe earlier shifts.
fn resolve_at(
    candidates: &mut [TurnCandidate],
    target: usize,
    neighbor: usize,
    to_the_right: bool,
) -> bool {
    let neighbor_instruction = candidates[neighbor].instruction;
    let mut instruction = candidates[target].instruction;
    if resolve(&mut instruction, neighbor_instruction, to_the_right) {
        candidates[target].instruction = instruction;
        true
    } else {
        false
    }
}

fn resolve_transitive_at(
    candidates: &mut [TurnCandidate],
    target: usize,
    neighbor: usize,
    far_neighbor: usize,
    to_the_right: bool,
) -> bool {
    let far_instruction = candidates[far_neighbor].instruction;
    let mut neighbor_instruction = candidates[neighbor].instruction;
    let mut instruction = candidates[target].instruction;
    if resolve_transitive(
        &mut instruction,
        &mut neighbor_instruction,
        far_instruction,
        to_the_right,
    ) {
        candidates[target].instruction = instruction;
        candidates[neighbor].instruction = neighbor_instruction;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::get_turn_direction;

    fn candidate(angle: f64) -> TurnCandidate {
        TurnCandidate {
            edge: angle as EdgeId,
            valid: true,
            angle,
            instruction: TurnInstruction::new(TurnType::Turn, get_turn_direction(angle)),
            confidence: 1.0,
        }
    }

    #[test]
    fn test_handle_fork_assigns_slight_pair() {
        let mut candidates = vec![candidate(0.0), candidate(165.0), candidate(195.0)];
        handle_fork_and_end(TurnType::Fork, &mut candidates);
        assert_eq!(candidates[1].instruction.turn_type, TurnType::Fork);
        assert_eq!(
            candidates[1].instruction.direction_modifier,
            DirectionModifier::SlightRight
        );
        assert_eq!(
            candidates[2].instruction.direction_modifier,
            DirectionModifier::SlightLeft
        );
    }

    #[test]
    fn test_handle_end_of_road_assigns_right_left() {
        let mut candidates = vec![candidate(0.0), candidate(90.0), candidate(270.0)];
        handle_fork_and_end(TurnType::EndOfRoad, &mut candidates);
        assert_eq!(
            candidates[1].instruction.direction_modifier,
            DirectionModifier::Right
        );
        assert_eq!(
            candidates[2].instruction.direction_modifier,
            DirectionModifier::Left
        );
    }

    #[test]
    fn test_valid_ratio_requires_dominance() {
        // near straight, neighbors far off: dominant
        let left = candidate(275.0);
        let center = candidate(190.0);
        let right = candidate(85.0);
        assert!(has_valid_ratio(&left, &center, &right));

        // a neighbor even closer to straight removes the dominance
        let close_left = candidate(185.0);
        assert!(!has_valid_ratio(&close_left, &center, &right));

        // turns far from straight are never obvious by ratio
        let sharp = candidate(100.0);
        assert!(!has_valid_ratio(&left, &sharp, &right));
    }

    #[test]
    fn test_resolve_at_observes_current_neighbor() {
        let mut candidates = vec![candidate(170.0), candidate(180.0)];
        candidates[0].instruction.direction_modifier = DirectionModifier::Straight;
        candidates[1].instruction.direction_modifier = DirectionModifier::Straight;

        assert!(resolve_at(&mut candidates, 0, 1, RESOLVE_TO_RIGHT));
        assert_eq!(
            candidates[0].instruction.direction_modifier,
            DirectionModifier::SlightRight
        );
        // the shifted neighbor now blocks that slot
        assert!(!resolve_at(&mut candidates, 1, 0, RESOLVE_TO_RIGHT));
    }
}
