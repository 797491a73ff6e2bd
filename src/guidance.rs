//! Turn instructions and the pure classification tables over them.
//!
//! A turn instruction is a tagged pair of turn type and direction
//! modifier. The two stay orthogonal on purpose: the post-processing
//! passes reassign modifiers independently of the type.

/// Angle interpreted as going straight through.
pub const STRAIGHT_ANGLE: f64 = 180.0;
/// Deviation from straight below which no turn needs announcing.
pub const MAXIMAL_ALLOWED_NO_TURN_DEVIATION: f64 = 2.0;
/// Angle between two nearly indistinguishable roads.
pub const NARROW_TURN_ANGLE: f64 = 35.0;
/// Deviation that still counts as straight when it is the only narrow turn.
pub const FUZZY_STRAIGHT_ANGLE: f64 = 15.0;
/// Required asymmetry between a turn and its neighbors to call it obvious.
pub const DISTINCTION_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TurnType {
    Invalid = 0,
    NoTurn = 1,
    Suppressed = 2,
    NewName = 3,
    Continue = 4,
    Turn = 5,
    Merge = 6,
    Ramp = 7,
    Fork = 8,
    EndOfRoad = 9,
    EnterRoundabout = 10,
    EnterRoundaboutAtExit = 11,
    ExitRoundabout = 12,
    RemainRoundabout = 13,
    EnterRotary = 14,
    EnterRotaryAtExit = 15,
}

impl From<u8> for TurnType {
    fn from(value: u8) -> Self {
        match value {
            1 => TurnType::NoTurn,
            2 => TurnType::Suppressed,
            3 => TurnType::NewName,
            4 => TurnType::Continue,
            5 => TurnType::Turn,
            6 => TurnType::Merge,
            7 => TurnType::Ramp,
            8 => TurnType::Fork,
            9 => TurnType::EndOfRoad,
            10 => TurnType::EnterRoundabout,
            11 => TurnType::EnterRoundaboutAtExit,
            12 => TurnType::ExitRoundabout,
            13 => TurnType::RemainRoundabout,
            14 => TurnType::EnterRotary,
            15 => TurnType::EnterRotaryAtExit,
            _ => TurnType::Invalid,
        }
    }
}

/// The eight direction modifiers, ordered clockwise from the U-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DirectionModifier {
    UTurn = 0,
    SharpRight = 1,
    Right = 2,
    SlightRight = 3,
    Straight = 4,
    SlightLeft = 5,
    Left = 6,
    SharpLeft = 7,
}

impl From<u8> for DirectionModifier {
    fn from(value: u8) -> Self {
        match value {
            1 => DirectionModifier::SharpRight,
            2 => DirectionModifier::Right,
            3 => DirectionModifier::SlightRight,
            4 => DirectionModifier::Straight,
            5 => DirectionModifier::SlightLeft,
            6 => DirectionModifier::Left,
            7 => DirectionModifier::SharpLeft,
            _ => DirectionModifier::UTurn,
        }
    }
}

impl DirectionModifier {
    /// One step toward sharper right; the U-turn is not reachable.
    pub fn step_right(self) -> Option<Self> {
        match self as u8 {
            2..=7 => Some(DirectionModifier::from(self as u8 - 1)),
            _ => None,
        }
    }

    /// One step toward sharper left.
    pub fn step_left(self) -> Option<Self> {
        match self as u8 {
            1..=6 => Some(DirectionModifier::from(self as u8 + 1)),
            _ => None,
        }
    }

    /// Center of the angle band this modifier is assigned from.
    fn band_center(self) -> f64 {
        match self {
            DirectionModifier::UTurn => 0.0,
            DirectionModifier::SharpRight => 30.0,
            DirectionModifier::Right => 100.0,
            DirectionModifier::SlightRight => 150.0,
            DirectionModifier::Straight => 180.0,
            DirectionModifier::SlightLeft => 210.0,
            DirectionModifier::Left => 260.0,
            DirectionModifier::SharpLeft => 320.0,
        }
    }

    fn band_half_width(self) -> f64 {
        match self {
            DirectionModifier::UTurn => 20.0,
            DirectionModifier::SharpRight => 30.0,
            DirectionModifier::Right => 40.0,
            DirectionModifier::SlightRight => 10.0,
            DirectionModifier::Straight => 20.0,
            DirectionModifier::SlightLeft => 10.0,
            DirectionModifier::Left => 40.0,
            DirectionModifier::SharpLeft => 20.0,
        }
    }
}

/// Mirrors a modifier across the straight axis (left <-> right).
pub fn mirror_direction_modifier(modifier: DirectionModifier) -> DirectionModifier {
    match modifier {
        DirectionModifier::UTurn => DirectionModifier::UTurn,
        DirectionModifier::SharpRight => DirectionModifier::SharpLeft,
        DirectionModifier::Right => DirectionModifier::Left,
        DirectionModifier::SlightRight => DirectionModifier::SlightLeft,
        DirectionModifier::Straight => DirectionModifier::Straight,
        DirectionModifier::SlightLeft => DirectionModifier::SlightRight,
        DirectionModifier::Left => DirectionModifier::Right,
        DirectionModifier::SharpLeft => DirectionModifier::SharpRight,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnInstruction {
    pub turn_type: TurnType,
    pub direction_modifier: DirectionModifier,
}

impl TurnInstruction {
    pub fn new(turn_type: TurnType, direction_modifier: DirectionModifier) -> Self {
        Self {
            turn_type,
            direction_modifier,
        }
    }

    pub fn no_turn() -> Self {
        Self::new(TurnType::NoTurn, DirectionModifier::UTurn)
    }

    pub fn invalid() -> Self {
        Self::new(TurnType::Invalid, DirectionModifier::UTurn)
    }

    pub fn remain_roundabout(modifier: DirectionModifier) -> Self {
        Self::new(TurnType::RemainRoundabout, modifier)
    }

    pub fn enter_roundabout(modifier: DirectionModifier) -> Self {
        Self::new(TurnType::EnterRoundabout, modifier)
    }

    pub fn exit_roundabout(modifier: DirectionModifier) -> Self {
        Self::new(TurnType::ExitRoundabout, modifier)
    }
}

/// Maps an angle in [0, 360) onto its direction modifier.
pub fn get_turn_direction(angle: f64) -> DirectionModifier {
    if angle > 0.0 && angle < 60.0 {
        DirectionModifier::SharpRight
    } else if angle >= 60.0 && angle < 140.0 {
        DirectionModifier::Right
    } else if angle >= 140.0 && angle < 160.0 {
        DirectionModifier::SlightRight
    } else if angle >= 160.0 && angle <= 200.0 {
        DirectionModifier::Straight
    } else if angle > 200.0 && angle < 220.0 {
        DirectionModifier::SlightLeft
    } else if angle >= 220.0 && angle < 300.0 {
        DirectionModifier::Left
    } else if angle >= 300.0 && angle < 340.0 {
        DirectionModifier::SharpLeft
    } else {
        DirectionModifier::UTurn
    }
}

/// Smallest angular difference between two angles, in [0, 180].
pub fn angular_deviation(angle: f64, from: f64) -> f64 {
    let deviation = (angle - from).abs();
    deviation.min(360.0 - deviation)
}

/// Plain turns and ramps; everything the post-processor may reshape.
pub fn is_basic(turn_type: TurnType) -> bool {
    matches!(turn_type, TurnType::Turn | TurnType::Ramp)
}

pub fn is_uturn(instruction: TurnInstruction) -> bool {
    is_basic(instruction.turn_type)
        && instruction.direction_modifier == DirectionModifier::UTurn
}

/// Turns taken from a road that is itself part of a roundabout.
pub fn is_on_roundabout(instruction: TurnInstruction) -> bool {
    matches!(
        instruction.turn_type,
        TurnType::RemainRoundabout | TurnType::ExitRoundabout
    )
}

pub fn enters_roundabout(instruction: TurnInstruction) -> bool {
    matches!(
        instruction.turn_type,
        TurnType::EnterRoundabout
            | TurnType::EnterRoundaboutAtExit
            | TurnType::EnterRotary
            | TurnType::EnterRotaryAtExit
    )
}

/// Two instructions conflict when a rider could not tell them apart.
pub fn is_conflict(first: TurnInstruction, second: TurnInstruction) -> bool {
    (first.turn_type == second.turn_type
        && first.direction_modifier == second.direction_modifier)
        || (is_basic(first.turn_type)
            && is_basic(second.turn_type)
            && first.direction_modifier == second.direction_modifier)
}

pub fn is_slight_modifier(modifier: DirectionModifier) -> bool {
    matches!(
        modifier,
        DirectionModifier::Straight
            | DirectionModifier::SlightRight
            | DirectionModifier::SlightLeft
    )
}

pub fn is_slight_turn(instruction: TurnInstruction) -> bool {
    (is_basic(instruction.turn_type) || instruction.turn_type == TurnType::NoTurn)
        && is_slight_modifier(instruction.direction_modifier)
}

pub fn is_sharp_turn(instruction: TurnInstruction) -> bool {
    is_basic(instruction.turn_type)
        && matches!(
            instruction.direction_modifier,
            DirectionModifier::SharpRight | DirectionModifier::SharpLeft
        )
}

/// Types that may be downgraded to a silent name change.
pub fn can_be_suppressed(turn_type: TurnType) -> bool {
    turn_type == TurnType::Turn
}

/// Confidence that the instruction matches the geometry, in [0, 1]:
/// closeness of the angle to the center of the matched modifier band.
/// Special instructions carry no angle ambiguity and stay at 1.
pub fn turn_confidence(angle: f64, instruction: TurnInstruction) -> f64 {
    if !is_basic(instruction.turn_type)
        || instruction.direction_modifier == DirectionModifier::UTurn
        || is_on_roundabout(instruction)
    {
        return 1.0;
    }

    let modifier = instruction.direction_modifier;
    let deviation = angular_deviation(angle, modifier.band_center());
    (1.0 - deviation / (2.0 * modifier.band_half_width())).clamp(0.0, 1.0)
}

/// Shifts `instruction` one modifier step away from `neighbor` if that
/// step exists and does not land on the neighbor. Returns whether the
/// shift was applied.
pub fn resolve(
    instruction: &mut TurnInstruction,
    neighbor: TurnInstruction,
    to_the_right: bool,
) -> bool {
    let shifted = if to_the_right {
        instruction.direction_modifier.step_right()
    } else {
        instruction.direction_modifier.step_left()
    };
    match shifted {
        Some(modifier) if modifier != neighbor.direction_modifier => {
            instruction.direction_modifier = modifier;
            true
        }
        _ => false,
    }
}

/// Shifts both `instruction` and its blocking `neighbor` one step
/// outward, provided neither collides after the move.
pub fn resolve_transitive(
    instruction: &mut TurnInstruction,
    neighbor: &mut TurnInstruction,
    far_neighbor: TurnInstruction,
    to_the_right: bool,
) -> bool {
    let step = |modifier: DirectionModifier| {
        if to_the_right {
            modifier.step_right()
        } else {
            modifier.step_left()
        }
    };
    let Some(shifted_neighbor) = step(neighbor.direction_modifier) else {
        return false;
    };
    if shifted_neighbor == far_neighbor.direction_modifier {
        return false;
    }
    let Some(shifted) = step(instruction.direction_modifier) else {
        return false;
    };
    if shifted == shifted_neighbor {
        return false;
    }
    neighbor.direction_modifier = shifted_neighbor;
    instruction.direction_modifier = shifted;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_bands() {
        assert_eq!(get_turn_direction(0.0), DirectionModifier::UTurn);
        assert_eq!(get_turn_direction(30.0), DirectionModifier::SharpRight);
        assert_eq!(get_turn_direction(90.0), DirectionModifier::Right);
        assert_eq!(get_turn_direction(150.0), DirectionModifier::SlightRight);
        assert_eq!(get_turn_direction(160.0), DirectionModifier::Straight);
        assert_eq!(get_turn_direction(180.0), DirectionModifier::Straight);
        assert_eq!(get_turn_direction(200.0), DirectionModifier::Straight);
        assert_eq!(get_turn_direction(210.0), DirectionModifier::SlightLeft);
        assert_eq!(get_turn_direction(270.0), DirectionModifier::Left);
        assert_eq!(get_turn_direction(320.0), DirectionModifier::SharpLeft);
        assert_eq!(get_turn_direction(350.0), DirectionModifier::UTurn);
    }

    #[test]
    fn test_angular_deviation_wraps() {
        assert_eq!(angular_deviation(10.0, 350.0), 20.0);
        assert_eq!(angular_deviation(350.0, 10.0), 20.0);
        assert_eq!(angular_deviation(180.0, 180.0), 0.0);
        assert_eq!(angular_deviation(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_mirror_is_involution() {
        for value in 0..8u8 {
            let modifier = DirectionModifier::from(value);
            assert_eq!(
                mirror_direction_modifier(mirror_direction_modifier(modifier)),
                modifier
            );
        }
        assert_eq!(
            mirror_direction_modifier(DirectionModifier::SlightRight),
            DirectionModifier::SlightLeft
        );
        assert_eq!(
            mirror_direction_modifier(DirectionModifier::Straight),
            DirectionModifier::Straight
        );
    }

    #[test]
    fn test_uturn_predicate_requires_basic_type() {
        let uturn = TurnInstruction::new(TurnType::Turn, DirectionModifier::UTurn);
        assert!(is_uturn(uturn));
        let no_turn = TurnInstruction::no_turn();
        assert!(!is_uturn(no_turn));
    }

    #[test]
    fn test_conflict_on_shared_modifier() {
        let a = TurnInstruction::new(TurnType::Turn, DirectionModifier::Right);
        let b = TurnInstruction::new(TurnType::Ramp, DirectionModifier::Right);
        let c = TurnInstruction::new(TurnType::Turn, DirectionModifier::SlightRight);
        assert!(is_conflict(a, b));
        assert!(is_conflict(a, a));
        assert!(!is_conflict(a, c));
    }

    #[test]
    fn test_resolve_shifts_away_from_neighbor() {
        let mut instruction = TurnInstruction::new(TurnType::Turn, DirectionModifier::Straight);
        let neighbor = TurnInstruction::new(TurnType::Turn, DirectionModifier::Straight);
        assert!(resolve(&mut instruction, neighbor, true));
        assert_eq!(instruction.direction_modifier, DirectionModifier::SlightRight);

        // blocked: the shift target is occupied
        let mut blocked = TurnInstruction::new(TurnType::Turn, DirectionModifier::Straight);
        let occupying = TurnInstruction::new(TurnType::Turn, DirectionModifier::SlightRight);
        assert!(!resolve(&mut blocked, occupying, true));
        assert_eq!(blocked.direction_modifier, DirectionModifier::Straight);

        // blocked: sharp right cannot rotate into the u-turn
        let mut sharp = TurnInstruction::new(TurnType::Turn, DirectionModifier::SharpRight);
        let far = TurnInstruction::new(TurnType::Turn, DirectionModifier::Left);
        assert!(!resolve(&mut sharp, far, true));
    }

    #[test]
    fn test_resolve_transitive_moves_both() {
        let mut instruction = TurnInstruction::new(TurnType::Turn, DirectionModifier::Straight);
        let mut neighbor = TurnInstruction::new(TurnType::Turn, DirectionModifier::SlightRight);
        let far = TurnInstruction::new(TurnType::Turn, DirectionModifier::SharpRight);
        assert!(resolve_transitive(
            &mut instruction,
            &mut neighbor,
            far,
            true
        ));
        assert_eq!(instruction.direction_modifier, DirectionModifier::SlightRight);
        assert_eq!(neighbor.direction_modifier, DirectionModifier::Right);

        // far neighbor blocks the chain
        let mut instruction = TurnInstruction::new(TurnType::Turn, DirectionModifier::Straight);
        let mut neighbor = TurnInstruction::new(TurnType::Turn, DirectionModifier::SlightRight);
        let blocking = TurnInstruction::new(TurnType::Turn, DirectionModifier::Right);
        assert!(!resolve_transitive(
            &mut instruction,
            &mut neighbor,
            blocking,
            true
        ));
        assert_eq!(neighbor.direction_modifier, DirectionModifier::SlightRight);
    }

    #[test]
    fn test_confidence_range() {
        let straight = TurnInstruction::new(TurnType::Turn, DirectionModifier::Straight);
        assert_eq!(turn_confidence(180.0, straight), 1.0);
        let off_center = turn_confidence(195.0, straight);
        assert!(off_center > 0.0 && off_center < 1.0);

        let uturn = TurnInstruction::new(TurnType::Turn, DirectionModifier::UTurn);
        assert_eq!(turn_confidence(0.0, uturn), 1.0);
        let fork = TurnInstruction::new(TurnType::Fork, DirectionModifier::SlightLeft);
        assert_eq!(turn_confidence(210.0, fork), 1.0);
    }
}
