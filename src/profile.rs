//! Speed-profile properties and the user turn-penalty hook.

use anyhow::Result;
use serde::Deserialize;

/// Fixed penalties applied while expanding turns, in deci-seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeedProfile {
    pub u_turn_penalty: i32,
    pub traffic_signal_penalty: i32,
    #[serde(default)]
    pub has_turn_penalty_function: bool,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            u_turn_penalty: 200,
            traffic_signal_penalty: 70,
            has_turn_penalty_function: false,
        }
    }
}

/// Maps the deviation from going straight (degrees, positive to the
/// right) to a turn penalty in deci-seconds. May fail; a failing call
/// is logged and treated as zero penalty by the expansion step.
pub trait TurnPenaltyFunction {
    fn turn_penalty(&self, angle: f64) -> Result<f64>;
}

/// The standard sigmoid turn-cost curve: one continuous function of the
/// signed deviation, near zero when going straight or bearing right,
/// climbing toward `max_penalty` for left reversals. `turn_bias` shifts
/// the curve so right turns stay cheap in right-hand traffic.
#[derive(Debug, Clone, Deserialize)]
pub struct SigmoidTurnPenalty {
    pub max_penalty: f64,
    pub turn_bias: f64,
}

impl Default for SigmoidTurnPenalty {
    fn default() -> Self {
        Self {
            max_penalty: 75.0,
            turn_bias: 1.075,
        }
    }
}

impl TurnPenaltyFunction for SigmoidTurnPenalty {
    fn turn_penalty(&self, angle: f64) -> Result<f64> {
        let exponent = -((13.0 / self.turn_bias) * (-angle / 180.0) - 6.5 * self.turn_bias);
        Ok(self.max_penalty / (1.0 + exponent.exp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_shape() {
        let penalty = SigmoidTurnPenalty::default();

        let straight = penalty.turn_penalty(0.0).unwrap();
        assert!(straight < 1.0, "straight should be ~0, got {straight}");

        // right turns ride the flat end of the curve
        let right = penalty.turn_penalty(90.0).unwrap();
        assert!(right < 10.0, "90 degree right should be ~0, got {right}");

        // left turns cross oncoming traffic
        let left = penalty.turn_penalty(-90.0).unwrap();
        assert!(
            (15.0..=30.0).contains(&left),
            "90 degree left should be ~2s, got {left}"
        );

        // a left reversal approaches the maximum
        let reversal = penalty.turn_penalty(-180.0).unwrap();
        assert!(
            reversal > penalty.max_penalty * 0.9,
            "left reversal should approach max, got {reversal}"
        );
    }

    #[test]
    fn test_sigmoid_right_turns_cheaper() {
        let penalty = SigmoidTurnPenalty::default();
        let right = penalty.turn_penalty(90.0).unwrap();
        let left = penalty.turn_penalty(-90.0).unwrap();
        assert!(
            left > right,
            "left turn ({left}) should cost more than right turn ({right})"
        );
    }

    #[test]
    fn test_profile_from_json() {
        let profile: SpeedProfile = serde_json::from_str(
            r#"{"u_turn_penalty": 200, "traffic_signal_penalty": 70, "has_turn_penalty_function": true}"#,
        )
        .unwrap();
        assert_eq!(profile.u_turn_penalty, 200);
        assert!(profile.has_turn_penalty_function);
    }
}
