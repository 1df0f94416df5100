// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Velocity servos driving joints.

use std::io::BufRead;

use evosim_core::physics::{JointId, JointKind, PhysicsEngine};

use crate::error::ProtocolError;
use crate::protocol::ProtocolReader;

/// An actuator entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuator {
    /// The kind of joint this actuator drives.
    pub kind: JointKind,
    /// Entity ID of the driven joint.
    pub joint: i64,
    /// Largest effort the servo may apply.
    pub max_force: f32,
    /// Proportional gain on the position error.
    pub speed: f32,
    /// Command in `[-1, 1]` for the current step.
    pub command: f32,
}

impl Actuator {
    /// Reads the payload shared by `RotaryActuator` and `LinearActuator`.
    pub fn read<R: BufRead>(
        kind: JointKind,
        reader: &mut ProtocolReader<R>,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind,
            joint: reader.read_int("actuator joint")?,
            max_force: reader.read_float("actuator max force")?,
            speed: reader.read_float("actuator speed")?,
            command: 0.0,
        })
    }

    /// Maps the command onto the joint range, or passes it through for an
    /// unlimited joint.
    pub fn target(&self, limits: Option<(f32, f32)>) -> f32 {
        let command = self.command.clamp(-1.0, 1.0);
        match limits {
            Some((lo, hi)) => lo + (command + 1.0) * 0.5 * (hi - lo),
            None => command,
        }
    }

    /// Effort driving the joint towards the target, saturated at `max_force`.
    ///
    /// The desired rate never exceeds the one that closes the position error
    /// within a single step of `dt` seconds.
    pub fn effort(&self, limits: Option<(f32, f32)>, position: f32, rate: f32, dt: f32) -> f32 {
        let error = self.target(limits) - position;
        let mut desired_rate = self.speed * error;
        if dt > 0.0 {
            let reach = (error / dt).abs();
            desired_rate = desired_rate.clamp(-reach, reach);
        }
        let max = self.max_force.abs();
        (self.max_force * (desired_rate - rate)).clamp(-max, max)
    }

    /// Applies this step's effort to the joint.
    pub fn actuate(
        &self,
        engine: &mut dyn PhysicsEngine,
        joint: JointId,
        limits: Option<(f32, f32)>,
        dt: f32,
    ) {
        let state = engine.joint_state(joint);
        let effort = self.effort(limits, state.position, state.rate, dt);
        engine.add_joint_effort(joint, effort);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn servo(command: f32) -> Actuator {
        Actuator {
            kind: JointKind::Hinge,
            joint: 0,
            max_force: 10.0,
            speed: 1.0,
            command,
        }
    }

    #[test]
    fn test_command_spans_limits() {
        let limits = Some((-0.5, 1.5));
        assert_abs_diff_eq!(servo(-1.0).target(limits), -0.5);
        assert_abs_diff_eq!(servo(0.0).target(limits), 0.5);
        assert_abs_diff_eq!(servo(1.0).target(limits), 1.5);
        assert_abs_diff_eq!(servo(0.3).target(None), 0.3);
        assert_abs_diff_eq!(servo(4.0).target(None), 1.0);
    }

    #[test]
    fn test_effort_saturates() {
        assert_abs_diff_eq!(servo(1.0).effort(None, 0.0, 0.0, 0.01), 10.0);
        assert_abs_diff_eq!(servo(-1.0).effort(None, 100.0, 0.0, 0.01), -10.0);
        assert_abs_diff_eq!(
            servo(0.5).effort(None, 0.5, 0.05, 0.01),
            -0.5,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_fast_servo_does_not_overshoot_within_a_step() {
        let fast = Actuator {
            max_force: 100.0,
            speed: 500.0,
            ..servo(0.2)
        };
        // An error of 0.1 closes in one 0.01 s step at a rate of 10.
        assert_abs_diff_eq!(fast.effort(None, 0.1, 10.0, 0.01), 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(fast.effort(None, 0.1, 0.0, 0.01), 100.0);
        // Without a step length only the gain applies.
        assert_abs_diff_eq!(fast.effort(None, 0.1, 10.0, 0.0), 100.0);
        assert_abs_diff_eq!(fast.effort(None, 0.1, 50.0, 0.0), 0.0, epsilon = 1e-3);
    }
}
