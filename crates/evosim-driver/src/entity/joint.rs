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

//! Hinge and slider joints between rigid bodies.

use std::io::BufRead;

use evosim_core::math::Vec3;
use evosim_core::physics::{BodyId, JointDesc, JointId, JointKind, PhysicsEngine};
use evosim_core::render::{Color, DrawSink};

use crate::error::ProtocolError;
use crate::protocol::ProtocolReader;

/// Half length of the axis segment drawn for a joint.
const AXIS_DRAW_LENGTH: f32 = 0.1;

/// A joint entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    /// Hinge or slider.
    pub kind: JointKind,
    /// Entity ID of the first body, or `None` for the world.
    pub body1: Option<i64>,
    /// Entity ID of the second body, or `None` for the world.
    pub body2: Option<i64>,
    /// World-space anchor at ingest.
    pub anchor: Vec3,
    /// World-space axis at ingest.
    pub axis: Vec3,
    /// Range of the joint coordinate, when limited.
    pub limits: Option<(f32, f32)>,
    joint: Option<JointId>,
}

impl Joint {
    /// Reads the payload shared by `HingeJoint` and `SliderJoint`.
    pub fn read<R: BufRead>(
        kind: JointKind,
        reader: &mut ProtocolReader<R>,
    ) -> Result<Self, ProtocolError> {
        let body1 = reader.read_body_ref("joint body 1")?;
        let body2 = reader.read_body_ref("joint body 2")?;
        let anchor = reader.read_vec3("joint anchor")?;
        let axis = reader.read_direction("joint axis")?;
        let lo = reader.read_float("joint lower limit")?;
        let hi = reader.read_float("joint upper limit")?;
        Ok(Self {
            kind,
            body1,
            body2,
            anchor,
            axis,
            limits: (lo < hi).then_some((lo, hi)),
            joint: None,
        })
    }

    /// The engine joint, once created.
    pub fn joint(&self) -> Option<JointId> {
        self.joint
    }

    /// Instantiates the joint between already-created engine bodies.
    pub fn create(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        body1: Option<BodyId>,
        body2: Option<BodyId>,
    ) {
        self.joint = Some(engine.create_joint(&JointDesc {
            kind: self.kind,
            body1,
            body2,
            anchor: self.anchor,
            axis: self.axis,
            limits: self.limits,
        }));
    }

    /// The sensor value: hinge angle or slider displacement.
    pub fn position(&self, engine: &dyn PhysicsEngine) -> f32 {
        self.joint
            .map_or(0.0, |joint| engine.joint_state(joint).position)
    }

    /// Draws the anchor and a short segment along the axis.
    pub fn draw(&self, engine: &dyn PhysicsEngine, sink: &mut dyn DrawSink) {
        let Some(joint) = self.joint else {
            return;
        };
        let state = engine.joint_state(joint);
        let half = state.axis * AXIS_DRAW_LENGTH;
        sink.set_color(Color::RED);
        sink.draw_line(state.anchor - half, state.anchor + half);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_limits_only_when_ordered() {
        let mut reader = ProtocolReader::new(Cursor::new(
            b"0 1 0 0 1 0 1 0 -0.5 0.5 0 -1 0 0 1 1 0 0 0 0".to_vec(),
        ));
        let hinge = Joint::read(JointKind::Hinge, &mut reader).ok();
        assert_eq!(hinge.as_ref().and_then(|j| j.limits), Some((-0.5, 0.5)));
        assert_eq!(hinge.as_ref().map(|j| j.body2), Some(Some(1)));

        let slider = Joint::read(JointKind::Slider, &mut reader).ok();
        assert_eq!(slider.as_ref().map(|j| j.limits), Some(None));
        assert_eq!(slider.as_ref().map(|j| j.body2), Some(None));
    }
}
