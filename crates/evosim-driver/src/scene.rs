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

//! Scene ingest: the top-level record loop.

use std::io::BufRead;

use crate::collision_policy::CollisionPolicy;
use crate::environment::Environment;
use crate::error::{ProtocolError, SimResult};
use crate::parameters::Parameters;
use crate::protocol::ProtocolReader;

/// Everything the controller sends before `Done`.
#[derive(Debug, Default)]
pub struct Scene {
    /// Simulation parameters.
    pub params: Parameters,
    /// Which collision groups meet.
    pub policy: CollisionPolicy,
    /// The entities.
    pub env: Environment,
}

impl Scene {
    /// Creates an empty scene with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads records until `Done`. The stream ending first is an error.
    pub fn ingest<R: BufRead>(reader: &mut ProtocolReader<R>) -> SimResult<Self> {
        let mut scene = Self::new();
        loop {
            let tag = reader.read_string("Done")?;
            if !scene.read_record(&tag, reader)? {
                break;
            }
        }
        log::info!("Finished reading scene ({} entities)", scene.env.len());
        Ok(scene)
    }

    /// Applies one record. Returns false on `Done`.
    pub fn read_record<R: BufRead>(
        &mut self,
        tag: &str,
        reader: &mut ProtocolReader<R>,
    ) -> SimResult<bool> {
        match tag {
            "Parameter" => {
                let name = reader.read_string("parameter name")?;
                let value = reader.read_double("parameter value")?;
                log::info!("{name} set to {value}");
                self.params.set(name, value);
            }
            "Entity" => {
                self.env.read_entity(reader)?;
            }
            "Add" => self.env.read_attachment(reader)?,
            "AssignCollision" => {
                let g1 = reader.read_string("collision group")?;
                let g2 = reader.read_string("collision group")?;
                log::info!("Collision assigned between {g1} and {g2}");
                self.policy.allow(&g1, &g2);
            }
            "Done" => return Ok(false),
            _ => return Err(ProtocolError::UnknownTag(tag.to_owned()).into()),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use std::io::Cursor;

    fn ingest(text: &str) -> SimResult<Scene> {
        Scene::ingest(&mut ProtocolReader::new(Cursor::new(text.as_bytes().to_vec())))
    }

    #[test]
    fn test_records_up_to_done() {
        let scene = ingest(
            "Parameter EvalSteps 50\n\
             Parameter DT 0.005\n\
             AssignCollision A B\n\
             Entity RigidBody 0 0 1 1 0 0 0\n\
             Add 0 Box 0 0 0 1 1 1 1 1 1 1\n\
             Done\n\
             Parameter EvalSteps 7\n",
        )
        .expect("valid scene");
        assert_eq!(scene.params.eval_steps(), 50);
        assert_eq!(scene.params.dt(), 0.005);
        assert!(scene.policy.allowed("B", "A"));
        assert_eq!(scene.env.len(), 1);
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let err = ingest("Parameter DT 0.01\nTeleport 3\nDone\n").unwrap_err();
        assert!(matches!(
            err,
            SimError::Protocol(ProtocolError::UnknownTag(tag)) if tag == "Teleport"
        ));
    }

    #[test]
    fn test_short_record_is_fatal() {
        let err = ingest("Entity RigidBody 0 0 1 1 0").unwrap_err();
        assert!(matches!(
            err,
            SimError::Protocol(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_missing_done_is_fatal() {
        let err = ingest("Parameter DT 0.01\n").unwrap_err();
        assert!(matches!(
            err,
            SimError::Protocol(ProtocolError::UnexpectedEof { expected: "Done" })
        ));
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let err = ingest("Parameter DT fast\nDone\n").unwrap_err();
        assert!(matches!(
            err,
            SimError::Protocol(ProtocolError::InvalidValue { token, .. }) if token == "fast"
        ));
    }

    #[test]
    fn test_degenerate_directions_are_fatal() {
        let err = ingest("Entity Ray -1 0 0 1 0 0 0 5\nDone\n").unwrap_err();
        assert!(matches!(
            err,
            SimError::Protocol(ProtocolError::ZeroLength {
                expected: "ray direction"
            })
        ));

        let err = ingest(
            "Entity RigidBody 0 0 1 1 0 0 0\n\
             Entity HingeJoint 0 -1 0 0 1 0 0 0 0 0\n\
             Done\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SimError::Protocol(ProtocolError::ZeroLength {
                expected: "joint axis"
            })
        ));
    }
}
