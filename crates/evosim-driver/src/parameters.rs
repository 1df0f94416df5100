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

//! The flat name → scalar parameter store.

use std::collections::BTreeMap;

use evosim_core::math::Vec3;
use evosim_core::render::Viewpoint;

/// Scene and simulation parameters, as sent by the controller.
///
/// Every key has a float value; integer-valued keys are rounded on read.
/// Unknown keys are kept but carry no meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, f64>,
}

impl Default for Parameters {
    fn default() -> Self {
        let defaults = [
            ("DT", 0.01),
            ("EvalSteps", 200.0),
            ("CameraX", 0.0),
            ("CameraY", 0.0),
            ("CameraZ", 0.0),
            ("CameraH", 90.0),
            ("CameraP", 0.0),
            ("CameraR", 0.0),
            ("GravityX", 0.0),
            ("GravityY", 0.0),
            ("GravityZ", -9.8),
            ("nContacts", 10.0),
            ("GroundPlane", 1.0),
        ];
        Self {
            values: defaults
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
        }
    }
}

impl Parameters {
    /// Creates a store holding the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a parameter, or zero when it was never set.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Sets a parameter, replacing any earlier value.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Value of an integer parameter.
    pub fn get_int(&self, name: &str) -> i64 {
        self.get(name).round() as i64
    }

    /// Integration step length in seconds.
    pub fn dt(&self) -> f64 {
        self.get("DT")
    }

    /// Number of steps in an evaluation. Non-positive values end the
    /// evaluation before the first step.
    pub fn eval_steps(&self) -> u64 {
        self.get_int("EvalSteps").max(0) as u64
    }

    /// Maximum number of contact points per geom pair.
    pub fn max_contacts(&self) -> usize {
        self.get_int("nContacts").max(0) as usize
    }

    /// World gravity.
    pub fn gravity(&self) -> Vec3 {
        Vec3::new(
            self.get("GravityX") as f32,
            self.get("GravityY") as f32,
            self.get("GravityZ") as f32,
        )
    }

    /// Whether a ground plane is created at `z = 0`.
    pub fn ground_plane(&self) -> bool {
        self.get_int("GroundPlane") != 0
    }

    /// Initial camera placement.
    pub fn viewpoint(&self) -> Viewpoint {
        Viewpoint {
            position: Vec3::new(
                self.get("CameraX") as f32,
                self.get("CameraY") as f32,
                self.get("CameraZ") as f32,
            ),
            heading: self.get("CameraH") as f32,
            pitch: self.get("CameraP") as f32,
            roll: self.get("CameraR") as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Parameters::new();
        assert_eq!(params.dt(), 0.01);
        assert_eq!(params.eval_steps(), 200);
        assert_eq!(params.max_contacts(), 10);
        assert_eq!(params.gravity(), Vec3::new(0.0, 0.0, -9.8));
        assert!(params.ground_plane());
        assert_eq!(params.viewpoint().heading, 90.0);
    }

    #[test]
    fn test_unknown_key_reads_zero() {
        let mut params = Parameters::new();
        assert_eq!(params.get("Unheard"), 0.0);
        params.set("Unheard", 3.5);
        assert_eq!(params.get("Unheard"), 3.5);
    }

    #[test]
    fn test_integer_keys_round() {
        let mut params = Parameters::new();
        params.set("EvalSteps", 49.6);
        assert_eq!(params.eval_steps(), 50);
        params.set("EvalSteps", -3.0);
        assert_eq!(params.eval_steps(), 0);
    }
}
