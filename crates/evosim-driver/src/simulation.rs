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

//! # Simulation Loop
//!
//! Owns the engine and the ingested scene and advances them in fixed steps.
//! Every step runs the same sequence: actuation, broad phase through the
//! [`CollisionDispatcher`], integration, emptying the contact group, sensor
//! sampling, then the clock.

use std::io::{BufRead, Write};

use evosim_core::physics::PhysicsEngine;
use evosim_core::render::DrawSink;

use crate::collision_policy::CollisionPolicy;
use crate::dispatcher::CollisionDispatcher;
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::parameters::Parameters;
use crate::protocol::ProtocolReader;
use crate::scene::Scene;

/// One evaluation.
pub struct Simulation {
    engine: Box<dyn PhysicsEngine>,
    params: Parameters,
    policy: CollisionPolicy,
    env: Environment,
    eval_step: u64,
    eval_time: f64,
    terminated: bool,
}

impl Simulation {
    /// Instantiates an ingested scene in `engine`.
    pub fn new(mut engine: Box<dyn PhysicsEngine>, scene: Scene) -> SimResult<Self> {
        let Scene {
            params,
            policy,
            mut env,
        } = scene;
        env.create_all(engine.as_mut(), &params)?;
        Ok(Self {
            engine,
            params,
            policy,
            env,
            eval_step: 0,
            eval_time: 0.0,
            terminated: false,
        })
    }

    /// Reads a scene from the controller and instantiates it.
    pub fn from_reader<R: BufRead>(
        engine: Box<dyn PhysicsEngine>,
        reader: &mut ProtocolReader<R>,
    ) -> SimResult<Self> {
        let scene = Scene::ingest(reader)?;
        Self::new(engine, scene)
    }

    /// The parameters the evaluation runs with.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// The collision policy.
    pub fn policy(&self) -> &CollisionPolicy {
        &self.policy
    }

    /// The entities.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// The physics engine.
    pub fn engine(&self) -> &dyn PhysicsEngine {
        self.engine.as_ref()
    }

    /// Number of completed steps.
    pub fn eval_step(&self) -> u64 {
        self.eval_step
    }

    /// Simulated seconds elapsed.
    pub fn eval_time(&self) -> f64 {
        self.eval_time
    }

    /// Returns true once the step budget is used up.
    pub fn is_finished(&self) -> bool {
        self.eval_step >= self.params.eval_steps()
    }

    /// Returns true once results were written.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Advances the evaluation by one step.
    pub fn step(&mut self) -> SimResult<()> {
        if self.terminated || self.is_finished() {
            return Err(SimError::AlreadyTerminated);
        }
        let dt = self.params.dt();

        self.env.take_step(self.engine.as_mut(), self.eval_step, dt as f32);

        let top = self.engine.top_space();
        let mut dispatcher =
            CollisionDispatcher::new(&mut self.env, &self.policy, self.params.max_contacts());
        self.engine.space_collide(top, &mut dispatcher);
        dispatcher.finish()?;

        self.engine.world_step(dt as f32);
        self.engine.empty_contact_group();
        self.env.sample(self.engine.as_ref());

        self.eval_step += 1;
        self.eval_time += dt;
        Ok(())
    }

    /// Runs `⌈elapsed / DT⌉` steps, stopping early at the end of the budget.
    pub fn advance(&mut self, elapsed: f64) -> SimResult<u64> {
        let dt = self.params.dt();
        let wanted = if dt > 0.0 {
            (elapsed / dt).ceil().max(0.0) as u64
        } else {
            1
        };
        let mut taken = 0;
        while taken < wanted && !self.is_finished() {
            self.step()?;
            taken += 1;
        }
        Ok(taken)
    }

    /// Steps until the budget is used up, then writes the results.
    pub fn run_headless<W: Write>(&mut self, out: &mut W) -> SimResult<u64> {
        log::info!(
            "Simulation starting: {} steps of {} s",
            self.params.eval_steps(),
            self.params.dt()
        );
        while !self.is_finished() {
            self.step()?;
        }
        self.terminate(out)
    }

    /// Writes the completed step count and every sensor's time series.
    /// May be called once; returns the step count.
    pub fn terminate<W: Write>(&mut self, out: &mut W) -> SimResult<u64> {
        if self.terminated {
            return Err(SimError::AlreadyTerminated);
        }
        self.terminated = true;
        writeln!(out, "{}", self.eval_step)?;
        self.env.write_sensors(out)?;
        out.flush()?;
        log::info!("Simulation completed after {} steps", self.eval_step);
        Ok(self.eval_step)
    }

    /// Draws the current state.
    pub fn draw(&self, sink: &mut dyn DrawSink, draw_joints: bool, draw_spaces: bool) {
        self.env
            .draw(self.engine.as_ref(), sink, draw_joints, draw_spaces);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evosim_infra::RapierEngine;
    use std::io::Cursor;

    fn simulation(text: &str) -> Simulation {
        let mut reader = ProtocolReader::new(Cursor::new(text.as_bytes().to_vec()));
        Simulation::from_reader(Box::new(RapierEngine::new()), &mut reader).expect("valid scene")
    }

    #[test]
    fn test_clock_advances_in_lockstep() {
        let mut sim = simulation("Parameter EvalSteps 3\nParameter DT 0.02\nDone\n");
        sim.step().expect("first step");
        sim.step().expect("second step");
        assert_eq!(sim.eval_step(), 2);
        assert!((sim.eval_time() - 0.04).abs() < 1e-12);
        assert!(!sim.is_finished());
        sim.step().expect("third step");
        assert!(sim.is_finished());
        assert!(matches!(sim.step(), Err(SimError::AlreadyTerminated)));
    }

    #[test]
    fn test_advance_rounds_up_and_stops_at_budget() {
        let mut sim = simulation("Parameter EvalSteps 5\nParameter DT 0.01\nDone\n");
        assert_eq!(sim.advance(0.015).expect("advance"), 2);
        assert_eq!(sim.advance(1.0).expect("advance"), 3);
        assert!(sim.is_finished());
    }

    #[test]
    fn test_terminate_writes_once() {
        let mut sim = simulation("Parameter EvalSteps 0\nDone\n");
        let mut out = Vec::new();
        assert_eq!(sim.run_headless(&mut out).expect("run"), 0);
        assert_eq!(out, b"0\n");
        assert!(matches!(
            sim.terminate(&mut out),
            Err(SimError::AlreadyTerminated)
        ));
    }

    #[test]
    fn test_scene_is_created_once() {
        let sim = simulation(
            "Entity RigidBody 0 0 1 1 0 0 0\nAdd 0 Sphere 0 0 0 0.1 1 1 1 1\nDone\n",
        );
        assert!(sim.env().is_created());
        assert!(sim.env().ground().is_some());
    }
}
