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

//! # Evosim Driver
//!
//! Runs one evaluation of an evolutionary-robotics scene: reads the scene
//! from the controller, builds it in a [`PhysicsEngine`], steps it for a
//! fixed budget and writes the sensor time series back.
//!
//! ```no_run
//! # fn run(engine: Box<dyn evosim_core::physics::PhysicsEngine>) -> evosim_driver::SimResult<()> {
//! use std::io::{self, BufReader};
//! use evosim_driver::{ProtocolReader, Simulation};
//!
//! let mut reader = ProtocolReader::new(BufReader::new(io::stdin()));
//! let mut sim = Simulation::from_reader(engine, &mut reader)?;
//! sim.run_headless(&mut io::stdout().lock())?;
//! # Ok(())
//! # }
//! ```
//!
//! [`PhysicsEngine`]: evosim_core::physics::PhysicsEngine

#![warn(missing_docs)]

pub mod collision_policy;
pub mod dispatcher;
pub mod entity;
pub mod environment;
pub mod error;
pub mod parameters;
pub mod protocol;
pub mod render;
pub mod scene;
pub mod simulation;

pub use collision_policy::{CollisionPolicy, COLLIDE};
pub use dispatcher::CollisionDispatcher;
pub use environment::Environment;
pub use error::{InvariantError, ProtocolError, SimError, SimResult};
pub use parameters::Parameters;
pub use protocol::ProtocolReader;
pub use render::RenderAdapter;
pub use scene::Scene;
pub use simulation::Simulation;
