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

//! A small continuous-time recurrent controller.
//!
//! Input neurons (bias, sensor, function) are set from outside every step.
//! Hidden and motor neurons then update synchronously:
//! `v ← tanh(alpha·v + tau·Σ w·v_src)`, all reading the values as they were
//! once the inputs were set. Motor neurons command actuators.

use std::io::BufRead;

use crate::error::{InvariantError, ProtocolError};
use crate::protocol::ProtocolReader;

/// One neuron of a network.
#[derive(Debug, Clone, PartialEq)]
pub enum Neuron {
    /// Constant 1.
    Bias,
    /// The latest sample of a sensor channel.
    Sensor {
        /// Entity carrying the sensor.
        entity: usize,
        /// Index of the sensor on that entity.
        sensor: usize,
        /// Channel of the sensor.
        channel: usize,
    },
    /// An internal neuron.
    Hidden {
        /// Input gain.
        tau: f32,
        /// Self-connection gain.
        alpha: f32,
    },
    /// An output neuron driving an actuator.
    Motor {
        /// Entity ID of the actuator.
        actuator: usize,
        /// Input gain.
        tau: f32,
        /// Self-connection gain.
        alpha: f32,
    },
    /// A scripted input cycling through fixed values.
    Function {
        /// Values, one per step, repeated.
        values: Vec<f32>,
    },
}

impl Neuron {
    fn is_input(&self) -> bool {
        matches!(
            self,
            Neuron::Bias | Neuron::Sensor { .. } | Neuron::Function { .. }
        )
    }

    /// Reads a neuron attachment named by `tag`. Returns `None` if `tag` is not a neuron.
    pub fn read<R: BufRead>(
        tag: &str,
        reader: &mut ProtocolReader<R>,
    ) -> Result<Option<Self>, ProtocolError> {
        let neuron = match tag {
            "BiasNeuron" => Neuron::Bias,
            "SensorNeuron" => Neuron::Sensor {
                entity: reader.read_index("sensor neuron entity")?,
                sensor: reader.read_index("sensor neuron sensor index")?,
                channel: reader.read_index("sensor neuron channel")?,
            },
            "HiddenNeuron" => Neuron::Hidden {
                tau: reader.read_float("neuron tau")?,
                alpha: reader.read_float("neuron alpha")?,
            },
            "MotorNeuron" => Neuron::Motor {
                actuator: reader.read_index("motor neuron actuator")?,
                tau: reader.read_float("neuron tau")?,
                alpha: reader.read_float("neuron alpha")?,
            },
            "FunctionNeuron" => {
                let count = reader.read_index("function neuron length")?;
                let values = (0..count)
                    .map(|_| reader.read_float("function neuron value"))
                    .collect::<Result<Vec<_>, _>>()?;
                Neuron::Function { values }
            }
            _ => return Ok(None),
        };
        Ok(Some(neuron))
    }
}

/// A weighted connection between two neurons of the same network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synapse {
    /// Index of the source neuron.
    pub source: usize,
    /// Index of the target neuron.
    pub target: usize,
    /// Connection weight.
    pub weight: f32,
}

impl Synapse {
    /// Reads the `Synapse` payload.
    pub fn read<R: BufRead>(reader: &mut ProtocolReader<R>) -> Result<Self, ProtocolError> {
        Ok(Self {
            source: reader.read_index("synapse source")?,
            target: reader.read_index("synapse target")?,
            weight: reader.read_float("synapse weight")?,
        })
    }
}

/// A network entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Network {
    /// Neurons, in attachment order.
    pub neurons: Vec<Neuron>,
    /// Synapses, in attachment order.
    pub synapses: Vec<Synapse>,
    values: Vec<f32>,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a neuron, initialised to zero.
    pub fn add_neuron(&mut self, neuron: Neuron) {
        self.neurons.push(neuron);
        self.values.push(0.0);
    }

    /// Adds a synapse.
    pub fn add_synapse(&mut self, synapse: Synapse) {
        self.synapses.push(synapse);
    }

    /// Current neuron values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Checks that every synapse connects two neurons of this network and
    /// ends on a neuron that integrates input.
    pub fn validate(&self, id: usize) -> Result<(), InvariantError> {
        for synapse in &self.synapses {
            let reason = if synapse.source >= self.neurons.len() {
                format!("synapse source {} does not exist", synapse.source)
            } else if synapse.target >= self.neurons.len() {
                format!("synapse target {} does not exist", synapse.target)
            } else if self.neurons[synapse.target].is_input() {
                format!("synapse target {} is an input neuron", synapse.target)
            } else {
                continue;
            };
            return Err(InvariantError::InvalidNeuronReference {
                network: id,
                reason,
            });
        }
        Ok(())
    }

    /// Advances the network by one step.
    ///
    /// `sensor_values[i]` is the reading for neuron `i` when it is a sensor
    /// neuron. Returns the `(actuator, command)` pairs of the motor neurons.
    pub fn update(&mut self, step: u64, sensor_values: &[f32]) -> Vec<(usize, f32)> {
        for (i, neuron) in self.neurons.iter().enumerate() {
            match neuron {
                Neuron::Bias => self.values[i] = 1.0,
                Neuron::Sensor { .. } => {
                    self.values[i] = sensor_values.get(i).copied().unwrap_or(0.0)
                }
                Neuron::Function { values } if !values.is_empty() => {
                    self.values[i] = values[(step % values.len() as u64) as usize]
                }
                _ => {}
            }
        }

        let previous = self.values.clone();
        let mut input = vec![0.0_f32; self.neurons.len()];
        for synapse in &self.synapses {
            input[synapse.target] += synapse.weight * previous[synapse.source];
        }

        let mut commands = Vec::new();
        for (i, neuron) in self.neurons.iter().enumerate() {
            match *neuron {
                Neuron::Hidden { tau, alpha } => {
                    self.values[i] = (alpha * previous[i] + tau * input[i]).tanh();
                }
                Neuron::Motor {
                    actuator,
                    tau,
                    alpha,
                } => {
                    self.values[i] = (alpha * previous[i] + tau * input[i]).tanh();
                    commands.push((actuator, self.values[i]));
                }
                _ => {}
            }
        }
        commands
    }
}
