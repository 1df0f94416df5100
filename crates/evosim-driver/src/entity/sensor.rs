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

//! Per-step sample buffers attached to entities.

use std::fmt;
use std::io::{self, Write};

/// The quantity a sensor records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Body position `x y z`.
    Position,
    /// Body linear velocity `vx vy vz`.
    Velocity,
    /// Body orientation `qw qx qy qz`.
    Orientation,
    /// 1 when the body received a contact during the step.
    Touch,
    /// Ray hit `distance r g b`.
    Ray,
    /// Hinge angle or slider displacement.
    Proprioceptive,
}

impl SensorKind {
    /// Number of values recorded per step.
    pub fn channels(self) -> usize {
        match self {
            SensorKind::Position | SensorKind::Velocity => 3,
            SensorKind::Orientation | SensorKind::Ray => 4,
            SensorKind::Touch | SensorKind::Proprioceptive => 1,
        }
    }

    /// Parses the attachment tag naming a sensor.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "PositionSensor" => SensorKind::Position,
            "VelocitySensor" => SensorKind::Velocity,
            "OrientationSensor" => SensorKind::Orientation,
            "TouchSensor" => SensorKind::Touch,
            "RaySensor" => SensorKind::Ray,
            "ProprioceptiveSensor" => SensorKind::Proprioceptive,
            _ => return None,
        })
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Position => "Position",
            SensorKind::Velocity => "Velocity",
            SensorKind::Orientation => "Orientation",
            SensorKind::Touch => "Touch",
            SensorKind::Ray => "Ray",
            SensorKind::Proprioceptive => "Proprioceptive",
        };
        f.write_str(name)
    }
}

/// A sensor and the time series it has recorded so far, one row per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    kind: SensorKind,
    channels: Vec<Vec<f32>>,
}

impl Sensor {
    /// Creates a sensor with no samples.
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            channels: vec![Vec::new(); kind.channels()],
        }
    }

    /// The recorded quantity.
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Number of steps recorded.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Returns true before the first sample.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one step. `values` holds one value per channel.
    pub fn record(&mut self, values: &[f32]) {
        debug_assert_eq!(values.len(), self.channels.len());
        for (channel, value) in self.channels.iter_mut().zip(values) {
            channel.push(*value);
        }
    }

    /// Time series of one channel.
    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Most recent value of a channel.
    pub fn latest(&self, channel: usize) -> Option<f32> {
        self.channels.get(channel)?.last().copied()
    }

    /// Writes the header line and one line per channel.
    pub fn write_to<W: Write>(&self, out: &mut W, entity: usize, index: usize) -> io::Result<()> {
        writeln!(
            out,
            "{entity} {index} {} {} {}",
            self.kind,
            self.channels.len(),
            self.len()
        )?;
        for channel in &self.channels {
            let mut first = true;
            for value in channel {
                if !first {
                    out.write_all(b" ")?;
                }
                write!(out, "{value}")?;
                first = false;
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}
