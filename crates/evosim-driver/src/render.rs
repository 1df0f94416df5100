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

//! Drives a [`Simulation`] from a viewer's frame loop.

use std::io::Write;

use evosim_core::render::{camera_basis, Color, DrawSink, ViewerApp, ViewerFlow};

use crate::error::SimResult;
use crate::simulation::Simulation;

/// Camera-space placement of the pause indicator.
const PAUSE_FORWARD: f32 = 0.2;
const PAUSE_RIGHT: f32 = 0.05;
const PAUSE_UP: f32 = -0.1;

/// A [`ViewerApp`] stepping the simulation in wall-clock time.
///
/// Results are written to `out` once, when the run ends for any reason.
pub struct RenderAdapter<W: Write> {
    sim: Simulation,
    out: W,
    paused: bool,
    draw_joints: bool,
    draw_spaces: bool,
    outcome: Option<SimResult<u64>>,
}

impl<W: Write> RenderAdapter<W> {
    /// Wraps a created simulation.
    pub fn new(sim: Simulation, out: W) -> Self {
        Self {
            sim,
            out,
            paused: false,
            draw_joints: false,
            draw_spaces: false,
            outcome: None,
        }
    }

    /// The simulation being shown.
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Returns true while stepping is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ends the run, writing results if that has not happened yet, and
    /// returns how it ended.
    pub fn finish(mut self) -> SimResult<u64> {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.sim.terminate(&mut self.out),
        }
    }

    fn end(&mut self) {
        if self.outcome.is_none() {
            self.outcome = Some(self.sim.terminate(&mut self.out));
        }
    }

    fn draw_pause_indicator(&self, sink: &mut dyn DrawSink) {
        let view = sink.viewpoint();
        let basis = camera_basis(view.heading, view.pitch);
        sink.set_color(Color::DARK_RED);
        for i in 0..2 {
            let right = PAUSE_RIGHT * (1.0 + 0.1 * i as f32);
            let top = basis.to_world(view.position, PAUSE_FORWARD, right, PAUSE_UP);
            let bottom = basis.to_world(view.position, PAUSE_FORWARD, right, PAUSE_UP * 1.1);
            sink.draw_line(top, bottom);
        }
    }
}

impl<W: Write> ViewerApp for RenderAdapter<W> {
    fn start(&mut self, sink: &mut dyn DrawSink) {
        sink.set_viewpoint(self.sim.params().viewpoint());
        log::info!(
            "Simulation starting: {} steps of {} s",
            self.sim.params().eval_steps(),
            self.sim.params().dt()
        );
    }

    fn step(&mut self, sink: &mut dyn DrawSink, elapsed: f32) -> ViewerFlow {
        if self.outcome.is_some() {
            return ViewerFlow::Exit;
        }
        if !self.paused {
            if let Err(err) = self.sim.advance(f64::from(elapsed)) {
                self.outcome = Some(Err(err));
                return ViewerFlow::Exit;
            }
            if self.sim.is_finished() {
                self.end();
                return ViewerFlow::Exit;
            }
        }
        self.sim.draw(sink, self.draw_joints, self.draw_spaces);
        if self.paused {
            self.draw_pause_indicator(sink);
        }
        ViewerFlow::Continue
    }

    fn command(&mut self, key: char) -> ViewerFlow {
        match key {
            'x' => {
                self.end();
                return ViewerFlow::Exit;
            }
            'd' => self.draw_joints = !self.draw_joints,
            's' => self.draw_spaces = !self.draw_spaces,
            'p' => {
                self.paused = !self.paused;
                log::debug!("Paused: {}", self.paused);
            }
            _ => {}
        }
        ViewerFlow::Continue
    }

    fn stop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolReader;
    use evosim_core::math::Vec3;
    use evosim_infra::platform::WireframeCanvas;
    use evosim_infra::RapierEngine;
    use std::io::Cursor;

    fn adapter(text: &str) -> RenderAdapter<Vec<u8>> {
        let mut reader = ProtocolReader::new(Cursor::new(text.as_bytes().to_vec()));
        let sim = Simulation::from_reader(Box::new(RapierEngine::new()), &mut reader)
            .expect("valid scene");
        RenderAdapter::new(sim, Vec::new())
    }

    #[test]
    fn test_start_sets_camera_from_parameters() {
        let mut app = adapter("Parameter CameraZ 2\nParameter CameraH 45\nDone\n");
        let mut canvas = WireframeCanvas::new();
        app.start(&mut canvas);
        let view = canvas.viewpoint();
        assert_eq!(view.position, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(view.heading, 45.0);
    }

    #[test]
    fn test_pause_stops_the_clock_and_draws_indicator() {
        let mut app = adapter("Parameter EvalSteps 100\nDone\n");
        let mut canvas = WireframeCanvas::new();
        app.start(&mut canvas);
        assert_eq!(app.command('p'), ViewerFlow::Continue);
        assert!(app.is_paused());
        assert_eq!(app.step(&mut canvas, 0.5), ViewerFlow::Continue);
        assert_eq!(app.simulation().eval_step(), 0);
        assert_eq!(canvas.segments().len(), 2);
    }

    #[test]
    fn test_variable_rate_stepping_until_budget() {
        let mut app = adapter("Parameter EvalSteps 4\nParameter DT 0.01\nDone\n");
        let mut canvas = WireframeCanvas::new();
        app.start(&mut canvas);
        assert_eq!(app.step(&mut canvas, 0.025), ViewerFlow::Continue);
        assert_eq!(app.simulation().eval_step(), 3);
        assert_eq!(app.step(&mut canvas, 0.025), ViewerFlow::Exit);
        assert_eq!(app.finish().expect("results written"), 4);
    }

    #[test]
    fn test_exit_key_writes_results() {
        let mut app = adapter("Parameter EvalSteps 10\nDone\n");
        assert_eq!(app.command('x'), ViewerFlow::Exit);
        app.stop();
        let RenderAdapter { out, outcome, .. } = app;
        assert_eq!(out, b"0\n");
        assert!(matches!(outcome, Some(Ok(0))));
    }
}
