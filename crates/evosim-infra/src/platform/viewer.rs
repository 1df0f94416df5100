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

//! An eframe window driving a [`ViewerApp`].

use anyhow::anyhow;
use eframe::egui;
use evosim_core::render::{Color, ViewerApp, ViewerFlow};

use super::canvas::WireframeCanvas;

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(230, 230, 235);

fn to_color32(color: Color) -> egui::Color32 {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    egui::Color32::from_rgb(channel(color.r), channel(color.g), channel(color.b))
}

/// A native window painting the frames of a [`ViewerApp`] as wireframes.
///
/// Key presses reach the app as characters. Dragging orbits the camera.
/// Closing the window calls [`ViewerApp::stop`].
#[derive(Debug, Clone)]
pub struct EguiViewer {
    title: String,
    size: [f32; 2],
}

impl EguiViewer {
    /// Creates a viewer with the given window title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            size: [352.0, 288.0],
        }
    }

    /// Sets the initial window size in logical pixels.
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = [width, height];
        self
    }

    /// Opens the window and blocks until the application exits or the user
    /// closes it.
    pub fn run(self, app: &mut dyn ViewerApp) -> anyhow::Result<()> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(self.title.clone())
                .with_inner_size(self.size),
            ..Default::default()
        };
        log::info!("Opening viewer window '{}'", self.title);
        let window = ViewerWindow {
            app,
            canvas: WireframeCanvas::new(),
            started: false,
            finished: false,
        };
        eframe::run_native(&self.title, options, Box::new(|_cc| Ok(Box::new(window))))
            .map_err(|e| anyhow!("viewer window failed: {e}"))
    }
}

struct ViewerWindow<'a> {
    app: &'a mut dyn ViewerApp,
    canvas: WireframeCanvas,
    started: bool,
    finished: bool,
}

impl ViewerWindow<'_> {
    fn finish(&mut self, ctx: &egui::Context) {
        self.finished = true;
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for ViewerWindow<'_> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.finished {
            return;
        }
        if ctx.input(|i| i.viewport().close_requested()) {
            self.app.stop();
            self.finished = true;
            return;
        }

        let keys: Vec<char> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Text(text) => Some(text.chars().collect::<Vec<_>>()),
                    _ => None,
                })
                .flatten()
                .collect()
        });
        for key in keys {
            if self.app.command(key) == ViewerFlow::Exit {
                self.finish(ctx);
                return;
            }
        }

        self.canvas.clear();
        if !self.started {
            self.app.start(&mut self.canvas);
            self.started = true;
        }
        let elapsed = ctx.input(|i| i.unstable_dt);
        if self.app.step(&mut self.canvas, elapsed) == ViewerFlow::Exit {
            self.finish(ctx);
            return;
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(BACKGROUND))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let response = ui.allocate_rect(rect, egui::Sense::drag());
                let drag = response.drag_delta();
                if drag != egui::Vec2::ZERO {
                    self.canvas.orbit(drag.x, drag.y);
                }
                let painter = ui.painter_at(rect);
                for segment in self.canvas.project_all(rect.width(), rect.height()) {
                    let from = rect.min + egui::vec2(segment.from[0], segment.from[1]);
                    let to = rect.min + egui::vec2(segment.to[0], segment.to[1]);
                    let stroke = egui::Stroke::new(1.0, to_color32(segment.color));
                    painter.line_segment([from, to], stroke);
                }
            });
        ctx.request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_conversion_saturates() {
        assert_eq!(to_color32(Color::RED), egui::Color32::from_rgb(255, 0, 0));
        assert_eq!(
            to_color32(Color::new(2.0, -1.0, 0.5)),
            egui::Color32::from_rgb(255, 0, 128)
        );
    }
}
