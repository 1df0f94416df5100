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

//! The `simulator` binary.
//!
//! Diagnostics go to stderr through `env_logger` (`RUST_LOG` overrides the
//! level); stdout carries only the results.

mod cli;

use std::io;

use anyhow::{Context, Result};
use evosim_driver::{ProtocolReader, RenderAdapter, Simulation};
use evosim_infra::{EguiViewer, RapierEngine};

use crate::cli::Cli;

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse_args();
    let mut reader = ProtocolReader::new(io::stdin().lock());
    let sim = Simulation::from_reader(Box::new(RapierEngine::new()), &mut reader)
        .context("failed to build the scene")?;

    if cli.blind {
        run_headless(sim)
    } else {
        log::debug!("Opening the viewer window");
        let mut adapter = RenderAdapter::new(sim, io::stdout().lock());
        EguiViewer::new("Simulator").run(&mut adapter)?;
        adapter.finish().context("simulation failed")?;
        Ok(())
    }
}

fn run_headless(mut sim: Simulation) -> Result<()> {
    let mut out = io::stdout().lock();
    sim.run_headless(&mut out).context("simulation failed")?;
    Ok(())
}
