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

//! Runs the built `simulator` binary the way the controller does.

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn simulate(args: &[&str], scene: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_simulator"))
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("simulator starts");
    child
        .stdin
        .take()
        .expect("piped stdin")
        .write_all(scene.as_bytes())
        .expect("scene written");
    child.wait_with_output().expect("simulator exits")
}

#[test]
fn blind_run_reports_the_step_budget() {
    let output = simulate(
        &["-blind"],
        "Parameter EvalSteps 200\n\
         Entity RigidBody 0 0 0.5 1 0 0 0\n\
         Add 0 Box 0 0 0 1 1 1 1 1 1 1\n\
         Add 0 PositionSensor\n\
         Done\n",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf-8 results");
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("200"));
    assert_eq!(lines.next(), Some("0 0 Position 3 200"));
}

#[test]
fn unknown_record_fails_without_results() {
    let output = simulate(&["--blind"], "Parameter DT 0.01\nWarp 9\nDone\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Warp"), "diagnostic was: {stderr}");
}
