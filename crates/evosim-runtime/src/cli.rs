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

//! Command-line interface of the simulator.

use std::ffi::OsString;

use clap::Parser;

/// Rigid-body evaluation driver for evolutionary robotics.
///
/// Reads a scene on standard input and writes the completed step count and
/// the sensor time series on standard output.
#[derive(Parser, Debug)]
#[command(name = "simulator", version, about, long_about = None)]
pub struct Cli {
    /// Run without a window, as fast as possible
    #[arg(long)]
    pub blind: bool,
}

impl Cli {
    /// Parses the process arguments, accepting the single-dash `-blind`.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize(std::env::args_os()))
    }
}

/// Rewrites the legacy `-blind` spelling to `--blind`.
pub fn normalize<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            if arg == "-blind" {
                OsString::from("--blind")
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(normalize(args.iter().map(OsString::from)))
    }

    #[test]
    fn test_legacy_blind_flag() {
        assert!(parse(&["simulator", "-blind"]).is_ok_and(|cli| cli.blind));
        assert!(parse(&["simulator", "--blind"]).is_ok_and(|cli| cli.blind));
    }

    #[test]
    fn test_window_by_default() {
        assert!(parse(&["simulator"]).is_ok_and(|cli| !cli.blind));
    }

    #[test]
    fn test_other_flags_are_rejected() {
        assert!(parse(&["simulator", "-fast"]).is_err());
        assert!(parse(&["simulator", "scene.txt"]).is_err());
    }
}
