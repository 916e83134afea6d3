// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runs a compiled design on the mesh simulator and dumps the captured
//! outputs as a VCD.

use anyhow::Context;
use env_logger::Target;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

use meshsim::{Capture, Design, Manager, VcdWriter};

#[derive(StructOpt)]
#[structopt(name = "runner", about = "Simulates a compiled design on the boolean mesh")]
struct Arguments {
    /// compiled design, .yaml or .json
    design: String,
    #[structopt(short, long, default_value = "100")]
    ticks: u64,
    /// per-cycle values of the named external inputs
    #[structopt(short, long, parse(from_os_str))]
    stimulus: Option<PathBuf>,
    #[structopt(short, long, parse(from_os_str), default_value = "mesh.vcd")]
    output: PathBuf,
    /// log the busiest pipes when done
    #[structopt(short, long)]
    utilization: bool,
}

/// Input values to apply, one map per cycle, starting with the first.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Stimulus {
    cycles: Vec<BTreeMap<String, bool>>,
}

impl Stimulus {
    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::from_args();

    env_logger::builder().target(Target::Stderr).init();

    let design = Design::from_file(&args.design)?;
    let stimulus = match &args.stimulus {
        Some(path) => Stimulus::from_file(path)?,
        None => Stimulus::default(),
    };
    log::info!(
        "design {}: {}x{} mesh, {} node programs",
        args.design,
        design.configuration.rows,
        design.configuration.cols,
        design.nodes.len()
    );

    let mut manager = Manager::from_design(&design)?;
    let capture = Capture::attach(&mut manager)?;
    for tick in 0..args.ticks {
        if let Some(values) = stimulus.cycles.get(tick as usize) {
            for (name, value) in values.iter() {
                manager.drive_named(name, *value)?;
            }
        }
        manager.run_ticks(1)?;
    }
    log::info!(
        "ran {} ticks in {} time units",
        manager.ticks(),
        manager.now()
    );

    if args.utilization {
        for (name, ratio) in manager.mesh().pipe_utilization(manager.now()).iter().take(10) {
            log::info!("{:>40}: {:5.1}%", name, ratio * 100.0);
        }
    }

    let waveform = capture.borrow().waveform();
    VcdWriter::create(&args.output)?.write_waveform(&waveform, manager.reports())?;
    log::info!(
        "wrote {} signals to {}",
        waveform.signals().count(),
        args.output.display()
    );
    Ok(())
}
