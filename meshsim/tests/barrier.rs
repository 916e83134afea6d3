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

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use meshsim::{Capture, Error, Manager, MeshConfiguration, Observer, PipeRef, Time};

use common::*;

/// Checks the pipes it was handed every time a tick is about to be issued.
struct BarrierCheck {
    pipes: Vec<PipeRef>,
    ticks: usize,
    busy_at_tick: usize,
    busy_instants: usize,
}

impl Observer for BarrierCheck {
    fn observe(&mut self, _now: Time) -> Result<(), Error> {
        if self.pipes.iter().any(|pipe| !pipe.borrow().is_empty()) {
            self.busy_instants += 1;
        }
        Ok(())
    }

    fn before_tick(&mut self) -> Result<(), Error> {
        self.ticks += 1;
        if self.pipes.iter().any(|pipe| !pipe.borrow().is_empty()) {
            self.busy_at_tick += 1;
        }
        Ok(())
    }
}

#[test]
fn ticks_only_when_every_pipe_is_empty() -> Result<(), Error> {
    init_logging();
    let mut manager = Manager::from_design(&inverter_chain())?;
    Capture::attach(&mut manager)?;
    let check = Rc::new(RefCell::new(BarrierCheck {
        pipes: manager.mesh().pipes().to_vec(),
        ticks: 0,
        busy_at_tick: 0,
        busy_instants: 0,
    }));
    manager.add_observer(check.clone());
    for value in [true, false, false, true, true, false] {
        manager.drive_named("a", value)?;
        manager.run_ticks(1)?;
    }
    let check = check.borrow();
    assert_eq!(check.ticks, 6);
    assert_eq!(check.busy_at_tick, 0);
    assert!(check.busy_instants > 0);
    Ok(())
}

#[test]
fn idle_mesh_ticks_every_instant() -> Result<(), Error> {
    init_logging();
    let mut manager = Manager::new(&MeshConfiguration::new(3, 3, 2, 2, 2))?;
    manager.run_until(10)?;
    // An empty program finishes its pass in the instant after the tick.
    assert_eq!(manager.ticks(), 10);
    Ok(())
}

#[test]
fn tick_follows_load_promptly() -> Result<(), Error> {
    init_logging();
    let design = inverter_chain();
    let messages = design.messages().len() as Time;
    let mut manager = Manager::from_design(&design)?;
    manager.run_ticks(1)?;
    // One message enters per instant, then crosses at most three nodes.
    assert!(manager.now() <= messages + 8, "first tick at {}", manager.now());
    Ok(())
}
