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

//! Drives a mesh: feeds it the load stream and external stimulus, and issues
//! global ticks whenever the whole mesh has settled.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::{
    Design, Direction, Error, Mesh, MeshConfiguration, Message, Payload, PinAddress, PipeRef,
    Position, Reports, Time,
};

/// Something that watches the simulation, like the [`crate::Capture`].
pub trait Observer {
    /// Called once per time unit, after every node has stepped.
    fn observe(&mut self, _now: Time) -> Result<(), Error> {
        Ok(())
    }

    /// Called with the mesh settled, right before a tick is delivered to it.
    fn before_tick(&mut self) -> Result<(), Error>;
}

pub struct Manager {
    mesh: Mesh,
    ingress: PipeRef,
    send_queue: VecDeque<Message>,
    observers: Vec<Rc<RefCell<dyn Observer>>>,
    /// Nodes consuming each input that is driven from outside the mesh.
    external_sinks: BTreeMap<PinAddress, Vec<Position>>,
    reports: Reports,
    now: Time,
    ticks: u64,
    last_tick: Time,
    /// Last instant the load stream or some node's pass moved forward.
    last_progress: Time,
    progress: usize,
}

impl Manager {
    pub fn new(config: &MeshConfiguration) -> Result<Self, Error> {
        let mut mesh = Mesh::new(config, 0)?;
        let ingress = mesh.attach_inbound(Position::new(0, 0), Direction::North, 0)?;
        Ok(Self {
            mesh,
            ingress,
            send_queue: VecDeque::new(),
            observers: Vec::new(),
            external_sinks: BTreeMap::new(),
            reports: Reports::default(),
            now: 0,
            ticks: 0,
            last_tick: 0,
            last_progress: 0,
            progress: 0,
        })
    }

    /// A manager for the design's own mesh configuration, with the design
    /// already queued for loading.
    pub fn from_design(design: &Design) -> Result<Self, Error> {
        let mut manager = Self::new(&design.configuration)?;
        manager.load(design)?;
        Ok(manager)
    }

    /// Queues the design's load stream.
    pub fn load(&mut self, design: &Design) -> Result<(), Error> {
        design.validate()?;
        let config = self.mesh.config();
        let ours = (config.rows, config.cols, config.inputs, config.outputs, config.registers);
        let theirs = &design.configuration;
        if ours
            != (
                theirs.rows,
                theirs.cols,
                theirs.inputs,
                theirs.outputs,
                theirs.registers,
            )
        {
            return Err(Error::InvalidDesign(format!(
                "design is for a {}x{} mesh with {}/{}/{} pins and registers, not {:?}",
                theirs.rows, theirs.cols, theirs.inputs, theirs.outputs, theirs.registers, ours
            )));
        }
        let messages = design.messages();
        log::debug!(
            "loading {} messages for {} nodes",
            messages.len(),
            design.nodes.len()
        );
        self.send_queue.extend(messages);
        for (source, sink) in design.external_inputs() {
            let sinks = self.external_sinks.entry(source).or_default();
            if !sinks.contains(&sink) {
                sinks.push(sink);
            }
        }
        self.reports = design.reports.clone();
        Ok(())
    }

    /// Queues a message for the ingress pipe.
    pub fn send(&mut self, message: Message) {
        self.send_queue.push_back(message);
    }

    /// Sets an external input to `value` in every node consuming it.
    pub fn drive(&mut self, source: PinAddress, value: bool) -> Result<(), Error> {
        let sinks = self
            .external_sinks
            .get(&source)
            .ok_or_else(|| Error::UnknownInput(source.to_string()))?;
        for &sink in sinks.iter() {
            self.send_queue
                .push_back(Message::unicast(sink, Payload::SignalState { source, value }));
        }
        Ok(())
    }

    pub fn drive_named(&mut self, name: &str, value: bool) -> Result<(), Error> {
        let source = self
            .reports
            .input(name)
            .ok_or_else(|| Error::UnknownInput(name.to_string()))?;
        self.drive(source, value)
    }

    pub fn add_observer(&mut self, observer: Rc<RefCell<dyn Observer>>) {
        self.observers.push(observer);
    }

    pub fn now(&self) -> Time {
        self.now
    }

    /// Number of global ticks issued so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    pub fn reports(&self) -> &Reports {
        &self.reports
    }

    /// Messages not yet sent into the mesh.
    pub fn pending(&self) -> usize {
        self.send_queue.len()
    }

    /// Simulates one time unit.
    pub fn step(&mut self) -> Result<(), Error> {
        let now = self.now;
        let transmitted = self.transmit(now);
        self.mesh.step(now)?;
        let progress = self.mesh.progress();
        if transmitted || progress > self.progress {
            self.last_progress = now;
        }
        self.progress = progress;
        for observer in self.observers.iter() {
            observer.borrow_mut().observe(now)?;
        }
        if self.send_queue.is_empty() && self.mesh.is_idle() {
            for observer in self.observers.iter() {
                observer.borrow_mut().before_tick()?;
            }
            self.mesh.tick()?;
            self.ticks += 1;
            self.last_tick = now;
            self.last_progress = now;
            self.progress = self.mesh.progress();
            log::debug!("tick {} @{}", self.ticks, now);
        } else if now - self.last_progress > self.mesh.config().stall_limit {
            log::error!(
                "no progress since {} (last tick {}), {} messages still queued",
                self.last_progress,
                self.last_tick,
                self.send_queue.len()
            );
            return Err(Error::Stalled {
                last_tick: self.last_tick,
                now,
            });
        }
        self.now += 1;
        Ok(())
    }

    /// Runs until `count` more ticks have been issued.
    pub fn run_ticks(&mut self, count: u64) -> Result<(), Error> {
        let target = self.ticks + count;
        while self.ticks < target {
            self.step()?;
        }
        Ok(())
    }

    /// Runs until simulated time reaches `time`.
    pub fn run_until(&mut self, time: Time) -> Result<(), Error> {
        while self.now < time {
            self.step()?;
        }
        Ok(())
    }

    /// Clears every node and pipe and drops anything not yet sent. Time and
    /// the tick count keep running.
    pub fn reset(&mut self) {
        self.mesh.reset(self.now);
        self.send_queue.clear();
        self.external_sinks.clear();
        self.reports = Reports::default();
        self.last_tick = self.now;
        self.last_progress = self.now;
        self.progress = 0;
    }

    /// Offers the next queued message to the ingress pipe. True if it was
    /// taken.
    fn transmit(&mut self, now: Time) -> bool {
        if let Some(message) = self.send_queue.pop_front() {
            let refused = self.ingress.borrow_mut().push(now, message);
            if let Err(message) = refused {
                self.send_queue.push_front(message);
                return false;
            }
            return true;
        }
        false
    }
}
