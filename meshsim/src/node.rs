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

//! A single compute node: message handling, pin state and the wiring tables.
//!
//! Each call to [`Node::step`] first lets the message handler receive (at
//! most) one message, then advances the execution state machine in
//! `execute.rs` by one instant.

use bitvec::prelude::*;
use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::{
    Direction, Error, Instruction, InstructionFormat, Message, MeshConfiguration, Payload,
    PinAddress, PipeRef, Position, Time,
};

mod execute;
mod wiring;

use execute::Execution;
pub use execute::Phase;
pub use wiring::{InputRoute, OutputRoute, PinState};

/// Activity counters, reset along with the node.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NodeStats {
    /// Messages received, from any pipe.
    pub messages: u64,
    pub instructions: u64,
    /// Combinatorial input changes.
    pub interrupts: u64,
    /// Signal messages generated by output changes.
    pub signals: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Channel {
    Internal,
    Link(Direction),
}

#[derive(Debug)]
struct Ports {
    inbound: [Option<PipeRef>; 4],
    outbound: [Option<PipeRef>; 4],
    /// Loopback carrying the node's own emissions back into its handler.
    internal: PipeRef,
}

#[derive(Debug)]
pub struct Node {
    position: Position,
    format: InstructionFormat,
    instruction_cost: Time,
    settle_delay: Time,

    inputs: BitVec,
    next_inputs: BitVec,
    registers: BitVec,
    outputs: Vec<PinState>,

    ops: Vec<Instruction>,
    input_map: Vec<Option<InputRoute>>,
    output_map: Vec<Option<OutputRoute>>,

    ports: Ports,
    /// Link the handler polls first on its next receive.
    next_link: usize,
    /// Forwarded copies not yet accepted by their outbound pipe. The handler
    /// receives nothing new until this drains.
    dispatch: VecDeque<(PipeRef, Message)>,

    exec: Execution,
    stats: NodeStats,
}

impl Node {
    pub fn new(position: Position, config: &MeshConfiguration, internal: PipeRef) -> Self {
        Self {
            position,
            format: config.format(),
            instruction_cost: config.instruction_cost,
            settle_delay: config.settle_delay,
            inputs: BitVec::repeat(false, config.inputs),
            next_inputs: BitVec::repeat(false, config.inputs),
            registers: BitVec::repeat(false, config.registers),
            outputs: vec![PinState::Unknown; config.outputs],
            ops: Vec::new(),
            input_map: vec![None; config.inputs],
            output_map: vec![None; config.outputs],
            ports: Ports {
                inbound: Default::default(),
                outbound: Default::default(),
                internal,
            },
            next_link: 0,
            dispatch: VecDeque::new(),
            exec: Execution::default(),
            stats: NodeStats::default(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn inputs(&self) -> &BitSlice {
        &self.inputs
    }

    /// Input values that become current at the next tick.
    pub fn next_inputs(&self) -> &BitSlice {
        &self.next_inputs
    }

    pub fn registers(&self) -> &BitSlice {
        &self.registers
    }

    pub fn outputs(&self) -> &[PinState] {
        &self.outputs
    }

    pub fn ops(&self) -> &[Instruction] {
        &self.ops
    }

    pub fn input_route(&self, pin: usize) -> Option<&InputRoute> {
        self.input_map.get(pin).and_then(Option::as_ref)
    }

    pub fn output_route(&self, pin: usize) -> Option<&OutputRoute> {
        self.output_map.get(pin).and_then(Option::as_ref)
    }

    pub fn phase(&self) -> Phase {
        self.exec.phase
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    pub fn has_inbound(&self, direction: Direction) -> bool {
        self.ports.inbound[direction.index()].is_some()
    }

    pub fn has_outbound(&self, direction: Direction) -> bool {
        self.ports.outbound[direction.index()].is_some()
    }

    pub(crate) fn attach_inbound(&mut self, direction: Direction, pipe: PipeRef) -> Result<(), Error> {
        Self::attach(&mut self.ports.inbound[direction.index()], pipe, self.position, direction)
    }

    pub(crate) fn attach_outbound(&mut self, direction: Direction, pipe: PipeRef) -> Result<(), Error> {
        Self::attach(&mut self.ports.outbound[direction.index()], pipe, self.position, direction)
    }

    fn attach(
        port: &mut Option<PipeRef>,
        pipe: PipeRef,
        position: Position,
        direction: Direction,
    ) -> Result<(), Error> {
        if port.is_some() {
            return Err(Error::AlreadyConnected { position, direction });
        }
        *port = Some(pipe);
        Ok(())
    }

    /// Advances the node by one instant.
    pub fn step(&mut self, now: Time) -> Result<(), Error> {
        self.handle_messages(now)?;
        self.execute(now)
    }

    /// Latches the sequential inputs and starts a new pass over the
    /// instruction list.
    pub fn tick(&mut self) -> Result<(), Error> {
        if self.exec.phase == Phase::Run {
            return Err(Error::TickWhileRunning(self.position));
        }
        self.inputs.clone_from(&self.next_inputs);
        self.exec.furthest = 0;
        self.exec.start();
        Ok(())
    }

    /// Instructions of the current cycle's pass reached so far. Passes
    /// restarted by an interrupt only count once they get further.
    pub fn progress(&self) -> usize {
        self.exec.furthest
    }

    /// True while the node has nothing left to do until the next tick: the
    /// pass is finished (or never started), nothing waits to be sent and no
    /// message waits to be received.
    pub fn is_idle(&self) -> bool {
        self.exec.is_quiet()
            && self.dispatch.is_empty()
            && self.ports.internal.borrow().is_empty()
            && self
                .ports
                .inbound
                .iter()
                .flatten()
                .all(|pipe| pipe.borrow().is_empty())
    }

    /// Returns to the freshly constructed state. Links stay attached; the
    /// pipes themselves belong to the mesh.
    pub fn reset(&mut self) {
        self.inputs.fill(false);
        self.next_inputs.fill(false);
        self.registers.fill(false);
        self.outputs.fill(PinState::Unknown);
        self.ops.clear();
        self.input_map.fill(None);
        self.output_map.fill(None);
        self.next_link = 0;
        self.dispatch.clear();
        self.exec = Execution::default();
        self.stats = NodeStats::default();
    }

    /// The link a unicast for `target` leaves on: rows first, then columns.
    /// `None` if the message has arrived.
    pub fn next_hop(&self, target: Position) -> Option<Direction> {
        match target.row.cmp(&self.position.row) {
            Ordering::Less => Some(Direction::North),
            Ordering::Greater => Some(Direction::South),
            Ordering::Equal => match target.col.cmp(&self.position.col) {
                Ordering::Less => Some(Direction::West),
                Ordering::Greater => Some(Direction::East),
                Ordering::Equal => None,
            },
        }
    }

    fn handle_messages(&mut self, now: Time) -> Result<(), Error> {
        self.flush_dispatch(now);
        if !self.dispatch.is_empty() {
            return Ok(());
        }
        let (arrival, message) = match self.receive(now) {
            Some(received) => received,
            None => return Ok(()),
        };
        self.stats.messages += 1;
        log::trace!(
            "node {} @{}: received {:?} via {:?}",
            self.position,
            now,
            message,
            arrival
        );
        if message.is_for(self.position) {
            self.digest(now, &message)?;
        }
        self.forward(arrival, message)?;
        self.flush_dispatch(now);
        Ok(())
    }

    /// Pops at most one message: the loopback first, then the links in
    /// round-robin order.
    fn receive(&mut self, now: Time) -> Option<(Channel, Message)> {
        if let Some(message) = self.ports.internal.borrow_mut().pop(now) {
            return Some((Channel::Internal, message));
        }
        let links = Direction::ALL.len();
        for offset in 0..links {
            let direction = Direction::ALL[(self.next_link + offset) % links];
            if let Some(pipe) = &self.ports.inbound[direction.index()] {
                if let Some(message) = pipe.borrow_mut().pop(now) {
                    self.next_link = (direction.index() + 1) % links;
                    return Some((Channel::Link(direction), message));
                }
            }
        }
        None
    }

    fn forward(&mut self, arrival: Channel, message: Message) -> Result<(), Error> {
        if message.broadcast {
            if let Some(copy) = message.decayed() {
                for direction in Direction::ALL {
                    if arrival == Channel::Link(direction) {
                        continue;
                    }
                    if let Some(pipe) = &self.ports.outbound[direction.index()] {
                        self.dispatch.push_back((pipe.clone(), copy.clone()));
                    }
                }
            }
            return Ok(());
        }
        let direction = match self.next_hop(message.target) {
            Some(direction) => direction,
            None => return Ok(()),
        };
        match &self.ports.outbound[direction.index()] {
            Some(pipe) => {
                self.dispatch.push_back((pipe.clone(), message));
                Ok(())
            }
            None => {
                log::error!(
                    "node {}: no {} link for {:?}",
                    self.position,
                    direction,
                    message
                );
                Err(Error::NoRoute {
                    position: self.position,
                    direction,
                    message,
                })
            }
        }
    }

    fn flush_dispatch(&mut self, now: Time) {
        while let Some((pipe, message)) = self.dispatch.pop_front() {
            let refused = pipe.borrow_mut().push(now, message);
            if let Err(message) = refused {
                self.dispatch.push_front((pipe, message));
                break;
            }
        }
    }

    fn digest(&mut self, now: Time, message: &Message) -> Result<(), Error> {
        match &message.payload {
            Payload::LoadInstruction { slot, word } => self.load_instruction(*slot, *word),
            Payload::ConfigureInput {
                source,
                target_pin,
                stateful,
            } => {
                self.check_pin(*target_pin, self.input_map.len())?;
                self.input_map[*target_pin] = Some(InputRoute {
                    source: *source,
                    stateful: *stateful,
                });
                Ok(())
            }
            Payload::ConfigureOutput { pin, route } => {
                self.check_pin(*pin, self.output_map.len())?;
                self.output_map[*pin] = Some(*route);
                Ok(())
            }
            Payload::SignalState { source, value } => {
                self.update_inputs(now, *source, *value, message.broadcast)
            }
        }
    }

    fn load_instruction(&mut self, slot: usize, word: u64) -> Result<(), Error> {
        if slot != self.ops.len() {
            log::error!(
                "node {}: instruction for slot {} while {} are loaded",
                self.position,
                slot,
                self.ops.len()
            );
            return Err(Error::SlotOutOfOrder {
                position: self.position,
                expected: self.ops.len(),
                found: slot,
            });
        }
        let instruction = self
            .format
            .decode(word)
            .filter(|instruction| instruction.fits(self.inputs.len(), self.registers.len()))
            .ok_or_else(|| {
                log::error!("node {}: cannot decode slot {} word {:#x}", self.position, slot, word);
                Error::InvalidInstruction {
                    position: self.position,
                    slot,
                    word,
                }
            })?;
        self.ops.push(instruction);
        Ok(())
    }

    fn check_pin(&self, pin: usize, pins: usize) -> Result<(), Error> {
        if pin >= pins {
            log::error!("node {}: pin {} out of range ({} pins)", self.position, pin, pins);
            return Err(Error::InvalidPin {
                position: self.position,
                pin,
            });
        }
        Ok(())
    }

    fn update_inputs(
        &mut self,
        now: Time,
        source: PinAddress,
        value: bool,
        broadcast: bool,
    ) -> Result<(), Error> {
        let mut matched = false;
        let mut interrupted = false;
        for (pin, route) in self.input_map.iter().enumerate() {
            let route = match route {
                Some(route) if route.source == source => route,
                _ => continue,
            };
            matched = true;
            self.next_inputs.set(pin, value);
            if !route.stateful && self.inputs[pin] != value {
                self.inputs.set(pin, value);
                interrupted = true;
            }
        }
        if interrupted {
            self.interrupt(now);
        }
        if !matched && !broadcast {
            log::error!("node {}: no input listens to {}", self.position, source);
            return Err(Error::UnroutableSignal {
                position: self.position,
                source,
            });
        }
        Ok(())
    }
}
