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

//! Execution state machine of a node.

use std::collections::VecDeque;

use super::{Node, PinState};
use crate::{Error, Message, Operation, PinAddress, Time};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Loading; nothing has run yet.
    Setup,
    /// Pass complete, waiting for the next tick (or an interrupt).
    Wait,
    Run,
}

#[derive(Debug)]
pub(super) struct Execution {
    pub(super) phase: Phase,
    pc: usize,
    /// Output pin assigned to the next output-producing instruction.
    next_output: usize,
    busy_until: Time,
    /// Signals waiting for room in the loopback pipe.
    emit: VecDeque<Message>,
    /// Output pin value to assert once its signals have been sent.
    pending_commit: Option<(usize, bool)>,
    pending_restart: bool,
    last_interrupt: Option<Time>,
    /// Furthest instruction reached since the last tick. A restarted pass
    /// does not lower it.
    pub(super) furthest: usize,
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            phase: Phase::Setup,
            pc: 0,
            next_output: 0,
            busy_until: 0,
            emit: VecDeque::new(),
            pending_commit: None,
            pending_restart: false,
            last_interrupt: None,
            furthest: 0,
        }
    }
}

impl Execution {
    pub(super) fn start(&mut self) {
        self.phase = Phase::Run;
        self.pc = 0;
        self.next_output = 0;
        self.busy_until = 0;
        self.pending_restart = false;
    }

    pub(super) fn is_quiet(&self) -> bool {
        matches!(self.phase, Phase::Setup | Phase::Wait)
            && !self.pending_restart
            && self.emit.is_empty()
            && self.pending_commit.is_none()
    }
}

impl Node {
    pub(super) fn execute(&mut self, now: Time) -> Result<(), Error> {
        self.flush_emissions(now);
        if !self.exec.emit.is_empty() {
            return Ok(());
        }
        if let Some((pin, value)) = self.exec.pending_commit.take() {
            self.outputs[pin] = PinState::from(value);
        }
        if self.exec.phase != Phase::Run {
            return Ok(());
        }
        if self.exec.pending_restart {
            let settled_at = self.exec.last_interrupt.unwrap_or(now) + self.settle_delay;
            if now < settled_at {
                return Ok(());
            }
            log::trace!("node {} @{}: restarting pass", self.position, now);
            self.exec.start();
            self.exec.busy_until = now;
        }
        if now < self.exec.busy_until {
            return Ok(());
        }
        if self.exec.pc == self.ops.len() {
            log::trace!("node {} @{}: pass complete", self.position, now);
            self.exec.phase = Phase::Wait;
            return Ok(());
        }
        self.execute_instruction(now)
    }

    /// A combinatorial input changed. Once the node has started running,
    /// the current pass is abandoned and restarts when the inputs settle.
    pub(super) fn interrupt(&mut self, now: Time) {
        self.stats.interrupts += 1;
        self.exec.last_interrupt = Some(now);
        if self.exec.phase == Phase::Setup {
            return;
        }
        log::trace!("node {} @{}: interrupted at pc {}", self.position, now, self.exec.pc);
        self.exec.phase = Phase::Run;
        self.exec.pending_restart = true;
        self.exec.pending_commit = None;
    }

    fn operand(&self, source: usize, is_input: bool) -> bool {
        if is_input {
            self.inputs[source]
        } else {
            self.registers[source]
        }
    }

    fn execute_instruction(&mut self, now: Time) -> Result<(), Error> {
        let instruction = self.ops[self.exec.pc];
        let a = self.operand(instruction.source_a, instruction.is_input_a);
        let b = match instruction.operation {
            Operation::Invert => false,
            _ => self.operand(instruction.source_b, instruction.is_input_b),
        };
        let result = instruction.operation.evaluate(a, b);
        self.registers.set(instruction.target_register, result);
        self.exec.pc += 1;
        self.exec.furthest = self.exec.furthest.max(self.exec.pc);
        self.exec.busy_until = now + self.instruction_cost;
        self.stats.instructions += 1;

        if !instruction.produces_output {
            return Ok(());
        }
        let pin = self.exec.next_output;
        self.exec.next_output += 1;
        if pin >= self.outputs.len() {
            return Err(Error::OutputOverflow {
                position: self.position,
                pin,
            });
        }
        if self.outputs[pin] == PinState::from(result) {
            return Ok(());
        }
        log::trace!(
            "node {} @{}: output {} -> {}",
            self.position,
            now,
            pin,
            result
        );
        self.outputs[pin] = PinState::Unknown;
        if let Some(route) = self.output_map[pin] {
            let signals = route.signals(self.position, PinAddress::at(self.position, pin), result);
            self.stats.signals += signals.len() as u64;
            self.exec.emit.extend(signals);
            self.flush_emissions(now);
        }
        if self.exec.emit.is_empty() {
            self.outputs[pin] = PinState::from(result);
        } else {
            self.exec.pending_commit = Some((pin, result));
        }
        Ok(())
    }

    fn flush_emissions(&mut self, now: Time) {
        while let Some(message) = self.exec.emit.pop_front() {
            let refused = self.ports.internal.borrow_mut().push(now, message);
            if let Err(message) = refused {
                self.exec.emit.push_front(message);
                break;
            }
        }
    }
}
