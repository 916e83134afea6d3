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

use std::fmt;

use crate::{Direction, Message, PinAddress, Position, Time};

/// Every variant is fatal: the simulator is a reference model, and carrying
/// on after any of these would desynchronize it from the hardware.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    InvalidConfiguration(String),
    InvalidDesign(String),
    InvalidInstruction {
        position: Position,
        slot: usize,
        word: u64,
    },
    SlotOutOfOrder {
        position: Position,
        expected: usize,
        found: usize,
    },
    InvalidPin {
        position: Position,
        pin: usize,
    },
    OutputOverflow {
        position: Position,
        pin: usize,
    },
    UnroutableSignal {
        position: Position,
        source: PinAddress,
    },
    NoRoute {
        position: Position,
        direction: Direction,
        message: Message,
    },
    AlreadyConnected {
        position: Position,
        direction: Direction,
    },
    NotOnBoundary {
        position: Position,
        direction: Direction,
    },
    UnexpectedMessage(Message),
    UnknownInput(String),
    TickWhileRunning(Position),
    Stalled {
        last_tick: Time,
        now: Time,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidConfiguration(why) => write!(f, "ERROR: Invalid configuration: {}", why),
            Self::InvalidDesign(why) => write!(f, "ERROR: Invalid design: {}", why),
            Self::InvalidInstruction {
                position,
                slot,
                word,
            } => write!(
                f,
                "ERROR: Invalid instruction {:#x} for slot {} of node {}",
                word, slot, position
            ),
            Self::SlotOutOfOrder {
                position,
                expected,
                found,
            } => write!(
                f,
                "ERROR: Node {} expected instruction slot {}, got {}",
                position, expected, found
            ),
            Self::UnroutableSignal { position, source } => write!(
                f,
                "ERROR: Node {} has no input mapped from {}",
                position, source
            ),
            Self::NoRoute {
                position,
                direction,
                message,
            } => write!(
                f,
                "ERROR: Node {} has no {} link for {:?}",
                position, direction, message
            ),
            Self::Stalled { last_tick, now } => write!(
                f,
                "ERROR: Mesh did not settle; last tick at {}, now {}",
                last_tick, now
            ),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}
