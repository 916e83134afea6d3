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

//! Messages exchanged between the manager, nodes and the capture.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::OutputRoute;

/// Coordinates of a node in the mesh; row 0 is the northern edge.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Names one output pin anywhere in (or outside) the mesh.
///
/// External inputs are modelled as output pins of sources that sit outside
/// the grid, so the coordinates are not required to name a real node.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PinAddress {
    pub row: usize,
    pub col: usize,
    pub pin: usize,
}

impl PinAddress {
    pub fn new(row: usize, col: usize, pin: usize) -> Self {
        Self { row, col, pin }
    }

    pub fn at(position: Position, pin: usize) -> Self {
        Self::new(position.row, position.col, pin)
    }

    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }
}

impl fmt::Display for PinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}).{}", self.row, self.col, self.pin)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// The neighbouring position in this direction, if it is not off the
    /// north or west edge. The south and east edges depend on the mesh size.
    pub fn step(self, from: Position) -> Option<Position> {
        match self {
            Self::North => from.row.checked_sub(1).map(|row| Position::new(row, from.col)),
            Self::East => Some(Position::new(from.row, from.col + 1)),
            Self::South => Some(Position::new(from.row + 1, from.col)),
            Self::West => from.col.checked_sub(1).map(|col| Position::new(from.row, col)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::North => write!(f, "north"),
            Self::East => write!(f, "east"),
            Self::South => write!(f, "south"),
            Self::West => write!(f, "west"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Payload {
    /// Installs `word` as instruction `slot`; slots must arrive in order.
    LoadInstruction { slot: usize, word: u64 },
    /// Binds input pin `target_pin` to the output pin `source`.
    ConfigureInput {
        source: PinAddress,
        target_pin: usize,
        stateful: bool,
    },
    /// Binds output pin `pin` to its destinations.
    ConfigureOutput { pin: usize, route: OutputRoute },
    /// The output pin `source` now carries `value`.
    SignalState { source: PinAddress, value: bool },
}

/// A routed message. Immutable once built; forwarding a broadcast produces a
/// fresh copy with less decay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    /// Destination of a unicast, origin of a broadcast.
    pub target: Position,
    pub broadcast: bool,
    /// Hops left before a broadcast stops being forwarded.
    pub decay: u32,
    pub payload: Payload,
}

impl Message {
    pub fn unicast(target: Position, payload: Payload) -> Self {
        Self {
            target,
            broadcast: false,
            decay: 0,
            payload,
        }
    }

    pub fn broadcast(origin: Position, decay: u32, payload: Payload) -> Self {
        Self {
            target: origin,
            broadcast: true,
            decay,
            payload,
        }
    }

    /// Whether a node at `here` must digest this message.
    pub fn is_for(&self, here: Position) -> bool {
        self.broadcast || self.target == here
    }

    /// The copy to forward one hop further, or `None` once the decay is
    /// spent.
    pub fn decayed(&self) -> Option<Message> {
        if self.decay == 0 {
            return None;
        }
        Some(Message {
            decay: self.decay - 1,
            ..self.clone()
        })
    }
}
