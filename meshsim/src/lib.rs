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

//! Architectural simulator for a 2-D mesh of boolean compute nodes.
//!
//! A compiled design (instruction streams plus I/O wiring) is loaded into the
//! mesh as a stream of messages, then executed cycle by cycle. A cycle only
//! advances (a "tick") once every node has drained its pipes and finished its
//! pass over its instruction list, so the output pin transitions observed at
//! the mesh boundary can be compared against RTL waveforms.

mod capture;
mod config;
mod design;
mod error;
mod instruction;
mod manager;
mod mesh;
mod message;
mod node;
mod pipe;
mod vcd;

/// Simulated time, in time units.
pub type Time = u64;

pub use crate::capture::{Capture, Snapshot, Waveform};
pub use crate::config::{MeshConfiguration, PipeConfiguration};
pub use crate::design::{
    Design, InputHandling, NamedPin, NodeProgram, OutputHandling, Reports,
};
pub use crate::error::Error;
pub use crate::instruction::{Instruction, InstructionFormat, Operation};
pub use crate::manager::{Manager, Observer};
pub use crate::mesh::Mesh;
pub use crate::message::{Direction, Message, Payload, PinAddress, Position};
pub use crate::node::{InputRoute, Node, NodeStats, OutputRoute, Phase, PinState};
pub use crate::pipe::{Pipe, PipeRef};
pub use crate::vcd::VcdWriter;
