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

//! Compiled design artifact: per-node programs and wiring, plus report names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{Error, MeshConfiguration, Message, OutputRoute, Payload, PinAddress, Position};

/// One entry of a node's input-handling list.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InputHandling {
    pub source_row: usize,
    pub source_col: usize,
    pub source_pin: usize,
    pub target_pin: usize,
    #[serde(default)]
    pub stateful: bool,
}

impl InputHandling {
    pub fn source(&self) -> PinAddress {
        PinAddress::new(self.source_row, self.source_col, self.source_pin)
    }
}

/// One entry of a node's output-handling list.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct OutputHandling {
    pub source_pin: usize,
    pub broadcast: bool,
    pub decay: u32,
    pub target_a: Option<Position>,
    pub target_b: Option<Position>,
}

impl OutputHandling {
    pub fn route(&self) -> OutputRoute {
        OutputRoute {
            broadcast: self.broadcast,
            decay: self.decay,
            target_a: self.target_a,
            target_b: self.target_b,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeProgram {
    pub row: usize,
    pub col: usize,
    /// Encoded instruction words, in slot order.
    #[serde(default)]
    pub instructions: Vec<u64>,
    #[serde(default)]
    pub inputs: Vec<InputHandling>,
    #[serde(default)]
    pub outputs: Vec<OutputHandling>,
}

impl NodeProgram {
    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NamedPin {
    pub name: String,
    pub pin: PinAddress,
}

/// Human readable names of the design's external inputs and outputs.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Reports {
    pub inputs: Vec<NamedPin>,
    pub outputs: Vec<NamedPin>,
}

impl Reports {
    pub fn input(&self, name: &str) -> Option<PinAddress> {
        Self::find(&self.inputs, name)
    }

    pub fn output(&self, name: &str) -> Option<PinAddress> {
        Self::find(&self.outputs, name)
    }

    /// Report name of `pin`, looking at outputs first.
    pub fn name_of(&self, pin: PinAddress) -> Option<&str> {
        self.outputs
            .iter()
            .chain(self.inputs.iter())
            .find(|named| named.pin == pin)
            .map(|named| named.name.as_str())
    }

    fn find(pins: &[NamedPin], name: &str) -> Option<PinAddress> {
        pins.iter().find(|named| named.name == name).map(|named| named.pin)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Design {
    pub configuration: MeshConfiguration,
    pub nodes: Vec<NodeProgram>,
    pub reports: Reports,
}

impl Design {
    /// Reads a design from a `.json` file, or from YAML otherwise.
    pub fn from_file(file_name: &str) -> Result<Self, Error> {
        let path = Path::new(file_name);
        let file = File::open(path)
            .map_err(|e| Error::InvalidDesign(format!("File {} not found. {:?}", file_name, e)))?;
        let reader = BufReader::new(file);
        let design: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_reader(reader).map_err(|e| Error::InvalidDesign(e.to_string()))?,
            _ => serde_yaml::from_reader(reader).map_err(|e| Error::InvalidDesign(e.to_string()))?,
        };
        log::debug!("read design {} with {} node programs", file_name, design.nodes.len());
        Ok(design)
    }

    pub fn from_yaml_str(design: &str) -> Result<Self, Error> {
        serde_yaml::from_str(design).map_err(|e| Error::InvalidDesign(e.to_string()))
    }

    pub fn from_json_str(design: &str) -> Result<Self, Error> {
        serde_json::from_str(design).map_err(|e| Error::InvalidDesign(e.to_string()))
    }

    /// Checks that every program, pin and destination fits the design's own
    /// mesh configuration.
    pub fn validate(&self) -> Result<(), Error> {
        let config = &self.configuration;
        config.validate()?;
        let invalid = |why: String| -> Result<(), Error> {
            log::error!("{}", why);
            Err(Error::InvalidDesign(why))
        };
        // Unicasts may also leave the mesh southwards, towards the capture.
        let reachable = |target: Position| target.row <= config.rows && target.col < config.cols;
        let mut seen = BTreeSet::new();
        for program in self.nodes.iter() {
            let position = program.position();
            if program.row >= config.rows || program.col >= config.cols {
                return invalid(format!("node {} is outside the mesh", position));
            }
            if !seen.insert(position) {
                return invalid(format!("node {} is programmed twice", position));
            }
            for input in program.inputs.iter() {
                if input.target_pin >= config.inputs {
                    return invalid(format!("node {} has no input pin {}", position, input.target_pin));
                }
            }
            for output in program.outputs.iter() {
                if output.source_pin >= config.outputs {
                    return invalid(format!("node {} has no output pin {}", position, output.source_pin));
                }
                if output.broadcast {
                    continue;
                }
                if let Some(target) = output.target_a.iter().chain(output.target_b.iter()).find(|&&t| !reachable(t)) {
                    return invalid(format!(
                        "output {} of node {} targets unreachable node {}",
                        output.source_pin, position, target
                    ));
                }
            }
        }
        for named in self.reports.outputs.iter() {
            if !self.configuration_contains(named.pin.position()) {
                return invalid(format!("reported output {} is not a mesh pin", named.name));
            }
        }
        Ok(())
    }

    /// The load stream: for every node, its instructions in slot order, then
    /// its input wiring, then its output wiring.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        for program in self.nodes.iter() {
            let target = program.position();
            messages.extend(program.instructions.iter().enumerate().map(|(slot, &word)| {
                Message::unicast(target, Payload::LoadInstruction { slot, word })
            }));
            messages.extend(program.inputs.iter().map(|input| {
                Message::unicast(
                    target,
                    Payload::ConfigureInput {
                        source: input.source(),
                        target_pin: input.target_pin,
                        stateful: input.stateful,
                    },
                )
            }));
            messages.extend(program.outputs.iter().map(|output| {
                Message::unicast(
                    target,
                    Payload::ConfigureOutput {
                        pin: output.source_pin,
                        route: output.route(),
                    },
                )
            }));
        }
        messages
    }

    /// Input pins fed from outside the mesh, and the nodes consuming each.
    pub fn external_inputs(&self) -> Vec<(PinAddress, Position)> {
        self.nodes
            .iter()
            .flat_map(|program| {
                program
                    .inputs
                    .iter()
                    .map(move |input| (input.source(), program.position()))
            })
            .filter(|(source, _)| !self.configuration_contains(source.position()))
            .collect()
    }

    fn configuration_contains(&self, position: Position) -> bool {
        position.row < self.configuration.rows && position.col < self.configuration.cols
    }
}
