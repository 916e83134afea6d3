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

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{Error, InstructionFormat, Time};

/// Default depth of the pipes between neighbouring nodes.
const LINK_DEPTH: usize = 4;

/// Default number of time units it takes to cross a pipe.
const LINK_DELAY: Time = 1;

/// Default number of time units without progress before the run is
/// declared stuck.
const STALL_LIMIT: Time = 100_000;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PipeConfiguration {
    /// Number of messages the pipe holds before producers have to wait.
    pub depth: usize,
    /// Time units between a message being accepted and it becoming visible.
    pub delay: Time,
}

impl Default for PipeConfiguration {
    fn default() -> Self {
        Self {
            depth: LINK_DEPTH,
            delay: LINK_DELAY,
        }
    }
}

/// provides the parameters of a mesh
///
/// constructed programmatically or read from a config file. Every node in
/// the mesh has the same pin and register counts.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MeshConfiguration {
    pub rows: usize,
    pub cols: usize,
    pub inputs: usize,
    pub outputs: usize,
    pub registers: usize,
    /// Pipes between neighbouring nodes.
    pub link: PipeConfiguration,
    /// Each node's loopback pipe, carrying its own emissions.
    pub internal: PipeConfiguration,
    /// Pipes attached at the edge of the mesh (manager ingress, capture).
    pub boundary: PipeConfiguration,
    /// Time units each instruction takes.
    pub instruction_cost: Time,
    /// Quiet time units required after an interrupt before execution restarts.
    pub settle_delay: Time,
    /// Time units without a tick, an accepted load message or a node getting
    /// further into its pass, after which a run is aborted.
    pub stall_limit: Time,
    /// Overrides the instruction layout derived from the pin/register counts.
    pub instruction_format: Option<InstructionFormat>,
}

impl Default for MeshConfiguration {
    fn default() -> Self {
        Self {
            rows: 1,
            cols: 1,
            inputs: 8,
            outputs: 8,
            registers: 16,
            link: PipeConfiguration::default(),
            internal: PipeConfiguration::default(),
            boundary: PipeConfiguration::default(),
            instruction_cost: 1,
            settle_delay: 1,
            stall_limit: STALL_LIMIT,
            instruction_format: None,
        }
    }
}

impl MeshConfiguration {
    pub fn new(rows: usize, cols: usize, inputs: usize, outputs: usize, registers: usize) -> Self {
        Self {
            rows,
            cols,
            inputs,
            outputs,
            registers,
            ..Default::default()
        }
    }

    pub fn format(&self) -> InstructionFormat {
        self.instruction_format
            .unwrap_or_else(|| InstructionFormat::for_node(self.inputs, self.registers))
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |why: String| -> Result<(), Error> {
            log::error!("{}", why);
            Err(Error::InvalidConfiguration(why))
        };
        if self.rows == 0 || self.cols == 0 {
            return invalid(format!("empty mesh {}x{}", self.rows, self.cols));
        }
        if self.registers == 0 {
            return invalid("nodes need at least one register".to_string());
        }
        for (name, pipe) in [
            ("link", &self.link),
            ("internal", &self.internal),
            ("boundary", &self.boundary),
        ] {
            if pipe.depth == 0 || pipe.delay == 0 {
                return invalid(format!(
                    "{} pipes need a non-zero depth and delay, got {:?}",
                    name, pipe
                ));
            }
        }
        if self.instruction_cost == 0 || self.settle_delay == 0 {
            return invalid("instruction cost and settle delay must be non-zero".to_string());
        }
        let format = self.format();
        if format.width() > u64::BITS as usize {
            return invalid(format!(
                "instruction format {:?} is {} bits wide",
                format,
                format.width()
            ));
        }
        let needed = InstructionFormat::for_node(self.inputs, self.registers);
        if format.operand_bits < needed.operand_bits || format.register_bits < needed.register_bits
        {
            return invalid(format!(
                "instruction format {:?} cannot address {} inputs and {} registers",
                format, self.inputs, self.registers
            ));
        }
        Ok(())
    }

    pub fn from_file(file_name: &str) -> Result<Self, Error> {
        let file = File::open(Path::new(file_name)).map_err(|e| {
            Error::InvalidConfiguration(format!("File {} not found. {:?}", file_name, e))
        })?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }

    pub fn from_str(config: &str) -> Result<Self, Error> {
        serde_yaml::from_str(config).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_yaml_config() {
        let conf_str = "---
rows: 4
cols: 3
inputs: 2
outputs: 2
registers: 4
link:
  depth: 2
  delay: 3
stall_limit: 500
";
        let config = MeshConfiguration::from_str(conf_str).unwrap();
        assert_eq!(config.rows, 4);
        assert_eq!(config.cols, 3);
        assert_eq!(config.inputs, 2);
        assert_eq!(config.link, PipeConfiguration { depth: 2, delay: 3 });
        // unspecified fields fall back to the defaults
        assert_eq!(config.internal, PipeConfiguration::default());
        assert_eq!(config.settle_delay, 1);
        assert_eq!(config.stall_limit, 500);
        assert_eq!(config.format(), InstructionFormat::for_node(2, 4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn write_yaml_config() {
        let config = MeshConfiguration::new(2, 2, 4, 4, 8);
        let text = serde_yaml::to_string(&config).unwrap();
        println!("{}", text);
        assert_eq!(MeshConfiguration::from_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_bad_configurations() {
        let mut config = MeshConfiguration::new(0, 2, 4, 4, 8);
        assert!(config.validate().is_err());
        config.rows = 2;
        config.link.delay = 0;
        assert!(config.validate().is_err());
        config.link.delay = 1;
        config.instruction_format = Some(InstructionFormat {
            operand_bits: 1,
            register_bits: 3,
        });
        assert!(config.validate().is_err());
        config.instruction_format = None;
        assert!(config.validate().is_ok());
    }
}
