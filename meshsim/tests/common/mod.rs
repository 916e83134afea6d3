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

//! Helpers shared by the end-to-end tests.

#![allow(dead_code)]

use meshsim::{
    Design, InputHandling, Instruction, MeshConfiguration, NamedPin, NodeProgram, Operation,
    OutputHandling, PinAddress, Position,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Operand read from an input pin.
pub fn input(index: usize) -> (usize, bool) {
    (index, true)
}

/// Operand read from a register.
pub fn register(index: usize) -> (usize, bool) {
    (index, false)
}

pub fn word(
    config: &MeshConfiguration,
    operation: Operation,
    a: (usize, bool),
    b: (usize, bool),
    target_register: usize,
    produces_output: bool,
) -> u64 {
    config.format().encode(&Instruction {
        operation,
        source_a: a.0,
        is_input_a: a.1,
        source_b: b.0,
        is_input_b: b.1,
        target_register,
        produces_output,
    })
}

pub fn wire(source: PinAddress, target_pin: usize, stateful: bool) -> InputHandling {
    InputHandling {
        source_row: source.row,
        source_col: source.col,
        source_pin: source.pin,
        target_pin,
        stateful,
    }
}

pub fn send_to(source_pin: usize, target_a: Position, target_b: Option<Position>) -> OutputHandling {
    OutputHandling {
        source_pin,
        target_a: Some(target_a),
        target_b,
        ..Default::default()
    }
}

pub fn flood(source_pin: usize, decay: u32) -> OutputHandling {
    OutputHandling {
        source_pin,
        broadcast: true,
        decay,
        ..Default::default()
    }
}

pub fn program(row: usize, col: usize) -> NodeProgram {
    NodeProgram {
        row,
        col,
        instructions: Vec::new(),
        inputs: Vec::new(),
        outputs: Vec::new(),
    }
}

pub fn named(name: &str, pin: PinAddress) -> NamedPin {
    NamedPin {
        name: name.to_string(),
        pin,
    }
}

/// A 1x1 mesh whose node inverts its own output every cycle. The output
/// goes back to the node itself and down to the capture row.
pub fn toggle() -> Design {
    let configuration = MeshConfiguration::new(1, 1, 2, 2, 2);
    let mut node = program(0, 0);
    node.instructions = vec![word(
        &configuration,
        Operation::Invert,
        input(0),
        input(0),
        0,
        true,
    )];
    node.inputs = vec![wire(PinAddress::new(0, 0, 0), 0, true)];
    node.outputs = vec![send_to(0, Position::new(0, 0), Some(Position::new(1, 0)))];
    let mut design = Design {
        configuration,
        nodes: vec![node],
        ..Default::default()
    };
    design.reports.outputs.push(named("q", PinAddress::new(0, 0, 0)));
    design
}

/// Three inverters in a row on a 1x3 mesh. The first one reads the
/// external input `a`, the others their western neighbour combinatorially;
/// the last one reports to the capture row as `y`.
pub fn inverter_chain() -> Design {
    let configuration = MeshConfiguration::new(1, 3, 2, 2, 2);
    let external = PinAddress::new(5, 0, 0);
    let mut design = Design {
        configuration: configuration.clone(),
        ..Default::default()
    };
    for col in 0..3 {
        let mut node = program(0, col);
        node.instructions = vec![word(
            &configuration,
            Operation::Invert,
            input(0),
            input(0),
            0,
            true,
        )];
        node.inputs = if col == 0 {
            vec![wire(external, 0, true)]
        } else {
            vec![wire(PinAddress::new(0, col - 1, 0), 0, false)]
        };
        let next = if col == 2 {
            Position::new(1, 2)
        } else {
            Position::new(0, col + 1)
        };
        node.outputs = vec![send_to(0, next, None)];
        design.nodes.push(node);
    }
    design.reports.inputs.push(named("a", external));
    design.reports.outputs.push(named("y", PinAddress::new(0, 2, 0)));
    design
}
