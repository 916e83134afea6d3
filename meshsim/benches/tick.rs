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

use bencher::Bencher;
use bencher::{benchmark_group, benchmark_main};

use meshsim::*;

const ROWS: usize = 4;
const COLS: usize = 4;

/// Every node inverts its own output each cycle and passes it on to its
/// eastern neighbour (or the capture row at the end of a row), which listens
/// combinatorially.
fn toggle_mesh() -> Design {
    let configuration = MeshConfiguration::new(ROWS, COLS, 2, 2, 2);
    let format = configuration.format();
    let invert = format.encode(&Instruction {
        operation: Operation::Invert,
        source_a: 0,
        is_input_a: true,
        source_b: 0,
        is_input_b: true,
        target_register: 0,
        produces_output: true,
    });
    let xor = format.encode(&Instruction {
        operation: Operation::Xor,
        source_a: 0,
        is_input_a: false,
        source_b: 1,
        is_input_b: true,
        target_register: 1,
        produces_output: true,
    });
    let mut design = Design {
        configuration,
        ..Default::default()
    };
    for row in 0..ROWS {
        for col in 0..COLS {
            let here = Position::new(row, col);
            let next = if col + 1 < COLS {
                Position::new(row, col + 1)
            } else {
                Position::new(ROWS, col)
            };
            let mut inputs = vec![InputHandling {
                source_row: row,
                source_col: col,
                source_pin: 0,
                target_pin: 0,
                stateful: true,
            }];
            if col > 0 {
                inputs.push(InputHandling {
                    source_row: row,
                    source_col: col - 1,
                    source_pin: 1,
                    target_pin: 1,
                    stateful: false,
                });
            }
            design.nodes.push(NodeProgram {
                row,
                col,
                instructions: vec![invert, xor],
                inputs,
                outputs: vec![
                    OutputHandling {
                        source_pin: 0,
                        target_a: Some(here),
                        ..Default::default()
                    },
                    OutputHandling {
                        source_pin: 1,
                        target_a: Some(next),
                        ..Default::default()
                    },
                ],
            });
        }
    }
    design
}

fn ticks(bench: &mut Bencher) {
    let design = toggle_mesh();
    let cycles = 100;
    bench.iter(|| {
        let mut manager = Manager::from_design(&design).expect("Failed to load design");
        let capture = Capture::attach(&mut manager).expect("Failed to attach capture");
        manager.run_ticks(cycles).expect("Failed simulation");
        let ticks = capture.borrow().snapshots().len();
        ticks
    });
}

fn load(bench: &mut Bencher) {
    let design = toggle_mesh();
    bench.iter(|| {
        let mut manager = Manager::from_design(&design).expect("Failed to load design");
        manager.run_ticks(1).expect("Failed simulation");
        manager.now()
    });
    bench.bytes = design.messages().len() as u64;
}

benchmark_group!(benches, ticks, load);
benchmark_main!(benches);
