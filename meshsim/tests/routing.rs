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

mod common;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::collections::HashMap;

use meshsim::{Design, Error, Manager, MeshConfiguration, Message, Operation, Payload, PinAddress, Position};

use common::*;

const ROWS: usize = 4;
const COLS: usize = 5;

/// Nodes a unicast entering at (0,0) visits on its way to `target`.
fn row_first_path(target: Position) -> Vec<Position> {
    let down = (0..=target.row).map(|row| Position::new(row, 0));
    let across = (1..=target.col).map(|col| Position::new(target.row, col));
    down.chain(across).collect()
}

#[test]
fn unicasts_arrive_exactly_once_along_rows_first() -> Result<(), Error> {
    init_logging();
    let mut rng = Xoshiro256StarStar::seed_from_u64(0x5eed);
    let mut manager = Manager::new(&MeshConfiguration::new(ROWS, COLS, 4, 2, 2))?;
    let mut expected: HashMap<Position, u64> = HashMap::new();
    let mut delivered: HashMap<Position, usize> = HashMap::new();
    for index in 0..200 {
        let target = Position::new(rng.gen_range(0..ROWS), rng.gen_range(0..COLS));
        let target_pin = rng.gen_range(0..4);
        manager.send(Message::unicast(
            target,
            Payload::ConfigureInput {
                source: PinAddress::new(100, index, 0),
                target_pin,
                stateful: true,
            },
        ));
        for hop in row_first_path(target) {
            *expected.entry(hop).or_default() += 1;
        }
        *delivered.entry(target).or_default() += 1;
    }
    manager.run_ticks(1)?;

    for node in manager.mesh().nodes() {
        let position = node.position();
        assert_eq!(
            node.stats().messages,
            expected.get(&position).copied().unwrap_or(0),
            "messages through {}",
            position
        );
        let configured = (0..4).filter(|&pin| node.input_route(pin).is_some()).count();
        assert_eq!(configured > 0, delivered.contains_key(&position), "{}", position);
    }
    Ok(())
}

#[test]
fn next_hop_reduces_row_distance_first() -> Result<(), Error> {
    let manager = Manager::new(&MeshConfiguration::new(ROWS, COLS, 2, 2, 2))?;
    let mut rng = Xoshiro256StarStar::seed_from_u64(7);
    let mesh = manager.mesh();
    for _ in 0..100 {
        let from = Position::new(rng.gen_range(0..ROWS), rng.gen_range(0..COLS));
        let to = Position::new(rng.gen_range(0..ROWS), rng.gen_range(0..COLS));
        let mut here = from;
        let mut hops = 0;
        while let Some(direction) = mesh.node(here).unwrap().next_hop(to) {
            let next = mesh.neighbour(here, direction).unwrap();
            if here.row != to.row {
                assert_eq!(next.col, here.col, "{} -> {}", from, to);
                assert!(next.row.abs_diff(to.row) < here.row.abs_diff(to.row));
            } else {
                assert!(next.col.abs_diff(to.col) < here.col.abs_diff(to.col));
            }
            here = next;
            hops += 1;
        }
        assert_eq!(here, to);
        assert_eq!(hops, from.row.abs_diff(to.row) + from.col.abs_diff(to.col));
    }
    Ok(())
}

/// Every node of a 5x5 mesh listens to the output of the centre node, which
/// broadcasts it with the given decay.
fn centre_broadcast(decay: u32) -> Design {
    let configuration = MeshConfiguration::new(5, 5, 2, 1, 1);
    let centre = Position::new(2, 2);
    let mut design = Design {
        configuration: configuration.clone(),
        ..Default::default()
    };
    for row in 0..5 {
        for col in 0..5 {
            let mut node = program(row, col);
            node.inputs = vec![wire(PinAddress::at(centre, 0), 1, true)];
            if Position::new(row, col) == centre {
                node.instructions = vec![word(
                    &configuration,
                    Operation::Invert,
                    input(0),
                    input(0),
                    0,
                    true,
                )];
                node.outputs = vec![flood(0, decay)];
            }
            design.nodes.push(node);
        }
    }
    design
}

#[test]
fn broadcast_reaches_decay_hops() -> Result<(), Error> {
    init_logging();
    let centre = Position::new(2, 2);
    for decay in 0..4 {
        let mut manager = Manager::from_design(&centre_broadcast(decay))?;
        manager.run_ticks(2)?;
        for node in manager.mesh().nodes() {
            let position = node.position();
            let distance = position.row.abs_diff(centre.row) + position.col.abs_diff(centre.col);
            assert_eq!(
                node.inputs()[1],
                distance <= decay as usize,
                "decay {} at {}",
                decay,
                position
            );
        }
    }
    Ok(())
}

#[test]
fn spent_broadcast_from_the_ingress_stays_put() -> Result<(), Error> {
    init_logging();
    let mut manager = Manager::from_design(&centre_broadcast(1))?;
    manager.run_ticks(1)?;
    let before: Vec<u64> = manager
        .mesh()
        .nodes()
        .iter()
        .map(|node| node.stats().messages)
        .collect();
    manager.send(Message::broadcast(
        Position::new(0, 0),
        0,
        Payload::SignalState {
            source: PinAddress::new(9, 9, 9),
            value: true,
        },
    ));
    manager.run_ticks(1)?;
    let after: Vec<u64> = manager
        .mesh()
        .nodes()
        .iter()
        .map(|node| node.stats().messages)
        .collect();
    // Only (0,0) sees it; the centre's own broadcast reaches its neighbours.
    assert_eq!(after[0] - before[0], 1);
    assert_eq!(after[1], before[1]);
    assert_eq!(after[5], before[5]);
    Ok(())
}
