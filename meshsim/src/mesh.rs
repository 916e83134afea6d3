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

//! The R x C grid of nodes and the pipes between them.

use itertools::Itertools;

use crate::{Direction, Error, MeshConfiguration, Node, Pipe, PipeConfiguration, PipeRef, Position, Time};

#[derive(Debug)]
pub struct Mesh {
    config: MeshConfiguration,
    /// Row-major.
    nodes: Vec<Node>,
    /// Every pipe of the mesh, boundary pipes included.
    pipes: Vec<PipeRef>,
    next_pipe_id: usize,
}

impl Mesh {
    pub fn new(config: &MeshConfiguration, now: Time) -> Result<Self, Error> {
        config.validate()?;
        let mut mesh = Self {
            config: config.clone(),
            nodes: Vec::with_capacity(config.rows * config.cols),
            pipes: Vec::new(),
            next_pipe_id: 0,
        };
        for (row, col) in (0..config.rows).cartesian_product(0..config.cols) {
            let position = Position::new(row, col);
            let internal = mesh.new_pipe(&format!("{} internal", position), config.internal, now);
            mesh.nodes.push(Node::new(position, config, internal));
        }
        for (row, col) in (0..config.rows).cartesian_product(0..config.cols) {
            let here = Position::new(row, col);
            for direction in [Direction::East, Direction::South] {
                if let Some(there) = mesh.neighbour(here, direction) {
                    mesh.link(here, there, direction, now)?;
                }
            }
        }
        log::debug!(
            "built {}x{} mesh with {} pipes",
            config.rows,
            config.cols,
            mesh.pipes.len()
        );
        Ok(mesh)
    }

    pub fn config(&self) -> &MeshConfiguration {
        &self.config
    }

    pub fn rows(&self) -> usize {
        self.config.rows
    }

    pub fn cols(&self) -> usize {
        self.config.cols
    }

    pub fn contains(&self, position: Position) -> bool {
        position.row < self.config.rows && position.col < self.config.cols
    }

    pub fn node(&self, position: Position) -> Option<&Node> {
        self.index(position).map(|index| &self.nodes[index])
    }

    /// All nodes, row-major.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pipes(&self) -> &[PipeRef] {
        &self.pipes
    }

    /// The node next to `position` in `direction`, if the mesh has one.
    pub fn neighbour(&self, position: Position, direction: Direction) -> Option<Position> {
        direction
            .step(position)
            .filter(|&there| self.contains(there))
    }

    /// Connects a new boundary pipe feeding the `direction` side of the node
    /// at `position`.
    pub fn attach_inbound(&mut self, position: Position, direction: Direction, now: Time) -> Result<PipeRef, Error> {
        let index = self.boundary_index(position, direction)?;
        let pipe = self.new_pipe(&format!("{} {} in", position, direction), self.config.boundary, now);
        self.nodes[index].attach_inbound(direction, pipe.clone())?;
        Ok(pipe)
    }

    /// Connects a new boundary pipe leaving the node at `position` on its
    /// `direction` side.
    pub fn attach_outbound(&mut self, position: Position, direction: Direction, now: Time) -> Result<PipeRef, Error> {
        let index = self.boundary_index(position, direction)?;
        let pipe = self.new_pipe(&format!("{} {} out", position, direction), self.config.boundary, now);
        self.nodes[index].attach_outbound(direction, pipe.clone())?;
        Ok(pipe)
    }

    /// Steps every node once, row-major.
    pub fn step(&mut self, now: Time) -> Result<(), Error> {
        for node in self.nodes.iter_mut() {
            node.step(now)?;
        }
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.nodes.iter().all(Node::is_idle) && self.pipes.iter().all(|pipe| pipe.borrow().is_empty())
    }

    /// Sum of the nodes' progress through their current passes.
    pub fn progress(&self) -> usize {
        self.nodes.iter().map(Node::progress).sum()
    }

    pub fn tick(&mut self) -> Result<(), Error> {
        for node in self.nodes.iter_mut() {
            node.tick()?;
        }
        Ok(())
    }

    pub fn reset(&mut self, now: Time) {
        for node in self.nodes.iter_mut() {
            node.reset();
        }
        for pipe in self.pipes.iter() {
            pipe.borrow_mut().clear(now);
        }
    }

    /// Fraction of its lifetime each pipe spent with messages in flight,
    /// busiest first.
    pub fn pipe_utilization(&self, now: Time) -> Vec<(String, f64)> {
        self.pipes
            .iter()
            .map(|pipe| {
                let pipe = pipe.borrow();
                let active = pipe.active(now);
                let total = active + pipe.idle(now);
                let ratio = if total == 0 { 0.0 } else { active as f64 / total as f64 };
                (pipe.name().to_string(), ratio)
            })
            .sorted_by(|a, b| b.1.total_cmp(&a.1))
            .collect()
    }

    fn index(&self, position: Position) -> Option<usize> {
        if self.contains(position) {
            Some(position.row * self.config.cols + position.col)
        } else {
            None
        }
    }

    fn boundary_index(&self, position: Position, direction: Direction) -> Result<usize, Error> {
        match self.index(position) {
            Some(index) if self.neighbour(position, direction).is_none() => Ok(index),
            _ => Err(Error::NotOnBoundary { position, direction }),
        }
    }

    fn new_pipe(&mut self, label: &str, config: PipeConfiguration, now: Time) -> PipeRef {
        let name = format!("pipe{} {}", self.next_pipe_id, label);
        self.next_pipe_id += 1;
        let pipe = Pipe::shared(&name, &config, now);
        self.pipes.push(pipe.clone());
        pipe
    }

    /// Two independent pipes between neighbours `a` and `b`, where `b` lies
    /// in `direction` from `a`.
    fn link(&mut self, a: Position, b: Position, direction: Direction, now: Time) -> Result<(), Error> {
        let forward = self.new_pipe(&format!("{}->{}", a, b), self.config.link, now);
        let backward = self.new_pipe(&format!("{}->{}", b, a), self.config.link, now);
        let (a, b) = match (self.index(a), self.index(b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(Error::InvalidConfiguration(format!("cannot link {} and {}", a, b))),
        };
        self.nodes[a].attach_outbound(direction, forward.clone())?;
        self.nodes[b].attach_inbound(direction.opposite(), forward)?;
        self.nodes[b].attach_outbound(direction.opposite(), backward.clone())?;
        self.nodes[a].attach_inbound(direction, backward)
    }
}
