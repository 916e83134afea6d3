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

//! Records the signals leaving the mesh through its southern edge, one
//! snapshot per tick.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::{Direction, Error, Manager, Observer, Payload, PinAddress, PipeRef, Position, Time};

/// Signal changes that arrived during one cycle, frozen right before the
/// tick that ended it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    /// Ticks issued before this snapshot was taken.
    pub tick: u64,
    pub time: Time,
    /// Last value seen for each source during the cycle.
    pub changes: BTreeMap<PinAddress, bool>,
}

#[derive(Debug)]
pub struct Capture {
    pipes: Vec<PipeRef>,
    pending: BTreeMap<PinAddress, bool>,
    snapshots: Vec<Snapshot>,
    now: Time,
}

impl Capture {
    /// Attaches one pipe below every column of the last row and registers
    /// the capture with `manager`. Outputs are captured by routing them to
    /// row `rows`, just past the southern edge.
    pub fn attach(manager: &mut Manager) -> Result<Rc<RefCell<Capture>>, Error> {
        let now = manager.now();
        let mesh = manager.mesh_mut();
        let last_row = mesh.rows() - 1;
        let pipes = (0..mesh.cols())
            .map(|col| mesh.attach_outbound(Position::new(last_row, col), Direction::South, now))
            .collect::<Result<Vec<_>, _>>()?;
        let capture = Rc::new(RefCell::new(Capture {
            pipes,
            pending: BTreeMap::new(),
            snapshots: Vec::new(),
            now,
        }));
        manager.add_observer(capture.clone());
        Ok(capture)
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Changes collected since the last tick.
    pub fn pending(&self) -> &BTreeMap<PinAddress, bool> {
        &self.pending
    }

    pub fn waveform(&self) -> Waveform {
        Waveform::from_snapshots(&self.snapshots)
    }
}

impl Observer for Capture {
    fn observe(&mut self, now: Time) -> Result<(), Error> {
        self.now = now;
        for pipe in self.pipes.iter() {
            while let Some(message) = pipe.borrow_mut().pop(now) {
                match message.payload {
                    Payload::SignalState { source, value } => {
                        log::trace!("capture @{}: {} = {}", now, source, value);
                        self.pending.insert(source, value);
                    }
                    _ => {
                        log::error!("capture @{}: unexpected {:?}", now, message);
                        return Err(Error::UnexpectedMessage(message));
                    }
                }
            }
        }
        Ok(())
    }

    fn before_tick(&mut self) -> Result<(), Error> {
        let snapshot = Snapshot {
            tick: self.snapshots.len() as u64,
            time: self.now,
            changes: std::mem::take(&mut self.pending),
        };
        self.snapshots.push(snapshot);
        Ok(())
    }
}

/// One sample per tick for every captured signal; `None` until the signal
/// is first seen, then its last value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Waveform {
    ticks: usize,
    signals: BTreeMap<PinAddress, Vec<Option<bool>>>,
}

impl Waveform {
    pub fn from_snapshots(snapshots: &[Snapshot]) -> Self {
        let sources: BTreeSet<PinAddress> = snapshots
            .iter()
            .flat_map(|snapshot| snapshot.changes.keys().copied())
            .collect();
        let signals = sources
            .into_iter()
            .map(|source| {
                let mut value = None;
                let samples = snapshots
                    .iter()
                    .map(|snapshot| {
                        if let Some(&changed) = snapshot.changes.get(&source) {
                            value = Some(changed);
                        }
                        value
                    })
                    .collect();
                (source, samples)
            })
            .collect();
        Self {
            ticks: snapshots.len(),
            signals,
        }
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn signals(&self) -> impl Iterator<Item = (&PinAddress, &[Option<bool>])> {
        self.signals
            .iter()
            .map(|(source, samples)| (source, samples.as_slice()))
    }

    pub fn samples(&self, source: PinAddress) -> Option<&[Option<bool>]> {
        self.signals.get(&source).map(Vec::as_slice)
    }

    pub fn value(&self, source: PinAddress, tick: usize) -> Option<bool> {
        self.signals
            .get(&source)
            .and_then(|samples| samples.get(tick).copied())
            .flatten()
    }

    /// Earliest tick (and the first signal, in address order) at which the
    /// two waveforms disagree.
    pub fn first_divergence(&self, other: &Waveform) -> Option<(usize, PinAddress)> {
        let sources: BTreeSet<PinAddress> = self
            .signals
            .keys()
            .chain(other.signals.keys())
            .copied()
            .collect();
        (0..self.ticks.max(other.ticks)).find_map(|tick| {
            sources
                .iter()
                .find(|&&source| self.value(source, tick) != other.value(source, tick))
                .map(|&source| (tick, source))
        })
    }
}
