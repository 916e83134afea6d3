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

//! Bounded, fixed-delay, point-to-point FIFO channel between two entities.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::{Message, PipeConfiguration, Time};

/// Pipes are shared between the mesh that owns them and the entities wired
/// to either end. The simulator is single threaded, so `Rc<RefCell<>>` is
/// enough.
pub type PipeRef = Rc<RefCell<Pipe>>;

#[derive(Clone, Debug)]
struct InFlight {
    ready_at: Time,
    message: Message,
}

#[derive(Debug)]
pub struct Pipe {
    name: String,
    depth: usize,
    delay: Time,

    /// Accepted messages, oldest first. Never longer than `depth`.
    queue: VecDeque<InFlight>,

    /// Single-slot outbound stage. Holds the message of a producer that
    /// found the queue full; only occupied while the queue is full.
    staged: Option<Message>,

    pushed: u64,
    popped: u64,

    created_at: Time,
    /// Accumulated time with messages in flight, up to `busy_since`.
    active: Time,
    busy_since: Option<Time>,
}

impl Pipe {
    pub fn new(name: &str, config: &PipeConfiguration, now: Time) -> Self {
        assert!(config.depth > 0, "Pipe {} needs a non-zero depth.", name);
        Self {
            name: name.to_string(),
            depth: config.depth,
            delay: config.delay,
            queue: VecDeque::with_capacity(config.depth),
            staged: None,
            pushed: 0,
            popped: 0,
            created_at: now,
            active: 0,
            busy_since: None,
        }
    }

    pub fn shared(name: &str, config: &PipeConfiguration, now: Time) -> PipeRef {
        Rc::new(RefCell::new(Self::new(name, config, now)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn delay(&self) -> Time {
        self.delay
    }

    /// Offer a message. It becomes visible to `pop` `delay` time units after
    /// the queue accepts it. A full queue parks the message in the outbound
    /// stage; if the stage is taken too, the message is handed back and the
    /// producer has to retry later.
    pub fn push(&mut self, now: Time, message: Message) -> Result<(), Message> {
        if self.staged.is_some() {
            return Err(message);
        }
        self.account(now);
        if self.queue.len() < self.depth {
            self.accept(now, message);
        } else {
            if cfg!(feature = "trace-pipe-contents") {
                log::trace!("{} full, staging {:?}", self.name, message);
            }
            self.staged = Some(message);
        }
        self.pushed += 1;
        self.update_busy(now);
        Ok(())
    }

    fn accept(&mut self, now: Time, message: Message) {
        debug_assert!(self.queue.len() < self.depth);
        if cfg!(feature = "trace-pipe-contents") {
            log::trace!("{} @{} accepted {:?}", self.name, now, message);
        }
        self.queue.push_back(InFlight {
            ready_at: now + self.delay,
            message,
        });
    }

    /// Whether `pop` would return a message at time `now`.
    pub fn has_ready(&self, now: Time) -> bool {
        self.queue
            .front()
            .map_or(false, |in_flight| in_flight.ready_at <= now)
    }

    /// Removes the oldest message, if its delay has elapsed.
    pub fn pop(&mut self, now: Time) -> Option<Message> {
        if !self.has_ready(now) {
            return None;
        }
        self.account(now);
        let in_flight = self.queue.pop_front()?;
        self.popped += 1;
        if let Some(staged) = self.staged.take() {
            self.accept(now, staged);
        }
        self.update_busy(now);
        if cfg!(feature = "trace-pipe-contents") {
            log::trace!("{} @{} delivered {:?}", self.name, now, in_flight.message);
        }
        Some(in_flight.message)
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len() + usize::from(self.staged.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight() == 0
    }

    /// Whether a producer would have to wait.
    pub fn is_full(&self) -> bool {
        self.staged.is_some()
    }

    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    pub fn popped(&self) -> u64 {
        self.popped
    }

    /// Time spent with at least one message in flight.
    pub fn active(&self, now: Time) -> Time {
        self.active + self.busy_since.map_or(0, |since| now - since)
    }

    /// Time spent empty.
    pub fn idle(&self, now: Time) -> Time {
        now - self.created_at - self.active(now)
    }

    /// Drops everything in flight.
    pub fn clear(&mut self, now: Time) {
        self.account(now);
        if !self.is_empty() {
            log::debug!("{} dropping {} messages", self.name, self.in_flight());
        }
        self.queue.clear();
        self.staged = None;
        self.update_busy(now);
    }

    fn account(&mut self, now: Time) {
        if let Some(since) = self.busy_since {
            self.active += now - since;
            self.busy_since = Some(now);
        }
    }

    fn update_busy(&mut self, now: Time) {
        self.busy_since = match (self.is_empty(), self.busy_since) {
            (true, _) => None,
            (false, None) => Some(now),
            (false, since) => since,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Payload, PinAddress, Position};

    fn config(depth: usize, delay: Time) -> PipeConfiguration {
        PipeConfiguration { depth, delay }
    }

    fn message(n: usize) -> Message {
        Message::unicast(
            Position::new(0, 0),
            Payload::SignalState {
                source: PinAddress::new(n, 0, 0),
                value: true,
            },
        )
    }

    fn source_row(message: &Message) -> usize {
        match message.payload {
            Payload::SignalState { source, .. } => source.row,
            _ => panic!("unexpected payload"),
        }
    }

    #[test]
    fn fifo_with_delay() {
        let mut pipe = Pipe::new("p", &config(8, 3), 0);
        let pushes: [(Time, usize); 4] = [(0, 0), (0, 1), (2, 2), (7, 3)];
        let mut next = 0;
        let mut popped = vec![];
        for now in 0..20 {
            while next < pushes.len() && pushes[next].0 == now {
                pipe.push(now, message(pushes[next].1)).unwrap();
                next += 1;
            }
            if let Some(m) = pipe.pop(now) {
                popped.push((now, source_row(&m)));
            }
        }
        // one pop per time unit, never before push + delay.
        assert_eq!(popped, vec![(3, 0), (4, 1), (5, 2), (10, 3)]);
        assert_eq!(pipe.pushed(), 4);
        assert_eq!(pipe.popped(), 4);
        assert!(pipe.is_empty());
    }

    #[test]
    fn back_pressure_stages_then_refuses() {
        let mut pipe = Pipe::new("p", &config(2, 1), 0);
        assert!(pipe.push(0, message(0)).is_ok());
        assert!(pipe.push(0, message(1)).is_ok());
        assert!(!pipe.is_full());
        // queue full: parked in the stage
        assert!(pipe.push(0, message(2)).is_ok());
        assert!(pipe.is_full());
        // stage taken: handed back
        let refused = pipe.push(0, message(3)).unwrap_err();
        assert_eq!(source_row(&refused), 3);
        assert_eq!(pipe.in_flight(), 3);
        assert_eq!(pipe.pushed(), 3);
    }

    #[test]
    fn staged_delay_counts_from_pop() {
        let mut pipe = Pipe::new("p", &config(1, 4), 0);
        pipe.push(0, message(0)).unwrap();
        pipe.push(1, message(1)).unwrap();
        assert_eq!(pipe.pop(3), None);
        assert_eq!(source_row(&pipe.pop(4).unwrap()), 0);
        // accepted at 4, so ready at 8 rather than 5
        assert_eq!(pipe.pop(7), None);
        assert_eq!(source_row(&pipe.pop(8).unwrap()), 1);
    }

    #[test]
    fn idle_plus_active_is_elapsed() {
        let mut pipe = Pipe::new("p", &config(4, 2), 5);
        pipe.push(6, message(0)).unwrap();
        pipe.push(7, message(1)).unwrap();
        assert_eq!(pipe.active(7), 1);
        pipe.pop(8).unwrap();
        pipe.pop(9).unwrap();
        for now in 9..15 {
            assert_eq!(pipe.active(now) + pipe.idle(now), now - 5);
        }
        assert_eq!(pipe.active(14), 3);
        assert_eq!(pipe.idle(14), 6);
    }

    #[test]
    fn clear_drops_everything() {
        let mut pipe = Pipe::new("p", &config(1, 1), 0);
        pipe.push(0, message(0)).unwrap();
        pipe.push(0, message(1)).unwrap();
        pipe.clear(1);
        assert!(pipe.is_empty());
        assert!(!pipe.has_ready(10));
        assert!(pipe.push(2, message(2)).is_ok());
    }
}
