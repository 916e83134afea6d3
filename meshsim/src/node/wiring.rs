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

//! Pin wiring tables and output pin state.

use crate::{Message, Payload, PinAddress, Position};

/// Where an input pin takes its value from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InputRoute {
    pub source: PinAddress,
    /// Sequential inputs only change at the next tick; combinatorial ones
    /// change immediately and restart the current pass.
    pub stateful: bool,
}

/// Where changes of an output pin are sent: one broadcast, or up to two
/// unicast destinations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OutputRoute {
    pub broadcast: bool,
    pub decay: u32,
    pub target_a: Option<Position>,
    pub target_b: Option<Position>,
}

impl OutputRoute {
    pub fn broadcast(decay: u32) -> Self {
        Self {
            broadcast: true,
            decay,
            ..Default::default()
        }
    }

    pub fn unicast(target_a: Position, target_b: Option<Position>) -> Self {
        Self {
            target_a: Some(target_a),
            target_b,
            ..Default::default()
        }
    }

    /// The messages announcing that `source` now carries `value`. A second
    /// unicast to the same destination as the first is not sent.
    pub fn signals(&self, origin: Position, source: PinAddress, value: bool) -> Vec<Message> {
        let payload = Payload::SignalState { source, value };
        if self.broadcast {
            return vec![Message::broadcast(origin, self.decay, payload)];
        }
        let mut messages = Vec::with_capacity(2);
        if let Some(target) = self.target_a {
            messages.push(Message::unicast(target, payload.clone()));
        }
        if let Some(target) = self.target_b {
            if self.target_a != Some(target) {
                messages.push(Message::unicast(target, payload));
            }
        }
        messages
    }
}

/// Last value asserted on an output pin. `Unknown` until the pin is first
/// driven, and while a change is being announced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PinState {
    Low,
    High,
    Unknown,
}

impl PinState {
    pub fn value(self) -> Option<bool> {
        match self {
            Self::Low => Some(false),
            Self::High => Some(true),
            Self::Unknown => None,
        }
    }
}

impl From<bool> for PinState {
    fn from(value: bool) -> Self {
        if value {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl Default for PinState {
    fn default() -> Self {
        PinState::Unknown
    }
}
