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

//! Decoding of the fixed-width instruction words the compiler emits.
//!
//! The real bit layout belongs to the hardware's encoding library; the
//! simulator only depends on the decoded tuple. `InstructionFormat`
//! describes a packed, LSB-first layout whose field widths follow from the
//! node's pin and register counts:
//!
//!```text
//!  | produces_output | target | is_input_b | source_b | is_input_a | source_a | opcode |
//!  MSB                                                                     LSB (bit 0)
//!```

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    Invert,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
}

impl Operation {
    const ALL: [Operation; 7] = [
        Operation::Invert,
        Operation::And,
        Operation::Nand,
        Operation::Or,
        Operation::Nor,
        Operation::Xor,
        Operation::Xnor,
    ];

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::ALL.get(opcode as usize).copied()
    }

    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// `Invert` ignores `b`.
    pub fn evaluate(self, a: bool, b: bool) -> bool {
        match self {
            Self::Invert => !a,
            Self::And => a & b,
            Self::Nand => !(a & b),
            Self::Or => a | b,
            Self::Nor => !(a | b),
            Self::Xor => a ^ b,
            Self::Xnor => !(a ^ b),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub operation: Operation,
    pub source_a: usize,
    pub is_input_a: bool,
    pub source_b: usize,
    pub is_input_b: bool,
    pub target_register: usize,
    pub produces_output: bool,
}

impl Instruction {
    /// Whether every operand and the target fit a node with the given counts.
    pub fn fits(&self, inputs: usize, registers: usize) -> bool {
        let operand_fits = |index: usize, is_input: bool| {
            if is_input {
                index < inputs
            } else {
                index < registers
            }
        };
        operand_fits(self.source_a, self.is_input_a)
            && (self.operation == Operation::Invert
                || operand_fits(self.source_b, self.is_input_b))
            && self.target_register < registers
    }
}

/// Number of bits needed to index `count` things; never less than one.
fn index_bits(count: usize) -> usize {
    let max_index = count.saturating_sub(1);
    ((usize::BITS - max_index.leading_zeros()) as usize).max(1)
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstructionFormat {
    /// Width of each source operand field.
    pub operand_bits: usize,
    /// Width of the target register field.
    pub register_bits: usize,
}

impl InstructionFormat {
    pub const OPCODE_BITS: usize = 3;

    pub fn for_node(inputs: usize, registers: usize) -> Self {
        Self {
            operand_bits: index_bits(inputs.max(registers)),
            register_bits: index_bits(registers),
        }
    }

    /// Total number of bits in an instruction word.
    pub fn width(&self) -> usize {
        Self::OPCODE_BITS + 2 * (self.operand_bits + 1) + self.register_bits + 1
    }

    // opcode, source_a, is_input_a, source_b, is_input_b, target, produces_output
    fn fields(&self) -> [Range<usize>; 7] {
        let widths = [
            Self::OPCODE_BITS,
            self.operand_bits,
            1,
            self.operand_bits,
            1,
            self.register_bits,
            1,
        ];
        let mut start = 0;
        widths.map(|width| {
            let field = start..start + width;
            start += width;
            field
        })
    }

    /// Returns `None` for an unknown opcode or when bits above the format's
    /// width are set.
    pub fn decode(&self, word: u64) -> Option<Instruction> {
        let width = self.width();
        if width < u64::BITS as usize && word >> width != 0 {
            return None;
        }
        let [opcode, source_a, is_input_a, source_b, is_input_b, target, produces_output] =
            self.fields();
        let bits = word.view_bits::<Lsb0>();
        Some(Instruction {
            operation: Operation::from_opcode(bits[opcode].load_le::<u8>())?,
            source_a: bits[source_a].load_le::<usize>(),
            is_input_a: bits[is_input_a.start],
            source_b: bits[source_b].load_le::<usize>(),
            is_input_b: bits[is_input_b.start],
            target_register: bits[target].load_le::<usize>(),
            produces_output: bits[produces_output.start],
        })
    }

    pub fn encode(&self, instruction: &Instruction) -> u64 {
        debug_assert!(instruction.source_a >> self.operand_bits == 0);
        debug_assert!(instruction.source_b >> self.operand_bits == 0);
        debug_assert!(instruction.target_register >> self.register_bits == 0);
        let [opcode, source_a, is_input_a, source_b, is_input_b, target, produces_output] =
            self.fields();
        let mut word = 0u64;
        let bits = word.view_bits_mut::<Lsb0>();
        bits[opcode].store_le(instruction.operation.opcode());
        bits[source_a].store_le(instruction.source_a);
        bits.set(is_input_a.start, instruction.is_input_a);
        bits[source_b].store_le(instruction.source_b);
        bits.set(is_input_b.start, instruction.is_input_b);
        bits[target].store_le(instruction.target_register);
        bits.set(produces_output.start, instruction.produces_output);
        word
    }
}
