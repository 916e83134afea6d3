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

use std::fs;
use std::io;
use std::path::Path;

use crate::{PinAddress, Reports, Waveform};

const DEFAULT_VCD_HEADER: &str = "meshsim VCD";
pub const DEFAULT_TOP_MODULE: &str = "mesh";

/// Writes captured waveforms as value change dumps, one timestamp per tick.
pub struct VcdWriter<W: io::Write> {
    writer: vcd::Writer<W>,
}

impl VcdWriter<fs::File> {
    pub fn create(dst: &Path) -> io::Result<Self> {
        let dst_file = fs::File::create(dst)?;
        log::debug!("VCD file: {}", dst.display());
        Ok(Self::new(dst_file))
    }
}

impl<W: io::Write> VcdWriter<W> {
    pub fn new(dst: W) -> Self {
        Self {
            writer: vcd::Writer::new(dst),
        }
    }

    /// Writes the header and every sample of `waveform`. Signals are named
    /// after `reports` where the design names them.
    pub fn write_waveform(&mut self, waveform: &Waveform, reports: &Reports) -> io::Result<()> {
        self.writer.comment(DEFAULT_VCD_HEADER)?;
        self.writer.date(chrono::Utc::now().to_string().as_str())?;
        self.writer.add_module(DEFAULT_TOP_MODULE)?;
        let mut vars = Vec::new();
        for (source, _) in waveform.signals() {
            let id_code = self
                .writer
                .add_var(vcd::VarType::Wire, 1, &signal_name(*source, reports), None)?;
            vars.push((*source, id_code));
        }
        self.writer.upscope()?;
        self.writer.enddefinitions()?;

        for tick in 0..waveform.ticks() {
            self.writer.timestamp(tick as u64)?;
            for (source, id_code) in vars.iter() {
                let value = waveform.value(*source, tick);
                if tick > 0 && value == waveform.value(*source, tick - 1) {
                    continue;
                }
                self.writer.change_scalar(*id_code, to_vcd_value(value))?;
            }
        }
        Ok(())
    }
}

/// The report name of `source`, or one built from its address.
pub fn signal_name(source: PinAddress, reports: &Reports) -> String {
    match reports.name_of(source) {
        Some(name) => name.to_string(),
        None => format!("r{}_c{}_p{}", source.row, source.col, source.pin),
    }
}

fn to_vcd_value(value: Option<bool>) -> vcd::Value {
    match value {
        Some(true) => vcd::Value::V1,
        Some(false) => vcd::Value::V0,
        None => vcd::Value::X,
    }
}
