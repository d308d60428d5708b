// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::thread;
use std::time::{Duration, Instant};

use node_value::NodeValue;
use sequence_program::{SequenceProgram, SequenceSettings, Waveform};
use toolkit_common::SequenceType;

use crate::config::AwgTiming;
use crate::connection::DeviceConnection;
use crate::{Error, Result};

const COMPILER_BUSY: i64 = -1;
const COMPILER_OK: i64 = 0;
const COMPILER_ERROR: i64 = 1;
const COMPILER_WARNING: i64 = 2;
const ELF_UPLOADED: i64 = 0;
const ELF_IN_PROGRESS: i64 = 2;

/// One AWG core of an instrument: its sequence program, the waveform queue
/// and the compile, upload and run cycle.
pub struct AwgCore {
    device: DeviceConnection,
    index: usize,
    program: SequenceProgram,
    waveforms: Vec<Waveform>,
    timing: AwgTiming,
}

impl AwgCore {
    pub(crate) fn new(device: &DeviceConnection, index: usize, timing: AwgTiming) -> Self {
        AwgCore {
            device: device.clone(),
            index,
            program: SequenceProgram::for_target(device.kind()),
            waveforms: vec![],
            timing,
        }
    }

    /// `<instrument>-<index>`
    pub fn name(&self) -> String {
        format!("{}-{}", self.device.name(), self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn device(&self) -> &DeviceConnection {
        &self.device
    }

    pub fn program(&self) -> &SequenceProgram {
        &self.program
    }

    pub fn waveforms(&self) -> &[Waveform] {
        &self.waveforms
    }

    pub(crate) fn replace_program(&mut self, program: SequenceProgram) {
        self.program = program;
    }

    pub fn run(&self) -> Result<()> {
        self.device.set(&format!("awgs/{}/enable", self.index), 1)?;
        toolkit_log::debug!("Started AWG {}", self.name());
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.device.set(&format!("awgs/{}/enable", self.index), 0)?;
        toolkit_log::debug!("Stopped AWG {}", self.name());
        Ok(())
    }

    pub fn is_running(&self) -> Result<bool> {
        let enable = self.device.get(&format!("awgs/{}/enable", self.index))?;
        Ok(enable.as_i64()? != 0)
    }

    /// Block until the core stops running.
    pub fn wait_done(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        while self.is_running()? {
            if start.elapsed() > timeout {
                return Err(Error::Timeout {
                    what: format!("AWG {}", self.name()),
                    after: timeout,
                });
            }
            thread::sleep(self.timing.poll_interval);
        }
        Ok(())
    }

    /// Compile the sequence program and wait for the ELF upload.
    ///
    /// For `Simple` programs the buffer lengths and delays of the queued
    /// waveforms are taken over first.
    pub fn compile(&mut self) -> Result<()> {
        let connection = self.device.connection()?;
        if self.program.sequence_type() == SequenceType::Simple && !self.waveforms.is_empty() {
            let settings = SequenceSettings::new()
                .buffer_lengths(
                    self.waveforms
                        .iter()
                        .map(|w| w.buffer_length() as u64)
                        .collect::<Vec<_>>(),
                )
                .delay_times(self.waveforms.iter().map(Waveform::delay).collect::<Vec<_>>());
            self.program.set_params(&settings)?;
        }
        let source = self.program.seqc()?;
        let serial = self.device.serial();
        connection.awg_set(
            serial,
            self.index,
            "compiler/sourcestring",
            NodeValue::String(source),
        )?;

        let start = Instant::now();
        let status = loop {
            let status = connection.awg_get_int(serial, self.index, "compiler/status")?;
            toolkit_log::diagnostic!("{}: compiler status {}", self.name(), status);
            if status != COMPILER_BUSY {
                break status;
            }
            if start.elapsed() > self.timing.compile_timeout {
                return Err(Error::Timeout {
                    what: format!("Compilation on {}", self.name()),
                    after: self.timing.compile_timeout,
                });
            }
            thread::sleep(self.timing.poll_interval);
        };
        match status {
            COMPILER_OK => toolkit_log::info!("{}: Compilation successful", self.name()),
            COMPILER_WARNING => {
                let message =
                    connection.awg_get_string(serial, self.index, "compiler/statusstring")?;
                toolkit_log::warn!("{}: Compiled with warning:\n{}", self.name(), message);
            }
            COMPILER_ERROR => {
                let status_string =
                    connection.awg_get_string(serial, self.index, "compiler/statusstring")?;
                return Err(Error::Compiler { status_string });
            }
            other => {
                return Err(anyhow::anyhow!("Unknown compiler status {other}").into());
            }
        }
        self.wait_upload_done()
    }

    fn wait_upload_done(&self) -> Result<()> {
        let connection = self.device.connection()?;
        let serial = self.device.serial();
        let start = Instant::now();
        let status = loop {
            let status = connection.awg_get_int(serial, self.index, "/elf/status")?;
            if status != ELF_IN_PROGRESS {
                break status;
            }
            if start.elapsed() >= self.timing.upload_timeout {
                return Err(Error::Timeout {
                    what: "Program upload".to_string(),
                    after: self.timing.upload_timeout,
                });
            }
            thread::sleep(self.timing.poll_interval);
        };
        if status != ELF_UPLOADED {
            return Err(Error::Upload(status));
        }
        toolkit_log::info!("{}: Sequencer status: ELF file uploaded", self.name());
        Ok(())
    }

    pub fn reset_queue(&mut self) {
        self.waveforms.clear();
    }

    pub fn queue_waveform(&mut self, wave1: Vec<f64>, wave2: Vec<f64>, delay: f64) -> Result<()> {
        if self.program.sequence_type() != SequenceType::Simple {
            return Err(Error::NotSimpleSequence);
        }
        self.waveforms.push(Waveform::new(wave1, wave2, delay));
        toolkit_log::info!("Current length of queue: {}", self.waveforms.len());
        Ok(())
    }

    /// Replace the data of a queued waveform without changing its buffer
    /// length.
    pub fn replace_waveform(
        &mut self,
        index: usize,
        wave1: Vec<f64>,
        wave2: Vec<f64>,
        delay: f64,
    ) -> Result<()> {
        let len = self.waveforms.len();
        let waveform = self
            .waveforms
            .get_mut(index)
            .ok_or(Error::WaveformIndex { index, len })?;
        waveform.replace_data(wave1, wave2, delay)?;
        Ok(())
    }

    /// Write the queued waveforms to `awgs/<index>/waveform/waves/<n>`.
    pub fn upload_waveforms(&self) -> Result<()> {
        let start = Instant::now();
        self.device.set_batch(self.waveforms.iter().enumerate().map(|(n, waveform)| {
            (
                format!("awgs/{}/waveform/waves/{n}", self.index),
                NodeValue::from(waveform.data().to_vec()),
            )
        }))?;
        toolkit_log::info!(
            "Upload of {} waveforms took {:.5} s",
            self.waveforms.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

/// Device-specific AWG core.
///
/// Implementors provide access to their [`AwgCore`] and the device settings
/// that go along with a sequence parameter update.
pub trait Awg {
    fn core(&self) -> &AwgCore;

    fn core_mut(&mut self) -> &mut AwgCore;

    /// Apply device settings that follow from a parameter update. Called
    /// after the program accepted `settings`, before the updated program
    /// replaces the current one.
    fn apply_sequence_settings(&mut self, settings: &SequenceSettings) -> Result<()>;

    fn name(&self) -> String {
        self.core().name()
    }

    fn sequence_type(&self) -> SequenceType {
        self.core().program().sequence_type()
    }

    /// Update the sequence program. Sequence types the device does not
    /// support are rejected before the program changes.
    fn set_sequence_params(&mut self, settings: &SequenceSettings) -> Result<()> {
        if let Some(sequence_type) = settings.sequence_type {
            let traits = self.core().device().kind().traits();
            if !traits.supports_sequence(sequence_type) {
                let allowed = traits
                    .supported_sequences
                    .iter()
                    .map(|t| format!("'{t}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(Error::UnsupportedSequence {
                    sequence_type: sequence_type.to_string(),
                    device: self.core().device().kind().to_string(),
                    allowed,
                });
            }
        }
        let mut program = self.core().program().clone();
        program.set_params(settings)?;
        self.apply_sequence_settings(settings)?;
        self.core_mut().replace_program(program);
        Ok(())
    }

    fn sequence_params(&self) -> (SequenceType, SequenceSettings) {
        self.core().program().list_params()
    }

    fn compile(&mut self) -> Result<()> {
        self.core_mut().compile()
    }

    fn run(&self) -> Result<()> {
        self.core().run()
    }

    fn stop(&self) -> Result<()> {
        self.core().stop()
    }

    fn is_running(&self) -> Result<bool> {
        self.core().is_running()
    }

    fn wait_done(&self, timeout: Duration) -> Result<()> {
        self.core().wait_done(timeout)
    }

    fn queue_waveform(&mut self, wave1: Vec<f64>, wave2: Vec<f64>, delay: f64) -> Result<()> {
        self.core_mut().queue_waveform(wave1, wave2, delay)
    }

    fn replace_waveform(
        &mut self,
        index: usize,
        wave1: Vec<f64>,
        wave2: Vec<f64>,
        delay: f64,
    ) -> Result<()> {
        self.core_mut().replace_waveform(index, wave1, wave2, delay)
    }

    fn reset_queue(&mut self) {
        self.core_mut().reset_queue();
    }

    fn upload_waveforms(&self) -> Result<()> {
        self.core().upload_waveforms()
    }

    fn compile_and_upload_waveforms(&mut self) -> Result<()> {
        self.compile()?;
        self.upload_waveforms()
    }
}
