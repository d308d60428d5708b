// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::f64::consts::PI;

use anyhow::anyhow;
use toolkit_common::time::time_to_samples;

use crate::seqc_statements::{SeqCStatement, SeqCVariant, format_float};
use crate::{Result, Samples};

/// Waveform buffers must be a multiple of this many samples.
pub const WAVEFORM_GRANULARITY: Samples = 16;

fn indent(s: &str, prefix: &str) -> String {
    s.lines()
        .flat_map(|line| {
            let prefix = if line.is_empty() { "" } else { prefix };
            [prefix, line, "\n"].into_iter()
        })
        .collect()
}

fn check_amplitude(amplitude: f64) -> Result<()> {
    if amplitude.abs() > 1.0 {
        return Err(anyhow!("Amplitude {amplitude} cannot be larger than 1.0!").into());
    }
    Ok(())
}

fn check_buffer_length(length: Samples) -> Result<()> {
    if length < WAVEFORM_GRANULARITY {
        return Err(anyhow!("Invalid waveform length {length}, minimum is {WAVEFORM_GRANULARITY}").into());
    }
    if length % WAVEFORM_GRANULARITY != 0 {
        return Err(anyhow!(
            "Waveform length {length} has to be a multiple of {WAVEFORM_GRANULARITY}!"
        )
        .into());
    }
    Ok(())
}

/// Sample counts of a truncated gaussian pulse (and its DRAG derivative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaussParams {
    pub length: Samples,
    pub position: Samples,
    pub width: Samples,
}

impl GaussParams {
    /// Gaussian of `width` seconds, cut off at `truncation` widths on both
    /// sides and rounded down to the waveform granularity.
    pub fn from_pulse(width: f64, truncation: f64, clock_rate: f64) -> Self {
        let length = time_to_samples(2.0 * truncation * width, clock_rate).max(0) as Samples;
        let length = length / WAVEFORM_GRANULARITY * WAVEFORM_GRANULARITY;
        GaussParams {
            length,
            position: length / 2,
            width: time_to_samples(width, clock_rate).max(0) as Samples,
        }
    }

    fn validate(&self) -> Result<()> {
        check_buffer_length(self.length)?;
        if !(self.length > self.position && self.length > self.width) {
            return Err(anyhow!(
                "Gauss length {} has to be larger than position {} and width {}!",
                self.length,
                self.position,
                self.width
            )
            .into());
        }
        if self.width == 0 {
            return Err(anyhow!("Gauss width must be positive!").into());
        }
        Ok(())
    }
}

/// One frequency component of a multiplexed readout pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadoutTone {
    pub frequency: f64,
    pub amplitude: f64,
    /// Phase of the quadrature component in degrees
    pub phase: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeqCGenerator {
    statements: Vec<SeqCStatement>,
}

impl SeqCGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_statements(&self) -> usize {
        self.statements.len()
    }

    pub fn add_comment<S: Into<String>>(&mut self, comment: S) {
        self.statements.push(SeqCStatement::Comment {
            text: comment.into(),
        });
    }

    pub fn add_blank_line(&mut self) {
        self.statements.push(SeqCStatement::BlankLine);
    }

    pub fn add_function_call_statement<S: Into<String>>(&mut self, name: S, args: Vec<SeqCVariant>) {
        self.statements.push(SeqCStatement::FunctionCall {
            name: name.into(),
            args,
        });
    }

    pub fn add_raw<S: Into<String>>(&mut self, text: S) {
        self.statements.push(SeqCStatement::Raw { text: text.into() });
    }

    /// Program banner: generator name, sequence type and generation time.
    pub fn add_header(&mut self, sequence_type: &str, timestamp: &str) {
        self.add_comment("Zurich Instruments sequencer program");
        self.add_comment(format!("sequence type:              {sequence_type}"));
        self.add_comment(format!("automatically generated:    {timestamp}"));
        self.add_blank_line();
    }

    /// `setTrigger(value << (index - 1))`
    pub fn add_set_trigger(&mut self, value: u8, index: u8) -> Result<()> {
        if value > 1 {
            return Err(anyhow!("Invalid Trigger Value {value}!").into());
        }
        if !(1..=2).contains(&index) {
            return Err(anyhow!("Invalid Trigger Index {index}!").into());
        }
        let bits = i64::from(value) << (index - 1);
        self.add_function_call_statement("setTrigger", vec![bits.into()]);
        Ok(())
    }

    /// Wait for `cycles` sequencer cycles. Nothing is emitted for zero cycles.
    pub fn add_wait(&mut self, cycles: i64) -> Result<()> {
        if cycles < 0 {
            return Err(anyhow!("Wait time cannot be negative!").into());
        }
        if cycles > 0 {
            self.add_function_call_statement("wait", vec![cycles.into()]);
        }
        Ok(())
    }

    pub fn add_wait_wave(&mut self) {
        self.add_function_call_statement("waitWave", vec![]);
    }

    pub fn add_reset_osc_phase(&mut self) {
        self.add_function_call_statement("resetOscPhase", vec![]);
    }

    /// Start the QA result logger for all integration units.
    pub fn add_start_qa(&mut self) {
        self.add_function_call_statement("startQA", vec!["QA_INT_ALL".into(), true.into()]);
    }

    /// Wait for a rising edge on a digital trigger input.
    ///
    /// Index 0 emits the single argument form used by the HDAWG.
    pub fn add_wait_dig_trigger(&mut self, index: u8) -> Result<()> {
        match index {
            0 => self.add_function_call_statement("waitDigTrigger", vec![1_i64.into()]),
            1 | 2 => self.add_function_call_statement(
                "waitDigTrigger",
                vec![i64::from(index).into(), 1_i64.into()],
            ),
            _ => return Err(anyhow!("Invalid Trigger Index {index}!").into()),
        }
        Ok(())
    }

    pub fn add_play_wave(&mut self) {
        self.add_function_call_statement("playWave", vec!["w_1".into(), "w_2".into()]);
    }

    pub fn add_play_wave_scaled(&mut self, amplitude1: f64, amplitude2: f64) -> Result<()> {
        check_amplitude(amplitude1)?;
        check_amplitude(amplitude2)?;
        self.add_function_call_statement(
            "playWave",
            vec![
                format!("{}*w_1", format_float(amplitude1)).into(),
                format!("{}*w_2", format_float(amplitude2)).into(),
            ],
        );
        Ok(())
    }

    pub fn add_play_wave_indexed(&mut self, index: usize) {
        let n = index + 1;
        self.add_function_call_statement(
            "playWave",
            vec![format!("w{n}_1").into(), format!("w{n}_2").into()],
        );
    }

    fn add_wave_declaration<S1: Into<String>, S2: Into<String>>(&mut self, wave_id: S1, expression: S2) {
        self.statements.push(SeqCStatement::WaveDeclaration {
            wave_id: wave_id.into(),
            expression: expression.into(),
        });
    }

    /// Declare the placeholder buffers `w{index+1}_1` and `w{index+1}_2` that
    /// are later overwritten by uploaded waveform data.
    pub fn add_random_buffers(&mut self, length: Samples, index: usize) -> Result<()> {
        check_buffer_length(length)?;
        let n = index + 1;
        self.add_wave_declaration(format!("w{n}_1"), format!("randomUniform({length})"));
        self.add_wave_declaration(format!("w{n}_2"), format!("randomUniform({length})"));
        Ok(())
    }

    /// Declare `w_1` as gaussian and `w_2` as its DRAG derivative, optionally
    /// scaled by `amplitude`.
    pub fn add_gauss_declaration(&mut self, params: GaussParams, amplitude: Option<f64>) -> Result<()> {
        params.validate()?;
        let GaussParams {
            length,
            position,
            width,
        } = params;
        let scale = match amplitude {
            Some(amplitude) => {
                check_amplitude(amplitude)?;
                format!("{} * ", format_float(amplitude))
            }
            None => String::new(),
        };
        self.add_wave_declaration("w_1", format!("{scale}gauss({length}, {position}, {width})"));
        self.add_wave_declaration("w_2", format!("{scale}drag({length}, {position}, {width})"));
        Ok(())
    }

    /// Declare a constant pulse of `length` samples on both channels.
    pub fn add_ones_declaration(&mut self, amplitude: f64, length: Samples) -> Result<()> {
        check_amplitude(amplitude)?;
        check_buffer_length(length)?;
        let amplitude = format_float(amplitude);
        self.add_wave_declaration("w_1", format!("{amplitude} * ones({length})"));
        self.add_wave_declaration("w_2", format!("{amplitude} * ones({length})"));
        Ok(())
    }

    /// Declare a frequency multiplexed readout pulse of `length` samples.
    ///
    /// Every tone contributes a sine to `w_1` and a phase shifted cosine to
    /// `w_2`. The tone amplitudes are divided by the number of tones so the
    /// sum stays within full scale.
    pub fn add_readout_pulse_declaration(
        &mut self,
        length: Samples,
        tones: &[ReadoutTone],
        clock_rate: f64,
    ) -> Result<()> {
        if tones.is_empty() {
            return Err(anyhow!("Invalid number of frequencies!").into());
        }
        check_buffer_length(length)?;
        let n = tones.len() as f64;
        let mut in_phase = Vec::with_capacity(tones.len());
        let mut quadrature = Vec::with_capacity(tones.len());
        for (i, tone) in tones.iter().enumerate() {
            check_amplitude(tone.amplitude)?;
            if tone.frequency <= 0.0 {
                return Err(anyhow!("Readout frequency {} must be positive!", tone.frequency).into());
            }
            let periods = format_float(length as f64 * tone.frequency / clock_rate);
            let amplitude = format_float(tone.amplitude / n);
            let phase = format_float(tone.phase * PI / 180.0);
            let (id_i, id_q) = (format!("w{}_I", i + 1), format!("w{}_Q", i + 1));
            self.add_wave_declaration(
                id_i.clone(),
                format!("sine({length}, {amplitude}, 0, {periods})"),
            );
            self.add_wave_declaration(
                id_q.clone(),
                format!("cosine({length}, {amplitude}, {phase}, {periods})"),
            );
            in_phase.push(id_i);
            quadrature.push(id_q);
        }
        let sum = |ids: Vec<String>| {
            if ids.len() == 1 {
                ids.join("")
            } else {
                format!("add({})", ids.join(", "))
            }
        };
        self.add_wave_declaration("w_1", sum(in_phase));
        self.add_wave_declaration("w_2", sum(quadrature));
        Ok(())
    }

    pub fn add_repeat(&mut self, num_repeats: u64, body: SeqCGenerator) {
        let complexity = body.estimate_complexity() + 2; // penalty for loop overhead
        self.statements.push(SeqCStatement::Repeat {
            num_repeats,
            body,
            complexity,
        });
    }

    /// Calculate a rough estimate for the complexity (~nr of instructions)
    ///
    /// The point here is not to be accurate about every statement, but to correctly
    /// gauge the size of loops etc.
    pub fn estimate_complexity(&self) -> u64 {
        self.statements.iter().map(SeqCStatement::complexity).sum()
    }

    pub fn generate_seq_c(&self) -> String {
        self.statements
            .iter()
            .map(|statement| self.emit_statement(statement))
            .collect::<String>()
    }

    fn emit_statement(&self, statement: &SeqCStatement) -> String {
        match statement {
            SeqCStatement::Comment { text } => format!("// {text}\n"),
            SeqCStatement::BlankLine => "\n".to_string(),
            SeqCStatement::FunctionCall { name, args } => {
                let args = args
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("{name}({args});\n")
            }
            SeqCStatement::WaveDeclaration {
                wave_id,
                expression,
            } => format!("wave {wave_id} = {expression};\n"),
            SeqCStatement::Repeat {
                num_repeats, body, ..
            } => {
                let body = indent(&body.generate_seq_c(), "  ");
                format!("repeat ({num_repeats}) {{\n{body}}}\n")
            }
            SeqCStatement::Raw { text } => {
                if text.ends_with('\n') || text.is_empty() {
                    text.clone()
                } else {
                    format!("{text}\n")
                }
            }
        }
    }
}
