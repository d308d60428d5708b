// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Program assembly for the individual sequence types.
//!
//! All timing is expressed in sequencer cycles (8 samples). Every sequence
//! starts from the same base timing, derived from the trigger mode, and then
//! shifts cycles between the wait before playback and the dead time after
//! it, depending on the alignment of the played pulse to the trigger.

use seqc_generator::{GaussParams, ReadoutTone, SeqCGenerator};
use toolkit_common::time::{floor_to_grid, time_to_cycles, time_to_samples};
use toolkit_common::{Alignment, DeviceKind, TriggerMode};

use crate::params::{
    CommonParams, CustomParams, PulsedSpectroscopyParams, RabiParams, ReadoutParams,
    SequenceParams, SimpleParams, T1Params,
};
use crate::{Error, Result};

const WAVEFORM_GRANULARITY: i64 = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
enum TriggerCommand {
    SetTrigger(u8),
    WaitDigTrigger(u8),
}

impl TriggerCommand {
    fn emit(self, seqc: &mut SeqCGenerator) -> Result<()> {
        match self {
            TriggerCommand::SetTrigger(value) => seqc.add_set_trigger(value, 1)?,
            TriggerCommand::WaitDigTrigger(index) => seqc.add_wait_dig_trigger(index)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Timing {
    trigger_start: Option<TriggerCommand>,
    trigger_end: Option<TriggerCommand>,
    /// Cycles between the trigger and the start of playback
    wait_cycles: i64,
    /// Cycles after playback
    dead_cycles: i64,
}

impl Timing {
    fn new(common: &CommonParams) -> Self {
        let (trigger_start, trigger_end, dead_cycles) = match common.trigger_mode {
            TriggerMode::None => (None, None, 0),
            TriggerMode::SendTrigger => (
                Some(TriggerCommand::SetTrigger(1)),
                Some(TriggerCommand::SetTrigger(0)),
                time_to_cycles(common.dead_time, common.clock_rate),
            ),
            TriggerMode::ExternalTrigger => {
                let index = u8::from(common.target == DeviceKind::Uhfqa);
                (Some(TriggerCommand::WaitDigTrigger(index)), None, 0)
            }
        };
        Timing {
            trigger_start,
            trigger_end,
            wait_cycles: base_wait(common, common.period - common.dead_time),
            dead_cycles,
        }
    }

    fn emit_start(&self, seqc: &mut SeqCGenerator) -> Result<()> {
        self.trigger_start.map_or(Ok(()), |cmd| cmd.emit(seqc))
    }

    fn emit_end(&self, seqc: &mut SeqCGenerator) -> Result<()> {
        self.trigger_end.map_or(Ok(()), |cmd| cmd.emit(seqc))
    }
}

/// Wait cycles for `time`, corrected by the trigger latency when waiting for
/// an external trigger.
fn base_wait(common: &CommonParams, time: f64) -> i64 {
    match common.trigger_mode {
        TriggerMode::ExternalTrigger => time_to_cycles(
            time - common.latency + common.trigger_delay,
            common.clock_rate,
        ),
        _ => time_to_cycles(time, common.clock_rate),
    }
}

fn waveform_comment(seqc: &mut SeqCGenerator, index: usize, count: usize) {
    seqc.add_comment(format!("waveform {} / {count}", index + 1));
}

/// Samples of a pulse of `length` seconds, rounded down to the waveform granularity.
fn pulse_samples(length: f64, clock_rate: f64) -> u64 {
    floor_to_grid(time_to_samples(length, clock_rate), WAVEFORM_GRANULARITY).max(0) as u64
}

/// Append the program body of the sequence to `seqc`.
pub(crate) fn write_sequence(
    common: &CommonParams,
    params: &SequenceParams,
    seqc: &mut SeqCGenerator,
) -> Result<()> {
    let timing = Timing::new(common);
    match params {
        SequenceParams::None => Err(Error::NoProgram),
        SequenceParams::Simple(p) => simple(common, p, timing, seqc),
        SequenceParams::Rabi(p) => rabi(common, p, timing, seqc),
        SequenceParams::T1(p) => t1(common, p, timing, seqc),
        SequenceParams::T2Ramsey(p) => t2_ramsey(common, p, timing, seqc),
        SequenceParams::Readout(p) => readout(common, p, timing, seqc),
        SequenceParams::PulsedSpectroscopy(p) => pulsed_spectroscopy(common, p, timing, seqc),
        SequenceParams::CwSpectroscopy => cw_spectroscopy(common, timing, seqc),
        SequenceParams::Custom(p) => custom(p, seqc),
        SequenceParams::Trigger => trigger(common, seqc),
    }
}

fn simple(
    common: &CommonParams,
    p: &SimpleParams,
    timing: Timing,
    seqc: &mut SeqCGenerator,
) -> Result<()> {
    let count = p.buffer_lengths.len();
    for (i, &length) in p.buffer_lengths.iter().enumerate() {
        seqc.add_random_buffers(length, i)?;
    }
    seqc.add_set_trigger(0, 1)?;
    seqc.add_blank_line();

    let mut body = SeqCGenerator::new();
    for (i, (&length, &delay)) in p.buffer_lengths.iter().zip(&p.delay_times).enumerate() {
        let buffer_cycles = length as i64 / 8;
        let delay_cycles = time_to_cycles(delay, common.clock_rate);
        let before = match common.alignment {
            Alignment::StartWithTrigger => timing.wait_cycles,
            Alignment::EndWithTrigger => timing.wait_cycles - buffer_cycles,
        };
        let after = match (common.trigger_mode, common.alignment) {
            (TriggerMode::ExternalTrigger, _) => 0,
            (_, Alignment::StartWithTrigger) => timing.dead_cycles - buffer_cycles,
            (_, Alignment::EndWithTrigger) => timing.dead_cycles,
        };
        if i > 0 {
            body.add_blank_line();
        }
        waveform_comment(&mut body, i, count);
        timing.emit_start(&mut body)?;
        if common.target == DeviceKind::Hdawg && common.reset_phase {
            body.add_reset_osc_phase();
        }
        body.add_wait(before - delay_cycles)?;
        timing.emit_end(&mut body)?;
        if common.target == DeviceKind::Uhfqa {
            body.add_start_qa();
        }
        body.add_play_wave_indexed(i);
        body.add_wait_wave();
        body.add_wait(after + delay_cycles)?;
    }
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

/// Shift the gauss pulse length out of the wait (end aligned) or the dead
/// time (start aligned).
fn align_pulse(common: &CommonParams, mut timing: Timing, pulse_cycles: i64) -> Timing {
    match (common.alignment, common.trigger_mode) {
        (Alignment::EndWithTrigger, _) => timing.wait_cycles -= pulse_cycles,
        (Alignment::StartWithTrigger, TriggerMode::ExternalTrigger) => timing.dead_cycles = 0,
        (Alignment::StartWithTrigger, _) => timing.dead_cycles -= pulse_cycles,
    }
    timing
}

fn rabi(common: &CommonParams, p: &RabiParams, timing: Timing, seqc: &mut SeqCGenerator) -> Result<()> {
    let gauss = GaussParams::from_pulse(p.pulse_width, p.pulse_truncation, common.clock_rate);
    seqc.add_gauss_declaration(gauss, None)?;
    timing.emit_end(seqc)?;
    seqc.add_blank_line();

    let timing = align_pulse(common, timing, gauss.length as i64 / 8);
    let count = p.pulse_amplitudes.len();
    let mut body = SeqCGenerator::new();
    for (i, &amplitude) in p.pulse_amplitudes.iter().enumerate() {
        waveform_comment(&mut body, i, count);
        timing.emit_start(&mut body)?;
        if common.reset_phase {
            body.add_reset_osc_phase();
        }
        body.add_wait(timing.wait_cycles)?;
        timing.emit_end(&mut body)?;
        body.add_play_wave_scaled(amplitude, amplitude)?;
        body.add_wait_wave();
        body.add_wait(timing.dead_cycles)?;
    }
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

fn t1(common: &CommonParams, p: &T1Params, timing: Timing, seqc: &mut SeqCGenerator) -> Result<()> {
    let gauss = GaussParams::from_pulse(p.pulse_width, p.pulse_truncation, common.clock_rate);
    seqc.add_gauss_declaration(gauss, Some(p.pulse_amplitude))?;
    timing.emit_end(seqc)?;
    seqc.add_blank_line();

    let count = p.delay_times.len();
    let mut body = SeqCGenerator::new();
    for (i, &delay) in p.delay_times.iter().enumerate() {
        let delay_cycles = time_to_cycles(delay, common.clock_rate);
        waveform_comment(&mut body, i, count);
        timing.emit_start(&mut body)?;
        if common.reset_phase {
            body.add_reset_osc_phase();
        }
        body.add_wait(timing.wait_cycles - delay_cycles)?;
        timing.emit_end(&mut body)?;
        body.add_play_wave();
        body.add_wait_wave();
        body.add_wait(timing.dead_cycles + delay_cycles)?;
    }
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

/// Number of cycles `playWave` itself takes between the two pulses.
const PLAY_WAVE_CYCLES: i64 = 3;

fn t2_ramsey(
    common: &CommonParams,
    p: &T1Params,
    timing: Timing,
    seqc: &mut SeqCGenerator,
) -> Result<()> {
    let gauss = GaussParams::from_pulse(p.pulse_width, p.pulse_truncation, common.clock_rate);
    seqc.add_gauss_declaration(gauss, Some(0.5 * p.pulse_amplitude))?;
    timing.emit_end(seqc)?;
    seqc.add_blank_line();

    let count = p.delay_times.len();
    let mut body = SeqCGenerator::new();
    for (i, &delay) in p.delay_times.iter().enumerate() {
        let delay_cycles = time_to_cycles(delay, common.clock_rate);
        waveform_comment(&mut body, i, count);
        timing.emit_start(&mut body)?;
        if common.reset_phase {
            body.add_reset_osc_phase();
        }
        body.add_wait(timing.wait_cycles - delay_cycles)?;
        timing.emit_end(&mut body)?;
        body.add_play_wave();
        if delay_cycles > PLAY_WAVE_CYCLES {
            body.add_wait(delay_cycles - PLAY_WAVE_CYCLES)?;
        } else {
            body.add_wait(delay_cycles)?;
        }
        body.add_play_wave();
        body.add_wait_wave();
        body.add_wait(timing.dead_cycles)?;
    }
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

/// Timing of a single pulse of `length` seconds that is played once per period.
fn pulse_timing(common: &CommonParams, mut timing: Timing, length: f64) -> Timing {
    let mut time = common.period - common.dead_time;
    match common.alignment {
        Alignment::EndWithTrigger => time -= length,
        Alignment::StartWithTrigger => {
            timing.dead_cycles = time_to_cycles(common.dead_time - length, common.clock_rate)
        }
    }
    timing.wait_cycles = base_wait(common, time);
    timing
}

fn readout(
    common: &CommonParams,
    p: &ReadoutParams,
    timing: Timing,
    seqc: &mut SeqCGenerator,
) -> Result<()> {
    let tones = p
        .readout_frequencies
        .iter()
        .zip(&p.readout_amplitudes)
        .zip(&p.phase_shifts)
        .map(|((&frequency, &amplitude), &phase)| ReadoutTone {
            frequency,
            amplitude,
            phase,
        })
        .collect::<Vec<_>>();
    let length = pulse_samples(p.readout_length, common.clock_rate);
    seqc.add_readout_pulse_declaration(length, &tones, common.clock_rate)?;
    seqc.add_set_trigger(0, 1)?;
    seqc.add_blank_line();

    let timing = pulse_timing(common, timing, p.readout_length);
    let mut body = SeqCGenerator::new();
    timing.emit_start(&mut body)?;
    body.add_wait(timing.wait_cycles)?;
    timing.emit_end(&mut body)?;
    if common.target == DeviceKind::Uhfqa {
        body.add_start_qa();
    }
    body.add_play_wave();
    body.add_wait_wave();
    body.add_wait(timing.dead_cycles)?;
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

fn pulsed_spectroscopy(
    common: &CommonParams,
    p: &PulsedSpectroscopyParams,
    timing: Timing,
    seqc: &mut SeqCGenerator,
) -> Result<()> {
    let length = pulse_samples(p.pulse_length, common.clock_rate);
    seqc.add_ones_declaration(p.pulse_amplitude, length)?;
    seqc.add_blank_line();

    let timing = pulse_timing(common, timing, p.pulse_length);
    let mut body = SeqCGenerator::new();
    timing.emit_start(&mut body)?;
    body.add_wait(timing.wait_cycles)?;
    timing.emit_end(&mut body)?;
    body.add_start_qa();
    body.add_play_wave();
    body.add_wait_wave();
    body.add_wait(timing.dead_cycles)?;
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

fn cw_spectroscopy(common: &CommonParams, timing: Timing, seqc: &mut SeqCGenerator) -> Result<()> {
    let mut body = SeqCGenerator::new();
    timing.emit_start(&mut body)?;
    body.add_wait(timing.wait_cycles)?;
    timing.emit_end(&mut body)?;
    body.add_start_qa();
    body.add_wait(timing.dead_cycles)?;
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

fn trigger(common: &CommonParams, seqc: &mut SeqCGenerator) -> Result<()> {
    let mut body = SeqCGenerator::new();
    body.add_set_trigger(1, 1)?;
    body.add_wait(time_to_cycles(common.period - common.dead_time, common.clock_rate))?;
    body.add_set_trigger(0, 1)?;
    body.add_wait(time_to_cycles(common.dead_time, common.clock_rate))?;
    seqc.add_repeat(common.repetitions, body);
    Ok(())
}

fn custom(p: &CustomParams, seqc: &mut SeqCGenerator) -> Result<()> {
    let program = p.resolve_program()?;
    if let Some(path) = &p.path {
        seqc.add_comment(format!("from file: {}", path.display()));
        seqc.add_blank_line();
    }
    seqc.add_raw(program);
    Ok(())
}
