// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Parameter sets of the sequence types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use seqc_generator::{GaussParams, format_float};
use toolkit_common::{Alignment, DeviceKind, SequenceType, TriggerMode};

use crate::settings::SequenceSettings;
use crate::{Error, Result};

fn update<T: Clone>(field: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value < 0.0 || value.is_nan() {
        return Err(Error::InvalidParameter {
            name,
            reason: format!("must be positive, got {value}"),
        });
    }
    Ok(())
}

fn check_amplitudes(name: &'static str, values: &[f64]) -> Result<()> {
    if values.iter().any(|a| a.abs() > 1.0) {
        return Err(Error::InvalidParameter {
            name,
            reason: "Amplitude cannot be larger than 1.0!".to_string(),
        });
    }
    Ok(())
}

/// Parameters shared by all sequence types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonParams {
    pub target: DeviceKind,
    pub clock_rate: f64,
    pub period: f64,
    pub trigger_mode: TriggerMode,
    pub repetitions: u64,
    pub alignment: Alignment,
    pub dead_time: f64,
    pub trigger_delay: f64,
    pub latency: f64,
    pub reset_phase: bool,
}

impl Default for CommonParams {
    fn default() -> Self {
        CommonParams {
            target: DeviceKind::Hdawg,
            clock_rate: DeviceKind::Hdawg.traits().sampling_rate,
            period: 100e-6,
            trigger_mode: TriggerMode::None,
            repetitions: 1,
            alignment: Alignment::EndWithTrigger,
            dead_time: 5e-6,
            trigger_delay: 0.0,
            latency: 160e-9,
            reset_phase: false,
        }
    }
}

impl CommonParams {
    pub(crate) fn apply(&mut self, settings: &SequenceSettings) {
        if let Some(target) = settings.target {
            self.target = target;
            if settings.clock_rate.is_none() {
                self.clock_rate = target.traits().sampling_rate;
            }
        }
        update(&mut self.clock_rate, &settings.clock_rate);
        update(&mut self.period, &settings.period);
        update(&mut self.trigger_mode, &settings.trigger_mode);
        update(&mut self.repetitions, &settings.repetitions);
        update(&mut self.alignment, &settings.alignment);
        update(&mut self.dead_time, &settings.dead_time);
        update(&mut self.trigger_delay, &settings.trigger_delay);
        update(&mut self.latency, &settings.latency);
        update(&mut self.reset_phase, &settings.reset_phase);
    }

    pub(crate) fn write_settings(&self, settings: &mut SequenceSettings) {
        settings.target = Some(self.target);
        settings.clock_rate = Some(self.clock_rate);
        settings.period = Some(self.period);
        settings.trigger_mode = Some(self.trigger_mode);
        settings.repetitions = Some(self.repetitions);
        settings.alignment = Some(self.alignment);
        settings.dead_time = Some(self.dead_time);
        settings.trigger_delay = Some(self.trigger_delay);
        settings.latency = Some(self.latency);
        settings.reset_phase = Some(self.reset_phase);
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !matches!(self.target, DeviceKind::Hdawg | DeviceKind::Uhfqa) {
            return Err(Error::InvalidParameter {
                name: "target",
                reason: format!("must be hdawg or uhfqa, got {}", self.target),
            });
        }
        if !(self.clock_rate.is_finite() && self.clock_rate > 0.0) {
            return Err(Error::InvalidParameter {
                name: "clock_rate",
                reason: format!("must be positive and finite, got {}", self.clock_rate),
            });
        }
        check_positive("period", self.period)?;
        check_positive("dead_time", self.dead_time)?;
        check_positive("latency", self.latency)?;
        if self.period - self.dead_time - self.latency + self.trigger_delay < 0.0 {
            return Err(Error::NegativeWaitTime);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleParams {
    pub buffer_lengths: Vec<u64>,
    pub delay_times: Vec<f64>,
}

impl Default for SimpleParams {
    fn default() -> Self {
        SimpleParams {
            buffer_lengths: vec![800],
            delay_times: vec![0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RabiParams {
    pub pulse_amplitudes: Vec<f64>,
    pub pulse_width: f64,
    pub pulse_truncation: f64,
}

impl Default for RabiParams {
    fn default() -> Self {
        RabiParams {
            pulse_amplitudes: vec![1.0],
            pulse_width: 50e-9,
            pulse_truncation: 3.0,
        }
    }
}

/// Parameters of the T1 and T2* (Ramsey) sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct T1Params {
    pub pulse_amplitude: f64,
    pub pulse_width: f64,
    pub pulse_truncation: f64,
    pub delay_times: Vec<f64>,
}

impl Default for T1Params {
    fn default() -> Self {
        T1Params {
            pulse_amplitude: 1.0,
            pulse_width: 50e-9,
            pulse_truncation: 3.0,
            delay_times: vec![1e-6],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadoutParams {
    pub readout_length: f64,
    pub readout_amplitudes: Vec<f64>,
    pub readout_frequencies: Vec<f64>,
    /// Phase of the quadrature component per frequency, in degrees
    pub phase_shifts: Vec<f64>,
}

impl Default for ReadoutParams {
    fn default() -> Self {
        ReadoutParams {
            readout_length: 2e-6,
            readout_amplitudes: vec![1.0],
            readout_frequencies: vec![100e6],
            phase_shifts: vec![0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulsedSpectroscopyParams {
    pub pulse_length: f64,
    pub pulse_amplitude: f64,
}

impl Default for PulsedSpectroscopyParams {
    fn default() -> Self {
        PulsedSpectroscopyParams {
            pulse_length: 2e-6,
            pulse_amplitude: 1.0,
        }
    }
}

/// Value substituted for a `$paramN$` placeholder of a custom program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomParam {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CustomParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomParam::Integer(v) => write!(f, "{v}"),
            CustomParam::Float(v) => f.write_str(&format_float(*v)),
            CustomParam::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CustomParam {
    fn from(value: i64) -> Self {
        CustomParam::Integer(value)
    }
}

impl From<f64> for CustomParam {
    fn from(value: f64) -> Self {
        CustomParam::Float(value)
    }
}

impl From<&str> for CustomParam {
    fn from(value: &str) -> Self {
        CustomParam::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomParams {
    /// `.seqc` file the program is read from at generation time
    pub path: Option<PathBuf>,
    pub program: String,
    pub custom_params: Vec<CustomParam>,
}

impl CustomParams {
    /// Program text with every `$param{i+1}$` replaced by the i-th custom parameter.
    pub fn resolve_program(&self) -> Result<String> {
        let mut program = match &self.path {
            Some(path) => std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
                path: path.clone(),
                source,
            })?,
            None => self.program.clone(),
        };
        for (i, param) in self.custom_params.iter().enumerate() {
            program = program.replace(&format!("$param{}$", i + 1), &param.to_string());
        }
        Ok(program)
    }
}

/// The type-specific parameters of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceParams {
    None,
    Simple(SimpleParams),
    Rabi(RabiParams),
    T1(T1Params),
    T2Ramsey(T1Params),
    Readout(ReadoutParams),
    PulsedSpectroscopy(PulsedSpectroscopyParams),
    CwSpectroscopy,
    Custom(CustomParams),
    Trigger,
}

impl SequenceParams {
    pub fn defaults(sequence_type: SequenceType) -> Self {
        match sequence_type {
            SequenceType::None => SequenceParams::None,
            SequenceType::Simple => SequenceParams::Simple(SimpleParams::default()),
            SequenceType::Rabi => SequenceParams::Rabi(RabiParams::default()),
            SequenceType::T1 => SequenceParams::T1(T1Params::default()),
            SequenceType::T2Ramsey => SequenceParams::T2Ramsey(T1Params::default()),
            SequenceType::Readout => SequenceParams::Readout(ReadoutParams::default()),
            SequenceType::PulsedSpectroscopy => {
                SequenceParams::PulsedSpectroscopy(PulsedSpectroscopyParams::default())
            }
            SequenceType::CwSpectroscopy => SequenceParams::CwSpectroscopy,
            SequenceType::Custom => SequenceParams::Custom(CustomParams::default()),
            SequenceType::Trigger => SequenceParams::Trigger,
        }
    }

    pub fn sequence_type(&self) -> SequenceType {
        match self {
            SequenceParams::None => SequenceType::None,
            SequenceParams::Simple(_) => SequenceType::Simple,
            SequenceParams::Rabi(_) => SequenceType::Rabi,
            SequenceParams::T1(_) => SequenceType::T1,
            SequenceParams::T2Ramsey(_) => SequenceType::T2Ramsey,
            SequenceParams::Readout(_) => SequenceType::Readout,
            SequenceParams::PulsedSpectroscopy(_) => SequenceType::PulsedSpectroscopy,
            SequenceParams::CwSpectroscopy => SequenceType::CwSpectroscopy,
            SequenceParams::Custom(_) => SequenceType::Custom,
            SequenceParams::Trigger => SequenceType::Trigger,
        }
    }

    /// Apply the settings this sequence type knows about, ignore the rest.
    pub(crate) fn apply(&mut self, s: &SequenceSettings) {
        match self {
            SequenceParams::Simple(p) => {
                update(&mut p.buffer_lengths, &s.buffer_lengths);
                update(&mut p.delay_times, &s.delay_times);
            }
            SequenceParams::Rabi(p) => {
                update(&mut p.pulse_amplitudes, &s.pulse_amplitudes);
                update(&mut p.pulse_width, &s.pulse_width);
                update(&mut p.pulse_truncation, &s.pulse_truncation);
            }
            SequenceParams::T1(p) | SequenceParams::T2Ramsey(p) => {
                update(&mut p.pulse_amplitude, &s.pulse_amplitude);
                update(&mut p.pulse_width, &s.pulse_width);
                update(&mut p.pulse_truncation, &s.pulse_truncation);
                update(&mut p.delay_times, &s.delay_times);
            }
            SequenceParams::Readout(p) => {
                update(&mut p.readout_length, &s.readout_length);
                update(&mut p.readout_amplitudes, &s.readout_amplitudes);
                update(&mut p.readout_frequencies, &s.readout_frequencies);
                update(&mut p.phase_shifts, &s.phase_shifts);
            }
            SequenceParams::PulsedSpectroscopy(p) => {
                update(&mut p.pulse_length, &s.pulse_length);
                update(&mut p.pulse_amplitude, &s.pulse_amplitude);
            }
            SequenceParams::Custom(p) => {
                if let Some(path) = &s.path {
                    p.path = Some(path.clone());
                }
                update(&mut p.program, &s.program);
                update(&mut p.custom_params, &s.custom_params);
            }
            SequenceParams::None | SequenceParams::CwSpectroscopy | SequenceParams::Trigger => {}
        }
    }

    pub(crate) fn write_settings(&self, s: &mut SequenceSettings) {
        match self {
            SequenceParams::Simple(p) => {
                s.buffer_lengths = Some(p.buffer_lengths.clone());
                s.delay_times = Some(p.delay_times.clone());
            }
            SequenceParams::Rabi(p) => {
                s.pulse_amplitudes = Some(p.pulse_amplitudes.clone());
                s.pulse_width = Some(p.pulse_width);
                s.pulse_truncation = Some(p.pulse_truncation);
            }
            SequenceParams::T1(p) | SequenceParams::T2Ramsey(p) => {
                s.pulse_amplitude = Some(p.pulse_amplitude);
                s.pulse_width = Some(p.pulse_width);
                s.pulse_truncation = Some(p.pulse_truncation);
                s.delay_times = Some(p.delay_times.clone());
            }
            SequenceParams::Readout(p) => {
                s.readout_length = Some(p.readout_length);
                s.readout_amplitudes = Some(p.readout_amplitudes.clone());
                s.readout_frequencies = Some(p.readout_frequencies.clone());
                s.phase_shifts = Some(p.phase_shifts.clone());
            }
            SequenceParams::PulsedSpectroscopy(p) => {
                s.pulse_length = Some(p.pulse_length);
                s.pulse_amplitude = Some(p.pulse_amplitude);
            }
            SequenceParams::Custom(p) => {
                s.path = p.path.clone();
                s.program = Some(p.program.clone());
                s.custom_params = Some(p.custom_params.clone());
            }
            SequenceParams::None | SequenceParams::CwSpectroscopy | SequenceParams::Trigger => {}
        }
    }

    /// Bring dependent lists and the shared parameters in line with the type.
    pub(crate) fn normalize(&mut self, common: &mut CommonParams) {
        match self {
            SequenceParams::Simple(p) => {
                let n = p.buffer_lengths.len();
                p.delay_times.resize(n, 0.0);
            }
            SequenceParams::Readout(p) => {
                let n = p.readout_frequencies.len();
                p.readout_amplitudes.resize(n, 1.0);
                p.phase_shifts.resize(n, 0.0);
            }
            SequenceParams::PulsedSpectroscopy(_) => {
                common.target = DeviceKind::Uhfqa;
                common.clock_rate = DeviceKind::Uhfqa.traits().sampling_rate;
            }
            _ => {}
        }
    }

    pub(crate) fn validate(&self, common: &CommonParams) -> Result<()> {
        match self {
            SequenceParams::Simple(p) => {
                if p.buffer_lengths.is_empty() {
                    return Err(Error::InvalidParameter {
                        name: "buffer_lengths",
                        reason: "at least one waveform buffer is required".to_string(),
                    });
                }
            }
            SequenceParams::Rabi(p) => {
                check_amplitudes("pulse_amplitudes", &p.pulse_amplitudes)?;
                check_pulse_shape(p.pulse_width, p.pulse_truncation)?;
                if common.period - common.dead_time - 2.0 * p.pulse_width * p.pulse_truncation
                    < 0.0
                {
                    return Err(Error::NegativeWaitTime);
                }
            }
            SequenceParams::T1(p) | SequenceParams::T2Ramsey(p) => {
                check_amplitudes("pulse_amplitude", &[p.pulse_amplitude])?;
                check_pulse_shape(p.pulse_width, p.pulse_truncation)?;
                let gauss =
                    GaussParams::from_pulse(p.pulse_width, p.pulse_truncation, common.clock_rate);
                if common.period - common.dead_time - gauss.length as f64 / common.clock_rate < 0.0 {
                    return Err(Error::NegativeWaitTime);
                }
            }
            SequenceParams::Readout(p) => {
                check_positive("readout_length", p.readout_length)?;
                check_amplitudes("readout_amplitudes", &p.readout_amplitudes)?;
            }
            SequenceParams::PulsedSpectroscopy(p) => {
                check_positive("pulse_length", p.pulse_length)?;
                check_amplitudes("pulse_amplitude", &[p.pulse_amplitude])?;
            }
            SequenceParams::Custom(p) => {
                if let Some(path) = &p.path
                    && path.extension().and_then(|e| e.to_str()) != Some("seqc")
                {
                    return Err(Error::NotSeqcFile(path.clone()));
                }
            }
            SequenceParams::None | SequenceParams::CwSpectroscopy | SequenceParams::Trigger => {}
        }
        Ok(())
    }
}

fn check_pulse_shape(width: f64, truncation: f64) -> Result<()> {
    check_positive("pulse_width", width)?;
    check_positive("pulse_truncation", truncation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_resets_clock_rate() {
        let mut common = CommonParams::default();
        common.apply(&SequenceSettings::new().target(DeviceKind::Uhfqa));
        assert_eq!(common.clock_rate, 1.8e9);
        common.apply(
            &SequenceSettings::new()
                .target(DeviceKind::Hdawg)
                .clock_rate(1.2e9),
        );
        assert_eq!(common.clock_rate, 1.2e9);
    }

    #[test]
    fn test_clock_rate_must_be_finite() {
        for clock_rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut common = CommonParams::default();
            common.apply(&SequenceSettings::new().clock_rate(clock_rate));
            assert!(matches!(
                common.validate(),
                Err(Error::InvalidParameter {
                    name: "clock_rate",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_common_negative_wait() {
        let mut common = CommonParams::default();
        common.apply(&SequenceSettings::new().period(1e-6));
        assert!(matches!(common.validate(), Err(Error::NegativeWaitTime)));
        common.apply(&SequenceSettings::new().target(DeviceKind::Mfli).period(1e-3));
        assert!(matches!(
            common.validate(),
            Err(Error::InvalidParameter { name: "target", .. })
        ));
    }

    #[test]
    fn test_readout_lists_follow_frequencies() {
        let mut params = SequenceParams::defaults(SequenceType::Readout);
        let mut common = CommonParams::default();
        params.apply(
            &SequenceSettings::new()
                .readout_frequencies([100e6, 120e6, 140e6])
                .readout_amplitudes([0.5]),
        );
        params.normalize(&mut common);
        let SequenceParams::Readout(p) = &params else {
            panic!("expected readout parameters");
        };
        assert_eq!(p.readout_amplitudes, vec![0.5, 1.0, 1.0]);
        assert_eq!(p.phase_shifts, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_custom_params_substitution() {
        let params = CustomParams {
            path: None,
            program: "repeat($param1$) { wait($param2$); } // $param3$ $param1$".to_string(),
            custom_params: vec![5_i64.into(), 0.5.into(), "done".into()],
        };
        assert_eq!(
            params.resolve_program().unwrap(),
            "repeat(5) { wait(0.5); } // done 5"
        );
    }

    #[test]
    fn test_custom_path_must_be_seqc() {
        let mut params = SequenceParams::defaults(SequenceType::Custom);
        params.apply(&SequenceSettings::new().path("program.txt"));
        assert!(matches!(
            params.validate(&CommonParams::default()),
            Err(Error::NotSeqcFile(_))
        ));
    }
}
