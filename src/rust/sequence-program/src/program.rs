// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use chrono::{Local, NaiveDateTime};
use seqc_generator::SeqCGenerator;
use toolkit_common::{DeviceKind, SequenceType};

use crate::params::{CommonParams, SequenceParams};
use crate::sequences::write_sequence;
use crate::settings::SequenceSettings;
use crate::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y @%H:%M";

/// The sequence program of one AWG core.
///
/// Holds the sequence type with its parameters and generates the seqC
/// program from them. Parameters are validated on every update; an update
/// that fails validation leaves the program unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceProgram {
    common: CommonParams,
    params: SequenceParams,
}

impl Default for SequenceProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceProgram {
    pub fn new() -> Self {
        SequenceProgram {
            common: CommonParams::default(),
            params: SequenceParams::None,
        }
    }

    /// Empty program for an AWG core of `target`, clocked at its sampling rate.
    pub fn for_target(target: DeviceKind) -> Self {
        let mut program = Self::new();
        program.common.target = target;
        program.common.clock_rate = target.traits().sampling_rate;
        program
    }

    pub fn with_type(sequence_type: SequenceType) -> Result<Self> {
        let mut program = Self::new();
        program.set_params(&SequenceSettings::new().sequence_type(sequence_type))?;
        Ok(program)
    }

    pub fn sequence_type(&self) -> SequenceType {
        self.params.sequence_type()
    }

    pub fn common(&self) -> &CommonParams {
        &self.common
    }

    pub fn params(&self) -> &SequenceParams {
        &self.params
    }

    /// Update the sequence parameters.
    ///
    /// A new `sequence_type` starts from the defaults of that type and keeps
    /// the values of all parameters both types share.
    pub fn set_params(&mut self, settings: &SequenceSettings) -> Result<()> {
        let mut next = self.clone();
        if let Some(sequence_type) = settings.sequence_type {
            let mut carried = SequenceSettings::new();
            next.params.write_settings(&mut carried);
            next.params = SequenceParams::defaults(sequence_type);
            next.params.apply(&carried);
            if sequence_type != self.sequence_type() {
                toolkit_log::debug!(
                    "Sequence type changed from '{}' to '{}'",
                    self.sequence_type(),
                    sequence_type
                );
            }
        }
        next.common.apply(settings);
        next.params.apply(settings);
        next.params.normalize(&mut next.common);
        next.common.validate()?;
        next.params.validate(&next.common)?;
        *self = next;
        Ok(())
    }

    /// Snapshot of the sequence type and all of its current parameters.
    pub fn list_params(&self) -> (SequenceType, SequenceSettings) {
        let mut settings = SequenceSettings::new().sequence_type(self.sequence_type());
        self.common.write_settings(&mut settings);
        self.params.write_settings(&mut settings);
        (self.sequence_type(), settings)
    }

    /// Generate the seqC program, stamped with the current local time.
    pub fn seqc(&self) -> Result<String> {
        self.seqc_at(Local::now().naive_local())
    }

    pub fn seqc_at(&self, timestamp: NaiveDateTime) -> Result<String> {
        if self.params == SequenceParams::None {
            return Err(Error::NoProgram);
        }
        self.common.validate()?;
        self.params.validate(&self.common)?;
        let mut seqc = SeqCGenerator::new();
        let timestamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        seqc.add_header(self.sequence_type().name(), &timestamp);
        write_sequence(&self.common, &self.params, &mut seqc)?;
        toolkit_log::diagnostic!(
            "Generated '{}' program with {} statements, complexity {}",
            self.sequence_type(),
            seqc.num_statements(),
            seqc.estimate_complexity()
        );
        Ok(seqc.generate_seq_c())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;
    use toolkit_common::{Alignment, DeviceKind, TriggerMode};

    use super::*;
    use crate::params::CustomParam;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap()
    }

    const HEADER_RABI: &str = "// Zurich Instruments sequencer program\n\
                               // sequence type:              Rabi\n\
                               // automatically generated:    14/03/2025 @09:05\n\n";

    #[test]
    fn test_none_has_no_program() {
        let program = SequenceProgram::new();
        assert_eq!(program.sequence_type(), SequenceType::None);
        assert!(matches!(program.seqc(), Err(Error::NoProgram)));
    }

    #[test]
    fn test_rabi_send_trigger() {
        let mut program = SequenceProgram::new();
        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::Rabi)
                    .trigger_mode(TriggerMode::SendTrigger)
                    .pulse_amplitudes([0.5, 1.0])
                    .repetitions(100_u64),
            )
            .unwrap();
        let expected = format!(
            "{HEADER_RABI}\
             wave w_1 = gauss(720, 360, 120);\n\
             wave w_2 = drag(720, 360, 120);\n\
             setTrigger(0);\n\
             \n\
             repeat (100) {{\n  \
               // waveform 1 / 2\n  \
               setTrigger(1);\n  \
               wait(28410);\n  \
               setTrigger(0);\n  \
               playWave(0.5*w_1, 0.5*w_2);\n  \
               waitWave();\n  \
               wait(1500);\n  \
               // waveform 2 / 2\n  \
               setTrigger(1);\n  \
               wait(28410);\n  \
               setTrigger(0);\n  \
               playWave(1.0*w_1, 1.0*w_2);\n  \
               waitWave();\n  \
               wait(1500);\n\
             }}\n"
        );
        assert_eq!(program.seqc_at(timestamp()).unwrap(), expected);
    }

    #[test]
    fn test_simple_uhfqa_external_trigger() {
        let mut program = SequenceProgram::with_type(SequenceType::Simple).unwrap();
        program
            .set_params(
                &SequenceSettings::new()
                    .target(DeviceKind::Uhfqa)
                    .trigger_mode(TriggerMode::ExternalTrigger)
                    .buffer_lengths(vec![800_u64, 400])
                    .delay_times([1e-6]),
            )
            .unwrap();
        let (_, settings) = program.list_params();
        assert_eq!(settings.delay_times, Some(vec![1e-6, 0.0]));
        assert_eq!(settings.clock_rate, Some(1.8e9));

        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.contains(
            "wave w1_1 = randomUniform(800);\n\
             wave w1_2 = randomUniform(800);\n\
             wave w2_1 = randomUniform(400);\n\
             wave w2_2 = randomUniform(400);\n\
             setTrigger(0);\n"
        ));
        // 21339 - 800 / 8 - 1us * 1.8GHz / 8
        assert!(code.contains(
            "  // waveform 1 / 2\n  \
             waitDigTrigger(1, 1);\n  \
             wait(21014);\n  \
             startQA(QA_INT_ALL, true);\n  \
             playWave(w1_1, w1_2);\n  \
             waitWave();\n  \
             wait(225);\n"
        ));
        assert!(code.contains(
            "  // waveform 2 / 2\n  \
             waitDigTrigger(1, 1);\n  \
             wait(21289);\n  \
             startQA(QA_INT_ALL, true);\n  \
             playWave(w2_1, w2_2);\n  \
             waitWave();\n}\n"
        ));
    }

    #[test]
    fn test_t1_and_t2_delays() {
        let mut program = SequenceProgram::new();
        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::T1)
                    .trigger_mode(TriggerMode::SendTrigger)
                    .delay_times([1e-6, 2e-6])
                    .pulse_amplitude(0.8),
            )
            .unwrap();
        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.contains("wave w_1 = 0.8 * gauss(720, 360, 120);\n"));
        assert!(code.contains("  wait(28200);\n  setTrigger(0);\n  playWave(w_1, w_2);\n  waitWave();\n  wait(1800);\n"));
        assert!(code.contains("  wait(27900);\n"));

        program
            .set_params(&SequenceSettings::new().sequence_type(SequenceType::T2Ramsey))
            .unwrap();
        let (_, settings) = program.list_params();
        assert_eq!(settings.delay_times, Some(vec![1e-6, 2e-6]));
        assert_eq!(settings.pulse_amplitude, Some(0.8));
        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.contains("// sequence type:              T2*\n"));
        assert!(code.contains("wave w_1 = 0.4 * gauss(720, 360, 120);\n"));
        assert!(code.contains("  playWave(w_1, w_2);\n  wait(297);\n  playWave(w_1, w_2);\n  waitWave();\n  wait(1500);\n"));
    }

    #[test]
    fn test_readout() {
        let mut program = SequenceProgram::new();
        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::Readout)
                    .target(DeviceKind::Uhfqa)
                    .readout_frequencies([100e6, 150e6]),
            )
            .unwrap();
        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.contains("wave w1_I = sine(3600, 0.5, 0, 200.0);\n"));
        assert!(code.contains("wave w2_Q = cosine(3600, 0.5, 0.0, 300.0);\n"));
        assert!(code.contains("wave w_1 = add(w1_I, w2_I);\n"));
        assert!(code.contains(
            "repeat (1) {\n  wait(20925);\n  startQA(QA_INT_ALL, true);\n  playWave(w_1, w_2);\n  waitWave();\n}\n"
        ));
    }

    #[test]
    fn test_readout_start_with_trigger() {
        let mut program = SequenceProgram::new();
        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::Readout)
                    .target(DeviceKind::Uhfqa)
                    .alignment(Alignment::StartWithTrigger),
            )
            .unwrap();
        let code = program.seqc_at(timestamp()).unwrap();
        // (100us - 5us) * 1.8GHz / 8 and (5us - 2us) * 1.8GHz / 8
        assert!(code.contains("  wait(21375);\n"));
        assert!(code.contains("  waitWave();\n  wait(675);\n}\n"));
    }

    #[test]
    fn test_pulsed_spectroscopy_forces_uhfqa() {
        let mut program = SequenceProgram::new();
        program
            .set_params(&SequenceSettings::new().sequence_type(SequenceType::PulsedSpectroscopy))
            .unwrap();
        assert_eq!(program.common().target, DeviceKind::Uhfqa);
        assert_eq!(program.common().clock_rate, 1.8e9);
        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.contains("wave w_1 = 1.0 * ones(3600);\n"));
        assert!(code.contains("startQA(QA_INT_ALL, true);\n  playWave(w_1, w_2);\n"));
    }

    #[test]
    fn test_cw_spectroscopy_and_trigger() {
        let mut program = SequenceProgram::new();
        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::CwSpectroscopy)
                    .target(DeviceKind::Uhfqa),
            )
            .unwrap();
        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.ends_with("repeat (1) {\n  wait(21375);\n  startQA(QA_INT_ALL, true);\n}\n"));

        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::Trigger)
                    .target(DeviceKind::Hdawg),
            )
            .unwrap();
        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.ends_with(
            "repeat (1) {\n  setTrigger(1);\n  wait(28500);\n  setTrigger(0);\n  wait(1500);\n}\n"
        ));
    }

    #[test]
    fn test_custom_from_file() {
        let mut file = tempfile::Builder::new().suffix(".seqc").tempfile().unwrap();
        write!(file, "repeat($param1$) {{\n  wait($param2$);\n}}\n").unwrap();
        let mut program = SequenceProgram::new();
        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::Custom)
                    .path(file.path())
                    .custom_params(vec![CustomParam::Integer(10), CustomParam::Integer(200)]),
            )
            .unwrap();
        let code = program.seqc_at(timestamp()).unwrap();
        assert!(code.contains(&format!("// from file: {}\n\n", file.path().display())));
        assert!(code.ends_with("repeat(10) {\n  wait(200);\n}\n"));
    }

    #[test]
    fn test_custom_rejects_other_extensions() {
        let mut program = SequenceProgram::with_type(SequenceType::Custom).unwrap();
        let err = program
            .set_params(&SequenceSettings::new().path("program.txt"))
            .unwrap_err();
        assert!(matches!(err, Error::NotSeqcFile(_)));
        assert_eq!(program.list_params().1.path, None);
    }

    #[test]
    fn test_invalid_update_is_not_applied() {
        let mut program = SequenceProgram::with_type(SequenceType::Rabi).unwrap();
        let err = program
            .set_params(&SequenceSettings::new().pulse_amplitudes([0.5, 1.5]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                name: "pulse_amplitudes",
                ..
            }
        ));
        let err = program
            .set_params(&SequenceSettings::new().period(1e-6))
            .unwrap_err();
        assert_eq!(err.to_string(), "Wait time cannot be negative!");
        assert_eq!(program.common().period, 100e-6);
    }

    #[test]
    fn test_type_change_ignores_unknown_params() {
        let mut program = SequenceProgram::with_type(SequenceType::Rabi).unwrap();
        program
            .set_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::CwSpectroscopy)
                    .pulse_width(10e-9)
                    .period(50e-6),
            )
            .unwrap();
        let (sequence_type, settings) = program.list_params();
        assert_eq!(sequence_type, SequenceType::CwSpectroscopy);
        assert_eq!(settings.pulse_width, None);
        assert_eq!(settings.period, Some(50e-6));
    }
}
