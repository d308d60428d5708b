// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use node_value::NodeValue;
use sequence_program::SequenceSettings;
use toolkit_common::{DeviceKind, SequenceType, TriggerMode};

use super::awg::{Awg, AwgCore};
use super::readout_channel::ReadoutChannel;
use super::{BaseInstrument, Instrument};
use crate::config::{AwgTiming, DeviceConfig, ToolkitConfig};
use crate::connection::DeviceConnection;
use crate::parameter::{NodeInfo, Parameter};
use crate::parsers;
use crate::{Error, Result};

const MATRIX_SIZE: usize = 10;

/// The AWG core of the UHFQA together with the readout channels it plays
/// readout pulses for.
pub struct UhfqaAwg {
    core: AwgCore,
    channels: Vec<ReadoutChannel>,
    pub output1: Parameter,
    pub output2: Parameter,
    pub gain1: Parameter,
    pub gain2: Parameter,
}

impl UhfqaAwg {
    fn new(device: &DeviceConnection, timing: AwgTiming, integration_time: &Parameter) -> Self {
        let output = |channel: usize| {
            Parameter::new(
                NodeInfo::new(
                    &format!("sigouts/{channel}/on"),
                    "Integer",
                    "Read, Write",
                    "None",
                    "Enables or disables the output. Either {'1', '0'} or {'on', 'off'}.",
                ),
                device,
            )
            .with_parsers(Some(parsers::set_on_off), Some(parsers::get_on_off))
        };
        let gain = |channel: usize| {
            Parameter::new(
                NodeInfo::new(
                    &format!("awgs/0/outputs/{channel}/amplitude"),
                    "Double",
                    "Read, Write",
                    "None",
                    "Gain of the output channel.",
                ),
                device,
            )
            .with_parsers(Some(parsers::amp1), None)
        };
        let readout_channels = usize::from(DeviceKind::Uhfqa.traits().readout_channels);
        UhfqaAwg {
            core: AwgCore::new(device, 0, timing),
            channels: (0..readout_channels)
                .map(|i| ReadoutChannel::new(device, i, integration_time.clone()))
                .collect(),
            output1: output(0),
            output2: output(1),
            gain1: gain(0),
            gain2: gain(1),
        }
    }

    pub fn channels(&self) -> &[ReadoutChannel] {
        &self.channels
    }

    pub fn channel_mut(&mut self, index: usize) -> Result<&mut ReadoutChannel> {
        self.channels
            .get_mut(index)
            .ok_or(Error::ChannelIndex(index))
    }

    pub fn outputs(&mut self) -> Result<(NodeValue, NodeValue)> {
        Ok((self.output1.get()?, self.output2.get()?))
    }

    pub fn set_outputs(
        &mut self,
        output1: impl Into<NodeValue>,
        output2: impl Into<NodeValue>,
    ) -> Result<()> {
        self.output1.set(output1)?;
        self.output2.set(output2)
    }

    fn disable_all_channels(&mut self) -> Result<()> {
        self.channels.iter_mut().try_for_each(ReadoutChannel::disable)
    }

    fn apply_cw_settings(&mut self) -> Result<()> {
        self.core.device().set_batch([
            ("sigouts/0/enables/0", NodeValue::from(1)),
            ("sigouts/1/enables/1", NodeValue::from(1)),
            ("sigouts/0/amplitudes/0", NodeValue::from(1)),
            ("sigouts/1/amplitudes/1", NodeValue::from(1)),
            ("qas/0/integration/mode", NodeValue::from(1)),
        ])?;
        self.disable_all_channels()
    }

    fn apply_pulsed_settings(&mut self) -> Result<()> {
        self.core.device().set_batch([
            ("sigouts/*/enables/*", NodeValue::from(0)),
            ("sigouts/*/amplitudes/*", NodeValue::from(0)),
            ("awgs/0/outputs/*/mode", NodeValue::from(1)),
            ("qas/0/integration/mode", NodeValue::from(1)),
        ])?;
        self.disable_all_channels()
    }

    fn apply_readout_settings(&self) -> Result<()> {
        self.core.device().set_batch([
            ("sigouts/*/enables/*", NodeValue::from(0)),
            ("awgs/0/outputs/*/mode", NodeValue::from(0)),
            ("qas/0/integration/mode", NodeValue::from(0)),
        ])
    }

    fn apply_trigger_settings(&self) -> Result<()> {
        self.core.device().set_batch([
            ("awgs/0/auxtriggers/*/channel", NodeValue::from(0)),
            ("awgs/0/auxtriggers/*/slope", NodeValue::from(1)),
        ])
    }

    /// Copy frequency, amplitude and phase shift of all enabled readout
    /// channels into the `Readout` sequence program.
    pub fn update_readout_params(&mut self) -> Result<()> {
        if self.sequence_type() != SequenceType::Readout {
            return Err(Error::NotReadoutSequence);
        }
        let enabled = self
            .channels
            .iter()
            .filter(|ch| ch.is_enabled())
            .collect::<Vec<_>>();
        if enabled.is_empty() {
            return Err(Error::NoReadoutChannels);
        }
        let settings = SequenceSettings::new()
            .readout_frequencies(
                enabled
                    .iter()
                    .map(|ch| ch.readout_frequency())
                    .collect::<Vec<_>>(),
            )
            .readout_amplitudes(
                enabled
                    .iter()
                    .map(|ch| ch.readout_amplitude())
                    .collect::<Vec<_>>(),
            )
            .phase_shifts(enabled.iter().map(|ch| ch.phase_shift()).collect::<Vec<_>>());
        self.set_sequence_params(&settings)
    }
}

impl Awg for UhfqaAwg {
    fn core(&self) -> &AwgCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AwgCore {
        &mut self.core
    }

    fn apply_sequence_settings(&mut self, settings: &SequenceSettings) -> Result<()> {
        match settings.sequence_type {
            Some(SequenceType::CwSpectroscopy) => self.apply_cw_settings()?,
            Some(SequenceType::PulsedSpectroscopy) => self.apply_pulsed_settings()?,
            Some(SequenceType::Readout) => self.apply_readout_settings()?,
            _ => {}
        }
        if settings.trigger_mode == Some(TriggerMode::ExternalTrigger) {
            self.apply_trigger_settings()?;
        }
        Ok(())
    }

    fn compile(&mut self) -> Result<()> {
        if self.sequence_type() == SequenceType::Readout {
            self.update_readout_params()?;
        }
        self.core.compile()
    }
}

/// UHFQA with one AWG core and ten readout channels.
pub struct Uhfqa {
    base: BaseInstrument,
    awg: UhfqaAwg,
    /// Integration time in seconds.
    pub integration_time: Parameter,
    /// One of 'Crosstalk', 'Threshold', 'Rotation', 'Crosstalk Correlation',
    /// 'Threshold Correlation' or 'Integration'.
    pub result_source: Parameter,
}

impl Uhfqa {
    pub fn new(name: &str, serial: &str) -> Self {
        Self::with_base(BaseInstrument::new(name, DeviceKind::Uhfqa, serial))
    }

    pub fn from_config(device: &DeviceConfig, config: &ToolkitConfig) -> Self {
        Self::with_base(BaseInstrument::from_config(device, config))
    }

    fn with_base(base: BaseInstrument) -> Self {
        let device = base.device();
        let integration_time = Parameter::new(
            NodeInfo::new(
                "qas/0/integration/length",
                "Double",
                "Read, Write",
                "s",
                "Integration time of the QA integration unit.",
            ),
            device,
        )
        .with_parsers(
            Some(parsers::qa_time2samples),
            Some(parsers::qa_samples2time),
        );
        let awg = UhfqaAwg::new(device, base.timing(), &integration_time);
        let result_source = Parameter::new(
            NodeInfo::new(
                "qas/0/result/source",
                "Integer",
                "Read, Write",
                "None",
                "Signal source of the QA results unit.",
            ),
            device,
        )
        .with_parsers(
            Some(parsers::set_result_source),
            Some(parsers::get_result_source),
        );
        Uhfqa {
            base,
            awg,
            integration_time,
            result_source,
        }
    }

    pub fn awg(&self) -> &UhfqaAwg {
        &self.awg
    }

    pub fn awg_mut(&mut self) -> &mut UhfqaAwg {
        &mut self.awg
    }

    pub fn channels(&self) -> &[ReadoutChannel] {
        self.awg.channels()
    }

    pub fn channel_mut(&mut self, index: usize) -> Result<&mut ReadoutChannel> {
        self.awg.channel_mut(index)
    }

    /// Write a crosstalk matrix of at most 10 x 10 elements, given row by
    /// row.
    pub fn write_crosstalk_matrix(&self, matrix: &[Vec<f64>]) -> Result<()> {
        let cols = matrix.iter().map(Vec::len).max().unwrap_or(0);
        if matrix.len() > MATRIX_SIZE || cols > MATRIX_SIZE {
            return Err(Error::invalid_value(
                "crosstalk matrix",
                format!(
                    "{} x {cols}, at most {MATRIX_SIZE} x {MATRIX_SIZE} elements are supported",
                    matrix.len()
                ),
            ));
        }
        self.base.set_batch(matrix.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().map(move |(c, value)| {
                (
                    format!("qas/0/crosstalk/rows/{r}/cols/{c}"),
                    NodeValue::from(*value),
                )
            })
        }))
    }

    pub fn enable_readout_channels(&mut self, channels: &[usize]) -> Result<()> {
        for &index in channels {
            self.channel_mut(index)?.enable()?;
        }
        Ok(())
    }

    pub fn disable_readout_channels(&mut self, channels: &[usize]) -> Result<()> {
        for &index in channels {
            self.channel_mut(index)?.disable()?;
        }
        Ok(())
    }

    /// Prepare the result unit for an acquisition of `length` results with
    /// `averages` averages each. Unset values keep the device settings.
    pub fn arm(&self, length: Option<u64>, averages: Option<u64>) -> Result<()> {
        let mut settings = Vec::new();
        if let Some(length) = length {
            settings.push(("qas/0/result/length", NodeValue::from(length as i64)));
        }
        if let Some(averages) = averages {
            settings.push(("qas/0/result/averages", NodeValue::from(averages as i64)));
        }
        settings.push(("qas/0/result/reset", NodeValue::from(1)));
        settings.push(("qas/0/result/enable", NodeValue::from(1)));
        self.base.set_batch(settings)?;
        toolkit_log::debug!("{}: result unit armed", self.base.name());
        Ok(())
    }
}

impl Instrument for Uhfqa {
    fn base(&self) -> &BaseInstrument {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInstrument {
        &mut self.base
    }

    fn init_settings(&mut self) -> Result<()> {
        self.base.set("awgs/0/single", 1)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn uhfqa() -> Uhfqa {
        let mut qa = Uhfqa::new("qa", "dev2000");
        qa.setup(None).unwrap();
        qa.connect_device(true).unwrap();
        qa
    }

    #[test]
    fn test_parameters() {
        let mut qa = uhfqa();
        assert_eq!(qa.base().get("awgs/0/single").unwrap(), NodeValue::Integer(1));
        qa.integration_time.set(1e-6).unwrap();
        assert_eq!(
            qa.base().get("qas/0/integration/length").unwrap(),
            NodeValue::Integer(1800)
        );
        assert_eq!(
            qa.result_source.get().unwrap(),
            NodeValue::from("Integration")
        );
        qa.result_source.set("Threshold").unwrap();
        assert_eq!(qa.base().get("qas/0/result/source").unwrap(), NodeValue::Integer(1));
        assert!(qa.awg_mut().gain2.set(-1.2).is_err());
    }

    #[test]
    fn test_readout_channels() {
        let mut qa = uhfqa();
        assert_eq!(qa.channels().len(), 10);
        assert!(matches!(
            qa.enable_readout_channels(&[0, 10]),
            Err(Error::ChannelIndex(10))
        ));
        let channel = qa.channel_mut(2).unwrap();
        channel.enable().unwrap();
        channel.set_readout_frequency(450e6).unwrap();
        assert!(channel.set_readout_amplitude(1.5).is_err());
        assert!(channel.set_phase_shift(90.0).is_err());
        channel.rotation.set(90.0).unwrap();
        assert!((channel.rotation.get().unwrap().as_f64().unwrap() - 90.0).abs() < 1e-9);

        let weights = qa
            .base()
            .get("qas/0/integration/weights/2/real")
            .unwrap()
            .as_vector()
            .unwrap()
            .to_f64_vec();
        assert_eq!(weights.len(), 3600);
        assert!((weights[1] - 1.0).abs() < 1e-9);

        qa.disable_readout_channels(&[2]).unwrap();
        assert!(!qa.channels()[2].is_enabled());
        let weights = qa.base().get("qas/0/integration/weights/2/imag").unwrap();
        assert_eq!(weights.as_vector().unwrap().max_abs(), 0.0);
    }

    #[test]
    fn test_enable_keeps_integration_time_in_sync() {
        let mut qa = uhfqa();
        qa.integration_time.set(1e-6).unwrap();
        qa.enable_readout_channels(&[0]).unwrap();
        assert_eq!(
            qa.base().get("qas/0/integration/length").unwrap(),
            NodeValue::Integer(3600)
        );
        qa.integration_time.set(1e-6).unwrap();
        assert_eq!(
            qa.base().get("qas/0/integration/length").unwrap(),
            NodeValue::Integer(1800)
        );
    }

    #[test]
    fn test_enable_failure_leaves_channel_disabled() {
        let mut qa = Uhfqa::new("qa", "dev2000");
        let channel = qa.channel_mut(4).unwrap();
        assert!(channel.enable().is_err());
        assert!(!channel.is_enabled());
    }

    #[test]
    fn test_crosstalk_matrix() {
        let qa = uhfqa();
        qa.write_crosstalk_matrix(&[vec![1.0, 0.1], vec![0.2, 1.0]])
            .unwrap();
        assert_eq!(
            qa.base().get("qas/0/crosstalk/rows/1/cols/0").unwrap(),
            NodeValue::Double(0.2)
        );
        assert!(qa.write_crosstalk_matrix(&[vec![0.0; 11], vec![0.0; 11]]).is_err());
    }

    #[test]
    fn test_spectroscopy_settings_disable_channels() {
        let mut qa = uhfqa();
        qa.enable_readout_channels(&[0, 1]).unwrap();
        qa.awg_mut()
            .set_sequence_params(
                &SequenceSettings::new().sequence_type(SequenceType::CwSpectroscopy),
            )
            .unwrap();
        assert!(qa.channels().iter().all(|ch| !ch.is_enabled()));
        assert_eq!(qa.base().get("sigouts/1/enables/1").unwrap(), NodeValue::Integer(1));
        assert_eq!(qa.base().get("qas/0/integration/mode").unwrap(), NodeValue::Integer(1));

        qa.awg_mut()
            .set_sequence_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::PulsedSpectroscopy)
                    .trigger_mode(TriggerMode::ExternalTrigger),
            )
            .unwrap();
        assert_eq!(qa.base().get("sigouts/1/enables/1").unwrap(), NodeValue::Integer(0));
        assert_eq!(qa.base().get("awgs/0/outputs/1/mode").unwrap(), NodeValue::Integer(1));
        assert_eq!(qa.base().get("awgs/0/auxtriggers/1/slope").unwrap(), NodeValue::Integer(1));
    }

    #[test]
    fn test_readout_compile() {
        let mut qa = uhfqa();
        let awg = qa.awg_mut();
        assert!(matches!(
            awg.update_readout_params(),
            Err(Error::NotReadoutSequence)
        ));
        awg.set_sequence_params(&SequenceSettings::new().sequence_type(SequenceType::Readout))
            .unwrap();
        assert!(matches!(awg.compile(), Err(Error::NoReadoutChannels)));

        qa.enable_readout_channels(&[0, 3]).unwrap();
        let channel = qa.channel_mut(3).unwrap();
        channel.set_readout_frequency(120e6).unwrap();
        channel.set_readout_amplitude(0.5).unwrap();
        channel.set_phase_shift(-30.0).unwrap();
        qa.awg_mut().compile().unwrap();

        let (_, params) = qa.awg().sequence_params();
        assert_eq!(params.readout_frequencies, Some(vec![100e6, 120e6]));
        assert_eq!(params.readout_amplitudes, Some(vec![1.0, 0.5]));
        assert_eq!(params.phase_shifts, Some(vec![0.0, -30.0]));
    }

    #[test]
    fn test_arm_and_results() {
        let mut qa = uhfqa();
        qa.arm(Some(10), Some(4)).unwrap();
        assert_eq!(qa.base().get("qas/0/result/averages").unwrap(), NodeValue::Integer(4));
        let result = qa.channel_mut(0).unwrap().result_vector().unwrap();
        assert_eq!(result.len(), 10);
        assert!((result[0] - 0.4_f64.cos()).abs() < 1e-12);

        qa.arm(None, None).unwrap();
        let result = qa.channel_mut(0).unwrap().result_vector().unwrap();
        assert_eq!(result.len(), 10);
        assert!((result[0] - 0.8_f64.cos()).abs() < 1e-12);
        qa.awg().wait_done(Duration::from_millis(10)).unwrap();
    }
}
