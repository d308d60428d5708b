// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use node_value::NodeValue;
use sequence_program::SequenceSettings;
use toolkit_common::{DeviceKind, TriggerMode};

use super::awg::{Awg, AwgCore};
use super::{BaseInstrument, Instrument};
use crate::config::{AwgTiming, DeviceConfig, ToolkitConfig};
use crate::connection::DeviceConnection;
use crate::parameter::{NodeInfo, Parameter};
use crate::parsers;
use crate::{Error, Result};

const TRIGGER_LEVEL: f64 = 0.5;

fn parameter(
    device: &DeviceConnection,
    path: String,
    node_type: &str,
    unit: &str,
    description: &str,
) -> Parameter {
    Parameter::new(
        NodeInfo::new(&path, node_type, "Read, Write", unit, description),
        device,
    )
}

/// AWG core of the HDAWG, driving a pair of signal outputs.
pub struct HdawgAwg {
    core: AwgCore,
    iq_modulation: bool,
    pub output1: Parameter,
    pub output2: Parameter,
    pub modulation_freq: Parameter,
    pub modulation_phase_shift: Parameter,
    pub gain1: Parameter,
    pub gain2: Parameter,
}

impl HdawgAwg {
    fn new(device: &DeviceConnection, index: usize, timing: AwgTiming) -> Self {
        let on_off = |channel: usize| {
            parameter(
                device,
                format!("sigouts/{channel}/on"),
                "Integer",
                "None",
                "Enables or disables the output. Either {'1', '0'} or {'on', 'off'}.",
            )
            .with_parsers(Some(parsers::set_on_off), Some(parsers::get_on_off))
        };
        let gain = |output: usize| {
            parameter(
                device,
                format!("awgs/{index}/outputs/{output}/gains/{output}"),
                "Double",
                "None",
                "Gain of the output channel.",
            )
            .with_parsers(Some(parsers::amp1), None)
        };
        HdawgAwg {
            core: AwgCore::new(device, index, timing),
            iq_modulation: false,
            output1: on_off(2 * index),
            output2: on_off(2 * index + 1),
            modulation_freq: parameter(
                device,
                format!("oscs/{}/freq", 4 * index),
                "Double",
                "Hz",
                "Modulation frequency of the AWG output channels.",
            )
            .with_parsers(Some(parsers::greater0), None),
            modulation_phase_shift: parameter(
                device,
                format!("sines/{}/phaseshift", 2 * index + 1),
                "Double",
                "Degrees",
                "Modulation phase shift between the two AWG output channels.",
            )
            .with_parsers(Some(parsers::abs90), None),
            gain1: gain(0),
            gain2: gain(1),
        }
    }

    pub fn index(&self) -> usize {
        self.core.index()
    }

    pub fn iq_modulation(&self) -> bool {
        self.iq_modulation
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

    /// Modulate both outputs with the core's oscillator, the second output
    /// shifted by 90 degrees.
    pub fn enable_iq_modulation(&mut self) -> Result<()> {
        let i = self.index();
        self.core.device().set_batch([
            (format!("awgs/{i}/outputs/0/modulation/mode"), 1.into()),
            (format!("awgs/{i}/outputs/1/modulation/mode"), 2.into()),
            (format!("sines/{}/oscselect", 2 * i), (4 * i as i64).into()),
            (format!("sines/{}/oscselect", 2 * i + 1), (4 * i as i64).into()),
        ])?;
        // 90 degrees is outside the range accepted from users.
        self.modulation_phase_shift.set_raw(90.0)?;
        self.set_sequence_params(&SequenceSettings::new().reset_phase(true))?;
        self.core.device().set("system/awg/oscillatorcontrol", 1)?;
        self.iq_modulation = true;
        Ok(())
    }

    pub fn disable_iq_modulation(&mut self) -> Result<()> {
        let i = self.index();
        self.core.device().set_batch([
            (format!("awgs/{i}/outputs/0/modulation/mode"), 0.into()),
            (format!("awgs/{i}/outputs/1/modulation/mode"), 0.into()),
        ])?;
        self.modulation_phase_shift.set(0.0)?;
        self.set_sequence_params(&SequenceSettings::new().reset_phase(false))?;
        self.core.device().set("system/awg/oscillatorcontrol", 0)?;
        self.iq_modulation = false;
        Ok(())
    }

    fn apply_trigger_settings(&self) -> Result<()> {
        let i = self.index();
        self.core.device().set_batch([
            (format!("triggers/in/{}/level", 2 * i), NodeValue::from(TRIGGER_LEVEL)),
            (format!("awgs/{i}/auxtriggers/*/channel"), (2 * i as i64).into()),
            (format!("awgs/{i}/auxtriggers/*/slope"), 1.into()),
        ])
    }
}

impl Awg for HdawgAwg {
    fn core(&self) -> &AwgCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AwgCore {
        &mut self.core
    }

    fn apply_sequence_settings(&mut self, settings: &SequenceSettings) -> Result<()> {
        if settings.trigger_mode == Some(TriggerMode::ExternalTrigger) {
            self.apply_trigger_settings()?;
        }
        Ok(())
    }
}

/// HDAWG with four AWG cores.
pub struct Hdawg {
    base: BaseInstrument,
    awgs: Vec<HdawgAwg>,
}

impl Hdawg {
    pub fn new(name: &str, serial: &str) -> Self {
        Self::with_base(BaseInstrument::new(name, DeviceKind::Hdawg, serial))
    }

    pub fn from_config(device: &DeviceConfig, config: &ToolkitConfig) -> Self {
        Self::with_base(BaseInstrument::from_config(device, config))
    }

    fn with_base(base: BaseInstrument) -> Self {
        let cores = usize::from(DeviceKind::Hdawg.traits().awg_cores);
        let awgs = (0..cores)
            .map(|i| HdawgAwg::new(base.device(), i, base.timing()))
            .collect();
        Hdawg { base, awgs }
    }

    pub fn awgs(&self) -> &[HdawgAwg] {
        &self.awgs
    }

    pub fn awg_mut(&mut self, index: usize) -> Result<&mut HdawgAwg> {
        let len = self.awgs.len();
        self.awgs.get_mut(index).ok_or_else(|| {
            Error::invalid_value("AWG index", format!("{index}, the HDAWG has {len} AWG cores"))
        })
    }
}

impl Instrument for Hdawg {
    fn base(&self) -> &BaseInstrument {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInstrument {
        &mut self.base
    }

    fn init_settings(&mut self) -> Result<()> {
        self.base.set_batch([
            ("/system/clocks/referenceclock/source", NodeValue::from(1)),
            ("awgs/*/single", NodeValue::from(1)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use toolkit_common::SequenceType;

    use super::*;

    fn hdawg() -> Hdawg {
        let config = ToolkitConfig {
            timing: AwgTiming {
                poll_interval: Duration::from_millis(1),
                ..AwgTiming::default()
            },
            ..ToolkitConfig::default()
        };
        let device = DeviceConfig {
            name: "hdawg".to_string(),
            kind: DeviceKind::Hdawg,
            serial: "dev8000".to_string(),
            interface: "1GbE".to_string(),
        };
        let mut hd = Hdawg::from_config(&device, &config);
        hd.setup(None).unwrap();
        hd.connect_device(true).unwrap();
        hd
    }

    #[test]
    fn test_init_settings() {
        let hd = hdawg();
        assert_eq!(hd.awgs().len(), 4);
        assert_eq!(
            hd.base().get("system/clocks/referenceclock/source").unwrap(),
            NodeValue::Integer(1)
        );
        assert_eq!(hd.base().get("awgs/3/single").unwrap(), NodeValue::Integer(1));
        assert_eq!(hd.awgs()[2].name(), "hdawg-2");
    }

    #[test]
    fn test_outputs_and_parsers() {
        let mut hd = hdawg();
        let awg = hd.awg_mut(1).unwrap();
        awg.set_outputs("on", "off").unwrap();
        assert_eq!(
            awg.outputs().unwrap(),
            (NodeValue::from("on"), NodeValue::from("off"))
        );
        assert!(awg.gain1.set(1.5).is_err());
        assert!(awg.modulation_phase_shift.set(95.0).is_err());
        awg.modulation_freq.set(100e6).unwrap();
        assert_eq!(
            hd.base().get("oscs/4/freq").unwrap(),
            NodeValue::Double(100e6)
        );
        assert_eq!(hd.base().get("sigouts/2/on").unwrap(), NodeValue::Integer(1));
        assert!(hd.awg_mut(4).is_err());
    }

    #[test]
    fn test_iq_modulation() {
        let mut hd = hdawg();
        let awg = hd.awg_mut(1).unwrap();
        awg.set_sequence_params(&SequenceSettings::new().sequence_type(SequenceType::Rabi))
            .unwrap();
        awg.enable_iq_modulation().unwrap();
        assert!(awg.iq_modulation());
        assert_eq!(awg.sequence_params().1.reset_phase, Some(true));
        let base = hd.base();
        assert_eq!(base.get("awgs/1/outputs/1/modulation/mode").unwrap(), NodeValue::Integer(2));
        assert_eq!(base.get("sines/3/oscselect").unwrap(), NodeValue::Integer(4));
        assert_eq!(base.get("sines/3/phaseshift").unwrap(), NodeValue::Double(90.0));
        assert_eq!(base.get("system/awg/oscillatorcontrol").unwrap(), NodeValue::Integer(1));

        hd.awg_mut(1).unwrap().disable_iq_modulation().unwrap();
        assert_eq!(hd.base().get("sines/3/phaseshift").unwrap(), NodeValue::Double(0.0));
        assert_eq!(
            hd.awgs()[1].sequence_params().1.reset_phase,
            Some(false)
        );
    }

    #[test]
    fn test_iq_modulation_keeps_phase_shift_in_sync() {
        let mut hd = hdawg();
        let awg = hd.awg_mut(0).unwrap();
        awg.set_sequence_params(&SequenceSettings::new().sequence_type(SequenceType::Rabi))
            .unwrap();
        awg.enable_iq_modulation().unwrap();
        awg.modulation_phase_shift.set(45.0).unwrap();
        awg.disable_iq_modulation().unwrap();
        awg.enable_iq_modulation().unwrap();
        assert_eq!(
            awg.modulation_phase_shift.cached(),
            Some(NodeValue::Double(90.0))
        );
        awg.modulation_phase_shift.set(45.0).unwrap();
        assert_eq!(
            hd.base().get("sines/1/phaseshift").unwrap(),
            NodeValue::Double(45.0)
        );
    }

    #[test]
    fn test_external_trigger_settings() {
        let mut hd = hdawg();
        hd.awg_mut(2)
            .unwrap()
            .set_sequence_params(
                &SequenceSettings::new()
                    .sequence_type(SequenceType::T1)
                    .trigger_mode(TriggerMode::ExternalTrigger),
            )
            .unwrap();
        let base = hd.base();
        assert_eq!(base.get("triggers/in/4/level").unwrap(), NodeValue::Double(0.5));
        assert_eq!(base.get("awgs/2/auxtriggers/1/channel").unwrap(), NodeValue::Integer(4));
        assert_eq!(base.get("awgs/2/auxtriggers/0/slope").unwrap(), NodeValue::Integer(1));
    }

    #[test]
    fn test_failed_device_settings_keep_program() {
        let mut hd = Hdawg::new("hd", "dev8000");
        let awg = hd.awg_mut(0).unwrap();
        let before = awg.sequence_params();
        let result = awg.set_sequence_params(
            &SequenceSettings::new()
                .sequence_type(SequenceType::T1)
                .trigger_mode(TriggerMode::ExternalTrigger),
        );
        assert!(result.is_err());
        assert_eq!(awg.sequence_params(), before);
    }

    #[test]
    fn test_unsupported_sequence() {
        let mut hd = hdawg();
        let awg = hd.awg_mut(0).unwrap();
        let err = awg
            .set_sequence_params(&SequenceSettings::new().sequence_type(SequenceType::Readout))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSequence { .. }));
        assert_eq!(awg.sequence_type(), SequenceType::None);
    }

    #[test]
    fn test_compile_run_wait() {
        let mut hd = hdawg();
        let awg = hd.awg_mut(0).unwrap();
        awg.set_sequence_params(
            &SequenceSettings::new()
                .sequence_type(SequenceType::Rabi)
                .pulse_amplitudes([0.2, 0.4, 0.6]),
        )
        .unwrap();
        awg.compile().unwrap();
        awg.run().unwrap();
        assert!(awg.is_running().unwrap());
        awg.wait_done(Duration::from_secs(1)).unwrap();
        assert!(!awg.is_running().unwrap());
    }

    #[test]
    fn test_waveform_queue() {
        let mut hd = hdawg();
        let awg = hd.awg_mut(3).unwrap();
        assert!(matches!(
            awg.queue_waveform(vec![0.5; 64], vec![], 0.0),
            Err(Error::NotSimpleSequence)
        ));
        awg.set_sequence_params(&SequenceSettings::new().sequence_type(SequenceType::Simple))
            .unwrap();
        awg.queue_waveform(vec![0.5; 100], vec![-0.5; 100], 0.0).unwrap();
        awg.queue_waveform(vec![1.0; 40], vec![], 1e-6).unwrap();
        awg.replace_waveform(0, vec![0.25; 110], vec![], 0.0).unwrap();
        assert!(matches!(
            awg.replace_waveform(2, vec![], vec![], 0.0),
            Err(Error::WaveformIndex { index: 2, len: 2 })
        ));
        awg.compile_and_upload_waveforms().unwrap();
        let (_, params) = awg.sequence_params();
        assert_eq!(params.buffer_lengths, Some(vec![112, 48]));
        assert_eq!(params.delay_times, Some(vec![0.0, 1e-6]));
        let uploaded = hd.base().get("awgs/3/waveform/waves/1").unwrap();
        assert_eq!(uploaded.as_vector().unwrap().len(), 96);
        hd.awg_mut(3).unwrap().reset_queue();
        assert!(hd.awgs()[3].core().waveforms().is_empty());
    }
}
