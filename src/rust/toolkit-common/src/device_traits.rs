// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::types::{DeviceKind, SequenceType};

/// Commonly used device traits
pub struct DeviceTraits {
    pub sampling_rate: f64,
    pub awg_cores: u16,
    pub channels_per_awg: u16,
    pub readout_channels: u16,
    /// Waveform buffers must be a multiple of this many samples
    pub waveform_granularity: u16,
    pub min_waveform_length: u16,
    pub supported_sequences: &'static [SequenceType],
}

impl DeviceTraits {
    pub fn from_device_kind(kind: &DeviceKind) -> &'static Self {
        match kind {
            DeviceKind::Hdawg => &HDAWG_TRAITS,
            DeviceKind::Uhfqa => &UHFQA_TRAITS,
            DeviceKind::Uhfli => &UHFLI_TRAITS,
            DeviceKind::Mfli => &MFLI_TRAITS,
            DeviceKind::Pqsc => &PQSC_TRAITS,
        }
    }

    pub fn supports_sequence(&self, sequence_type: SequenceType) -> bool {
        self.supported_sequences.contains(&sequence_type)
    }

    pub fn has_awg(&self) -> bool {
        self.awg_cores > 0
    }
}

pub const HDAWG_TRAITS: DeviceTraits = DeviceTraits {
    sampling_rate: 2.4e9,
    awg_cores: 4,
    channels_per_awg: 2,
    readout_channels: 0,
    waveform_granularity: 16,
    min_waveform_length: 32,
    supported_sequences: &[
        SequenceType::None,
        SequenceType::Simple,
        SequenceType::Rabi,
        SequenceType::T1,
        SequenceType::T2Ramsey,
        SequenceType::Custom,
        SequenceType::Trigger,
    ],
};

pub const UHFQA_TRAITS: DeviceTraits = DeviceTraits {
    sampling_rate: 1.8e9,
    awg_cores: 1,
    channels_per_awg: 2,
    readout_channels: 10,
    waveform_granularity: 16,
    min_waveform_length: 32,
    supported_sequences: &[
        SequenceType::Simple,
        SequenceType::Readout,
        SequenceType::CwSpectroscopy,
        SequenceType::PulsedSpectroscopy,
        SequenceType::Custom,
    ],
};

pub const UHFLI_TRAITS: DeviceTraits = DeviceTraits {
    sampling_rate: 1.8e9,
    awg_cores: 0,
    channels_per_awg: 0,
    readout_channels: 0,
    waveform_granularity: 16,
    min_waveform_length: 32,
    supported_sequences: &[],
};

pub const MFLI_TRAITS: DeviceTraits = DeviceTraits {
    sampling_rate: 60e6,
    awg_cores: 0,
    channels_per_awg: 0,
    readout_channels: 0,
    waveform_granularity: 16,
    min_waveform_length: 32,
    supported_sequences: &[],
};

pub const PQSC_TRAITS: DeviceTraits = DeviceTraits {
    sampling_rate: 0.0, // Not applicable
    awg_cores: 0,
    channels_per_awg: 0,
    readout_channels: 0,
    waveform_granularity: 16,
    min_waveform_length: 32,
    supported_sequences: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_sequences() {
        let hd = DeviceKind::Hdawg.traits();
        assert!(hd.supports_sequence(SequenceType::Rabi));
        assert!(!hd.supports_sequence(SequenceType::Readout));
        let qa = DeviceKind::Uhfqa.traits();
        assert!(qa.supports_sequence(SequenceType::Readout));
        assert!(!qa.supports_sequence(SequenceType::None));
        assert!(!DeviceKind::Pqsc.traits().has_awg());
    }
}
