// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use toolkit_common::{Alignment, DeviceKind, SequenceType, TriggerMode};

use crate::params::CustomParam;
use crate::{Error, Result};

/// A partial update of sequence parameters.
///
/// Every field is optional; `None` leaves the current value untouched.
/// Parameters that the selected sequence type does not know are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SequenceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_type: Option<SequenceType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<DeviceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<TriggerMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetitions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_phase: Option<bool>,

    // Simple
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_lengths: Option<Vec<u64>>,
    // Simple, T1, T2*
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_times: Option<Vec<f64>>,

    // Rabi
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_amplitudes: Option<Vec<f64>>,
    // Rabi, T1, T2*
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_truncation: Option<f64>,
    // T1, T2*, Pulsed Spectroscopy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_amplitude: Option<f64>,

    // Readout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readout_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readout_amplitudes: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readout_frequencies: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_shifts: Option<Vec<f64>>,

    // Pulsed Spectroscopy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_length: Option<f64>,

    // Custom
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_params: Option<Vec<CustomParam>>,
}

macro_rules! setters {
    ($($name:ident: $ty:ty),* $(,)?) => {
        impl SequenceSettings {
            $(
                pub fn $name(mut self, value: impl Into<$ty>) -> Self {
                    self.$name = Some(value.into());
                    self
                }
            )*
        }
    };
}

setters! {
    sequence_type: SequenceType,
    target: DeviceKind,
    clock_rate: f64,
    period: f64,
    trigger_mode: TriggerMode,
    repetitions: u64,
    alignment: Alignment,
    dead_time: f64,
    trigger_delay: f64,
    latency: f64,
    reset_phase: bool,
    buffer_lengths: Vec<u64>,
    delay_times: Vec<f64>,
    pulse_amplitudes: Vec<f64>,
    pulse_width: f64,
    pulse_truncation: f64,
    pulse_amplitude: f64,
    readout_length: f64,
    readout_amplitudes: Vec<f64>,
    readout_frequencies: Vec<f64>,
    phase_shifts: Vec<f64>,
    pulse_length: f64,
    path: PathBuf,
    program: String,
    custom_params: Vec<CustomParam>,
}

impl SequenceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::from(anyhow::anyhow!("Invalid sequence settings: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
