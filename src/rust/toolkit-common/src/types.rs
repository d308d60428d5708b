// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::device_traits::DeviceTraits;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Hdawg,
    Uhfqa,
    Uhfli,
    Mfli,
    Pqsc,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 5] = [
        DeviceKind::Hdawg,
        DeviceKind::Uhfqa,
        DeviceKind::Uhfli,
        DeviceKind::Mfli,
        DeviceKind::Pqsc,
    ];

    pub fn traits(&self) -> &'static DeviceTraits {
        DeviceTraits::from_device_kind(self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Hdawg => "hdawg",
            DeviceKind::Uhfqa => "uhfqa",
            DeviceKind::Uhfli => "uhfli",
            DeviceKind::Mfli => "mfli",
            DeviceKind::Pqsc => "pqsc",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        DeviceKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| Error::UnknownDeviceKind(s.to_string()))
    }
}

/// Named, predefined sequencer programs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SequenceType {
    #[default]
    None,
    Simple,
    Rabi,
    T1,
    #[serde(rename = "T2*", alias = "T2 Ramsey")]
    T2Ramsey,
    Readout,
    #[serde(rename = "Pulsed Spectroscopy")]
    PulsedSpectroscopy,
    #[serde(rename = "CW Spectroscopy")]
    CwSpectroscopy,
    Custom,
    Trigger,
}

impl SequenceType {
    pub const ALL: [SequenceType; 10] = [
        SequenceType::None,
        SequenceType::Simple,
        SequenceType::Rabi,
        SequenceType::T1,
        SequenceType::T2Ramsey,
        SequenceType::Readout,
        SequenceType::PulsedSpectroscopy,
        SequenceType::CwSpectroscopy,
        SequenceType::Custom,
        SequenceType::Trigger,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SequenceType::None => "None",
            SequenceType::Simple => "Simple",
            SequenceType::Rabi => "Rabi",
            SequenceType::T1 => "T1",
            SequenceType::T2Ramsey => "T2*",
            SequenceType::Readout => "Readout",
            SequenceType::PulsedSpectroscopy => "Pulsed Spectroscopy",
            SequenceType::CwSpectroscopy => "CW Spectroscopy",
            SequenceType::Custom => "Custom",
            SequenceType::Trigger => "Trigger",
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SequenceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "T2 Ramsey" {
            return Ok(SequenceType::T2Ramsey);
        }
        SequenceType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| Error::UnknownSequenceType(s.to_string()))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriggerMode {
    #[default]
    None,
    #[serde(rename = "Send Trigger")]
    SendTrigger,
    #[serde(rename = "External Trigger")]
    ExternalTrigger,
}

impl TriggerMode {
    pub fn name(&self) -> &'static str {
        match self {
            TriggerMode::None => "None",
            TriggerMode::SendTrigger => "Send Trigger",
            TriggerMode::ExternalTrigger => "External Trigger",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TriggerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            TriggerMode::None,
            TriggerMode::SendTrigger,
            TriggerMode::ExternalTrigger,
        ]
        .into_iter()
        .find(|t| t.name() == s)
        .ok_or_else(|| Error::UnknownTriggerMode(s.to_string()))
    }
}

/// Whether the played waveform ends or starts at the trigger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    #[serde(rename = "End with Trigger")]
    EndWithTrigger,
    #[serde(rename = "Start with Trigger")]
    StartWithTrigger,
}

impl Alignment {
    pub fn name(&self) -> &'static str {
        match self {
            Alignment::EndWithTrigger => "End with Trigger",
            Alignment::StartWithTrigger => "Start with Trigger",
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Alignment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Alignment::EndWithTrigger, Alignment::StartWithTrigger]
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| Error::UnknownAlignment(s.to_string()))
    }
}
