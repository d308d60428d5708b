// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! High-level control of Zurich Instruments devices.
//!
//! Devices talk to a data server through a shared [`ZiConnection`]. Each
//! instrument holds a [`DeviceConnection`] that addresses the nodes of one
//! device, a [`Nodetree`] of its parameters, and, where the device has AWG
//! cores, one [`SequenceProgram`](sequence_program::SequenceProgram) per core.

pub mod config;
pub mod connection;
pub mod instruments;
pub mod multi_device;
pub mod nodetree;
pub mod parameter;
pub mod parsers;
pub mod sweep;
pub mod virtual_server;

use std::time::Duration;

pub use config::{ApiConfig, AwgTiming, DeviceConfig, ToolkitConfig};
pub use connection::{AwgModule, DataServer, DeviceConnection, ZiConnection};
pub use instruments::{
    Awg, AwgCore, BaseInstrument, GenericInstrument, Hdawg, HdawgAwg, Instrument, ReadoutChannel,
    Uhfqa, UhfqaAwg,
};
pub use multi_device::{Device, MultiDeviceConnection};
pub use nodetree::{Node, NodeEntry, Nodetree};
pub use parameter::{NodeInfo, Parameter};
pub use sweep::{Sweep, SweepPoint};
pub use virtual_server::VirtualDataServer;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No existing connection to data server")]
    NoServer,
    #[error(
        "The device {name} ({serial}) is not connected to a data server! Use setup() to establish a data server connection."
    )]
    NotConnected { name: String, serial: String },
    #[error("Device {0} is not connected to the data server")]
    DeviceNotFound(String),
    #[error("Node {0} does not exist")]
    NodeNotFound(String),
    #[error("Node {0} is read-only")]
    ReadOnly(String),
    #[error("Parameter {path} is not {access}!")]
    Access { path: String, access: &'static str },
    #[error("Invalid value for {what}: {reason}")]
    InvalidValue { what: String, reason: String },
    #[error("Sequence type '{sequence_type}' is not supported by {device}, must be one of {allowed}")]
    UnsupportedSequence {
        sequence_type: String,
        device: String,
        allowed: String,
    },
    #[error("Compilation failed:\n{status_string}")]
    Compiler { status_string: String },
    #[error("ELF upload failed with status {0}")]
    Upload(i64),
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },
    #[error("Waveform upload only possible for 'Simple' sequence program!")]
    NotSimpleSequence,
    #[error("Waveform index {index} out of range, the queue holds {len} waveforms")]
    WaveformIndex { index: usize, len: usize },
    #[error("AWG sequence type needs to be 'Readout'")]
    NotReadoutSequence,
    #[error("No readout channels are enabled!")]
    NoReadoutChannels,
    #[error("Readout channel {0} does not exist, must be within 0..10")]
    ChannelIndex(usize),
    #[error("Sweep '{name}' failed at point {index} ({value})")]
    Sweep {
        name: String,
        index: usize,
        value: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    TypeMismatch(#[from] node_value::TypeMismatch),
    #[error(transparent)]
    Sequence(#[from] sequence_program::Error),
    #[error(transparent)]
    Common(#[from] toolkit_common::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_value(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
