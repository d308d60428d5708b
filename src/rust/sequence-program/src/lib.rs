// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Predefined AWG sequence programs.
//!
//! A [`SequenceProgram`] holds the sequence type and its parameters and
//! renders them into a seqC program for a single AWG core. User waveforms for
//! the `Simple` type are packed by [`Waveform`].

mod params;
mod program;
mod sequences;
mod settings;
pub mod waveform;

pub use params::{
    CommonParams, CustomParam, CustomParams, PulsedSpectroscopyParams, RabiParams, ReadoutParams,
    SequenceParams, SimpleParams, T1Params,
};
pub use program::SequenceProgram;
pub use settings::SequenceSettings;
pub use waveform::Waveform;

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Wait time cannot be negative!")]
    NegativeWaitTime,
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("No sequence program defined, set a sequence type first")]
    NoProgram,
    #[error("Specified file is not a .seqc file: {}", .0.display())]
    NotSeqcFile(PathBuf),
    #[error("Failed to read {}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Waveform lengths don't match: expected buffer of {expected} samples, got {found}")]
    BufferLengthMismatch { expected: usize, found: usize },
    #[error("Waveform channel {0} out of range, must be 0 or 1")]
    ChannelOutOfRange(usize),
    #[error(transparent)]
    Common(#[from] toolkit_common::Error),
    #[error(transparent)]
    SeqC(#[from] seqc_generator::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
