// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Builder and emitter for sequencer (seqC) programs.
//!
//! Every command added through [`SeqCGenerator`] is validated against the
//! constraints of the AWG sequencer (waveform granularity, amplitude range,
//! trigger indices, ...) before it becomes a [`SeqCStatement`].

pub mod seqc_generator;
pub mod seqc_statements;

pub use seqc_generator::{GaussParams, ReadoutTone, SeqCGenerator};
pub use seqc_statements::{SeqCStatement, SeqCVariant, format_float};

pub type Samples = u64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
