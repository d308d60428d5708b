// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod device_traits;
pub mod time;
pub mod types;

pub use device_traits::DeviceTraits;
pub use types::{Alignment, DeviceKind, SequenceType, TriggerMode};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown device type '{0}', must be one of hdawg, uhfqa, uhfli, mfli, pqsc")]
    UnknownDeviceKind(String),
    #[error("Unknown Sequence Type '{0}'!")]
    UnknownSequenceType(String),
    #[error("Unknown trigger mode '{0}', must be one of 'None', 'Send Trigger', 'External Trigger'")]
    UnknownTriggerMode(String),
    #[error("Unknown alignment '{0}', must be one of 'End with Trigger', 'Start with Trigger'")]
    UnknownAlignment(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
