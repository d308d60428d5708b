// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Logging macros of the toolkit crates.
//!
//! Records go to the `log` facade with the target
//! `zhinst.toolkit::<module path>`. Diagnostics, the per-node and per-poll
//! chatter of device control, use `zhinst.toolkit.diagnostics::<module path>`
//! so a logger can filter them on their own.

use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;

#[doc(hidden)]
pub use log as _log;

#[doc(hidden)]
#[macro_export]
macro_rules! __record {
    ($level:ident, toolkit, $($arg:tt)+) => {
        $crate::_log::$level!(target: concat!("zhinst.toolkit::", module_path!()), $($arg)+)
    };
    ($level:ident, diagnostics, $($arg:tt)+) => {
        $crate::_log::$level!(target: concat!("zhinst.toolkit.diagnostics::", module_path!()), $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::__record!(info, toolkit, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::__record!(warn, toolkit, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::__record!(debug, toolkit, $($arg)+)
    };
}

/// Log a diagnostic message if diagnostics are enabled.
#[macro_export]
macro_rules! diagnostic {
    ($($arg:tt)+) => {
        if $crate::is_diagnostics_enabled() {
            $crate::__record!(info, diagnostics, $($arg)+)
        }
    };
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Most verbose level the toolkit emits: `Debug` with diagnostics, `Info`
/// otherwise.
pub fn max_level() -> LevelFilter {
    if is_diagnostics_enabled() {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Enable or disable diagnostics.
///
/// Libraries only emit records. The binary installs the logger, e.g.
/// `env_logger` in `zhtk`, filtered at [`max_level`].
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
}
