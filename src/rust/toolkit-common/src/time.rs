// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Conversions between seconds, samples and sequencer cycles.

/// Samples per sequencer clock cycle.
pub const SAMPLES_PER_CYCLE: f64 = 8.0;

/// Convert a time to sequencer wait cycles, truncating toward zero.
pub fn time_to_cycles(time: f64, clock_rate: f64) -> i64 {
    (time * clock_rate / SAMPLES_PER_CYCLE) as i64
}

/// Convert a time to samples, truncating toward zero.
pub fn time_to_samples(time: f64, clock_rate: f64) -> i64 {
    (time * clock_rate) as i64
}

pub fn floor_to_grid(value: i64, grid: i64) -> i64 {
    value - value % grid
}
