// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::f64::consts::PI;

use node_value::{NodeValue, NumericArray};

use crate::connection::DeviceConnection;
use crate::parameter::{NodeInfo, Parameter};
use crate::parsers;
use crate::{Error, Result};

const CLOCK_RATE: f64 = 1.8e9;
const WEIGHTS_LENGTH: usize = 4096;
const DEFAULT_INTEGRATION_TIME: f64 = 2e-6;

/// Integration weights `sin(2π f x / 1.8 GHz + phase)` for `x` in
/// `0..length`.
fn demod_weights(length: usize, frequency: f64, phase_deg: f64) -> Result<Vec<f64>> {
    if length > WEIGHTS_LENGTH {
        return Err(Error::invalid_value(
            "integration length",
            format!("{length} samples, at most {WEIGHTS_LENGTH} are supported"),
        ));
    }
    let phase = phase_deg.to_radians();
    Ok((0..length)
        .map(|x| (2.0 * PI * frequency * x as f64 / CLOCK_RATE + phase).sin())
        .collect())
}

/// One of the ten readout channels of the UHFQA.
///
/// Frequency, amplitude and phase shift are kept locally and feed the
/// `Readout` sequence program when the AWG is compiled. The frequency also
/// sets the channel's integration weights.
pub struct ReadoutChannel {
    index: usize,
    device: DeviceConnection,
    enabled: bool,
    readout_frequency: f64,
    readout_amplitude: f64,
    phase_shift: f64,
    integration_time: Parameter,
    pub rotation: Parameter,
    pub threshold: Parameter,
    pub result: Parameter,
}

impl ReadoutChannel {
    /// `integration_time` is the UHFQA's integration time parameter, shared
    /// by all channels.
    pub(crate) fn new(
        device: &DeviceConnection,
        index: usize,
        integration_time: Parameter,
    ) -> Self {
        ReadoutChannel {
            index,
            device: device.clone(),
            enabled: false,
            readout_frequency: 100e6,
            readout_amplitude: 1.0,
            phase_shift: 0.0,
            integration_time,
            rotation: Parameter::new(
                NodeInfo::new(
                    &format!("qas/0/rotations/{index}"),
                    "Double",
                    "Read, Write",
                    "Degrees",
                    "Rotation of the readout channel in degrees.",
                ),
                device,
            )
            .with_parsers(Some(parsers::deg2complex), Some(parsers::complex2deg)),
            threshold: Parameter::new(
                NodeInfo::new(
                    &format!("qas/0/thresholds/{index}/level"),
                    "Double",
                    "Read, Write",
                    "None",
                    "Threshold of the readout channel.",
                ),
                device,
            ),
            result: Parameter::new(
                NodeInfo::new(
                    &format!("qas/0/result/data/{index}/wave"),
                    "ZIVectorData",
                    "Read",
                    "None",
                    "Result vector of the readout channel.",
                ),
                device,
            ),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch the integration unit to standard mode with 2 µs integration
    /// and write this channel's weights.
    pub fn enable(&mut self) -> Result<()> {
        self.device.set("qas/0/integration/mode", 0)?;
        self.integration_time.set(DEFAULT_INTEGRATION_TIME)?;
        self.set_int_weights()?;
        self.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        self.reset_int_weights()?;
        self.enabled = false;
        Ok(())
    }

    pub fn readout_frequency(&self) -> f64 {
        self.readout_frequency
    }

    pub fn set_readout_frequency(&mut self, frequency: f64) -> Result<()> {
        parsers::greater0(frequency.into())?;
        self.readout_frequency = frequency;
        self.set_int_weights()
    }

    pub fn readout_amplitude(&self) -> f64 {
        self.readout_amplitude
    }

    pub fn set_readout_amplitude(&mut self, amplitude: f64) -> Result<()> {
        parsers::amp1(amplitude.into())?;
        self.readout_amplitude = amplitude;
        Ok(())
    }

    /// Phase shift in degrees.
    pub fn phase_shift(&self) -> f64 {
        self.phase_shift
    }

    pub fn set_phase_shift(&mut self, phase_shift: f64) -> Result<()> {
        parsers::abs90(phase_shift.into())?;
        self.phase_shift = phase_shift;
        Ok(())
    }

    /// Result vector of the last acquisition.
    pub fn result_vector(&mut self) -> Result<Vec<f64>> {
        Ok(self.result.get()?.as_vector()?.to_f64_vec())
    }

    fn weights_node(&self, part: &str) -> String {
        format!("qas/0/integration/weights/{}/{part}", self.index)
    }

    fn reset_int_weights(&self) -> Result<()> {
        let zeros = NodeValue::Vector(NumericArray::Float64(vec![0.0; WEIGHTS_LENGTH]));
        self.device.set_batch([
            (self.weights_node("real"), zeros.clone()),
            (self.weights_node("imag"), zeros),
        ])
    }

    fn set_int_weights(&self) -> Result<()> {
        self.reset_int_weights()?;
        let length = self.device.get("qas/0/integration/length")?.as_i64()?;
        let length = usize::try_from(length)
            .map_err(|_| Error::invalid_value("integration length", length.to_string()))?;
        let real = demod_weights(length, self.readout_frequency, 0.0)?;
        let imag = demod_weights(length, self.readout_frequency, 90.0)?;
        self.device.set_batch([
            (self.weights_node("real"), NodeValue::from(real)),
            (self.weights_node("imag"), NodeValue::from(imag)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demod_weights() {
        let weights = demod_weights(4, 450e6, 0.0).unwrap();
        // a quarter period per sample
        let expected = [0.0, 1.0, 0.0, -1.0];
        for (w, e) in weights.iter().zip(expected) {
            assert!((w - e).abs() < 1e-9);
        }
        let shifted = demod_weights(2, 450e6, 90.0).unwrap();
        assert!((shifted[0] - 1.0).abs() < 1e-12);
        assert!(demod_weights(4097, 1e6, 0.0).is_err());
    }
}
