// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Two-channel waveforms queued for upload to an AWG core.

use crate::{Error, Result};

const GRANULARITY: usize = 16;
const MIN_LENGTH: usize = 32;
const FULL_SCALE: f64 = 32767.0;

fn round_up(n: usize) -> usize {
    n.div_ceil(GRANULARITY) * GRANULARITY
}

/// A pair of waveforms played on the two channels of an AWG core.
///
/// The channel data is packed into a single interleaved buffer of 16-bit
/// samples whose length per channel is a multiple of 16 samples and at least
/// 32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    waves: [Vec<f64>; 2],
    delay: f64,
    align_start: bool,
    buffer_length: usize,
    data: Vec<i16>,
}

impl Waveform {
    pub fn new(wave1: Vec<f64>, wave2: Vec<f64>, delay: f64) -> Self {
        let mut waveform = Waveform {
            waves: [wave1, wave2],
            delay,
            align_start: true,
            buffer_length: 0,
            data: vec![],
        };
        waveform.update();
        waveform
    }

    /// Align the waves to the start of the buffer (default) or to its end.
    pub fn with_alignment(mut self, align_start: bool) -> Self {
        self.align_start = align_start;
        self.update();
        self
    }

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    pub fn waves(&self) -> &[Vec<f64>; 2] {
        &self.waves
    }

    /// Replace the wave of one channel (0 or 1).
    pub fn add_wave(&mut self, channel: usize, wave: Vec<f64>) -> Result<()> {
        let slot = self
            .waves
            .get_mut(channel)
            .ok_or(Error::ChannelOutOfRange(channel))?;
        *slot = wave;
        self.update();
        Ok(())
    }

    /// Replace both waves, keeping the buffer length the sequencer program
    /// was compiled for.
    pub fn replace_data(&mut self, wave1: Vec<f64>, wave2: Vec<f64>, delay: f64) -> Result<()> {
        let new_length = Self::required_length(&wave1, &wave2);
        if new_length != self.buffer_length {
            return Err(Error::BufferLengthMismatch {
                expected: self.buffer_length,
                found: new_length,
            });
        }
        self.delay = delay;
        self.waves = [wave1, wave2];
        self.update();
        Ok(())
    }

    fn required_length(wave1: &[f64], wave2: &[f64]) -> usize {
        round_up(wave1.len().max(wave2.len()).max(MIN_LENGTH))
    }

    fn update(&mut self) {
        self.buffer_length = Self::required_length(&self.waves[0], &self.waves[1]);
        let channels = [self.scaled(&self.waves[0]), self.scaled(&self.waves[1])];
        self.data = channels[0]
            .iter()
            .zip(&channels[1])
            .flat_map(|(a, b)| [*a, *b])
            .collect();
    }

    /// One channel padded to the buffer length, normalized if it exceeds
    /// full scale.
    fn scaled(&self, wave: &[f64]) -> Vec<i16> {
        let max = wave.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        let norm = if max >= 1.0 { max } else { 1.0 };
        let mut channel = vec![0_i16; self.buffer_length];
        let offset = if self.align_start {
            0
        } else {
            self.buffer_length - wave.len()
        };
        for (sample, x) in channel[offset..].iter_mut().zip(wave) {
            *sample = (x / norm * FULL_SCALE) as i16;
        }
        channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_buffer_length() {
        assert_eq!(Waveform::new(vec![], vec![], 0.0).buffer_length(), 32);
        assert_eq!(Waveform::new(vec![0.0; 33], vec![], 0.0).buffer_length(), 48);
        assert_eq!(
            Waveform::new(vec![0.0; 10], vec![0.0; 64], 0.0).buffer_length(),
            64
        );
    }

    #[test]
    fn test_interleave_start_aligned() {
        let waveform = Waveform::new(vec![0.5, -0.5], vec![1.0], 0.0);
        let data = waveform.data();
        assert_eq!(data.len(), 64);
        assert_eq!(&data[..6], &[16383, 32767, -16383, 0, 0, 0]);
        assert!(data[6..].iter().all(|x| *x == 0));
    }

    #[test]
    fn test_interleave_end_aligned() {
        let waveform = Waveform::new(vec![0.5, -0.5], vec![], 0.0).with_alignment(false);
        let data = waveform.data();
        assert_eq!(&data[60..], &[16383, 0, -16383, 0]);
        assert!(data[..60].iter().all(|x| *x == 0));
    }

    #[test]
    fn test_normalize_above_full_scale() {
        let waveform = Waveform::new(vec![2.0, -1.0, 0.5], vec![0.25], 0.0);
        let data = waveform.data();
        assert_eq!(data[0], 32767);
        assert_eq!(data[1], 8191);
        assert_eq!(data[2], -16383);
        assert_eq!(data[4], 8191);
    }

    #[test]
    fn test_replace_data() {
        let mut waveform = Waveform::new(vec![0.0; 100], vec![0.0; 100], 0.0);
        assert_eq!(waveform.buffer_length(), 112);
        waveform.replace_data(vec![0.5; 110], vec![], 1e-6).unwrap();
        assert_eq!(waveform.delay(), 1e-6);
        assert_eq!(waveform.data()[0], 16383);
        assert!(matches!(
            waveform.replace_data(vec![0.5; 120], vec![], 0.0),
            Err(Error::BufferLengthMismatch {
                expected: 112,
                found: 128
            })
        ));
    }

    #[test]
    fn test_add_wave() {
        let mut waveform = Waveform::new(vec![], vec![], 0.0);
        waveform.add_wave(1, vec![1.0; 40]).unwrap();
        assert_eq!(waveform.buffer_length(), 48);
        assert_eq!(waveform.data()[1], 32767);
        assert!(matches!(
            waveform.add_wave(2, vec![]),
            Err(Error::ChannelOutOfRange(2))
        ));
    }

    proptest! {
        #[test]
        fn packed_buffer_is_well_formed(
            wave1 in prop::collection::vec(-4.0_f64..4.0, 0..300),
            wave2 in prop::collection::vec(-4.0_f64..4.0, 0..300),
            align_start in any::<bool>(),
        ) {
            let waveform = Waveform::new(wave1.clone(), wave2.clone(), 0.0).with_alignment(align_start);
            let length = waveform.buffer_length();
            prop_assert_eq!(length % GRANULARITY, 0);
            prop_assert!(length >= MIN_LENGTH);
            prop_assert!(length >= wave1.len() && length >= wave2.len());
            prop_assert!(length < MIN_LENGTH.max(wave1.len()).max(wave2.len()) + GRANULARITY);
            prop_assert_eq!(waveform.data().len(), 2 * length);
            prop_assert!(waveform.data().iter().all(|x| *x >= -32767));
        }
    }
}
