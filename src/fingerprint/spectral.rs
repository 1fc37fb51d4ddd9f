//! Spectral analysis: framing, windowing and per-band peak extraction.

use std::f32::consts::PI;

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::fingerprint::{FRAME_SIZE, FREQ_BANDS, HOP_SIZE, SAMPLE_RATE};

/// Peak-magnitude bin index per frequency band for one frame. The position
/// of a vector in the analyzer's output doubles as its time coordinate.
pub type LandmarkVector = [u16; FREQ_BANDS.len()];

/// Turn a mono sample buffer into ordered per-frame landmark vectors.
///
/// Buffers shorter than one frame produce an empty sequence. Output is a
/// pure function of the input; the catalogue round-trips on it.
pub fn analyze(samples: &[f32]) -> Vec<LandmarkVector> {
    let frames = frame(samples);
    if frames.is_empty() {
        return vec![];
    }

    let fft_size = FRAME_SIZE.next_power_of_two();
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);

    frames
        .into_par_iter()
        .map(|frame| {
            let mut buffer: Vec<Complex<f32>> = frame
                .iter()
                .map(|&v| Complex { re: v, im: 0.0 })
                .collect();
            buffer.resize(fft_size, Complex { re: 0.0, im: 0.0 });

            fft.process(&mut buffer);

            let magnitudes: Vec<f32> = buffer[..fft_size / 2]
                .iter()
                .map(|c| (c.re * c.re + c.im * c.im).sqrt())
                .collect();

            band_peaks(&magnitudes, fft_size)
        })
        .collect()
}

/// Split the buffer into overlapping Hann-windowed frames. A trailing
/// stretch shorter than a full frame is dropped, not padded.
fn frame(samples: &[f32]) -> Vec<Vec<f32>> {
    let window = hann_window(FRAME_SIZE);

    let mut frames = Vec::new();
    let mut position = 0;
    while position + FRAME_SIZE <= samples.len() {
        let mut frame = samples[position..position + FRAME_SIZE].to_vec();
        for (sample, w) in frame.iter_mut().zip(window.iter()) {
            *sample *= *w;
        }
        frames.push(frame);

        position += HOP_SIZE;
    }

    frames
}

fn hann_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n - 1.0)).cos()))
        .collect()
}

/// Select the strongest bin inside each band's bin range. The first bin of
/// a tie wins; a degenerate range falls back to its lower bound.
fn band_peaks(magnitudes: &[f32], fft_size: usize) -> LandmarkVector {
    let mut peaks = [0u16; FREQ_BANDS.len()];

    for (band, &(low_hz, high_hz)) in FREQ_BANDS.iter().enumerate() {
        let low_bin = (low_hz as usize * fft_size) / SAMPLE_RATE as usize;
        let high_bin =
            ((high_hz as usize * fft_size) / SAMPLE_RATE as usize).min(magnitudes.len() - 1);

        let mut peak = low_bin;
        let mut peak_magnitude = f32::MIN;
        for bin in low_bin..=high_bin {
            if magnitudes[bin] > peak_magnitude {
                peak_magnitude = magnitudes[bin];
                peak = bin;
            }
        }

        peaks[band] = peak as u16;
    }

    peaks
}
