//! Audio fingerprinting core.
//!
//! Wires spectral analysis and landmark hashing together to produce the
//! fingerprint set used on both the ingest and query paths.

pub mod decode;
pub mod hashing;
pub mod matching;
pub mod spectral;

use crate::fingerprint::hashing::{generate_hashes, Fingerprint};
use crate::fingerprint::spectral::analyze;

/// Pipeline sample rate. The decoder converts everything to this before
/// analysis; the band table below is expressed against it.
pub const SAMPLE_RATE: u32 = 44_100;

/// Samples per analysis frame.
pub const FRAME_SIZE: usize = 4096;

/// Hop between frame starts (50% overlap).
pub const HOP_SIZE: usize = FRAME_SIZE / 2;

/// Peak-search bands in Hz. Ingest and query must agree on this table and
/// on the frame geometry above, or matching silently breaks.
pub const FREQ_BANDS: [(u32, u32); 4] = [(40, 80), (80, 120), (120, 180), (180, 300)];

/// Look-ahead window of frames paired with each anchor.
pub const TARGET_ZONE_SIZE: usize = 5;

/// Fingerprint an already-decoded mono sample buffer.
pub fn fingerprint_samples(samples: &[f32]) -> Vec<Fingerprint> {
    let landmarks = analyze(samples);

    generate_hashes(&landmarks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_is_deterministic_end_to_end() {
        let samples: Vec<f32> = (0..FRAME_SIZE * 4)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (2.0 * std::f32::consts::PI * 65.0 * t).sin()
                    + 0.5 * (2.0 * std::f32::consts::PI * 210.0 * t).sin()
            })
            .collect();

        assert_eq!(fingerprint_samples(&samples), fingerprint_samples(&samples));
    }

    #[test]
    fn short_buffers_produce_no_fingerprints() {
        assert!(fingerprint_samples(&[]).is_empty());
        assert!(fingerprint_samples(&vec![0.1; FRAME_SIZE - 1]).is_empty());
    }
}
