//! Combinatorial landmark hashing.
//!
//! Each anchor frame is paired with the frames in its target zone; every
//! pair becomes one catalogue entry keyed by a digest of the two landmark
//! vectors and their frame distance.

use serde::{Deserialize, Serialize};

use crate::fingerprint::spectral::LandmarkVector;
use crate::fingerprint::TARGET_ZONE_SIZE;

/// One catalogue entry: a landmark-pair digest and the anchor frame it was
/// derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: u64,
    pub frame_index: u32,
}

/// Pair every anchor with the frames in its target zone, in frame order.
///
/// Sequences shorter than two frames yield no hashes. Digest collisions
/// between unrelated pairs are acceptable; the matcher's voting step
/// absorbs them.
pub fn generate_hashes(landmarks: &[LandmarkVector]) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::new();

    for i in 0..landmarks.len() {
        let zone_end = landmarks.len().min(i + TARGET_ZONE_SIZE);

        for j in i + 1..zone_end {
            let hash = pair_digest(&landmarks[i], &landmarks[j], (j - i) as u16);

            fingerprints.push(Fingerprint {
                hash,
                frame_index: i as u32,
            });
        }
    }

    fingerprints
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64 over the canonical little-endian layout of
/// (anchor bins, target bins, frame delta).
///
/// The digest is part of the catalogue format: entries written by one build
/// must match queries made by another, so nothing runtime-dependent may
/// leak in here.
fn pair_digest(anchor: &LandmarkVector, target: &LandmarkVector, delta: u16) -> u64 {
    let mut digest = FNV_OFFSET_BASIS;

    let mut absorb = |value: u16| {
        for byte in value.to_le_bytes() {
            digest = (digest ^ u64::from(byte)).wrapping_mul(FNV_PRIME);
        }
    };

    for &bin in anchor {
        absorb(bin);
    }
    for &bin in target {
        absorb(bin);
    }
    absorb(delta);

    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmark(seed: u16) -> LandmarkVector {
        [seed, seed + 1, seed + 2, seed + 3]
    }

    #[test]
    fn fewer_than_two_frames_yield_no_hashes() {
        assert!(generate_hashes(&[]).is_empty());
        assert!(generate_hashes(&[landmark(3)]).is_empty());
    }

    #[test]
    fn fan_out_is_bounded_by_the_target_zone() {
        let landmarks: Vec<LandmarkVector> = (0u16..10).map(landmark).collect();
        let fingerprints = generate_hashes(&landmarks);

        let expected: usize = (0..10)
            .map(|i| 10usize.min(i + TARGET_ZONE_SIZE) - (i + 1))
            .sum();
        assert_eq!(fingerprints.len(), expected);

        // Two frames pair exactly once.
        assert_eq!(generate_hashes(&landmarks[..2]).len(), 1);
    }

    #[test]
    fn anchors_are_emitted_in_frame_order() {
        let landmarks: Vec<LandmarkVector> = (0u16..6).map(landmark).collect();
        let offsets: Vec<u32> = generate_hashes(&landmarks)
            .iter()
            .map(|f| f.frame_index)
            .collect();

        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
    }

    #[test]
    fn digest_is_deterministic_and_order_sensitive() {
        let a = landmark(5);
        let b = landmark(9);

        assert_eq!(pair_digest(&a, &b, 2), pair_digest(&a, &b, 2));
        assert_ne!(pair_digest(&a, &b, 2), pair_digest(&b, &a, 2));
        assert_ne!(pair_digest(&a, &b, 2), pair_digest(&a, &b, 3));
    }

    #[test]
    fn identical_traces_yield_identical_hash_sets() {
        let landmarks: Vec<LandmarkVector> = (0u16..8).map(|i| landmark(i * 7)).collect();

        assert_eq!(generate_hashes(&landmarks), generate_hashes(&landmarks));
    }
}
