//! Time-offset histogram voting.
//!
//! A true match produces many hashes that agree on a single playback
//! offset; coincidental collisions spread their votes across many distinct
//! offsets. Scoring the best-supported offset separates the two.

use std::collections::HashMap;

use crate::fingerprint::hashing::Fingerprint;

/// Catalogue hits grouped by song id: (hash, catalogue time-offset) pairs.
pub type SongHits = HashMap<i64, Vec<(u64, i64)>>;

/// Best-aligned candidate for one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub song_id: Option<i64>,
    /// Fraction of query fingerprints explained by the winning alignment.
    pub confidence: f64,
    /// Winning alignment delta (catalogue offset minus query offset).
    pub aligned_delta: Option<i64>,
}

impl MatchOutcome {
    fn no_match() -> Self {
        Self {
            song_id: None,
            confidence: 0.0,
            aligned_delta: None,
        }
    }
}

/// Pick the candidate whose hits agree most strongly on one playback
/// offset.
///
/// A hash the query produced at several offsets keeps the last offset seen
/// in the query's (ascending frame) order; only one offset per hash can be
/// voted against, and true matches are corroborated by many independent
/// hashes. Score ties between songs break toward the lowest id, vote ties
/// between deltas toward the smallest delta.
pub fn find_best_match(query: &[Fingerprint], hits: &SongHits) -> MatchOutcome {
    if query.is_empty() {
        return MatchOutcome::no_match();
    }

    let mut query_offsets: HashMap<u64, i64> = HashMap::with_capacity(query.len());
    for fingerprint in query {
        query_offsets.insert(fingerprint.hash, i64::from(fingerprint.frame_index));
    }

    let mut best: Option<(i64, f64, i64)> = None;

    for (&song_id, song_hits) in hits {
        let mut histogram: HashMap<i64, u32> = HashMap::new();

        for &(hash, db_offset) in song_hits {
            let Some(&query_offset) = query_offsets.get(&hash) else {
                continue;
            };

            *histogram.entry(db_offset - query_offset).or_insert(0) += 1;
        }

        let Some((delta, votes)) = histogram
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        else {
            continue;
        };

        let score = f64::from(votes) / query.len() as f64;

        let replace = match best {
            None => true,
            Some((best_id, best_score, _)) => {
                score > best_score || (score == best_score && song_id < best_id)
            }
        };
        if replace {
            best = Some((song_id, score, delta));
        }
    }

    match best {
        Some((song_id, confidence, delta)) => MatchOutcome {
            song_id: Some(song_id),
            confidence,
            aligned_delta: Some(delta),
        },
        None => MatchOutcome::no_match(),
    }
}
