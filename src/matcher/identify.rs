//! Identification: match the brightest observed stars against the table.
//!
//! 1. Keep the `max_false_stars + min_stars_per_fov` brightest observed stars.
//! 2. Pair every two of them.
//! 3. For each observed pair, find catalog pairs whose distance agrees within
//!    `position_error_sigma · sqrt(var_a + var_b + 2 · catalog_max_variance)`.
//! 4. Every catalog pair found votes for both ways of assigning its two stars
//!    to the two observed stars.
//! 5. Accept identities with at least `db_redundancy` votes, most votes first,
//!    never reusing an observed star or a catalog star.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use tracing::debug;

use crate::{Camera, Constellation, StarDatabase};

use super::{ConstellationDatabase, Correspondence, MatchResult, MatchStatus};

// ── Identification entry point ──────────────────────────────────────────────

impl ConstellationDatabase {
    /// Identify the stars of one image.
    ///
    /// `observed` holds the image stars in camera-frame directions; their
    /// positions in it are the `observed_index` values of the result.
    /// No-match outcomes are reported through [`MatchResult::status`].
    pub fn identify(&self, observed: &StarDatabase, camera: &Camera) -> MatchResult {
        let t0 = Instant::now();

        let brightest = observed.stars_by_greatest_flux(camera.max_candidates());
        if brightest.len() < 2 {
            debug!("Only {} observed stars, cannot form a pair", brightest.len());
            return MatchResult::failure(MatchStatus::TooFew, elapsed_ms(t0));
        }

        // Observed-database positions of the candidates, in brightness order.
        let positions: Vec<usize> = brightest
            .iter()
            .filter_map(|s| observed.position_of(s.hash()))
            .collect();

        let mut observed_pairs = Vec::with_capacity(brightest.len() * (brightest.len() - 1) / 2);
        for a in 0..brightest.len() {
            for b in (a + 1)..brightest.len() {
                observed_pairs.push((a, b, Constellation::new(0, *brightest[a], *brightest[b])));
            }
        }

        let sigma = camera.position_error_sigma();
        let catalog_variance = 2.0 * self.props.catalog_max_variance;

        let mut votes: BTreeMap<(usize, u32), u32> = BTreeMap::new();
        let mut num_pair_matches = 0;
        for &(a, b, ref pair) in &observed_pairs {
            let var_a = brightest[a].variance();
            let var_b = brightest[b].variance();
            let tolerance = sigma * (var_a + var_b + catalog_variance).sqrt();

            for catalog_pair in self.pairs_near(pair.distance(), tolerance) {
                let (Some(c0), Some(c1)) = (
                    catalog_pair.first().catalog_id(),
                    catalog_pair.second().catalog_id(),
                ) else {
                    continue;
                };
                num_pair_matches += 1;
                for (obs, cat) in [(a, c0), (b, c1), (a, c1), (b, c0)] {
                    *votes.entry((positions[obs], cat)).or_insert(0) += 1;
                }
            }
        }
        debug!(
            "{} observed pairs matched {} catalog pairs, {} candidate identities",
            observed_pairs.len(),
            num_pair_matches,
            votes.len()
        );

        let correspondences = accept_votes(&votes, camera.db_redundancy());
        let status = if correspondences.is_empty() {
            MatchStatus::NoMatch
        } else {
            MatchStatus::MatchFound
        };
        debug!(
            "Identified {} of {} candidate stars in {:.2} ms",
            correspondences.len(),
            brightest.len(),
            elapsed_ms(t0)
        );

        MatchResult {
            status,
            correspondences,
            num_candidates: brightest.len(),
            num_constellations: observed_pairs.len(),
            num_pair_matches,
            match_time_ms: elapsed_ms(t0),
        }
    }
}

// ── Vote resolution ─────────────────────────────────────────────────────────

/// Greedy unique 1-to-1 assignment from vote counts.
///
/// Candidates below `min_votes` are dropped. The rest are taken in order of
/// descending votes, then ascending observed index, then ascending catalog id,
/// skipping any that reuse an already assigned observed or catalog star.
fn accept_votes(votes: &BTreeMap<(usize, u32), u32>, min_votes: u32) -> Vec<Correspondence> {
    let mut candidates: Vec<Correspondence> = votes
        .iter()
        .filter(|&(_, &n)| n >= min_votes)
        .map(|(&(observed_index, catalog_id), &votes)| Correspondence {
            observed_index,
            catalog_id,
            votes,
        })
        .collect();
    candidates.sort_by(|x, y| {
        y.votes
            .cmp(&x.votes)
            .then_with(|| x.observed_index.cmp(&y.observed_index))
            .then_with(|| x.catalog_id.cmp(&y.catalog_id))
    });

    let mut used_observed = HashSet::new();
    let mut used_catalog = HashSet::new();
    let mut accepted = Vec::new();
    for c in candidates {
        if used_observed.contains(&c.observed_index) || used_catalog.contains(&c.catalog_id) {
            continue;
        }
        used_observed.insert(c.observed_index);
        used_catalog.insert(c.catalog_id);
        accepted.push(c);
    }
    accepted.sort_by_key(|c| c.observed_index);
    accepted
}

fn elapsed_ms(t0: Instant) -> f32 {
    t0.elapsed().as_secs_f32() * 1000.0
}
