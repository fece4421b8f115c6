//! Lost-in-space star identification by pairwise distance voting.
//!
//! The matcher works in two phases:
//!
//! 1. **Database generation**: thin the catalog with the double-star and
//!    uniform-density masks, then enumerate every pair of surviving stars
//!    closer than the camera's diagonal field of view. The pairs are kept as
//!    a table of [`Constellation`]s sorted by angular distance.
//! 2. **Identification**: take the brightest observed stars, pair them up,
//!    find catalog pairs of matching distance by binary search in the table,
//!    and let every match vote for the star identities it implies. Identities
//!    with enough independent votes are accepted one-to-one.
//!
//! No attitude is estimated; the output is a list of (observed star, catalog
//! star) correspondences.

pub mod database;
pub mod identify;

use rkyv::{Archive, Deserialize, Serialize};

use crate::{Constellation, StarDatabase};

// ── Status codes ────────────────────────────────────────────────────────────

/// Outcome of an identification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// At least one observed star was identified.
    MatchFound,
    /// Pairs were compared but no identity reached the vote threshold.
    NoMatch,
    /// Fewer than two observed stars, so no pair could be formed.
    TooFew,
}

// ── Database properties ─────────────────────────────────────────────────────

/// Metadata describing how a constellation database was built.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct DatabaseProperties {
    /// Largest pair separation stored (radians); the camera's diagonal FOV.
    pub max_fov_rad: f32,
    /// Leaf capacity of the spatial index the pairs were enumerated from.
    pub kdbucket_size: u32,
    /// Stars in the catalog before masking.
    pub num_catalog_stars: u32,
    /// Stars that survived masking and take part in pairs.
    pub num_stars: u32,
    /// Number of pairs in the table.
    pub num_constellations: u32,
    /// Largest positional variance of any working catalog star (radians²).
    pub catalog_max_variance: f32,
}

// ── The constellation database ──────────────────────────────────────────────

/// Working catalog plus its sorted pair table.
///
/// Read-only once built; identification borrows it immutably, so one
/// database can serve any number of images, including from several threads.
#[derive(Debug, Clone)]
pub struct ConstellationDatabase {
    /// Masked catalog the pairs were built from.
    catalog: StarDatabase,
    /// Pairs sorted by distance. `constellations[i].index() == i`.
    constellations: Vec<Constellation>,
    props: DatabaseProperties,
}

impl ConstellationDatabase {
    pub fn catalog(&self) -> &StarDatabase {
        &self.catalog
    }

    pub fn constellations(&self) -> &[Constellation] {
        &self.constellations
    }

    pub fn props(&self) -> &DatabaseProperties {
        &self.props
    }

    pub fn len(&self) -> usize {
        self.constellations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constellations.is_empty()
    }

    /// Catalog pairs whose distance lies within `tolerance` of `distance`.
    ///
    /// Two binary searches on the sorted table; the result is a contiguous
    /// slice in ascending distance order.
    pub fn pairs_near(&self, distance: f32, tolerance: f32) -> &[Constellation] {
        let lo = self
            .constellations
            .partition_point(|c| c.distance() < distance - tolerance);
        let hi = self
            .constellations
            .partition_point(|c| c.distance() <= distance + tolerance);
        if hi <= lo {
            return &[];
        }
        &self.constellations[lo..hi]
    }
}

// ── Match result ────────────────────────────────────────────────────────────

/// One accepted identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correspondence {
    /// Position of the star in the observed [`StarDatabase`].
    pub observed_index: usize,
    /// Catalog id the star was identified as.
    pub catalog_id: u32,
    /// Number of pair matches that voted for this identity.
    pub votes: u32,
}

/// Result of an identification attempt.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Outcome status.
    pub status: MatchStatus,
    /// Accepted identities, ordered by observed index. Empty unless
    /// `status` is [`MatchStatus::MatchFound`].
    pub correspondences: Vec<Correspondence>,
    /// Observed stars used for matching (the brightest ones).
    pub num_candidates: usize,
    /// Observed pairs compared against the table.
    pub num_constellations: usize,
    /// Catalog pairs that matched some observed pair.
    pub num_pair_matches: usize,
    /// Wall-clock time spent matching, in milliseconds.
    pub match_time_ms: f32,
}

impl MatchResult {
    /// Create a failure result with the given status and elapsed time.
    pub(crate) fn failure(status: MatchStatus, match_time_ms: f32) -> Self {
        Self {
            status,
            correspondences: Vec::new(),
            num_candidates: 0,
            num_constellations: 0,
            num_pair_matches: 0,
            match_time_ms,
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == MatchStatus::MatchFound
    }

    /// Catalog id assigned to the observed star at `observed_index`, if any.
    pub fn catalog_id_for(&self, observed_index: usize) -> Option<u32> {
        self.correspondences
            .iter()
            .find(|c| c.observed_index == observed_index)
            .map(|c| c.catalog_id)
    }
}
