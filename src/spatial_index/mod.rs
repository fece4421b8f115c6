//! Bucketed KD-tree over star directions, optimized for cone searches.
//!
//! `SpatialIndex` holds positions into a borrowed [`StarDatabase`] and
//! reorganizes them in place into an implicit tree:
//!
//! 1. A range longer than the bucket size is split at its median along one
//!    axis of the unit vector (x, then y, then z, cycling). The median element
//!    stays at the middle position as the splitting pivot.
//! 2. A range of at most `bucket_size` stars is a leaf bucket, ordered by
//!    descending flux so that a brightness cut can stop scanning early.
//!
//! Query flow:
//! 1. Convert the angular radius to a chord length on the unit sphere.
//! 2. Descend only into halves whose splitting plane lies within one chord of
//!    the query direction.
//! 3. Apply the exact chord-distance and flux filters to each visited star.
//!
//! Searches are only valid after [`SpatialIndex::sort`]; an unsorted index
//! refuses them with [`StarIdError::Unsorted`].

mod mask;

pub use mask::Mask;

use std::cmp::Ordering;

use crate::error::{Result, StarIdError};
use crate::star::distance_from_angle;
use crate::{Star, StarDatabase, Vector3};

#[derive(Debug, Clone)]
pub struct SpatialIndex<'a> {
    database: &'a StarDatabase,
    elements: Vec<u32>,
    bucket_size: usize,
    sorted: bool,
}

impl<'a> SpatialIndex<'a> {
    /// Index every star of `database`. `bucket_size` is the leaf capacity and
    /// is raised to 1 if zero. An empty database yields an empty index.
    pub fn build(database: &'a StarDatabase, bucket_size: usize) -> Self {
        Self {
            database,
            elements: (0..database.len() as u32).collect(),
            bucket_size: bucket_size.max(1),
            sorted: false,
        }
    }

    /// Reorganize storage into the bucketed tree. Index positions refer to
    /// different stars afterwards. Sorting twice is a no-op.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let n = self.elements.len();
        self.sort_node(0, n, 0);
        self.sorted = true;
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// The database this index refers into.
    pub fn database(&self) -> &'a StarDatabase {
        self.database
    }

    /// Star at position `index` in the current internal order.
    pub fn get(&self, index: usize) -> Option<&'a Star> {
        self.elements
            .get(index)
            .map(|&pos| &self.database.stars()[pos as usize])
    }

    /// Database (insertion) position of the star at index position `index`.
    pub fn database_position(&self, index: usize) -> Option<usize> {
        self.elements.get(index).map(|&pos| pos as usize)
    }

    /// Stars in current internal order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Star> + '_ {
        let stars = self.database.stars();
        self.elements.iter().map(move |&pos| &stars[pos as usize])
    }

    /// Stars within angular `radius` (radians) of `direction` with
    /// `flux >= min_flux`, as a new, unsorted index over the same database.
    pub fn search(&self, direction: Vector3, radius: f32, min_flux: f32) -> Result<SpatialIndex<'a>> {
        let positions = self.search_positions(direction, radius, min_flux)?;
        Ok(SpatialIndex {
            database: self.database,
            elements: positions.into_iter().map(|i| self.elements[i]).collect(),
            bucket_size: self.bucket_size,
            sorted: false,
        })
    }

    /// Index positions of the stars [`search`](Self::search) would return, ascending.
    pub fn search_positions(
        &self,
        direction: Vector3,
        radius: f32,
        min_flux: f32,
    ) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        self.visit_matches(direction, radius, min_flux, |pos, _| out.push(pos))?;
        out.sort_unstable();
        Ok(out)
    }

    /// Mark every star matching the [`search`](Self::search) predicate in
    /// `mask`, skipping stars with `flux >= exclude_flux` when an exclusion
    /// is given. Returns the number of qualifying positions.
    ///
    /// Bits are only ever set; positions already marked stay marked.
    pub fn masked_search(
        &self,
        direction: Vector3,
        radius: f32,
        min_flux: f32,
        exclude_flux: Option<f32>,
        mask: &mut Mask,
    ) -> Result<usize> {
        if mask.len() != self.len() {
            return Err(StarIdError::MaskLength {
                expected: self.len(),
                actual: mask.len(),
            });
        }
        let mut hits = 0;
        self.visit_matches(direction, radius, min_flux, |pos, star| {
            if let Some(limit) = exclude_flux {
                if star.flux() >= limit {
                    return;
                }
            }
            mask.mark(pos);
            hits += 1;
        })?;
        Ok(hits)
    }

    /// Copy the stars not excluded by `mask` (all stars if `None`) into a new
    /// database, in current index order.
    pub fn to_database(&self, mask: Option<&Mask>) -> Result<StarDatabase> {
        if let Some(m) = mask {
            if m.len() != self.len() {
                return Err(StarIdError::MaskLength {
                    expected: self.len(),
                    actual: m.len(),
                });
            }
        }
        let mut db = StarDatabase::with_min_variance(0.0);
        for (i, star) in self.iter().enumerate() {
            if mask.is_some_and(|m| m.is_masked(i)) {
                continue;
            }
            db.push(*star);
        }
        Ok(db)
    }

    fn visit_matches<F>(&self, direction: Vector3, radius: f32, min_flux: f32, mut f: F) -> Result<()>
    where
        F: FnMut(usize, &'a Star),
    {
        if !self.sorted {
            return Err(StarIdError::Unsorted);
        }
        let norm = direction.norm();
        if !norm.is_finite() || norm <= f32::EPSILON {
            return Err(StarIdError::DegenerateDirection(
                direction.x,
                direction.y,
                direction.z,
            ));
        }
        if !(radius > 0.0) || self.is_empty() {
            return Ok(());
        }
        let query = Query {
            center: direction / norm,
            chord: distance_from_angle(radius),
            min_flux: if min_flux.is_nan() { f32::NEG_INFINITY } else { min_flux },
        };
        self.visit_node(0, self.elements.len(), 0, &query, &mut f);
        Ok(())
    }

    fn visit_node<F>(&self, lo: usize, hi: usize, dim: usize, query: &Query, f: &mut F)
    where
        F: FnMut(usize, &'a Star),
    {
        let len = hi - lo;
        if len == 0 {
            return;
        }
        if len <= self.bucket_size {
            for pos in lo..hi {
                let star = self.star_at(pos);
                // Buckets are brightest first.
                if star.flux() < query.min_flux {
                    break;
                }
                if query.contains(star) {
                    f(pos, star);
                }
            }
            return;
        }

        let mid = lo + len / 2;
        let pivot = self.star_at(mid);
        if pivot.flux() >= query.min_flux && query.contains(pivot) {
            f(mid, pivot);
        }

        let split = pivot.direction()[dim];
        let q = query.center[dim];
        let next = (dim + 1) % 3;
        if q - query.chord <= split {
            self.visit_node(lo, mid, next, query, f);
        }
        if q + query.chord >= split {
            self.visit_node(mid + 1, hi, next, query, f);
        }
    }

    fn sort_node(&mut self, lo: usize, hi: usize, dim: usize) {
        let len = hi - lo;
        if len == 0 {
            return;
        }
        let database: &'a StarDatabase = self.database;
        let stars = database.stars();
        if len <= self.bucket_size {
            self.elements[lo..hi].sort_by(|&a, &b| {
                let (sa, sb) = (&stars[a as usize], &stars[b as usize]);
                sb.flux()
                    .total_cmp(&sa.flux())
                    .then_with(|| sa.hash().cmp(&sb.hash()))
            });
            return;
        }

        let half = len / 2;
        self.elements[lo..hi].select_nth_unstable_by(half, |&a, &b| {
            compare_along(&stars[a as usize], &stars[b as usize], dim)
        });
        let next = (dim + 1) % 3;
        self.sort_node(lo, lo + half, next);
        self.sort_node(lo + half + 1, hi, next);
    }

    #[inline]
    fn star_at(&self, pos: usize) -> &'a Star {
        &self.database.stars()[self.elements[pos] as usize]
    }
}

struct Query {
    center: Vector3,
    chord: f32,
    min_flux: f32,
}

impl Query {
    #[inline]
    fn contains(&self, star: &Star) -> bool {
        let dx = self.center.x - star.x();
        let dy = self.center.y - star.y();
        let dz = self.center.z - star.z();
        let r = self.chord;
        dx.abs() <= r && dy.abs() <= r && dz.abs() <= r && dx * dx + dy * dy + dz * dz <= r * r
    }
}

fn compare_along(a: &Star, b: &Star, dim: usize) -> Ordering {
    a.direction()[dim]
        .total_cmp(&b.direction()[dim])
        .then_with(|| a.hash().cmp(&b.hash()))
}
