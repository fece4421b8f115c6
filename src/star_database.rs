//! Ordered, append-only collection of stars.
//!
//! Insertion order is catalog (or scan) order and is what index positions
//! refer to. A hash map gives constant-time lookup by star identity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::Star;

/// Counts live [`StarDatabase`] instances that were created with
/// [`StarDatabase::tracked`]. Owned by whoever wants the count (usually a test).
#[derive(Debug, Clone, Default)]
pub struct InstanceCounter(Arc<AtomicUsize>);

impl InstanceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked databases currently alive.
    pub fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Self {
        self.0.fetch_add(1, Ordering::SeqCst);
        self.clone()
    }
}

#[derive(Debug)]
pub struct StarDatabase {
    stars: Vec<Star>,
    max_variance: f32,
    by_hash: HashMap<u64, usize>,
    counter: Option<InstanceCounter>,
}

impl Default for StarDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl StarDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::with_min_variance(0.0)
    }

    /// Create an empty database whose reported `max_variance` never drops
    /// below `min_variance`.
    pub fn with_min_variance(min_variance: f32) -> Self {
        Self {
            stars: Vec::new(),
            max_variance: min_variance.max(0.0),
            by_hash: HashMap::new(),
            counter: None,
        }
    }

    /// Create an empty database registered with `counter` for as long as it lives.
    pub fn tracked(counter: &InstanceCounter) -> Self {
        let mut db = Self::new();
        db.counter = Some(counter.acquire());
        db
    }

    /// Build a database from stars in order, skipping duplicates.
    pub fn from_stars<I: IntoIterator<Item = Star>>(stars: I) -> Self {
        let mut db = Self::new();
        for s in stars {
            db.push(s);
        }
        db
    }

    /// Append a star. Returns `false` (and leaves the database unchanged) if a
    /// star with the same hash is already present.
    pub fn push(&mut self, star: Star) -> bool {
        if self.by_hash.contains_key(&star.hash()) {
            return false;
        }
        if star.variance() > self.max_variance {
            self.max_variance = star.variance();
        }
        self.by_hash.insert(star.hash(), self.stars.len());
        self.stars.push(star);
        true
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// Star at insertion position `index`.
    pub fn get(&self, index: usize) -> Option<&Star> {
        self.stars.get(index)
    }

    pub fn get_by_hash(&self, hash: u64) -> Option<&Star> {
        self.by_hash.get(&hash).map(|&i| &self.stars[i])
    }

    /// Insertion position of the star with this hash.
    pub fn position_of(&self, hash: u64) -> Option<usize> {
        self.by_hash.get(&hash).copied()
    }

    pub fn contains(&self, star: &Star) -> bool {
        self.by_hash.contains_key(&star.hash())
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Star> {
        self.stars.iter()
    }

    /// Largest positional variance of any star (radians²).
    pub fn max_variance(&self) -> f32 {
        self.max_variance
    }

    /// The `n` brightest stars, brightest first. Equal fluxes are ordered by
    /// ascending hash so the result does not depend on insertion order.
    pub fn stars_by_greatest_flux(&self, n: usize) -> Vec<&Star> {
        let mut sorted: Vec<&Star> = self.stars.iter().collect();
        sorted.sort_by(|a, b| {
            b.flux()
                .total_cmp(&a.flux())
                .then_with(|| a.hash().cmp(&b.hash()))
        });
        sorted.truncate(n);
        sorted
    }
}

impl Clone for StarDatabase {
    fn clone(&self) -> Self {
        Self {
            stars: self.stars.clone(),
            max_variance: self.max_variance,
            by_hash: self.by_hash.clone(),
            counter: self.counter.as_ref().map(InstanceCounter::acquire),
        }
    }
}

impl Drop for StarDatabase {
    fn drop(&mut self) {
        if let Some(counter) = &self.counter {
            counter.0.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl<'a> IntoIterator for &'a StarDatabase {
    type Item = &'a Star;
    type IntoIter = std::slice::Iter<'a, Star>;

    fn into_iter(self) -> Self::IntoIter {
        self.stars.iter()
    }
}

impl Extend<Star> for StarDatabase {
    fn extend<T: IntoIterator<Item = Star>>(&mut self, iter: T) {
        for s in iter {
            self.push(s);
        }
    }
}
