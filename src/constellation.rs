//! Unordered star pairs: the unit of geometric matching.

use std::cmp::Ordering;

use rkyv::{Archive, Deserialize, Serialize};

use crate::Star;

/// Two stars and the angular distance between them.
///
/// The pair is stored canonically with the lower-hash star first, so
/// `Constellation::new(i, a, b)` and `Constellation::new(i, b, a)` are equal.
/// Ordering is total: distance, then first hash, then second hash. The `index`
/// is a table position and takes no part in comparisons.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
pub struct Constellation {
    index: u32,
    stars: [Star; 2],
    distance: f32,
}

impl Constellation {
    /// Pair `a` and `b`, measuring their angular separation.
    pub fn new(index: u32, a: Star, b: Star) -> Self {
        let distance = a.angle_to(&b);
        Self::with_distance(index, a, b, distance)
    }

    /// Pair `a` and `b` with a precomputed distance (radians).
    pub fn with_distance(index: u32, a: Star, b: Star, distance: f32) -> Self {
        let stars = if a.hash() <= b.hash() { [a, b] } else { [b, a] };
        Self {
            index,
            stars,
            distance,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Angular separation in radians.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// The stars, lower hash first.
    pub fn stars(&self) -> &[Star; 2] {
        &self.stars
    }

    pub fn first(&self) -> &Star {
        &self.stars[0]
    }

    pub fn second(&self) -> &Star {
        &self.stars[1]
    }
}

impl PartialEq for Constellation {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Constellation {}

impl PartialOrd for Constellation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constellation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.stars[0].hash().cmp(&other.stars[0].hash()))
            .then_with(|| self.stars[1].hash().cmp(&other.stars[1].hash()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector3;

    fn stars() -> [Star; 3] {
        [
            Star::catalog(0, Vector3::new(1.0, 2.0, 3.0), 5.5, 1e-8, false).unwrap(),
            Star::catalog(1, Vector3::new(1.0, 2.01, 3.0), 5.0, 1e-8, false).unwrap(),
            Star::catalog(2, Vector3::new(1.01, 2.0, 3.0), 5.4, 1e-8, false).unwrap(),
        ]
    }

    #[test]
    fn orders_by_distance_first() {
        let [s1, s2, s3] = stars();
        let c1 = Constellation::new(0, s1, s2);
        let c2 = Constellation::new(1, s1, s3);
        assert_eq!(c1.distance(), s1.angle_to(&s2));
        assert!(c1.distance() < c2.distance());
        assert!(c1 < c2);
        assert!(!(c2 < c1));
    }

    #[test]
    fn pair_is_canonical() {
        let [s1, s2, _] = stars();
        let ab = Constellation::new(0, s1, s2);
        let ba = Constellation::new(7, s2, s1);
        assert_eq!(ab, ba);
        assert!(ab.first().hash() < ab.second().hash());
        assert_ne!(ab.index(), ba.index());
    }

    #[test]
    fn equal_distances_fall_back_to_hashes() {
        let [s1, s2, s3] = stars();
        let a = Constellation::with_distance(0, s1, s2, 0.25);
        let b = Constellation::with_distance(1, s1, s3, 0.25);
        let c = Constellation::with_distance(2, s2, s3, 0.25);

        let mut all = [c, b, a];
        all.sort();
        for w in all.windows(2) {
            assert!(w[0] < w[1]);
        }
        // Exactly one of <, ==, > holds for every pair.
        for x in &all {
            for y in &all {
                let n = [x < y, x == y, x > y].iter().filter(|&&t| t).count();
                assert_eq!(n, 1);
            }
        }
    }
}
