//! Catalog thinning passes over a sorted [`SpatialIndex`].
//!
//! Both passes are pure: they read the index and an optional starting mask and
//! return a new [`Mask`] of the same length, `true` meaning "drop this star".
//! They only use the index's search primitives, so their cost follows local
//! star density rather than catalog size.
//!
//! Typical use:
//!
//! ```no_run
//! # use starid::{Camera, CameraConfig, SpatialIndex, StarDatabase};
//! # use starid::masking::{filter_mask, uniform_density_mask};
//! # let camera = Camera::new(CameraConfig::default()).unwrap();
//! # let catalog = StarDatabase::new();
//! let mut index = SpatialIndex::build(&catalog, camera.kdbucket_size());
//! index.sort();
//! let doubles = filter_mask(&index, &camera, None).unwrap();
//! let uniform = uniform_density_mask(&index, &camera, Some(&doubles)).unwrap();
//! let working = index.to_database(Some(&uniform)).unwrap();
//! ```

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Result, StarIdError};
use crate::{Camera, Mask, SpatialIndex, Vector3};

/// Double-star suppression.
///
/// Every unmasked, reliable star with `flux >= min_observable_flux` acts as an
/// anchor, in index order. Each anchor masks the observable neighbors within
/// the camera's double-star angle that are dimmer than itself. A star masked
/// earlier in the pass is never an anchor. Unreliable and unobservable stars
/// are never anchors but can be masked as neighbors.
///
/// Stars of exactly equal flux do not mask each other.
pub fn filter_mask(index: &SpatialIndex, camera: &Camera, mask: Option<&Mask>) -> Result<Mask> {
    let mut mask = starting_mask(index, mask)?;
    let min_flux = camera.min_observable_flux();
    let separation = camera.double_star_angle();

    for (i, anchor) in index.iter().enumerate() {
        if mask.is_masked(i) || anchor.is_unreliable() || anchor.flux() < min_flux {
            continue;
        }
        index.masked_search(anchor.uvec(), separation, min_flux, Some(anchor.flux()), &mut mask)?;
    }

    debug!(
        "filter_mask: {} of {} stars masked",
        mask.count_masked(),
        index.len()
    );
    Ok(mask)
}

/// Density equalization.
///
/// For every unmasked anchor, the observable, unmasked stars within half the
/// camera's minimum field of view are found and the `min_stars_per_fov`
/// brightest of them are kept. The union of kept stars over all anchors is the
/// only set left unmasked in the result.
///
/// Each anchor's candidates are judged against the starting mask only, so
/// anchors do not see each other's decisions; the keep-set is merged in index
/// order and the result is deterministic.
pub fn uniform_density_mask(
    index: &SpatialIndex,
    camera: &Camera,
    mask: Option<&Mask>,
) -> Result<Mask> {
    let mask = starting_mask(index, mask)?;
    let min_flux = camera.min_observable_flux();
    let radius = camera.min_fov() * 0.5;
    let keep_per_anchor = camera.min_stars_per_fov();

    let mut keep: BTreeSet<usize> = BTreeSet::new();
    for (i, anchor) in index.iter().enumerate() {
        if mask.is_masked(i) {
            continue;
        }
        let candidates = unmasked_neighbors(index, &mask, anchor.uvec(), radius, min_flux)?;
        keep.extend(n_brightest(index, candidates, keep_per_anchor));
    }

    let mut result = Mask::new(index.len(), true);
    for &i in &keep {
        result.unmark(i);
    }
    debug!(
        "uniform_density_mask: kept {} of {} stars",
        keep.len(),
        index.len()
    );
    Ok(result)
}

/// Positions within `radius` of `center` at or above `min_flux` that `base`
/// leaves unmasked.
fn unmasked_neighbors(
    index: &SpatialIndex,
    base: &Mask,
    center: Vector3,
    radius: f32,
    min_flux: f32,
) -> Result<Vec<usize>> {
    let mut positions = index.search_positions(center, radius, min_flux)?;
    positions.retain(|&j| !base.is_masked(j));
    Ok(positions)
}

/// The `n` brightest of `candidates`, ties broken by hash.
fn n_brightest(index: &SpatialIndex, mut candidates: Vec<usize>, n: usize) -> Vec<usize> {
    candidates.sort_by(|&a, &b| {
        let (sa, sb) = (index.get(a), index.get(b));
        match (sa, sb) {
            (Some(sa), Some(sb)) => sb
                .flux()
                .total_cmp(&sa.flux())
                .then_with(|| sa.hash().cmp(&sb.hash())),
            _ => a.cmp(&b),
        }
    });
    candidates.truncate(n);
    candidates
}

fn starting_mask(index: &SpatialIndex, mask: Option<&Mask>) -> Result<Mask> {
    if !index.is_sorted() {
        return Err(StarIdError::Unsorted);
    }
    match mask {
        Some(m) if m.len() != index.len() => Err(StarIdError::MaskLength {
            expected: index.len(),
            actual: m.len(),
        }),
        Some(m) => Ok(m.clone()),
        None => Ok(Mask::clear(index.len())),
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::{CameraConfig, Star, StarDatabase};

    fn camera() -> Camera {
        // 36"/px: double-star angle 3 px = 0.03 deg, min fov 5 deg
        Camera::new(CameraConfig {
            image_width: 1000,
            image_height: 500,
            pixel_arcseconds: 36.0,
            double_star_pixels: 3.0,
            image_variance: 1.0,
            threshold_factor: 1.0,
            min_stars_per_fov: 2,
            ..Default::default()
        })
        .unwrap()
    }

    fn star(id: u32, ra_deg: f32, dec_deg: f32, flux: f32, unreliable: bool) -> Star {
        Star::from_radec(id, ra_deg.to_radians(), dec_deg.to_radians(), flux, 1e-9, unreliable)
            .unwrap()
    }

    fn masked_ids(index: &SpatialIndex, mask: &Mask) -> Vec<u32> {
        let mut ids: Vec<u32> = mask
            .masked_indices()
            .filter_map(|i| index.get(i).and_then(|s| s.catalog_id()))
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn dimmer_double_is_masked() {
        let cam = camera();
        let db = StarDatabase::from_stars([
            star(0, 10.0, 10.0, 5.5, false),
            star(1, 10.01, 10.0, 5.0, false),
            star(2, 40.0, -5.0, 5.4, false),
        ]);
        let mut index = SpatialIndex::build(&db, 2);
        index.sort();
        let mask = filter_mask(&index, &cam, None).unwrap();
        assert_eq!(masked_ids(&index, &mask), vec![1]);
    }

    #[test]
    fn equal_flux_double_keeps_both_stars() {
        let cam = camera();
        let db = StarDatabase::from_stars([
            star(0, 10.0, 10.0, 5.0, false),
            star(1, 10.01, 10.0, 5.0, false),
        ]);
        let mut index = SpatialIndex::build(&db, 2);
        index.sort();
        let mask = filter_mask(&index, &cam, None).unwrap();
        assert_eq!(mask.count_masked(), 0);

        // A slightly dimmer companion is masked.
        let db = StarDatabase::from_stars([
            star(0, 10.0, 10.0, 5.0, false),
            star(1, 10.01, 10.0, 4.999, false),
        ]);
        let mut index = SpatialIndex::build(&db, 2);
        index.sort();
        let mask = filter_mask(&index, &cam, None).unwrap();
        assert_eq!(masked_ids(&index, &mask), vec![1]);
    }

    #[test]
    fn unreliable_and_dim_stars_are_not_anchors() {
        let cam = camera();
        let db = StarDatabase::from_stars([
            // Bright but unreliable: cannot mask its neighbor.
            star(0, 10.0, 10.0, 9.0, true),
            star(1, 10.01, 10.0, 5.0, false),
            // Below the observable flux: neither anchor nor masked.
            star(2, 50.0, 0.0, 0.5, false),
            star(3, 50.01, 0.0, 0.2, false),
        ]);
        let mut index = SpatialIndex::build(&db, 1);
        index.sort();
        let mask = filter_mask(&index, &cam, None).unwrap();
        assert!(masked_ids(&index, &mask).is_empty());
    }

    #[test]
    fn unreliable_star_can_be_masked_as_neighbor() {
        let cam = camera();
        let db = StarDatabase::from_stars([
            star(0, 10.0, 10.0, 9.0, false),
            star(1, 10.01, 10.0, 5.0, true),
        ]);
        let mut index = SpatialIndex::build(&db, 1);
        index.sort();
        let mask = filter_mask(&index, &cam, None).unwrap();
        assert_eq!(masked_ids(&index, &mask), vec![1]);
    }

    #[test]
    fn filter_mask_is_idempotent() {
        let cam = camera();
        let mut stars = Vec::new();
        for i in 0..40u32 {
            let ra = 20.0 + (i % 8) as f32 * 0.012;
            let dec = (i / 8) as f32 * 0.012;
            stars.push(star(i, ra, dec, 2.0 + ((i * 7) % 11) as f32, i % 5 == 0));
        }
        let db = StarDatabase::from_stars(stars);
        let mut index = SpatialIndex::build(&db, 3);
        index.sort();
        let once = filter_mask(&index, &cam, None).unwrap();
        let twice = filter_mask(&index, &cam, Some(&once)).unwrap();
        assert_eq!(once, twice);
        assert!(once.count_masked() > 0);
    }

    #[test]
    fn uniform_density_keeps_brightest_per_neighborhood() {
        let cam = camera();
        // A tight cluster of five stars; only the two brightest survive.
        let db = StarDatabase::from_stars([
            star(0, 100.0, 20.0, 3.0, false),
            star(1, 100.2, 20.0, 7.0, false),
            star(2, 100.4, 20.0, 5.0, false),
            star(3, 100.0, 20.2, 9.0, false),
            star(4, 100.2, 20.2, 2.0, false),
        ]);
        let mut index = SpatialIndex::build(&db, 2);
        index.sort();
        let mask = uniform_density_mask(&index, &cam, None).unwrap();
        assert_eq!(masked_ids(&index, &mask), vec![0, 2, 4]);
    }

    #[test]
    fn uniform_density_ignores_masked_and_unobservable_stars() {
        let cam = camera();
        let db = StarDatabase::from_stars([
            star(0, 100.0, 20.0, 9.0, false),
            star(1, 100.1, 20.0, 8.0, false),
            star(2, 100.2, 20.0, 7.0, false),
            star(3, 100.3, 20.0, 0.1, false),
        ]);
        let mut index = SpatialIndex::build(&db, 2);
        index.sort();

        let mut start = Mask::clear(index.len());
        let brightest = (0..index.len())
            .find(|&i| index.get(i).unwrap().catalog_id() == Some(0))
            .unwrap();
        start.mark(brightest);

        let mask = uniform_density_mask(&index, &cam, Some(&start)).unwrap();
        // Star 0 was excluded up front and star 3 is too faint to be observed.
        assert_eq!(masked_ids(&index, &mask), vec![0, 3]);
    }

    /// Dense 10 deg patch with a partly masked start.
    fn random_patch(seed: u64, n: usize) -> (StarDatabase, Vec<bool>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let stars = (0..n as u32).map(|i| {
            let ra = 150.0 + rng.random::<f32>() * 10.0;
            let dec = -30.0 + rng.random::<f32>() * 10.0;
            star(i, ra, dec, rng.random_range(0.5..10.0), rng.random::<f32>() < 0.1)
        });
        let db = StarDatabase::from_stars(stars.collect::<Vec<_>>());
        let pre: Vec<bool> = (0..n).map(|_| rng.random::<f32>() < 0.2).collect();
        (db, pre)
    }

    #[test]
    fn neighbor_candidates_match_scratch_mask_search() {
        let cam = camera();
        let (db, pre) = random_patch(11, 1500);
        let mut index = SpatialIndex::build(&db, cam.kdbucket_size());
        index.sort();
        let base = Mask::from(pre);
        let min_flux = cam.min_observable_flux();
        let radius = cam.min_fov() * 0.5;

        let mut checked = 0;
        for (i, anchor) in index.iter().enumerate() {
            if base.is_masked(i) {
                continue;
            }
            let mut scratch = base.clone();
            index
                .masked_search(anchor.uvec(), radius, min_flux, None, &mut scratch)
                .unwrap();
            let expected: Vec<usize> = scratch
                .masked_indices()
                .filter(|&j| !base.is_masked(j))
                .collect();
            let mut found =
                unmasked_neighbors(&index, &base, anchor.uvec(), radius, min_flux).unwrap();
            found.sort_unstable();
            assert_eq!(found, expected);
            checked += 1;
        }
        assert!(checked > 1000);
    }

    #[test]
    fn uniform_density_matches_scratch_mask_reference() {
        let cam = camera();
        let (db, pre) = random_patch(12, 1200);
        let mut index = SpatialIndex::build(&db, cam.kdbucket_size());
        index.sort();
        let base = Mask::from(pre);
        let min_flux = cam.min_observable_flux();
        let radius = cam.min_fov() * 0.5;

        // Straightforward per-anchor scratch mask rendition.
        let mut reference = Mask::new(index.len(), true);
        for (i, anchor) in index.iter().enumerate() {
            if base.is_masked(i) {
                continue;
            }
            let mut scratch = base.clone();
            index
                .masked_search(anchor.uvec(), radius, min_flux, None, &mut scratch)
                .unwrap();
            let fresh: Vec<usize> = scratch
                .masked_indices()
                .filter(|&j| !base.is_masked(j))
                .collect();
            for j in n_brightest(&index, fresh, cam.min_stars_per_fov()) {
                reference.unmark(j);
            }
        }

        let mask = uniform_density_mask(&index, &cam, Some(&base)).unwrap();
        assert_eq!(mask, reference);
        assert!(mask.count_masked() > base.count_masked());
    }

    #[test]
    fn passes_require_sorted_index_and_matching_mask() {
        let cam = camera();
        let db = StarDatabase::from_stars([star(0, 0.0, 0.0, 5.0, false)]);
        let index = SpatialIndex::build(&db, 1);
        assert_eq!(filter_mask(&index, &cam, None), Err(StarIdError::Unsorted));

        let mut index = SpatialIndex::build(&db, 1);
        index.sort();
        let wrong = Mask::clear(3);
        assert_eq!(
            uniform_density_mask(&index, &cam, Some(&wrong)),
            Err(StarIdError::MaskLength { expected: 1, actual: 3 })
        );
    }
}
