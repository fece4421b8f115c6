//! Database generation: builds the sorted constellation table from a catalog.
//!
//! 1. Index the catalog and sort the index.
//! 2. Suppress double stars, then equalize density ([`crate::masking`]).
//! 3. Copy the surviving stars into a working catalog and index it.
//! 4. Cone-search around every working star with the diagonal FOV and record
//!    each pair once.
//! 5. Sort the pairs by distance and number them.

use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StarIdError};
use crate::masking::{filter_mask, uniform_density_mask};
use crate::{Camera, Constellation, Mask, SpatialIndex, Star, StarDatabase};

use super::{ConstellationDatabase, DatabaseProperties};

// ── Database generation ─────────────────────────────────────────────────────

impl ConstellationDatabase {
    /// Build the database from a raw catalog, applying both masking passes.
    pub fn from_catalog(catalog: &StarDatabase, camera: &Camera) -> Result<Self> {
        if catalog.is_empty() {
            return Err(StarIdError::EmptyDatabase);
        }
        let mut index = SpatialIndex::build(catalog, camera.kdbucket_size());
        index.sort();

        let doubles = filter_mask(&index, camera, None)?;
        info!(
            "Double-star mask: {} of {} stars masked",
            doubles.count_masked(),
            index.len()
        );
        let uniform = uniform_density_mask(&index, camera, Some(&doubles))?;
        info!(
            "Uniform-density mask: {} of {} stars kept",
            index.len() - uniform.count_masked(),
            index.len()
        );

        Self::build(&index, Some(&uniform), camera)
    }

    /// Build the database from an already sorted catalog index and an
    /// optional mask of stars to leave out.
    pub fn build(index: &SpatialIndex, mask: Option<&Mask>, camera: &Camera) -> Result<Self> {
        if !index.is_sorted() {
            return Err(StarIdError::Unsorted);
        }
        let working = index.to_database(mask)?;
        if working.is_empty() {
            return Err(StarIdError::EmptyDatabase);
        }

        let max_fov = camera.max_fov();
        let mut working_index = SpatialIndex::build(&working, camera.kdbucket_size());
        working_index.sort();

        let mut pairs: Vec<Constellation> = Vec::new();
        for (i, star) in working_index.iter().enumerate() {
            for j in working_index.search_positions(star.uvec(), max_fov, f32::NEG_INFINITY)? {
                if j <= i {
                    continue;
                }
                if let Some(other) = working_index.get(j) {
                    pairs.push(Constellation::new(0, *star, *other));
                }
            }
        }
        pairs.sort_unstable();

        let constellations: Vec<Constellation> = pairs
            .iter()
            .enumerate()
            .map(|(i, c)| Constellation::with_distance(i as u32, *c.first(), *c.second(), c.distance()))
            .collect();

        let props = DatabaseProperties {
            max_fov_rad: max_fov,
            kdbucket_size: camera.kdbucket_size() as u32,
            num_catalog_stars: index.len() as u32,
            num_stars: working.len() as u32,
            num_constellations: constellations.len() as u32,
            catalog_max_variance: working.max_variance().max(camera.min_position_variance()),
        };
        info!(
            "Constellation table: {} pairs over {} stars (max fov {:.2}°)",
            props.num_constellations,
            props.num_stars,
            max_fov.to_degrees()
        );

        Ok(Self {
            catalog: working,
            constellations,
            props,
        })
    }
}

// ── Serialization ───────────────────────────────────────────────────────────

/// On-disk form. The working catalog is stored as a plain star list and its
/// lookup table is rebuilt on load.
#[derive(Archive, Serialize, Deserialize)]
struct StoredDatabase {
    stars: Vec<Star>,
    constellations: Vec<Constellation>,
    props: DatabaseProperties,
}

impl ConstellationDatabase {
    /// Serialize the database to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let stored = StoredDatabase {
            stars: self.catalog.stars().to_vec(),
            constellations: self.constellations.clone(),
            props: self.props.clone(),
        };
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&stored)
            .map_err(|e| anyhow::anyhow!("rkyv serialization failed: {}", e))?;
        Ok(bytes.to_vec())
    }

    /// Deserialize a database previously produced by [`to_rkyv_bytes`](Self::to_rkyv_bytes).
    pub fn from_rkyv_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        // Archived data must be aligned; a plain byte buffer may not be.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        let stored = rkyv::from_bytes::<StoredDatabase, rkyv::rancor::Error>(&aligned)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))?;

        let mut catalog = StarDatabase::with_min_variance(stored.props.catalog_max_variance);
        catalog.extend(stored.stars);
        if catalog.len() != stored.props.num_stars as usize
            || stored.constellations.len() != stored.props.num_constellations as usize
        {
            anyhow::bail!(
                "inconsistent database: {} stars and {} pairs, properties say {} and {}",
                catalog.len(),
                stored.constellations.len(),
                stored.props.num_stars,
                stored.props.num_constellations
            );
        }
        Ok(Self {
            catalog,
            constellations: stored.constellations,
            props: stored.props,
        })
    }

    /// Save the database to a file using rkyv.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let bytes = self.to_rkyv_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(
            "Saved database to {} ({} bytes)",
            path.as_ref().display(),
            bytes.len()
        );
        Ok(())
    }

    /// Load a database from an rkyv file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let db = Self::from_rkyv_bytes(&bytes)?;
        info!(
            "Loaded database: {} stars, {} constellations",
            db.catalog.len(),
            db.props.num_constellations
        );
        Ok(db)
    }
}
