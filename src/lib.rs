//! # starid
//!
//! **Lost-in-space star identification**: given the bright points of a star
//! image and a reference catalog, work out which catalog star each point is,
//! with no prior attitude estimate.
//!
//! The crate stops at correspondences (image star ↔ catalog id). Turning those
//! into an attitude is left to the caller.
//!
//! ## Pipeline
//!
//! 1. **Catalog**: Load Hipparcos records into a [`StarDatabase`], propagating
//!    proper motion to the observation epoch ([`catalogs::hipparcos`]).
//! 2. **Index**: Build a [`SpatialIndex`], a bucketed KD-tree over star
//!    directions, and sort it.
//! 3. **Masking**: Suppress double stars and equalize catalog density so
//!    every field of view holds a similar number of usable stars
//!    ([`masking`]).
//! 4. **Constellation table**: Enumerate every pair of working stars closer
//!    than the field of view, sorted by angular distance
//!    ([`ConstellationDatabase`]).
//! 5. **Identification**: Pair up the brightest image stars, look up catalog
//!    pairs of the same distance and vote for star identities
//!    ([`ConstellationDatabase::identify`]).
//!
//! ## Example
//!
//! ```no_run
//! use starid::catalogs::load_hipparcos_catalog_from_file;
//! use starid::{Blob, Camera, CameraConfig, ConstellationDatabase, MatchStatus, ObservedFrame};
//!
//! let camera = Camera::new(CameraConfig::default()).unwrap();
//! let catalog = load_hipparcos_catalog_from_file("data/hip_main.dat", &camera, 2025.0).unwrap();
//! let db = ConstellationDatabase::from_catalog(&catalog.database, &camera).unwrap();
//!
//! // Save for fast loading later, or load a previously saved database
//! db.save_to_file("data/constellations.rkyv").unwrap();
//! let db = ConstellationDatabase::load_from_file("data/constellations.rkyv").unwrap();
//!
//! let mut frame = ObservedFrame::new(&camera);
//! let blobs: Vec<Blob> = Vec::new(); // from an extraction step
//! for blob in &blobs {
//!     frame.add_blob(blob);
//! }
//!
//! let result = db.identify(frame.stars(), &camera);
//! if result.status == MatchStatus::MatchFound {
//!     for c in &result.correspondences {
//!         println!("blob {} is HIP {} ({} votes)", c.observed_index, c.catalog_id, c.votes);
//!     }
//! }
//! ```

pub mod blob;
pub mod camera;
pub mod catalogs;
pub mod constellation;
pub mod error;
pub mod masking;
pub mod matcher;
pub mod spatial_index;
pub mod star;
pub mod star_database;

pub use blob::{Blob, ObservedFrame};
pub use camera::{Camera, CameraConfig};
pub use constellation::Constellation;
pub use error::{Result, StarIdError};
pub use matcher::{
    ConstellationDatabase, Correspondence, DatabaseProperties, MatchResult, MatchStatus,
};
pub use spatial_index::{Mask, SpatialIndex};
pub use star::{Star, StarKind};
pub use star_database::{InstanceCounter, StarDatabase};

// Commonly used types
// 32-bit floats are sufficient: catalog positions are only good to a few
// milliarcseconds and all matching tolerances are far coarser.
pub type Vector3 = nalgebra::Vector3<f32>;
pub type Matrix2 = nalgebra::Matrix2<f32>;
