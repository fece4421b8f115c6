use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{Result, StarIdError};
use crate::Vector3;

/// Mixed into the hash of observed stars so a synthetic id never collides
/// with the same number used as a catalog id.
const OBSERVED_HASH_TAG: u64 = 0x9e37_79b9_7f4a_7c15;

/// Where a star came from.
///
/// Catalog stars carry a stable catalog id and a reliability flag; observed
/// stars carry their focal-plane position instead. Neither carries fields that
/// are meaningless for it.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub enum StarKind {
    Catalog {
        /// Catalog identifier (e.g. HIP number).
        id: u32,
        /// Variable brightness or poor astrometric quality.
        unreliable: bool,
    },
    Observed {
        /// Synthetic id assigned by the producer of the observation (e.g. blob order).
        id: u32,
        /// Pixels right of the image center.
        px: f32,
        /// Pixels below the image center.
        py: f32,
    },
}

/// A point on the celestial sphere with a brightness and a positional uncertainty.
///
/// Stars are immutable once built. Equality is identity: two stars are equal
/// when their hashes are equal.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
pub struct Star {
    direction: [f32; 3],
    flux: f32,
    variance: f32,
    kind: StarKind,
    hash: u64,
}

impl Star {
    /// Create a catalog star from a (possibly non-unit) direction vector.
    pub fn catalog(
        id: u32,
        direction: Vector3,
        flux: f32,
        variance: f32,
        unreliable: bool,
    ) -> Result<Self> {
        Self::build(
            direction,
            flux,
            variance,
            StarKind::Catalog { id, unreliable },
            mix_hash(id as u64),
        )
    }

    /// Create a catalog star from right ascension and declination in radians.
    pub fn from_radec(
        id: u32,
        ra_rad: f32,
        dec_rad: f32,
        flux: f32,
        variance: f32,
        unreliable: bool,
    ) -> Result<Self> {
        Self::catalog(id, radec_to_uvec(ra_rad, dec_rad), flux, variance, unreliable)
    }

    /// Create an observed star. `direction` is the camera-frame line of sight
    /// for the focal-plane position `(px, py)`.
    pub fn observed(
        id: u32,
        px: f32,
        py: f32,
        direction: Vector3,
        flux: f32,
        variance: f32,
    ) -> Result<Self> {
        Self::build(
            direction,
            flux,
            variance,
            StarKind::Observed { id, px, py },
            mix_hash(id as u64 ^ OBSERVED_HASH_TAG),
        )
    }

    fn build(direction: Vector3, flux: f32, variance: f32, kind: StarKind, hash: u64) -> Result<Self> {
        let norm = direction.norm();
        if !norm.is_finite() || norm <= f32::EPSILON {
            return Err(StarIdError::DegenerateDirection(
                direction.x,
                direction.y,
                direction.z,
            ));
        }
        if !flux.is_finite() || flux < 0.0 {
            return Err(StarIdError::InvalidFlux(flux));
        }
        if !variance.is_finite() || variance <= 0.0 {
            return Err(StarIdError::InvalidVariance(variance));
        }
        let d = direction / norm;
        Ok(Self {
            direction: [d.x, d.y, d.z],
            flux,
            variance,
            kind,
            hash,
        })
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.direction[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.direction[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.direction[2]
    }

    /// Unit vector pointing to the star.
    pub fn uvec(&self) -> Vector3 {
        Vector3::new(self.direction[0], self.direction[1], self.direction[2])
    }

    pub fn direction(&self) -> [f32; 3] {
        self.direction
    }

    pub fn flux(&self) -> f32 {
        self.flux
    }

    /// Positional variance in radians².
    pub fn variance(&self) -> f32 {
        self.variance
    }

    pub fn kind(&self) -> StarKind {
        self.kind
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Catalog id, or `None` for an observed star.
    pub fn catalog_id(&self) -> Option<u32> {
        match self.kind {
            StarKind::Catalog { id, .. } => Some(id),
            StarKind::Observed { .. } => None,
        }
    }

    /// Focal-plane offset from the image center, or `None` for a catalog star.
    pub fn focal_plane(&self) -> Option<(f32, f32)> {
        match self.kind {
            StarKind::Observed { px, py, .. } => Some((px, py)),
            StarKind::Catalog { .. } => None,
        }
    }

    /// Only catalog stars can be unreliable.
    pub fn is_unreliable(&self) -> bool {
        matches!(self.kind, StarKind::Catalog { unreliable: true, .. })
    }

    /// Angular separation in radians.
    ///
    /// Uses `atan2(|a × b|, a · b)`, which stays accurate for both tiny and
    /// near-antipodal separations.
    pub fn angle_to(&self, other: &Star) -> f32 {
        let a = self.uvec();
        let b = other.uvec();
        a.cross(&b).norm().atan2(a.dot(&b))
    }

    /// Euclidean (chord) distance between the two unit vectors.
    pub fn chord_to(&self, other: &Star) -> f32 {
        (self.uvec() - other.uvec()).norm()
    }
}

impl PartialEq for Star {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Star {}

/// Unit vector for a right ascension / declination pair in radians.
pub fn radec_to_uvec(ra_rad: f32, dec_rad: f32) -> Vector3 {
    let (rasin, racos) = ra_rad.sin_cos();
    let (decsin, deccos) = dec_rad.sin_cos();
    Vector3::new(deccos * racos, deccos * rasin, decsin)
}

/// Chord length between two points on the unit sphere → center angle (radians).
#[inline]
pub fn angle_from_distance(dist: f32) -> f32 {
    2.0 * (0.5 * dist).clamp(-1.0, 1.0).asin()
}

/// Center angle (radians) → chord length between two points on the unit sphere.
#[inline]
pub fn distance_from_angle(angle: f32) -> f32 {
    2.0 * (angle.clamp(0.0, std::f32::consts::PI) / 2.0).sin()
}

/// splitmix64 finalizer; spreads sequential ids over the whole u64 range.
fn mix_hash(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
