//! Image blobs and their conversion to observed stars.
//!
//! A blob is a connected bright region found by whatever extraction step the
//! caller runs. Only its raw image moments and a sampled brightness are
//! needed here. Image coordinates have the origin at the top-left pixel,
//! +X right and +Y down.

use tracing::warn;

use crate::{Camera, Matrix2, Star, StarDatabase};

/// Blobs larger than this many pixels are suspiciously extended for a star.
const PLANET_AREA: f64 = 100.0;

/// Raw image moments of a blob plus its brightness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m11: f64,
    pub m20: f64,
    pub m02: f64,
    /// Brightness sampled at the centroid.
    pub flux: f32,
}

impl Blob {
    /// Moments of a set of equally weighted pixel positions.
    pub fn from_pixels<I: IntoIterator<Item = (f32, f32)>>(pixels: I, flux: f32) -> Self {
        let mut b = Blob {
            m00: 0.0,
            m10: 0.0,
            m01: 0.0,
            m11: 0.0,
            m20: 0.0,
            m02: 0.0,
            flux,
        };
        for (x, y) in pixels {
            let (x, y) = (x as f64, y as f64);
            b.m00 += 1.0;
            b.m10 += x;
            b.m01 += y;
            b.m11 += x * y;
            b.m20 += x * x;
            b.m02 += y * y;
        }
        b
    }

    /// Area in pixels.
    pub fn area(&self) -> f64 {
        self.m00
    }

    /// Center of mass in image coordinates, `None` for an empty blob.
    pub fn centroid(&self) -> Option<(f32, f32)> {
        if !(self.m00 > 0.0) {
            return None;
        }
        Some(((self.m10 / self.m00) as f32, (self.m01 / self.m00) as f32))
    }

    /// Second central moments `[[μ20, μ11], [μ11, μ02]]`, `None` for an empty blob.
    pub fn covariance(&self) -> Option<Matrix2> {
        if !(self.m00 > 0.0) {
            return None;
        }
        let cx = self.m10 / self.m00;
        let cy = self.m01 / self.m00;
        let u11 = self.m11 / self.m00 - cx * cy;
        let u20 = self.m20 / self.m00 - cx * cx;
        let u02 = self.m02 / self.m00 - cy * cy;
        Some(Matrix2::new(u20 as f32, u11 as f32, u11 as f32, u02 as f32))
    }

    /// Convert to an observed star with synthetic id `id`.
    ///
    /// Returns `None` when the blob has no area or no positive flux. The
    /// positional variance grows with the blob's spread and shrinks with its
    /// brightness, floored at the camera's minimum.
    pub fn to_star(&self, camera: &Camera, id: u32) -> Option<Star> {
        let (cx, cy) = self.centroid()?;
        let cov = self.covariance()?;
        if !(self.flux > 0.0) || !self.flux.is_finite() {
            return None;
        }
        if self.area() > PLANET_AREA {
            warn!("possible planet: blob {} covers {:.0} pixels", id, self.area());
        }

        let px = cx - camera.image_width() as f32 / 2.0;
        let py = cy - camera.image_height() as f32 / 2.0;
        let direction = camera.pixel_to_direction(px, py);

        let rpp = camera.radians_per_pixel();
        let spread = (0.5 * cov.trace()).max(0.0);
        let variance = (rpp * rpp * spread * camera.image_variance() / self.flux)
            .max(camera.min_position_variance())
            .max(f32::MIN_POSITIVE);

        Star::observed(id, px, py, direction, self.flux, variance).ok()
    }
}

/// Observed stars of one image, with the per-blob measurements kept
/// alongside. `centroids[i]`, `covariances[i]` and `fluxes[i]` describe
/// `stars.get(i)`.
#[derive(Debug)]
pub struct ObservedFrame<'a> {
    camera: &'a Camera,
    stars: StarDatabase,
    centroids: Vec<(f32, f32)>,
    covariances: Vec<Matrix2>,
    fluxes: Vec<f32>,
}

impl<'a> ObservedFrame<'a> {
    pub fn new(camera: &'a Camera) -> Self {
        Self {
            camera,
            stars: StarDatabase::with_min_variance(camera.min_position_variance()),
            centroids: Vec::new(),
            covariances: Vec::new(),
            fluxes: Vec::new(),
        }
    }

    /// Convert `blob` and add it. Returns `false` if the blob is not an
    /// observable star, in which case nothing is recorded.
    pub fn add_blob(&mut self, blob: &Blob) -> bool {
        let id = self.stars.len() as u32;
        let Some(star) = blob.to_star(self.camera, id) else {
            return false;
        };
        let (Some(centroid), Some(cov)) = (blob.centroid(), blob.covariance()) else {
            return false;
        };
        if !self.stars.push(star) {
            return false;
        }
        self.centroids.push(centroid);
        self.covariances.push(cov);
        self.fluxes.push(blob.flux);
        true
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn stars(&self) -> &StarDatabase {
        &self.stars
    }

    pub fn centroids(&self) -> &[(f32, f32)] {
        &self.centroids
    }

    pub fn covariances(&self) -> &[Matrix2] {
        &self.covariances
    }

    pub fn fluxes(&self) -> &[f32] {
        &self.fluxes
    }

    pub fn into_database(self) -> StarDatabase {
        self.stars
    }
}
