//! Camera parameters consumed by the index, masking and matching passes.
//!
//! [`CameraConfig`] holds the raw per-sensor numbers as a caller would keep
//! them in a configuration file; [`Camera`] validates them once and derives
//! the angular quantities everything else works in.
//!
//! # Coordinate conventions
//!
//! Focal-plane coordinates are pixel offsets from the image center, +X right,
//! +Y down. The camera boresight is +Z, so a focal-plane position maps to the
//! line of sight `normalize(px · tx, py · ty, 1)` where `tx`, `ty` are the
//! per-axis tangent-plane pixel scales.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StarIdError};
use crate::Vector3;

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / (180.0 * 3600.0);

fn default_kdbucket_scale() -> f64 {
    3.5
}

/// Raw camera configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Angular size of one pixel in arcseconds.
    pub pixel_arcseconds: f64,
    /// Empirical scale from field-of-view area (deg²) to index bucket capacity.
    #[serde(default = "default_kdbucket_scale")]
    pub kdbucket_scale: f64,
    /// Number of standard deviations accepted when comparing distances.
    pub position_error_sigma: f64,
    /// Floor on the positional variance of any star, radians².
    pub min_position_variance: f64,
    /// Image noise variance (counts²).
    pub image_variance: f64,
    /// Detection threshold as a multiple of `image_variance`.
    pub threshold_factor: f64,
    /// Separation in pixels below which two stars blend into one.
    pub double_star_pixels: f64,
    /// Spurious detections tolerated among the brightest image stars.
    pub max_false_stars: u32,
    /// Stars the thinned catalog should keep per field of view.
    pub min_stars_per_fov: u32,
    /// Independent pair matches required before an identity is accepted.
    pub db_redundancy: u32,
    /// Flux of a magnitude-0 star, in image units.
    pub base_flux: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            image_width: 1024,
            image_height: 768,
            pixel_arcseconds: 40.0,
            kdbucket_scale: default_kdbucket_scale(),
            position_error_sigma: 3.0,
            min_position_variance: 1e-9,
            image_variance: 8.0,
            threshold_factor: 5.0,
            double_star_pixels: 3.0,
            max_false_stars: 2,
            min_stars_per_fov: 10,
            db_redundancy: 2,
            base_flux: 1e5,
        }
    }
}

/// Validated camera with derived angular parameters.
#[derive(Debug, Clone)]
pub struct Camera {
    config: CameraConfig,
    radians_per_pixel: f32,
    max_fov: f32,
    min_fov: f32,
    pixel_x_tangent: f32,
    pixel_y_tangent: f32,
    kdbucket_size: usize,
}

impl Camera {
    /// Validate `config` and derive the angular parameters.
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.image_width == 0 || config.image_height == 0 {
            return Err(StarIdError::InvalidCamera(format!(
                "image dimensions must be non-zero, got {}x{}",
                config.image_width, config.image_height
            )));
        }
        if !(config.pixel_arcseconds > 0.0) || !config.pixel_arcseconds.is_finite() {
            return Err(StarIdError::InvalidCamera(format!(
                "pixel_arcseconds must be positive, got {}",
                config.pixel_arcseconds
            )));
        }
        for (name, value) in [
            ("kdbucket_scale", config.kdbucket_scale),
            ("position_error_sigma", config.position_error_sigma),
            ("min_position_variance", config.min_position_variance),
            ("image_variance", config.image_variance),
            ("threshold_factor", config.threshold_factor),
            ("double_star_pixels", config.double_star_pixels),
            ("base_flux", config.base_flux),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(StarIdError::InvalidCamera(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        let w = config.image_width as f64;
        let h = config.image_height as f64;
        let rpp = config.pixel_arcseconds * ARCSEC_TO_RAD;
        // The tangent-plane projection only covers less than a hemisphere.
        if w * rpp >= std::f64::consts::PI || h * rpp >= std::f64::consts::PI {
            return Err(StarIdError::InvalidCamera(format!(
                "field of view {:.1}x{:.1} deg must stay below 180 deg",
                (w * rpp).to_degrees(),
                (h * rpp).to_degrees()
            )));
        }

        let fov_w_deg = (w * rpp).to_degrees();
        let fov_h_deg = (h * rpp).to_degrees();
        let kdbucket_size = (fov_w_deg * fov_h_deg * config.kdbucket_scale)
            .round()
            .max(1.0) as usize;

        Ok(Self {
            radians_per_pixel: rpp as f32,
            max_fov: (rpp * (w * w + h * h).sqrt()) as f32,
            min_fov: (rpp * w.min(h)) as f32,
            pixel_x_tangent: (2.0 * (w * rpp / 2.0).tan() / w) as f32,
            pixel_y_tangent: (2.0 * (h * rpp / 2.0).tan() / h) as f32,
            kdbucket_size,
            config,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn image_width(&self) -> u32 {
        self.config.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.config.image_height
    }

    pub fn radians_per_pixel(&self) -> f32 {
        self.radians_per_pixel
    }

    /// Diagonal field of view (radians).
    pub fn max_fov(&self) -> f32 {
        self.max_fov
    }

    /// Field of view along the short image axis (radians).
    pub fn min_fov(&self) -> f32 {
        self.min_fov
    }

    pub fn pixel_x_tangent(&self) -> f32 {
        self.pixel_x_tangent
    }

    pub fn pixel_y_tangent(&self) -> f32 {
        self.pixel_y_tangent
    }

    /// Leaf capacity for a [`SpatialIndex`](crate::SpatialIndex) over a catalog
    /// seen by this camera.
    pub fn kdbucket_size(&self) -> usize {
        self.kdbucket_size
    }

    /// Separation (radians) below which two stars are treated as one.
    pub fn double_star_angle(&self) -> f32 {
        (self.config.double_star_pixels * self.radians_per_pixel as f64) as f32
    }

    /// Faintest flux the detector reports.
    pub fn min_observable_flux(&self) -> f32 {
        (self.config.threshold_factor * self.config.image_variance) as f32
    }

    pub fn min_position_variance(&self) -> f32 {
        self.config.min_position_variance as f32
    }

    pub fn image_variance(&self) -> f32 {
        self.config.image_variance as f32
    }

    pub fn position_error_sigma(&self) -> f32 {
        self.config.position_error_sigma as f32
    }

    pub fn min_stars_per_fov(&self) -> usize {
        self.config.min_stars_per_fov as usize
    }

    pub fn max_false_stars(&self) -> usize {
        self.config.max_false_stars as usize
    }

    pub fn db_redundancy(&self) -> u32 {
        self.config.db_redundancy
    }

    pub fn base_flux(&self) -> f32 {
        self.config.base_flux as f32
    }

    /// Number of brightest image stars used for lost-in-space matching.
    pub fn max_candidates(&self) -> usize {
        self.max_false_stars() + self.min_stars_per_fov()
    }

    /// Flux of a star of visual magnitude `mag`.
    pub fn flux_from_magnitude(&self, mag: f32) -> f32 {
        (self.config.base_flux * 10f64.powf(-mag as f64 / 2.5)) as f32
    }

    /// Camera-frame line of sight for a focal-plane offset in pixels.
    pub fn pixel_to_direction(&self, px: f32, py: f32) -> Vector3 {
        let j = self.pixel_x_tangent * px;
        let k = self.pixel_y_tangent * py;
        let z = 1.0 / (j * j + k * k + 1.0).sqrt();
        Vector3::new(j * z, k * z, z)
    }
}
