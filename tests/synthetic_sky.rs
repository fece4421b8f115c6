//! Shared synthetic sky helpers.
//!
//! Generates a random catalog in the Hipparcos text layout, points a camera at
//! it and renders the visible stars as single-pixel blobs, remembering which
//! catalog star produced each one.

#![allow(dead_code)]

use nalgebra::{Matrix3, Rotation3};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use starid::star::radec_to_uvec;
use starid::{Blob, Camera, CameraConfig, ObservedFrame, StarDatabase, Vector3};

/// One generated catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub hip: u32,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub vmag: f32,
}

/// 20° square camera with tight positional variances.
pub fn camera() -> Camera {
    Camera::new(CameraConfig {
        image_width: 1024,
        image_height: 1024,
        pixel_arcseconds: 72.0,
        position_error_sigma: 3.0,
        min_position_variance: 1e-12,
        image_variance: 1.0,
        threshold_factor: 1.0,
        double_star_pixels: 3.0,
        max_false_stars: 2,
        min_stars_per_fov: 10,
        db_redundancy: 4,
        base_flux: 1e4,
        ..Default::default()
    })
    .expect("valid camera")
}

/// `n` stars uniformly distributed over the sphere, magnitudes 1 to 6.
pub fn random_catalog(rng: &mut StdRng, n: usize) -> Vec<Entry> {
    (0..n)
        .map(|i| {
            let ra: f64 = rng.random::<f64>() * 360.0;
            let dec: f64 = (rng.random::<f64>() * 2.0 - 1.0).asin().to_degrees();
            Entry {
                hip: 1000 + i as u32,
                ra_deg: ra,
                dec_deg: dec,
                vmag: rng.random_range(1.0..6.0),
            }
        })
        .collect()
}

/// Render entries as `hip_main.dat` records with zero proper motion.
pub fn hipparcos_text(entries: &[Entry]) -> String {
    let mut out = String::new();
    for e in entries {
        let mut f = vec![String::new(); 78];
        f[0] = "H".into();
        f[1] = format!("{:>12}", e.hip);
        f[5] = format!("{:5.2}", e.vmag);
        f[6] = " ".into();
        f[8] = format!("{:12.8}", e.ra_deg);
        f[9] = format!("{:12.8}", e.dec_deg);
        f[12] = "    0.00".into();
        f[13] = "    0.00".into();
        f[29] = " 0".into();
        out.push_str(&f.join("|"));
        out.push('\n');
    }
    out
}

/// Rotation taking inertial vectors to the camera frame for a boresight at
/// (`ra`, `dec`) and a roll about the boresight, all in radians.
pub fn pointing(ra: f32, dec: f32, roll: f32) -> Matrix3<f32> {
    let cam_z = radec_to_uvec(ra, dec);
    let north = if cam_z.z.abs() > 0.99 { Vector3::x() } else { Vector3::z() };
    let cam_x = north.cross(&cam_z).normalize();
    let cam_y = cam_z.cross(&cam_x);
    let rot = Matrix3::new(
        cam_x.x, cam_x.y, cam_x.z, cam_y.x, cam_y.y, cam_y.z, cam_z.x, cam_z.y, cam_z.z,
    );
    Rotation3::from_axis_angle(&Vector3::z_axis(), roll).matrix() * rot
}

/// Random pointing.
pub fn random_pointing(rng: &mut StdRng) -> Matrix3<f32> {
    let ra: f32 = rng.random::<f32>() * 2.0 * std::f32::consts::PI;
    let dec: f32 = (rng.random::<f32>() * 2.0 - 1.0).asin();
    let roll: f32 = rng.random::<f32>() * 2.0 * std::f32::consts::PI;
    pointing(ra, dec, roll)
}

/// Focal-plane offsets (pixels from center) and fluxes of catalog stars
/// inside the image, with the catalog id of each.
pub fn visible(catalog: &StarDatabase, camera: &Camera, rot: &Matrix3<f32>) -> Vec<(f32, f32, f32, u32)> {
    let half_w = camera.image_width() as f32 / 2.0;
    let half_h = camera.image_height() as f32 / 2.0;
    let mut out = Vec::new();
    for star in catalog {
        let v = rot * star.uvec();
        if v.z <= 0.0 {
            continue;
        }
        let px = v.x / v.z / camera.pixel_x_tangent();
        let py = v.y / v.z / camera.pixel_y_tangent();
        if px.abs() >= half_w - 1.0 || py.abs() >= half_h - 1.0 {
            continue;
        }
        if let Some(id) = star.catalog_id() {
            out.push((px, py, star.flux(), id));
        }
    }
    out
}

/// Rendered image: observed stars plus the catalog id behind each one
/// (`None` for a false star).
pub struct Frame<'a> {
    pub observed: ObservedFrame<'a>,
    pub truth: Vec<Option<u32>>,
}

/// Render `stars` (from [`visible`]) and `false_stars` as single-pixel blobs
/// with Gaussian centroid noise of `noise_px` pixels.
pub fn render<'a>(
    camera: &'a Camera,
    stars: &[(f32, f32, f32, u32)],
    false_stars: &[(f32, f32, f32)],
    noise_px: f64,
    rng: &mut StdRng,
) -> Frame<'a> {
    let noise = Normal::new(0.0, noise_px).expect("valid noise");
    let half_w = camera.image_width() as f64 / 2.0;
    let half_h = camera.image_height() as f64 / 2.0;

    let mut observed = ObservedFrame::new(camera);
    let mut truth = Vec::new();
    let all = stars
        .iter()
        .map(|&(px, py, f, id)| (px, py, f, Some(id)))
        .chain(false_stars.iter().map(|&(px, py, f)| (px, py, f, None)));
    for (px, py, flux, id) in all {
        let x = px as f64 + half_w + noise.sample(rng);
        let y = py as f64 + half_h + noise.sample(rng);
        let blob = Blob::from_pixels([(x as f32, y as f32)], flux);
        if observed.add_blob(&blob) {
            truth.push(id);
        }
    }
    Frame { observed, truth }
}
