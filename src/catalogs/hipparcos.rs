//! Loader for the Hipparcos main catalog (`hip_main.dat`, CDS I/239).
//!
//! Records are pipe-delimited. Only a handful of fields are used:
//!
//! | field | content |
//! |---|---|
//! | 1 | HIP number |
//! | 5 | V magnitude |
//! | 6 | variability flag (3 = variable) |
//! | 8, 9 | RA, Dec in degrees at epoch J1991.25 |
//! | 12, 13 | proper motion in RA (·cos δ) and Dec, mas/yr |
//! | 29 | percentage of rejected data |
//!
//! Positions are propagated from J1991.25 to the requested year. A record
//! that cannot be parsed is logged and skipped; it never fails the load.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::{Camera, Star, StarDatabase};

/// Catalog epoch of the Hipparcos positions.
pub const HIPPARCOS_EPOCH: f64 = 1991.25;

/// Below this |cos δ| the RA proper-motion term is not applied.
const MIN_COS_DEC: f64 = 0.05;

const MAS_PER_DEG: f64 = 3.6e6;

/// The fields of one catalog record that identification needs.
#[derive(Debug, Clone, PartialEq)]
pub struct HipparcosRecord {
    pub hip: u32,
    pub vmag: f32,
    /// Variability flag; `None` when blank.
    pub var_flag: Option<u8>,
    pub ra_deg: f64,
    pub dec_deg: f64,
    /// mas/yr, already multiplied by cos δ.
    pub pm_ra: f64,
    /// mas/yr.
    pub pm_dec: f64,
    /// Percentage of rejected data; `None` when blank.
    pub rejected_pct: Option<u8>,
}

impl HipparcosRecord {
    /// A record is reliable when little data was rejected and the star is not
    /// flagged as variable. A blank rejection percentage counts as unreliable.
    pub fn is_unreliable(&self) -> bool {
        let low_rejection = matches!(self.rejected_pct, Some(0) | Some(1));
        let variable = self.var_flag == Some(3);
        !(low_rejection && !variable)
    }

    /// Right ascension and declination in degrees at `year`.
    pub fn position_at(&self, year: f64) -> (f64, f64) {
        let dt = year - HIPPARCOS_EPOCH;
        let dec = self.dec_deg + dt * self.pm_dec / MAS_PER_DEG;
        let cos_dec = dec.to_radians().cos();
        let ra = if cos_dec.abs() > MIN_COS_DEC {
            self.ra_deg + dt * self.pm_ra / (cos_dec * MAS_PER_DEG)
        } else {
            self.ra_deg
        };
        (ra, dec)
    }

    /// Catalog star as seen by `camera` at `year`.
    pub fn to_star(&self, camera: &Camera, year: f64) -> crate::error::Result<Star> {
        let (ra, dec) = self.position_at(year);
        Star::from_radec(
            self.hip,
            ra.to_radians() as f32,
            dec.to_radians() as f32,
            camera.flux_from_magnitude(self.vmag),
            camera.min_position_variance(),
            self.is_unreliable(),
        )
    }
}

/// Outcome of a catalog load.
#[derive(Debug)]
pub struct CatalogLoad {
    pub database: StarDatabase,
    /// Records dropped because they could not be parsed or converted.
    pub skipped: usize,
}

/// Parse one catalog record.
pub fn parse_hipparcos_record(record: &csv::StringRecord) -> Result<HipparcosRecord, String> {
    Ok(HipparcosRecord {
        hip: required(record, 1, "HIP")?,
        vmag: required(record, 5, "Vmag")?,
        var_flag: optional(record, 6, "VarFlag")?,
        ra_deg: required(record, 8, "RAdeg")?,
        dec_deg: required(record, 9, "DEdeg")?,
        pm_ra: required(record, 12, "pmRA")?,
        pm_dec: required(record, 13, "pmDE")?,
        rejected_pct: optional(record, 29, "F1")?,
    })
}

fn optional<T: FromStr>(record: &csv::StringRecord, i: usize, name: &str) -> Result<Option<T>, String> {
    match record.get(i).map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| format!("bad {name} field {s:?}")),
    }
}

fn required<T: FromStr>(record: &csv::StringRecord, i: usize, name: &str) -> Result<T, String> {
    optional(record, i, name)?.ok_or_else(|| format!("missing {name} field"))
}

/// Load the catalog from any reader, propagating positions to `year`.
pub fn load_hipparcos_catalog<R: Read>(reader: R, camera: &Camera, year: f64) -> CatalogLoad {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut database = StarDatabase::with_min_variance(camera.min_position_variance());
    let mut skipped = 0;
    for (line, result) in rdr.records().enumerate() {
        let star = result
            .map_err(|e| e.to_string())
            .and_then(|r| parse_hipparcos_record(&r))
            .and_then(|h| h.to_star(camera, year).map_err(|e| e.to_string()));
        match star {
            Ok(star) => {
                if !database.push(star) {
                    warn!("Hipparcos line {}: duplicate HIP entry ignored", line + 1);
                }
            }
            Err(reason) => {
                warn!("Hipparcos line {}: skipped ({})", line + 1, reason);
                skipped += 1;
            }
        }
    }
    info!(
        "Loaded {} Hipparcos stars at epoch {:.2} ({} records skipped)",
        database.len(),
        year,
        skipped
    );
    CatalogLoad { database, skipped }
}

pub fn load_hipparcos_catalog_from_file<P: AsRef<Path>>(
    path: P,
    camera: &Camera,
    year: f64,
) -> anyhow::Result<CatalogLoad> {
    let file = std::fs::File::open(path.as_ref())?;
    info!("Loading Hipparcos catalog from {}", path.as_ref().display());
    Ok(load_hipparcos_catalog(std::io::BufReader::new(file), camera, year))
}
