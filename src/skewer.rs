//! In-memory model of one mock spectra file

use std::error::Error;
use std::fmt;
use std::path::Path;

use crate::constants::*;
use crate::fits::{FitsError, FitsFile};

#[derive(Debug)]
pub enum SkewerError {
    Fits(FitsError),
    Shape(String),
}

impl fmt::Display for SkewerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkewerError::Fits(e) => write!(f, "{}", e),
            SkewerError::Shape(s) => write!(f, "inconsistent array shapes: {}", s),
        }
    }
}

impl Error for SkewerError {}

impl From<FitsError> for SkewerError {
    fn from(e: FitsError) -> Self {
        SkewerError::Fits(e)
    }
}

/// One spectra file: quasar metadata plus the per-cell fields of every
/// skewer, on a wavelength grid shared by all skewers in the file.
pub struct SpectraFile {
    pub thing_id: Vec<i64>,
    pub ra: Vec<f64>,
    pub dec: Vec<f64>,
    /// Quasar redshift, with redshift-space distortion
    pub z_qso: Vec<f64>,
    /// Quasar redshift without redshift-space distortion
    pub z_qso_no_rsd: Vec<f64>,
    /// Observed wavelength of each cell, in Angstroms
    pub lambda: Vec<f64>,
    /// Density contrast, nspec x npix, row per skewer
    pub delta: Vec<f64>,
    /// Line-of-sight peculiar velocity in km/s, nspec x npix
    pub velocity: Vec<f64>,
    /// Linear growth factor per cell
    pub growth: Vec<f64>,
    pub nspec: usize,
    pub npix: usize,
}

impl SpectraFile {
    pub fn load(path: &Path) -> Result<Self, SkewerError> {
        let fits = FitsFile::open(path)?;

        let qso = fits.hdu_by_name("METADATA")?;
        let thing_id = qso.column_i64("THING_ID")?;
        let ra = qso.column_f64("RA")?;
        let dec = qso.column_f64("DEC")?;
        let z_qso = qso.column_f64("Z")?;
        let z_qso_no_rsd = qso.column_f64("Z_noRSD")?;

        let (_, lambda) = fits.hdu_by_name("LAMBDA")?.image_f64()?;
        let (delta_axes, delta) = fits.hdu_by_name("DELTA")?.image_f64()?;
        let (velo_axes, velocity) = fits.hdu_by_name("VELO_PAR")?.image_f64()?;
        let (_, growth) = fits.hdu_by_name("GROWTHF")?.image_f64()?;

        let nspec = z_qso.len();
        let npix = lambda.len();

        // the redshift bin edges need at least two cells
        if npix < 2 {
            return Err(SkewerError::Shape(format!(
                "wavelength grid has only {} cell{}", npix, if npix == 1 {""} else {"s"},
            )));
        }
        if delta.len() != nspec * npix || delta_axes.first() != Some(&npix) {
            return Err(SkewerError::Shape(format!(
                "DELTA is {:?} for {} skewers of {} cells", delta_axes, nspec, npix,
            )));
        }
        if velocity.len() != nspec * npix || velo_axes.first() != Some(&npix) {
            return Err(SkewerError::Shape(format!(
                "VELO_PAR is {:?} for {} skewers of {} cells", velo_axes, nspec, npix,
            )));
        }
        if growth.len() < npix {
            return Err(SkewerError::Shape(format!(
                "GROWTHF has {} values for {} cells", growth.len(), npix,
            )));
        }
        let growth = growth[..npix].to_vec();

        Ok(SpectraFile {
            thing_id, ra, dec, z_qso, z_qso_no_rsd,
            lambda, delta, velocity, growth,
            nspec, npix,
        })
    }

    /// Redshift of each cell on the shared wavelength grid.
    pub fn cell_redshifts(&self) -> Vec<f64> {
        cell_redshifts(&self.lambda)
    }

    pub fn delta_row(&self, skewer: usize) -> &[f64] {
        &self.delta[skewer * self.npix..(skewer + 1) * self.npix]
    }

    pub fn velocity_row(&self, skewer: usize) -> &[f64] {
        &self.velocity[skewer * self.npix..(skewer + 1) * self.npix]
    }
}

pub fn cell_redshifts(lambda: &[f64]) -> Vec<f64> {
    lambda.iter().map(|l| l / LYMAN_ALPHA - 1.0).collect()
}

/// Edges of the redshift bins: midpoints between adjacent cells, with
/// the first cell's own redshift as the lower edge unless an explicit
/// extrapolation redshift below it is supplied. The upper edge
/// extrapolates the final spacing by half a cell.
pub fn redshift_edges(z_cell: &[f64], extrapolate_down: Option<f64>) -> Vec<f64> {
    let n = z_cell.len();
    let mut edges = Vec::with_capacity(n + 1);

    let first = match extrapolate_down {
        Some(z) if z < z_cell[0] => z,
        _ => z_cell[0],
    };
    edges.push(first);
    for w in z_cell.windows(2) {
        edges.push(0.5 * (w[0] + w[1]));
    }
    edges.push(z_cell[n-1] + 0.5 * (z_cell[n-1] - z_cell[n-2]));
    edges
}
