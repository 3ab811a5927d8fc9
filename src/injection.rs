//! Drawing absorbers into the skewers of one spectra file

use rand::prelude::*;
use rand_distr::Poisson;

use crate::catalog::DlaRecord;
use crate::column_density::{sample_column_density, ColumnDensityModel};
use crate::constants::*;
use crate::cosmology::CellWidth;
use crate::skewer::{redshift_edges, SpectraFile};
use crate::special_functions::norm_sf;
use crate::threshold::BiasThreshold;

pub struct Injector {
    /// Tracer bias the threshold is tuned to reproduce
    pub dla_bias: f64,
    /// Rms of the underlying Gaussian field
    pub sigma_g: f64,
    /// No absorbers below this redshift
    pub z_low: f64,
    /// Range of log10 column densities to draw from
    pub n_min: f64,
    pub n_max: f64,
    pub nsamp: usize,
    /// Optional lower edge for the first redshift bin
    pub extrapolate_z_down: Option<f64>,
    /// Ignore the density threshold and populate every cell in the
    /// forest, for generating a random catalogue
    pub random: bool,
}

impl Default for Injector {
    fn default() -> Self {
        Injector {
            dla_bias: 2.0,
            sigma_g: SIGMA_G,
            z_low: 1.8,
            n_min: 17.2,
            n_max: 22.5,
            nsamp: 100,
            extrapolate_z_down: None,
            random: false,
        }
    }
}

impl Injector {
    /// Whether an absorber may be drawn in the given cell: the density
    /// must exceed the threshold (unless generating randoms), the cell
    /// must lie in the forest of its quasar and above the low-redshift
    /// cutoff, and cells flagged as outside the forest never qualify.
    fn eligible(&self, delta: f64, nu: f64, z_cell: f64, z_qso: f64, dz_qso: f64) -> bool {
        if delta == OUTSIDE_FOREST {
            return false;
        }
        if !self.random && delta <= nu * self.sigma_g {
            return false;
        }
        z_cell < z_qso - dz_qso && z_cell > self.z_low
    }

    /// Draws absorbers for every skewer in `file` and returns their
    /// catalogue records. `dndz` is the calibrated incidence per unit
    /// redshift at each cell of the shared wavelength grid.
    pub fn process_file<R: Rng>(
        &self,
        file: &SpectraFile,
        dndz: &[f64],
        cell_width: &CellWidth,
        threshold: &BiasThreshold,
        model: &dyn ColumnDensityModel,
        rng: &mut R,
    ) -> Vec<DlaRecord> {
        assert_eq!(dndz.len(), file.npix);

        let z_cell = file.cell_redshifts();
        let bias: Vec<f64> = file.growth.iter()
            .map(|d| self.dla_bias * self.sigma_g * d)
            .collect();
        let nu = threshold.thresholds(&bias);

        let edges = redshift_edges(&z_cell, self.extrapolate_z_down);

        // Poisson mean per cell, before the eligibility mask: the
        // expected count in the bin, boosted by the probability that
        // the Gaussian field clears the threshold
        let mu: Vec<f64> = (0..file.npix)
            .map(|i| (edges[i+1] - edges[i]) * dndz[i] / norm_sf(nu[i]))
            .collect();

        let mut records = Vec::new();
        for s in 0..file.nspec {
            let z_qso = file.z_qso[s];
            let dz_qso = cell_width.evaluate(z_qso);
            let delta = file.delta_row(s);
            let velocity = file.velocity_row(s);

            for i in 0..file.npix {
                if !self.eligible(delta[i], nu[i], z_cell[i], z_qso, dz_qso) {
                    continue;
                }
                // the survival function underflows at large nu
                if !mu[i].is_finite() || mu[i] <= 0.0 {
                    continue;
                }
                let count = Poisson::new(mu[i])
                    .map(|p| p.sample(rng) as u64)
                    .unwrap_or(0);
                for _ in 0..count {
                    let z = edges[i] + (edges[i+1] - edges[i]) * rng.gen::<f64>();
                    let log_nhi = sample_column_density(model, z, self.n_min, self.n_max, self.nsamp, rng);
                    records.push(DlaRecord {
                        mock_id: file.thing_id[s],
                        z,
                        dz_rsd: velocity[i] / SPEED_OF_LIGHT,
                        log_nhi,
                        z_qso,
                        z_qso_no_rsd: file.z_qso_no_rsd[s],
                        ra: file.ra[s],
                        dec: file.dec[s],
                    });
                }
            }
        }
        records
    }
}
