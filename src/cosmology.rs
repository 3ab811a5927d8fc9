//! Background cosmology and the comoving-distance <-> redshift mapping

use crate::constants::*;
use crate::interp::Table;
use crate::quadrature;

/// Flat (or nearly flat) Lambda-CDM background.
#[derive(Copy, Clone, Debug)]
pub struct Cosmology {
    pub omega_m: f64,
    pub omega_k: f64,
    pub omega_l: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Cosmology { omega_m: OMEGA_M, omega_k: OMEGA_K, omega_l: OMEGA_L }
    }
}

impl Cosmology {
    /// Dimensionless Hubble rate E(z) = H(z)/H0.
    pub fn e_z(&self, z: f64) -> f64 {
        let a = 1.0 + z;
        (self.omega_m * a.powi(3) + self.omega_k * a * a + self.omega_l).sqrt()
    }

    /// Comoving distance to redshift `z`, in Mpc/h.
    pub fn comoving_distance(&self, z: f64) -> f64 {
        let f = |z: f64| 1.0 / self.e_z(z);
        0.01 * SPEED_OF_LIGHT * quadrature::integrate_composite(f, 0.0, z, 8)
    }

    /// Derivative of the absorption path length X with respect to z.
    pub fn abs_distance_integrand(&self, z: f64) -> f64 {
        (1.0 + z).powi(2) / self.e_z(z)
    }
}

/// Redshift interval spanned by one comoving cell, as a function of
/// the redshift of that cell. Used to keep a DLA out of the cell that
/// hosts its own quasar.
pub struct CellWidth {
    table: Table,
}

impl CellWidth {
    /// Tabulates dz(z) for cells of comoving size `cell_size` (Mpc/h)
    /// over `[z_min, z_max]`, sampled at `nbin` points of a uniform
    /// comoving grid.
    pub fn new(cosmo: &Cosmology, cell_size: f64, z_min: f64, z_max: f64, nbin: usize) -> Self {
        // forward mapping z -> r, extended past z_max so that r + cell_size
        // stays inside the inverse table
        let z_hi = z_max + 0.5;
        let n_fwd = 2000;
        let mut z_fwd = Vec::with_capacity(n_fwd + 1);
        let mut r_fwd = Vec::with_capacity(n_fwd + 1);
        let mut r = 0.0;
        let mut z_prev = 0.0;
        for i in 0..=n_fwd {
            let z = z_hi * (i as f64) / (n_fwd as f64);
            r += 0.01 * SPEED_OF_LIGHT * quadrature::integrate(|z| 1.0 / cosmo.e_z(z), z_prev, z);
            z_fwd.push(z);
            r_fwd.push(r);
            z_prev = z;
        }
        let z_of_r = Table::new(r_fwd.clone(), z_fwd);

        let r_min = cosmo.comoving_distance(z_min);
        let r_max = cosmo.comoving_distance(z_max);
        let mut z_vec = Vec::with_capacity(nbin);
        let mut dz_vec = Vec::with_capacity(nbin);
        for i in 0..nbin {
            let r = r_min + (r_max - r_min) * (i as f64) / ((nbin - 1) as f64);
            z_vec.push(z_of_r.evaluate(r));
            dz_vec.push(z_of_r.evaluate(r + cell_size) - z_of_r.evaluate(r));
        }

        CellWidth { table: Table::new(z_vec, dz_vec) }
    }

    /// Redshift width of one cell at redshift `z` (clamped to the
    /// tabulated range).
    pub fn evaluate(&self, z: f64) -> f64 {
        self.table.evaluate(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_vanishes_at_origin() {
        let cosmo = Cosmology::default();
        assert_eq!(cosmo.comoving_distance(0.0), 0.0);
        assert!(cosmo.comoving_distance(2.0) > 0.0);
    }

    #[test]
    fn distance_magnitude() {
        // chi(z = 2.3) is around 4000 Mpc/h for Planck-like parameters
        let cosmo = Cosmology::default();
        let r = cosmo.comoving_distance(2.3);
        println!("chi(2.3) = {:.1} Mpc/h", r);
        assert!(r > 3500.0 && r < 4500.0);
    }

    #[test]
    fn cell_width_matches_hubble_rate() {
        // dz = H(z) dr / c with dr in Mpc reduces to 100 E(z) L / c
        // for a cell of size L in Mpc/h
        let cosmo = Cosmology::default();
        let cell = 2.19;
        let width = CellWidth::new(&cosmo, cell, 1.3, 4.0, 500);
        for &z in &[1.5, 2.0, 2.5, 3.0, 3.5] {
            let got = width.evaluate(z);
            let expected = 100.0 * cosmo.e_z(z) * cell / SPEED_OF_LIGHT;
            let err = (got - expected).abs() / expected;
            println!("z = {}, dz = {:e}, expected {:e}, error = {:e}", z, got, expected, err);
            assert!(err < 1.0e-2);
        }
    }

    #[test]
    fn cell_width_grows_with_redshift() {
        let width = CellWidth::new(&Cosmology::default(), 2.19, 1.3, 4.0, 500);
        assert!(width.evaluate(3.5) > width.evaluate(1.5));
    }
}
