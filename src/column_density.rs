//! Column-density distribution of the absorbers
//!
//! The incidence function f(N, z) is a pluggable strategy: a built-in
//! broken power law by default, or a tabulated cumulative distribution
//! read from an ASCII file. The choice is made once at startup and the
//! selected model is passed to the sampler explicitly.

use std::error::Error;
use std::fmt;
use std::path::Path;

use rand::prelude::*;

use crate::cosmology::Cosmology;
use crate::interp::Grid2;

const LN_10: f64 = std::f64::consts::LN_10;

/// Incidence of absorbers as a function of column density and redshift.
pub trait ColumnDensityModel {
    /// Expected number of absorbers per unit redshift per unit log10 N,
    /// at column density `log_n` (log10 of N in cm^-2) and redshift `z`.
    fn incidence(&self, log_n: f64, z: f64) -> f64;

    /// Expected number of absorbers per unit redshift with log10 N in
    /// `[n_min, n_max]`, integrated on a uniform grid of `nsamp` nodes.
    fn dndz(&self, z: f64, n_min: f64, n_max: f64, nsamp: usize) -> f64 {
        let grid = linspace(n_min, n_max, nsamp);
        let dn = grid[1] - grid[0];
        self.bin_weights(z, &grid).iter().sum::<f64>() * dn
    }

    /// Unnormalized sampling weight of each grid node.
    fn bin_weights(&self, z: f64, grid: &[f64]) -> Vec<f64> {
        grid.iter().map(|&n| self.incidence(n, z)).collect()
    }
}

/// Draws one column density from the model's distribution at redshift
/// `z`, by a categorical draw over the discretized grid plus a uniform
/// offset within the selected bin (which removes the discretization
/// comb from the output).
pub fn sample_column_density<M, R>(model: &M, z: f64, n_min: f64, n_max: f64, nsamp: usize, rng: &mut R) -> f64
where
    M: ColumnDensityModel + ?Sized,
    R: Rng,
{
    let grid = linspace(n_min, n_max, nsamp);
    let dn = grid[1] - grid[0];
    let weights = model.bin_weights(z, &grid);
    let total: f64 = weights.iter().sum();

    if !(total > 0.0) {
        // degenerate model at this redshift
        return n_min + (n_max - n_min) * rng.gen::<f64>();
    }

    let mut u = rng.gen::<f64>() * total;
    for (&n, &w) in grid.iter().zip(weights.iter()) {
        if u < w {
            return n + dn * rng.gen::<f64>();
        }
        u -= w;
    }
    *grid.last().unwrap() + dn * rng.gen::<f64>()
}

fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    (0..n).map(|i| a + (b - a) * (i as f64) / ((n - 1) as f64)).collect()
}

/// Broken power law f(N, X) = A (N/Nb)^alpha, with slope `alpha_lo`
/// below the break column density Nb and `alpha_hi` above, converted
/// from absorption path length X to redshift via dX/dz.
pub struct PowerLawModel {
    cosmo: Cosmology,
    log_amplitude: f64,
    log_break: f64,
    alpha_lo: f64,
    alpha_hi: f64,
}

impl PowerLawModel {
    pub fn new(cosmo: Cosmology, log_amplitude: f64, log_break: f64, alpha_lo: f64, alpha_hi: f64) -> Self {
        PowerLawModel { cosmo, log_amplitude, log_break, alpha_lo, alpha_hi }
    }

    /// log10 f(N, X), per unit N per unit absorption length
    fn log_f(&self, log_n: f64) -> f64 {
        let alpha = if log_n < self.log_break { self.alpha_lo } else { self.alpha_hi };
        self.log_amplitude + alpha * (log_n - self.log_break)
    }
}

impl ColumnDensityModel for PowerLawModel {
    fn incidence(&self, log_n: f64, z: f64) -> f64 {
        // dN/(dz dlog10 N) = f(N, X) N ln10 dX/dz
        LN_10 * 10f64.powf(self.log_f(log_n) + log_n) * self.cosmo.abs_distance_integrand(z)
    }
}

#[derive(Debug)]
pub enum ModelError {
    Io(std::io::Error),
    Parse { line: usize },
    Grid,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelError::Io(e) => write!(f, "failed to read incidence table: {}", e),
            ModelError::Parse { line } => write!(f, "incidence table line {} is not 'z log10(N) value'", line),
            ModelError::Grid => write!(f, "incidence table does not cover a complete (z, log10 N) grid"),
        }
    }
}

impl Error for ModelError {}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        ModelError::Io(e)
    }
}

/// Cumulative incidence read from a three-column ASCII table
/// (z, log10 N, cumulative number per unit redshift below log10 N),
/// interpolated bilinearly.
pub struct TabulatedModel {
    cumulative: Grid2,
}

impl TabulatedModel {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self, ModelError> {
        let mut triples = Vec::new();
        for (i, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace().map(str::parse::<f64>);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(Ok(z)), Some(Ok(n)), Some(Ok(v))) => triples.push((z, n, v)),
                _ => return Err(ModelError::Parse { line: i + 1 }),
            }
        }
        let cumulative = Grid2::from_triples(&triples).ok_or(ModelError::Grid)?;
        Ok(TabulatedModel { cumulative })
    }

    fn cumulative_at(&self, z: f64, log_n: f64) -> f64 {
        self.cumulative.evaluate(z, log_n)
    }
}

impl ColumnDensityModel for TabulatedModel {
    fn incidence(&self, log_n: f64, z: f64) -> f64 {
        let eps = 0.01;
        (self.cumulative_at(z, log_n + eps) - self.cumulative_at(z, log_n - eps)) / (2.0 * eps)
    }

    fn dndz(&self, z: f64, n_min: f64, n_max: f64, _nsamp: usize) -> f64 {
        self.cumulative_at(z, n_max) - self.cumulative_at(z, n_min)
    }

    fn bin_weights(&self, z: f64, grid: &[f64]) -> Vec<f64> {
        // weight of the first node is zero; node i carries the
        // cumulative increment over (grid[i-1], grid[i]]
        let mut weights = Vec::with_capacity(grid.len());
        weights.push(0.0);
        for w in grid.windows(2) {
            weights.push((self.cumulative_at(z, w[1]) - self.cumulative_at(z, w[0])).max(0.0));
        }
        weights
    }
}

#[cfg(test)]
mod tests {
    use rand_xoshiro::*;
    use super::*;

    fn power_law() -> PowerLawModel {
        PowerLawModel::new(Cosmology::default(), -22.5, 21.3, -2.0, -3.0)
    }

    #[test]
    fn dndz_grows_with_upper_bound() {
        let model = power_law();
        let mut prev = 0.0;
        for i in 1..=10 {
            let n_max = 20.0 + 0.25 * (i as f64);
            let got = model.dndz(2.5, 17.2, n_max, 100);
            println!("nmax = {:.2}, dndz = {:e}", n_max, got);
            assert!(got >= prev);
            prev = got;
        }
    }

    #[test]
    fn dndz_grows_with_redshift() {
        // dX/dz increases with z, the power law itself does not evolve
        let model = power_law();
        assert!(model.dndz(3.0, 17.2, 22.5, 100) > model.dndz(2.0, 17.2, 22.5, 100));
    }

    #[test]
    fn samples_stay_in_range() {
        let model = power_law();
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let (n_min, n_max, nsamp) = (17.2, 22.5, 100);
        let dn = (n_max - n_min) / ((nsamp - 1) as f64);
        for _ in 0..1000 {
            let n = sample_column_density(&model, 2.4, n_min, n_max, nsamp, &mut rng);
            assert!(n >= n_min && n <= n_max + dn);
        }
    }

    #[test]
    fn samples_favor_low_columns() {
        // steeply falling f(N) puts most draws below the midpoint
        let model = power_law();
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let below = (0..2000)
            .filter(|_| sample_column_density(&model, 2.4, 17.2, 22.5, 100, &mut rng) < 19.85)
            .count();
        println!("{} of 2000 draws below the midpoint", below);
        assert!(below > 1800);
    }

    #[test]
    fn sampling_is_deterministic() {
        let model = power_law();
        let draw = |seed: u64| -> Vec<f64> {
            let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
            (0..50).map(|_| sample_column_density(&model, 2.4, 17.2, 22.5, 100, &mut rng)).collect()
        };
        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7), draw(8));
    }

    const TABLE: &str = "\
# z  log10N  cumulative
2.0 17.0 0.00
2.0 20.0 0.30
2.0 23.0 0.40
3.0 17.0 0.00
3.0 20.0 0.60
3.0 23.0 0.80
";

    #[test]
    fn tabulated_model_dndz() {
        let model = TabulatedModel::from_str(TABLE).unwrap();
        let got = model.dndz(2.0, 17.0, 23.0, 100);
        assert!((got - 0.4).abs() < 1.0e-12);
        // interpolates between tabulated redshifts
        let mid = model.dndz(2.5, 17.0, 23.0, 100);
        assert!((mid - 0.6).abs() < 1.0e-12);
    }

    #[test]
    fn tabulated_weights_match_cumulative_increments() {
        let model = TabulatedModel::from_str(TABLE).unwrap();
        let grid = [17.0, 20.0, 23.0];
        let w = model.bin_weights(2.0, &grid);
        assert_eq!(w.len(), 3);
        assert_eq!(w[0], 0.0);
        assert!((w[1] - 0.30).abs() < 1.0e-12);
        assert!((w[2] - 0.10).abs() < 1.0e-12);
    }

    #[test]
    fn malformed_table_rejected() {
        assert!(TabulatedModel::from_str("2.0 17.0\n").is_err());
        assert!(TabulatedModel::from_str("2.0 17.0 0.0\n2.0 20.0 0.1\n3.0 17.0 0.0\n").is_err());
    }
}
