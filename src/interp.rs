//! Table-based linear interpolation

/// A sampled function y(x), evaluated by linear interpolation.
/// The abscissa must be strictly increasing; evaluation outside
/// the tabulated range clamps to the end values.
#[derive(Clone, Debug)]
pub struct Table {
    x: Vec<f64>,
    y: Vec<f64>,
}

/// Returns i such that xs[i] <= x <= xs[i+1], clamped to the valid range.
fn bracket(xs: &[f64], x: f64) -> usize {
    let n = xs.len();
    let i = xs.partition_point(|&v| v < x);
    i.saturating_sub(1).min(n - 2)
}

impl Table {
    /// Builds a table from matching samples of x and y.
    /// Panics if the lengths differ, fewer than two points are given,
    /// or x is not strictly increasing.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        assert_eq!(x.len(), y.len());
        assert!(x.len() >= 2);
        assert!(x.windows(2).all(|w| w[0] < w[1]));
        Table { x, y }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let i = bracket(&self.x, x);
        let t = (x - self.x[i]) / (self.x[i+1] - self.x[i]);
        let t = t.clamp(0.0, 1.0);
        (1.0 - t) * self.y[i] + t * self.y[i+1]
    }

    /// Returns the table of the inverse function x(y).
    /// Panics unless y is strictly increasing.
    pub fn inverse(self) -> Self {
        Table::new(self.y, self.x)
    }
}

/// A function v(x, y) sampled on a rectilinear grid, evaluated by
/// bilinear interpolation with clamping at the grid edges.
#[derive(Clone, Debug)]
pub struct Grid2 {
    x: Vec<f64>,
    y: Vec<f64>,
    // row-major, v[i * y.len() + j] = v(x[i], y[j])
    v: Vec<f64>,
}

impl Grid2 {
    /// Assembles a grid from scattered (x, y, v) triples, which must
    /// cover every combination of the distinct x and y values exactly once.
    pub fn from_triples(triples: &[(f64, f64, f64)]) -> Option<Self> {
        let mut x: Vec<f64> = triples.iter().map(|t| t.0).collect();
        let mut y: Vec<f64> = triples.iter().map(|t| t.1).collect();
        for v in [&mut x, &mut y] {
            v.sort_by(|a, b| a.partial_cmp(b).unwrap());
            v.dedup();
        }
        if x.len() < 2 || y.len() < 2 || triples.len() != x.len() * y.len() {
            return None;
        }

        let mut v = vec![f64::NAN; x.len() * y.len()];
        for &(tx, ty, tv) in triples {
            let i = x.binary_search_by(|p| p.partial_cmp(&tx).unwrap()).ok()?;
            let j = y.binary_search_by(|p| p.partial_cmp(&ty).unwrap()).ok()?;
            v[i * y.len() + j] = tv;
        }
        if v.iter().any(|e| e.is_nan()) {
            return None;
        }

        Some(Grid2 { x, y, v })
    }

    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let i = bracket(&self.x, x);
        let j = bracket(&self.y, y);
        let tx = ((x - self.x[i]) / (self.x[i+1] - self.x[i])).clamp(0.0, 1.0);
        let ty = ((y - self.y[j]) / (self.y[j+1] - self.y[j])).clamp(0.0, 1.0);
        let ny = self.y.len();
        let f00 = self.v[i * ny + j];
        let f01 = self.v[i * ny + j + 1];
        let f10 = self.v[(i+1) * ny + j];
        let f11 = self.v[(i+1) * ny + j + 1];
        (1.0 - tx) * ((1.0 - ty) * f00 + ty * f01) + tx * ((1.0 - ty) * f10 + ty * f11)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_recovers_line() {
        let x: Vec<f64> = (0..20).map(|i| (i as f64) / 4.0).collect();
        let y: Vec<f64> = x.iter().map(|x| 2.0 * x - 1.0).collect();
        let table = Table::new(x, y);
        for &p in &[0.1, 1.7, 3.3, 4.75] {
            let err = (table.evaluate(p) - (2.0 * p - 1.0)).abs();
            assert!(err < 1.0e-12);
        }
    }

    #[test]
    fn clamps_outside_domain() {
        let table = Table::new(vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]);
        assert_eq!(table.evaluate(0.0), 10.0);
        assert_eq!(table.evaluate(5.0), 30.0);
    }

    #[test]
    fn inverse_of_tanh() {
        let x: Vec<f64> = (0..200).map(|i| 5.0 * (i as f64) / 200.0).collect();
        let y: Vec<f64> = x.iter().map(|x| x.tanh()).collect();
        let inv = Table::new(x, y).inverse();

        let target = 0.22f64;
        let got = inv.evaluate(target.tanh());
        let err = (got - target).abs();
        println!("got {:e}, expected {:e}, error = {:e}", got, target, err);
        assert!(err < 1.0e-4);
    }

    #[test]
    fn bilinear_plane() {
        // exact for any function linear in x and y
        let mut triples = Vec::new();
        for i in 0..4 {
            for j in 0..5 {
                let x = i as f64;
                let y = 0.5 * (j as f64);
                triples.push((x, y, 3.0 * x - 2.0 * y + 1.0));
            }
        }
        let grid = Grid2::from_triples(&triples).unwrap();
        let err = (grid.evaluate(1.3, 1.71) - (3.0 * 1.3 - 2.0 * 1.71 + 1.0)).abs();
        assert!(err < 1.0e-12);
    }

    #[test]
    fn incomplete_grid_rejected() {
        let triples = vec![(0.0, 0.0, 1.0), (0.0, 1.0, 2.0), (1.0, 0.0, 3.0)];
        assert!(Grid2::from_triples(&triples).is_none());
    }
}
