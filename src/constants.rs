//! Physical constants and fiducial parameter values

/// Rest-frame wavelength of the Lyman-alpha transition, in Angstroms
pub const LYMAN_ALPHA: f64 = 1215.67;
/// Speed of light in vacuum, units of km/s
pub const SPEED_OF_LIGHT: f64 = 299792.458;
/// Hubble constant in units of 100 km/s/Mpc
pub const HUBBLE_H: f64 = 0.6731;
/// Fiducial matter density parameter
pub const OMEGA_M: f64 = 0.3147;
/// Fiducial dark-energy density parameter
pub const OMEGA_L: f64 = 1.0 - OMEGA_M;
/// Fiducial curvature density parameter
pub const OMEGA_K: f64 = 0.0;
/// RMS of the Gaussian density field the mocks are drawn from
pub const SIGMA_G: f64 = 1.19;
/// Sentinel marking cells outside the observed forest region
pub const OUTSIDE_FOREST: f64 = -1.0e6;
