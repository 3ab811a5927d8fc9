//! Calibration file parsing
//!
//! The incidence-rate normalization and its empirical redshift correction
//! are tuning constants with no first-principles derivation, so they are
//! read from an optional YAML file rather than hardcoded. Values may be
//! plain numbers or mathematical expressions over a context of named
//! physical constants.

use std::error::Error;
use std::fmt;
use std::path::Path;

use evalexpr::*;
use yaml_rust::{yaml::Yaml, YamlLoader};

use crate::constants::*;
use crate::cosmology::Cosmology;

/// Why did Config::read fail?
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InputErrorKind {
    File,
    Location,
    Conversion,
}

/// Error returned when a calibration file cannot be read or parsed.
pub struct InputError {
    kind: InputErrorKind,
    path: String,
    cause: String,
}

impl fmt::Debug for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            InputErrorKind::File => write!(f, "Unable to open calibration file."),
            InputErrorKind::Location => write!(f, "Failed to follow specified path \"{}\": component \"{}\" is missing.", self.path, self.cause),
            InputErrorKind::Conversion => write!(f, "Could not convert field \"{}\" to target type.", self.cause),
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Error for InputError {}

impl InputError {
    fn file() -> Self {
        Self { kind: InputErrorKind::File, path: String::new(), cause: String::new() }
    }

    fn location(path: &str, cause: &str) -> Self {
        Self { kind: InputErrorKind::Location, path: path.to_owned(), cause: cause.to_owned() }
    }

    fn conversion(path: &str, cause: &str) -> Self {
        Self { kind: InputErrorKind::Conversion, path: path.to_owned(), cause: cause.to_owned() }
    }

    pub fn kind(&self) -> InputErrorKind {
        self.kind
    }
}

/// Types that can be parsed from a YAML field
pub trait FromYaml: Sized {
    fn from_yaml(arg: Yaml, ctx: &HashMapContext) -> Result<Self, ()>;
}

impl FromYaml for f64 {
    fn from_yaml(arg: Yaml, ctx: &HashMapContext) -> Result<Self, ()> {
        match arg {
            Yaml::Real(s) => s.parse::<f64>().or(Err(())),
            Yaml::Integer(i) => Ok(i as f64),
            Yaml::String(s) => eval_number_with_context(&s, ctx).or(Err(())),
            _ => Err(()),
        }
    }
}

/// A parsed calibration file, with an expression context holding the
/// physical constants of the problem.
pub struct Config {
    input: Yaml,
    ctx: HashMapContext,
}

impl Config {
    /// Loads a YAML calibration file.
    pub fn from_file(path: &Path) -> Result<Self, InputError> {
        let contents = std::fs::read_to_string(path).map_err(|_| InputError::file())?;
        Self::from_string(&contents)
    }

    /// Loads a YAML calibration from a string.
    pub fn from_string(s: &str) -> Result<Self, InputError> {
        let input = YamlLoader::load_from_str(s).map_err(|_| InputError::file())?;
        let input = input.first().ok_or(InputError::file())?;

        let mut config = Config {
            input: input.clone(),
            ctx: HashMapContext::new(),
        };
        config.load_context()?;
        Ok(config)
    }

    /// Fills the expression context with named constants and any extra
    /// definitions given in the optional `constants` block.
    fn load_context(&mut self) -> Result<(), InputError> {
        let mut ctx = context_map! {
            "lya" => LYMAN_ALPHA,
            "c" => SPEED_OF_LIGHT,
            "h" => HUBBLE_H,
            "omega_m" => OMEGA_M,
            "omega_l" => OMEGA_L,
            "omega_k" => OMEGA_K,
            "sigma_g" => SIGMA_G,
            "pi" => std::f64::consts::PI,
        }.unwrap();

        helper::context_function!(ctx, "sqrt", f64::sqrt);
        helper::context_function!(ctx, "abs", f64::abs);
        helper::context_function!(ctx, "exp", f64::exp);
        helper::context_function!(ctx, "ln", f64::ln);
        helper::context_function!(ctx, "log10", f64::log10);

        self.ctx = ctx;

        let section = "constants";
        if self.input[section].is_badvalue() {
            return Ok(());
        }

        let entries = self.input[section].as_hash()
            .ok_or_else(|| InputError::conversion(section, section))?;

        for (a, b) in entries {
            let (key, value) = match (a, b) {
                (Yaml::String(k), Yaml::Integer(i)) => (Some(k), Some(*i as f64)),
                (Yaml::String(k), Yaml::Real(s)) => (Some(k), s.parse::<f64>().ok()),
                (Yaml::String(k), Yaml::String(s)) => (Some(k), eval_number_with_context(s, &self.ctx).ok()),
                _ => (None, None),
            };

            if let Some(v) = value {
                let key = key.unwrap(); // if value.is_some() so is key
                self.ctx.set_value(key.clone(), Value::from(v))
                    .map_err(|_| InputError::conversion(section, key))?
            } else if let Some(k) = key {
                Err(InputError::conversion(section, k))?
            }
        }

        Ok(())
    }

    /// Locates a key-value pair and parses the value as the specified
    /// type. The path is a string of colon-separated sections, e.g.
    /// `'calibration:sigma_g'`.
    pub fn read<T, S>(&self, path: S) -> Result<T, InputError>
    where
        T: FromYaml,
        S: AsRef<str>,
    {
        let address: Vec<&str> = path.as_ref().split(':').collect();
        let value = address.iter()
            .try_fold(&self.input, |y, s| {
                if y[*s].is_badvalue() {
                    Err(InputError::location(path.as_ref(), s))
                } else {
                    Ok(&y[*s])
                }
            });
        value.and_then(|arg| {
            T::from_yaml(arg.clone(), &self.ctx)
                .map_err(|_| InputError::conversion(path.as_ref(), address.last().unwrap()))
        })
    }
}

mod helper {
    macro_rules! context_function {
        ($ctx:expr, $name:literal, $func:expr) => {
            $ctx.set_function(
                $name.to_string(),
                Function::new(|arg| {
                    let x = arg.as_number()?;
                    Ok(Value::Float($func(x)))
                })
            ).unwrap()
        };
    }

    pub(super) use context_function;
}

/// Calibration constants of the injection model. Every field has the
/// value used by the production mocks as its default; a YAML file
/// supplied on the command line overrides individual fields.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Calibration {
    /// RMS of the underlying Gaussian field
    pub sigma_g: f64,
    pub omega_m: f64,
    pub omega_k: f64,
    pub omega_l: f64,
    /// Overall boost applied to the raw incidence rate
    pub incidence_boost: f64,
    /// Secondary scale factor on the incidence rate
    pub incidence_scale: f64,
    /// Slope of the empirical redshift-correction polynomial
    pub z_corr_slope: f64,
    /// Intercept of the empirical redshift-correction polynomial
    pub z_corr_intercept: f64,
    /// Normalization of the redshift correction
    pub z_corr_norm: f64,
    /// log10 f(N, X) of the built-in column-density model at the break
    pub fn_log_amplitude: f64,
    /// log10 N at the break of the built-in column-density model
    pub fn_log_break: f64,
    /// Power-law slope below the break
    pub fn_alpha_lo: f64,
    /// Power-law slope above the break
    pub fn_alpha_hi: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            sigma_g: SIGMA_G,
            omega_m: OMEGA_M,
            omega_k: OMEGA_K,
            omega_l: OMEGA_L,
            incidence_boost: 20000.0,
            incidence_scale: 6.4,
            z_corr_slope: -0.01534254,
            z_corr_intercept: 0.0597803,
            z_corr_norm: 0.186,
            fn_log_amplitude: -22.5,
            fn_log_break: 21.3,
            fn_alpha_lo: -2.0,
            fn_alpha_hi: -3.0,
        }
    }
}

impl Calibration {
    /// Reads the `calibration` section of a YAML file, falling back to
    /// the default for any field that is absent.
    pub fn from_config(config: &Config) -> Result<Self, InputError> {
        let defaults = Calibration::default();
        let read = |key: &str, fallback: f64| -> Result<f64, InputError> {
            match config.read(format!("calibration:{}", key)) {
                Ok(v) => Ok(v),
                Err(e) if e.kind() == InputErrorKind::Location => Ok(fallback),
                Err(e) => Err(e),
            }
        };

        Ok(Calibration {
            sigma_g: read("sigma_g", defaults.sigma_g)?,
            omega_m: read("omega_m", defaults.omega_m)?,
            omega_k: read("omega_k", defaults.omega_k)?,
            omega_l: read("omega_l", defaults.omega_l)?,
            incidence_boost: read("incidence_boost", defaults.incidence_boost)?,
            incidence_scale: read("incidence_scale", defaults.incidence_scale)?,
            z_corr_slope: read("z_corr_slope", defaults.z_corr_slope)?,
            z_corr_intercept: read("z_corr_intercept", defaults.z_corr_intercept)?,
            z_corr_norm: read("z_corr_norm", defaults.z_corr_norm)?,
            fn_log_amplitude: read("fn_log_amplitude", defaults.fn_log_amplitude)?,
            fn_log_break: read("fn_log_break", defaults.fn_log_break)?,
            fn_alpha_lo: read("fn_alpha_lo", defaults.fn_alpha_lo)?,
            fn_alpha_hi: read("fn_alpha_hi", defaults.fn_alpha_hi)?,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, InputError> {
        let config = Config::from_file(path)?;
        Self::from_config(&config)
    }

    pub fn cosmology(&self) -> Cosmology {
        Cosmology {
            omega_m: self.omega_m,
            omega_k: self.omega_k,
            omega_l: self.omega_l,
        }
    }

    /// Empirical correction dividing the incidence rate at redshift `z`.
    pub fn z_correction(&self, z: f64) -> f64 {
        (self.z_corr_slope * z + self.z_corr_intercept) * self.incidence_scale / self.z_corr_norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_parser() {
        let text = "---
        constants:
          fudge: 2.0

        calibration:
          sigma_g: 1.0
          incidence_boost: 10000 * fudge
          z_corr_slope: -0.02
        ";

        let config = Config::from_string(text).unwrap();
        let calib = Calibration::from_config(&config).unwrap();

        assert_eq!(calib.sigma_g, 1.0);
        assert_eq!(calib.incidence_boost, 20000.0);
        assert_eq!(calib.z_corr_slope, -0.02);
        // untouched fields keep their defaults
        assert_eq!(calib.z_corr_intercept, Calibration::default().z_corr_intercept);
    }

    #[test]
    fn expressions_use_named_constants() {
        let text = "---
        calibration:
          sigma_g: sigma_g / 2.0
        ";
        let config = Config::from_string(text).unwrap();
        let calib = Calibration::from_config(&config).unwrap();
        assert!((calib.sigma_g - 0.5 * SIGMA_G).abs() < 1.0e-12);
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_string("---\nunrelated: 1\n").unwrap();
        let calib = Calibration::from_config(&config).unwrap();
        assert_eq!(calib, Calibration::default());
    }

    #[test]
    fn bad_field_is_an_error() {
        let text = "---
        calibration:
          sigma_g: [1.0, 2.0]
        ";
        let config = Config::from_string(text).unwrap();
        assert!(Calibration::from_config(&config).is_err());
    }

    #[test]
    fn z_correction_default_values() {
        let calib = Calibration::default();
        let z = 2.4;
        let expected = (-0.01534254 * z + 0.0597803) * 6.4 / 0.186;
        assert!((calib.z_correction(z) - expected).abs() < 1.0e-12);
    }
}
