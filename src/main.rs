use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256StarStar;

mod catalog;
mod column_density;
mod config;
mod constants;
mod cosmology;
mod fits;
mod injection;
mod interp;
mod quadrature;
mod skewer;
mod special_functions;
mod threshold;
mod timing;

use catalog::Catalog;
use column_density::{ColumnDensityModel, PowerLawModel, TabulatedModel};
use config::Calibration;
use cosmology::CellWidth;
use injection::Injector;
use skewer::SpectraFile;
use threshold::BiasThreshold;
use timing::{ettc, PrettyDuration};

/// Number of nodes used when discretizing the column-density grid
const NSAMP: usize = 100;

/// Populates simulated quasar spectra with synthetic damped
/// Lyman-alpha absorbers and writes their catalogue.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Directory holding the input spectra files
    #[arg(long)]
    input_path: PathBuf,

    /// Directory the catalogue is written to
    #[arg(long)]
    output_path: PathBuf,

    /// Filename pattern of the spectra files
    #[arg(long, default_value = "spectra_merged*.fits")]
    input_pattern: String,

    /// Minimum log10 column density to consider
    #[arg(long, default_value_t = 17.2)]
    nmin: f64,

    /// Maximum log10 column density to consider
    #[arg(long, default_value_t = 22.5)]
    nmax: f64,

    /// DLA bias at z = 2.25
    #[arg(long, default_value_t = 2.0)]
    dla_bias: f64,

    /// Comoving cell size in Mpc/h
    #[arg(long, default_value_t = 2.19)]
    cell_size: f64,

    /// Seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// Generate a random catalogue, ignoring the density field
    #[arg(long)]
    random: bool,

    /// Size of the random catalogue relative to the data catalogue
    #[arg(long, default_value_t = 3.0)]
    random_factor: f64,

    /// No absorbers below this redshift
    #[arg(long, default_value_t = 1.8)]
    z_low: f64,

    /// Extend the lowest redshift bin down to this value
    #[arg(long)]
    extrapolate_z_down: Option<f64>,

    /// Tabulated cumulative incidence (three-column ASCII: z, log10 N,
    /// cumulative dN/dz), replacing the built-in power-law model
    #[arg(long)]
    fn_table: Option<PathBuf>,

    /// YAML file overriding individual calibration constants
    #[arg(long)]
    calibration: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let start = Instant::now();

    let seed = match args.seed {
        Some(seed) => {
            println!("{} rng with specified seed {}", "Seeding".bold().cyan(), seed);
            seed
        }
        None => {
            let seed = rand::thread_rng().gen_range(0..(1u64 << 31));
            println!("{} rng with randomly drawn seed {}", "Seeding".bold().cyan(), seed);
            seed
        }
    };
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);

    let calibration = match &args.calibration {
        Some(path) => Calibration::from_file(path)?,
        None => Calibration::default(),
    };
    let cosmo = calibration.cosmology();

    let cell_width = CellWidth::new(&cosmo, args.cell_size, 1.3, 4.0, 500);
    let threshold = BiasThreshold::new();

    let model: Box<dyn ColumnDensityModel> = match &args.fn_table {
        Some(path) => Box::new(TabulatedModel::from_file(path)?),
        None => Box::new(PowerLawModel::new(
            cosmo,
            calibration.fn_log_amplitude,
            calibration.fn_log_break,
            calibration.fn_alpha_lo,
            calibration.fn_alpha_hi,
        )),
    };

    let pattern = args.input_path.join(&args.input_pattern);
    let files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .collect();
    if files.is_empty() {
        return Err(format!("no input files match {}", pattern.display()).into());
    }
    println!(
        "{} {} file{} matching {}",
        "Found".bold().cyan(),
        files.len(),
        if files.len() > 1 {"s"} else {""},
        pattern.display(),
    );

    // incidence per unit redshift at each cell of the wavelength grid,
    // shared by all files, calibrated against the production mocks
    let first = SpectraFile::load(&files[0])?;
    let z_cell = first.cell_redshifts();
    let dndz: Vec<f64> = z_cell.iter()
        .map(|&z| {
            let raw = model.dndz(z, args.nmin, args.nmax, NSAMP);
            let boost = calibration.incidence_boost * calibration.incidence_scale
                * if args.random { args.random_factor } else { 1.0 };
            raw * boost / calibration.z_correction(z)
        })
        .collect();

    let injector = Injector {
        dla_bias: args.dla_bias,
        sigma_g: calibration.sigma_g,
        z_low: args.z_low,
        n_min: args.nmin,
        n_max: args.nmax,
        nsamp: NSAMP,
        extrapolate_z_down: args.extrapolate_z_down,
        random: args.random,
    };

    let mut catalog = Catalog::new();
    for (i, path) in files.iter().enumerate() {
        let file = match SpectraFile::load(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("{} can't read {}: {}", "Warning:".bold().yellow(), path.display(), e);
                continue;
            }
        };
        if file.npix != dndz.len() {
            eprintln!(
                "{} {} has {} cells per skewer, expected {}, skipping",
                "Warning:".bold().yellow(), path.display(), file.npix, dndz.len(),
            );
            continue;
        }
        catalog.append(injector.process_file(&file, &dndz, &cell_width, &threshold, model.as_ref(), &mut rng));

        if i % 500 == 0 && i > 0 {
            println!(
                "{} {} of {} files, {} absorbers so far, ettc {}",
                "Processed".bold().cyan(),
                i, files.len(), catalog.len(),
                PrettyDuration::from(ettc(start, i, files.len())),
            );
        }
    }

    let filename = if args.random {"dla_randoms.fits"} else {"dla.fits"};
    let output = args.output_path.join(filename);
    catalog.write(&output)?;

    println!(
        "{} {} absorbers to {} after {}",
        "Wrote".bold().bright_green(),
        catalog.len(),
        output.display(),
        PrettyDuration::from(start.elapsed()),
    );

    Ok(())
}
