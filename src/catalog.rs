//! Accumulation and output of the absorber catalogue

use std::path::Path;

use crate::fits::{self, ColumnData, FitsError};

/// One synthetic absorber.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DlaRecord {
    /// Identifier of the host skewer
    pub mock_id: i64,
    /// Absorber redshift
    pub z: f64,
    /// Redshift offset due to the peculiar velocity of the host cell
    pub dz_rsd: f64,
    /// log10 of the HI column density in cm^-2
    pub log_nhi: f64,
    pub z_qso: f64,
    pub z_qso_no_rsd: f64,
    pub ra: f64,
    pub dec: f64,
}

/// Catalogue of absorbers accumulated over all input files.
#[derive(Default)]
pub struct Catalog {
    records: Vec<DlaRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, mut records: Vec<DlaRecord>) {
        self.records.append(&mut records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the catalogue as a binary table extension named 'DLACAT'.
    pub fn write(&self, path: &Path) -> Result<(), FitsError> {
        let mock_id: Vec<i64> = self.records.iter().map(|r| r.mock_id).collect();
        let z: Vec<f64> = self.records.iter().map(|r| r.z).collect();
        let dz: Vec<f64> = self.records.iter().map(|r| r.dz_rsd).collect();
        let nhi: Vec<f64> = self.records.iter().map(|r| r.log_nhi).collect();
        let z_qso: Vec<f64> = self.records.iter().map(|r| r.z_qso).collect();
        let z_no_rsd: Vec<f64> = self.records.iter().map(|r| r.z_qso_no_rsd).collect();
        let ra: Vec<f64> = self.records.iter().map(|r| r.ra).collect();
        let dec: Vec<f64> = self.records.iter().map(|r| r.dec).collect();

        fits::write_table(path, "DLACAT", &[
            ("MOCKID", ColumnData::Int64(&mock_id)),
            ("Z_DLA", ColumnData::Float64(&z)),
            ("DZ_DLA", ColumnData::Float64(&dz)),
            ("N_HI_DLA", ColumnData::Float64(&nhi)),
            ("Z_QSO", ColumnData::Float64(&z_qso)),
            ("Z_QSO_NO_RSD", ColumnData::Float64(&z_no_rsd)),
            ("RA", ColumnData::Float64(&ra)),
            ("DEC", ColumnData::Float64(&dec)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use crate::fits::FitsFile;
    use super::*;

    fn record(i: i64) -> DlaRecord {
        DlaRecord {
            mock_id: 100 + i,
            z: 2.0 + 0.1 * (i as f64),
            dz_rsd: 1.0e-4 * (i as f64),
            log_nhi: 20.0 + 0.2 * (i as f64),
            z_qso: 3.0,
            z_qso_no_rsd: 2.999,
            ra: 150.0,
            dec: 2.5,
        }
    }

    #[test]
    fn round_trip_through_fits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dla.fits");

        let mut catalog = Catalog::new();
        catalog.append((0..5).map(record).collect());
        catalog.write(&path).unwrap();

        let fits = FitsFile::open(&path).unwrap();
        let hdu = fits.hdu_by_name("DLACAT").unwrap();
        assert_eq!(hdu.column_i64("MOCKID").unwrap(), vec![100, 101, 102, 103, 104]);
        let z = hdu.column_f64("Z_DLA").unwrap();
        assert_eq!(z.len(), 5);
        assert!((z[3] - 2.3).abs() < 1.0e-12);
        assert_eq!(hdu.column_f64("RA").unwrap(), vec![150.0; 5]);
    }

    #[test]
    fn empty_catalog_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fits");
        Catalog::new().write(&path).unwrap();
        let fits = FitsFile::open(&path).unwrap();
        assert_eq!(fits.hdu_by_name("DLACAT").unwrap().column_f64("Z_DLA").unwrap().len(), 0);
    }
}
