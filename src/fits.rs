//! Minimal FITS I/O
//!
//! Reads the IMAGE and BINTABLE extensions of the mock spectra files and
//! writes the output catalog as a binary table. Only the subset of the
//! standard that those files use is implemented: 2880-byte blocks,
//! 80-byte header cards, big-endian data, scalar table columns.

use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const BLOCK: usize = 2880;
const CARD: usize = 80;

#[derive(Debug)]
pub enum FitsError {
    Io(std::io::Error),
    NotFits,
    Truncated,
    MissingHdu(String),
    MissingKeyword(String),
    MissingColumn(String),
    Unsupported(String),
}

impl fmt::Display for FitsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FitsError::Io(e) => write!(f, "i/o error: {}", e),
            FitsError::NotFits => write!(f, "file does not start with a FITS primary header"),
            FitsError::Truncated => write!(f, "file ends in the middle of a block"),
            FitsError::MissingHdu(s) => write!(f, "no HDU named '{}'", s),
            FitsError::MissingKeyword(s) => write!(f, "header keyword '{}' not found", s),
            FitsError::MissingColumn(s) => write!(f, "no table column named '{}'", s),
            FitsError::Unsupported(s) => write!(f, "unsupported FITS feature: {}", s),
        }
    }
}

impl Error for FitsError {}

impl From<std::io::Error> for FitsError {
    fn from(e: std::io::Error) -> Self {
        FitsError::Io(e)
    }
}

/// A parsed header value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Str(String),
}

/// One header-data unit: the parsed header cards and the raw data block.
pub struct Hdu {
    keywords: Vec<(String, Value)>,
    data: Vec<u8>,
}

impl Hdu {
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    fn integer(&self, name: &str) -> Result<i64, FitsError> {
        match self.keyword(name) {
            Some(Value::Integer(i)) => Ok(*i),
            Some(Value::Real(x)) => Ok(*x as i64),
            _ => Err(FitsError::MissingKeyword(name.to_owned())),
        }
    }

    fn integer_or(&self, name: &str, default: i64) -> i64 {
        self.integer(name).unwrap_or(default)
    }

    fn string(&self, name: &str) -> Option<&str> {
        match self.keyword(name) {
            Some(Value::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn extname(&self) -> Option<&str> {
        self.string("EXTNAME")
    }

    fn axes(&self) -> Result<Vec<usize>, FitsError> {
        let naxis = self.integer("NAXIS")?;
        (1..=naxis)
            .map(|i| self.integer(&format!("NAXIS{}", i)).map(|n| n as usize))
            .collect()
    }

    /// Size in bytes of the data that follows the header.
    fn data_len(&self) -> Result<usize, FitsError> {
        let bitpix = self.integer("BITPIX")?.unsigned_abs() as usize;
        let axes = self.axes()?;
        if axes.is_empty() {
            return Ok(0);
        }
        let pcount = self.integer_or("PCOUNT", 0) as usize;
        let gcount = self.integer_or("GCOUNT", 1) as usize;
        Ok((bitpix / 8) * gcount * (pcount + axes.iter().product::<usize>()))
    }

    /// Reads an IMAGE HDU as a flat array plus its axis lengths
    /// (in FITS order, NAXIS1 first).
    pub fn image_f64(&self) -> Result<(Vec<usize>, Vec<f64>), FitsError> {
        let bitpix = self.integer("BITPIX")?;
        let axes = self.axes()?;
        let n: usize = axes.iter().product();
        let bscale = match self.keyword("BSCALE") {
            Some(Value::Real(x)) => *x,
            Some(Value::Integer(i)) => *i as f64,
            _ => 1.0,
        };
        let bzero = match self.keyword("BZERO") {
            Some(Value::Real(x)) => *x,
            Some(Value::Integer(i)) => *i as f64,
            _ => 0.0,
        };

        let width = (bitpix.unsigned_abs() / 8) as usize;
        if self.data.len() < n * width {
            return Err(FitsError::Truncated);
        }
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let raw = &self.data[i * width..(i + 1) * width];
            let x = match bitpix {
                8 => raw[0] as f64,
                16 => i16::from_be_bytes(raw.try_into().unwrap()) as f64,
                32 => i32::from_be_bytes(raw.try_into().unwrap()) as f64,
                64 => i64::from_be_bytes(raw.try_into().unwrap()) as f64,
                -32 => f32::from_be_bytes(raw.try_into().unwrap()) as f64,
                -64 => f64::from_be_bytes(raw.try_into().unwrap()),
                b => return Err(FitsError::Unsupported(format!("BITPIX = {}", b))),
            };
            out.push(bscale * x + bzero);
        }
        Ok((axes, out))
    }

    /// Byte layout of a binary table: (name, element width, offset) per
    /// field, plus the row stride.
    fn table_layout(&self) -> Result<(Vec<(String, char, usize, usize)>, usize), FitsError> {
        if self.string("XTENSION").map(str::trim) != Some("BINTABLE") {
            return Err(FitsError::Unsupported("table read from a non-BINTABLE HDU".to_owned()));
        }
        let tfields = self.integer("TFIELDS")?;
        let stride = self.integer("NAXIS1")? as usize;

        let mut fields = Vec::new();
        let mut offset = 0;
        for i in 1..=tfields {
            let name = self.string(&format!("TTYPE{}", i))
                .map(|s| s.trim().to_owned())
                .ok_or_else(|| FitsError::MissingKeyword(format!("TTYPE{}", i)))?;
            let tform = self.string(&format!("TFORM{}", i))
                .map(|s| s.trim().to_owned())
                .ok_or_else(|| FitsError::MissingKeyword(format!("TFORM{}", i)))?;

            let split = tform.find(|c: char| c.is_ascii_alphabetic())
                .ok_or_else(|| FitsError::Unsupported(format!("TFORM '{}'", tform)))?;
            let repeat: usize = if split == 0 { 1 } else {
                tform[..split].parse().map_err(|_| FitsError::Unsupported(format!("TFORM '{}'", tform)))?
            };
            let kind = tform.as_bytes()[split] as char;
            let width = match kind {
                'L' | 'B' | 'A' | 'X' => 1,
                'I' => 2,
                'J' | 'E' => 4,
                'K' | 'D' => 8,
                c => return Err(FitsError::Unsupported(format!("TFORM type '{}'", c))),
            };
            fields.push((name, kind, width, offset));
            offset += repeat * width;
        }
        if offset > stride {
            return Err(FitsError::Unsupported("table fields overflow NAXIS1".to_owned()));
        }
        Ok((fields, stride))
    }

    /// Reads a scalar numeric column of a binary table as f64.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>, FitsError> {
        let (fields, stride) = self.table_layout()?;
        let nrows = self.integer("NAXIS2")? as usize;
        let (_, kind, width, offset) = fields.into_iter()
            .find(|(n, ..)| n == name)
            .ok_or_else(|| FitsError::MissingColumn(name.to_owned()))?;

        if self.data.len() < nrows * stride {
            return Err(FitsError::Truncated);
        }
        let mut out = Vec::with_capacity(nrows);
        for row in 0..nrows {
            let raw = &self.data[row * stride + offset..row * stride + offset + width];
            let x = match kind {
                'B' => raw[0] as f64,
                'I' => i16::from_be_bytes(raw.try_into().unwrap()) as f64,
                'J' => i32::from_be_bytes(raw.try_into().unwrap()) as f64,
                'K' => i64::from_be_bytes(raw.try_into().unwrap()) as f64,
                'E' => f32::from_be_bytes(raw.try_into().unwrap()) as f64,
                'D' => f64::from_be_bytes(raw.try_into().unwrap()),
                c => return Err(FitsError::Unsupported(format!("column type '{}'", c))),
            };
            out.push(x);
        }
        Ok(out)
    }

    /// Reads a scalar integer column of a binary table as i64.
    pub fn column_i64(&self, name: &str) -> Result<Vec<i64>, FitsError> {
        let (fields, stride) = self.table_layout()?;
        let nrows = self.integer("NAXIS2")? as usize;
        let (_, kind, width, offset) = fields.into_iter()
            .find(|(n, ..)| n == name)
            .ok_or_else(|| FitsError::MissingColumn(name.to_owned()))?;

        if self.data.len() < nrows * stride {
            return Err(FitsError::Truncated);
        }
        let mut out = Vec::with_capacity(nrows);
        for row in 0..nrows {
            let raw = &self.data[row * stride + offset..row * stride + offset + width];
            let x = match kind {
                'B' => raw[0] as i64,
                'I' => i16::from_be_bytes(raw.try_into().unwrap()) as i64,
                'J' => i32::from_be_bytes(raw.try_into().unwrap()) as i64,
                'K' => i64::from_be_bytes(raw.try_into().unwrap()),
                c => return Err(FitsError::Unsupported(format!("integer column type '{}'", c))),
            };
            out.push(x);
        }
        Ok(out)
    }
}

/// A fully parsed FITS file.
pub struct FitsFile {
    hdus: Vec<Hdu>,
}

impl FitsFile {
    pub fn open(path: &Path) -> Result<Self, FitsError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FitsError> {
        if !bytes.starts_with(b"SIMPLE") {
            return Err(FitsError::NotFits);
        }

        let mut hdus = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let (keywords, header_len) = parse_header(&bytes[pos..])?;
            pos += header_len;
            let hdu = Hdu { keywords, data: Vec::new() };
            let data_len = hdu.data_len()?;
            if pos + data_len > bytes.len() {
                return Err(FitsError::Truncated);
            }
            let data = bytes[pos..pos + data_len].to_vec();
            // data area is padded to a whole number of blocks
            pos += data_len.div_ceil(BLOCK) * BLOCK;
            pos = pos.min(bytes.len());
            hdus.push(Hdu { data, ..hdu });
        }
        Ok(FitsFile { hdus })
    }

    /// Finds the extension with the given EXTNAME.
    pub fn hdu_by_name(&self, name: &str) -> Result<&Hdu, FitsError> {
        self.hdus.iter()
            .find(|h| h.extname().map(str::trim) == Some(name))
            .ok_or_else(|| FitsError::MissingHdu(name.to_owned()))
    }
}

/// Parses header cards up to END; returns them with the padded header
/// size in bytes.
fn parse_header(bytes: &[u8]) -> Result<(Vec<(String, Value)>, usize), FitsError> {
    let mut keywords = Vec::new();
    let mut pos = 0;
    loop {
        if pos + CARD > bytes.len() {
            return Err(FitsError::Truncated);
        }
        let card = &bytes[pos..pos + CARD];
        pos += CARD;

        let key = String::from_utf8_lossy(&card[0..8]).trim_end().to_owned();
        if key == "END" {
            break;
        }
        if key.is_empty() || key == "COMMENT" || key == "HISTORY" || &card[8..10] != b"= " {
            continue;
        }
        let value = parse_value(String::from_utf8_lossy(&card[10..]).as_ref());
        if let Some(value) = value {
            keywords.push((key, value));
        }
    }
    Ok((keywords, pos.div_ceil(BLOCK) * BLOCK))
}

fn parse_value(field: &str) -> Option<Value> {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        // string value; '' escapes a quote
        let mut s = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            if c == '\'' {
                match chars.next() {
                    Some('\'') => s.push('\''),
                    _ => break,
                }
            } else {
                s.push(c);
            }
        }
        return Some(Value::Str(s.trim_end().to_owned()));
    }

    let value = field.split('/').next().unwrap_or("").trim();
    match value {
        "" => None,
        "T" => Some(Value::Logical(true)),
        "F" => Some(Value::Logical(false)),
        v => v.parse::<i64>().map(Value::Integer)
            .or_else(|_| v.parse::<f64>().map(Value::Real))
            .ok(),
    }
}

/// A table column to be written.
pub enum ColumnData<'a> {
    Int64(&'a [i64]),
    Float64(&'a [f64]),
}

impl ColumnData<'_> {
    fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
        }
    }

    fn tform(&self) -> char {
        match self {
            ColumnData::Int64(_) => 'K',
            ColumnData::Float64(_) => 'D',
        }
    }
}

/// Counts the bytes passing through, so that headers and data can be
/// padded out to whole 2880-byte blocks.
struct BlockWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> BlockWriter<W> {
    fn new(inner: W) -> Self {
        BlockWriter { inner, written: 0 }
    }

    fn card(&mut self, text: String) -> std::io::Result<()> {
        let mut text = text;
        text.truncate(CARD);
        write!(self.inner, "{:<80}", text)?;
        self.written += CARD;
        Ok(())
    }

    fn raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    fn pad(&mut self, fill: u8) -> std::io::Result<()> {
        let excess = self.written % BLOCK;
        if excess > 0 {
            self.raw(&vec![fill; BLOCK - excess])?;
        }
        Ok(())
    }
}

fn value_card(key: &str, value: impl fmt::Display, comment: &str) -> String {
    format!("{:<8}= {:>20} / {:<47}", key, value, comment)
}

fn string_card(key: &str, value: &str) -> String {
    format!("{:<8}= '{}'", key, value)
}

/// Writes a FITS file one HDU at a time: an empty primary header
/// followed by any number of image or binary-table extensions.
pub struct FitsBuilder {
    out: BlockWriter<BufWriter<File>>,
}

impl FitsBuilder {
    /// Creates the file and writes the empty primary HDU.
    pub fn create(path: &Path) -> Result<Self, FitsError> {
        let file = File::create(path)?;
        let mut out = BlockWriter::new(BufWriter::new(file));
        out.card(value_card("SIMPLE", 'T', "file conforms to FITS standard"))?;
        out.card(value_card("BITPIX", 8, "number of bits per data pixel"))?;
        out.card(value_card("NAXIS", 0, "number of data axes"))?;
        out.card(value_card("EXTEND", 'T', "dataset contains extensions"))?;
        out.card("END".to_owned())?;
        out.pad(b' ')?;
        Ok(FitsBuilder { out })
    }

    /// Appends a double-precision IMAGE extension. Axis lengths are in
    /// FITS order (NAXIS1 first, i.e. the contiguous one).
    pub fn image_f64(&mut self, extname: &str, axes: &[usize], data: &[f64]) -> Result<(), FitsError> {
        if axes.iter().product::<usize>() != data.len() {
            return Err(FitsError::Unsupported("image data does not match its axes".to_owned()));
        }
        let out = &mut self.out;
        out.card(string_card("XTENSION", "IMAGE"))?;
        out.card(value_card("BITPIX", -64, "number of bits per data pixel"))?;
        out.card(value_card("NAXIS", axes.len(), "number of data axes"))?;
        for (i, n) in axes.iter().enumerate() {
            out.card(value_card(&format!("NAXIS{}", i + 1), n, "length of data axis"))?;
        }
        out.card(value_card("PCOUNT", 0, "size of the heap"))?;
        out.card(value_card("GCOUNT", 1, "one data group"))?;
        out.card(string_card("EXTNAME", extname))?;
        out.card("END".to_owned())?;
        out.pad(b' ')?;
        for x in data {
            out.raw(&x.to_be_bytes())?;
        }
        out.pad(0)?;
        Ok(())
    }

    /// Appends a BINTABLE extension with the given named columns, all
    /// of which must have the same length.
    pub fn table(&mut self, extname: &str, columns: &[(&str, ColumnData)]) -> Result<(), FitsError> {
        let nrows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if columns.iter().any(|(_, c)| c.len() != nrows) {
            return Err(FitsError::Unsupported("columns of unequal length".to_owned()));
        }
        let stride: usize = columns.len() * 8;

        let out = &mut self.out;
        out.card(string_card("XTENSION", "BINTABLE"))?;
        out.card(value_card("BITPIX", 8, "number of bits per data pixel"))?;
        out.card(value_card("NAXIS", 2, "number of data axes"))?;
        out.card(value_card("NAXIS1", stride, "bytes per row"))?;
        out.card(value_card("NAXIS2", nrows, "number of rows"))?;
        out.card(value_card("PCOUNT", 0, "size of the heap"))?;
        out.card(value_card("GCOUNT", 1, "one data group"))?;
        out.card(value_card("TFIELDS", columns.len(), "number of fields per row"))?;
        for (i, (name, data)) in columns.iter().enumerate() {
            out.card(string_card(&format!("TTYPE{}", i + 1), name))?;
            out.card(string_card(&format!("TFORM{}", i + 1), &data.tform().to_string()))?;
        }
        out.card(string_card("EXTNAME", extname))?;
        out.card("END".to_owned())?;
        out.pad(b' ')?;

        // row-major, big-endian data
        for row in 0..nrows {
            for (_, data) in columns {
                match data {
                    ColumnData::Int64(v) => out.raw(&v[row].to_be_bytes())?,
                    ColumnData::Float64(v) => out.raw(&v[row].to_be_bytes())?,
                }
            }
        }
        out.pad(0)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), FitsError> {
        self.out.inner.flush()?;
        Ok(())
    }
}

/// Writes one binary-table extension preceded by an empty primary HDU.
pub fn write_table(path: &Path, extname: &str, columns: &[(&str, ColumnData)]) -> Result<(), FitsError> {
    let mut builder = FitsBuilder::create(path)?;
    builder.table(extname, columns)?;
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_is_eighty_bytes() {
        assert_eq!(value_card("NAXIS1", 64, "bytes per row").len(), 80);
        let mut buf = Vec::new();
        let mut w = BlockWriter::new(&mut buf);
        w.card(string_card("EXTNAME", "METADATA")).unwrap();
        w.card("END".to_owned()).unwrap();
        w.pad(b' ').unwrap();
        assert_eq!(buf.len(), BLOCK);
    }

    #[test]
    fn header_value_parsing() {
        assert_eq!(parse_value("                   T / comment"), Some(Value::Logical(true)));
        assert_eq!(parse_value("                  42"), Some(Value::Integer(42)));
        assert_eq!(parse_value("        2.190000E+00 / cell"), Some(Value::Real(2.19)));
        assert_eq!(parse_value("'BINTABLE'           / ext"), Some(Value::Str("BINTABLE".to_owned())));
        assert_eq!(parse_value("'it''s    '"), Some(Value::Str("it's".to_owned())));
    }

    #[test]
    fn table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.fits");

        let ids = [101i64, 102, 103];
        let zs = [2.1f64, 2.5, 3.3];
        write_table(&path, "DLACAT", &[
            ("MOCKID", ColumnData::Int64(&ids)),
            ("Z_DLA", ColumnData::Float64(&zs)),
        ]).unwrap();

        let fits = FitsFile::open(&path).unwrap();
        let hdu = fits.hdu_by_name("DLACAT").unwrap();
        assert_eq!(hdu.column_i64("MOCKID").unwrap(), ids.to_vec());
        assert_eq!(hdu.column_f64("Z_DLA").unwrap(), zs.to_vec());
        assert!(hdu.column_f64("NOPE").is_err());

        // file is block aligned
        let len = std::fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(len % BLOCK, 0);
        assert_eq!(len, 3 * BLOCK);
    }

    #[test]
    fn empty_table_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fits");
        write_table(&path, "DLACAT", &[
            ("MOCKID", ColumnData::Int64(&[])),
            ("Z_DLA", ColumnData::Float64(&[])),
        ]).unwrap();
        let fits = FitsFile::open(&path).unwrap();
        let hdu = fits.hdu_by_name("DLACAT").unwrap();
        assert!(hdu.column_i64("MOCKID").unwrap().is_empty());
    }

    #[test]
    fn image_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.fits");

        let data: Vec<f64> = (0..12).map(|i| 0.5 * (i as f64)).collect();
        let mut builder = FitsBuilder::create(&path).unwrap();
        builder.image_f64("DELTA", &[4, 3], &data).unwrap();
        builder.finish().unwrap();

        let fits = FitsFile::open(&path).unwrap();
        let hdu = fits.hdu_by_name("DELTA").unwrap();
        let (axes, got) = hdu.image_f64().unwrap();
        assert_eq!(axes, vec![4, 3]);
        assert_eq!(got, data);
    }

    #[test]
    fn rejects_non_fits() {
        assert!(matches!(FitsFile::from_bytes(b"not a fits file"), Err(FitsError::NotFits)));
    }
}
