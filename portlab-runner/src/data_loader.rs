//! Dataset adapters for the runner.
//!
//! Three sources feed a `PriceDataset`:
//! 1. Wide CSV files: `date,<asset>,<asset>...`, ISO dates, one file per
//!    field. The close file defines the date axis; extra field files are
//!    matched to it by date.
//! 2. Long CSV files: `date,asset,close` rows, aligned onto the union of
//!    their dates.
//! 3. Synthetic random walks seeded from each asset name, weekdays only.
//!
//! Missing cells (empty or `NaN`) stay `NaN`; nothing is forward-filled.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use thiserror::Error;
use tracing::{debug, info, warn};

use portlab_core::data::{
    align_series, missing_rates, DatasetError, PriceDataset, CLOSE, MARKET_CAP,
};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("first header column must be 'date', found '{0}'")]
    MissingDateColumn(String),

    #[error("file has no asset columns")]
    NoAssets,

    #[error("long format header must be 'date,asset,close', found '{0}'")]
    LongHeader(String),

    #[error("row {row}: invalid date '{value}'")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: invalid value '{value}' for {asset}")]
    InvalidValue {
        row: usize,
        asset: String,
        value: String,
    },

    #[error("synthetic range {start}..={end} contains no weekdays")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

/// One wide table: a date axis and a column per asset.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Parse a wide CSV table from any reader.
pub fn read_wide_csv<R: Read>(reader: R) -> Result<WideTable, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let first = headers.get(0).unwrap_or_default();
    if !first.eq_ignore_ascii_case("date") {
        return Err(LoadError::MissingDateColumn(first.to_string()));
    }
    let assets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    if assets.is_empty() {
        return Err(LoadError::NoAssets);
    }

    let mut dates = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); assets.len()];
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let raw_date = record.get(0).unwrap_or_default();
        let date = raw_date
            .parse::<NaiveDate>()
            .map_err(|_| LoadError::InvalidDate {
                row,
                value: raw_date.to_string(),
            })?;
        dates.push(date);
        for (k, asset) in assets.iter().enumerate() {
            let cell = record.get(k + 1).unwrap_or_default();
            values[k].push(parse_cell(cell).ok_or_else(|| LoadError::InvalidValue {
                row,
                asset: asset.clone(),
                value: cell.to_string(),
            })?);
        }
    }

    Ok(WideTable {
        dates,
        columns: assets.into_iter().zip(values).collect(),
    })
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a close-price CSV plus optional named field files.
///
/// Extra fields are aligned to the close file's dates: a date missing from a
/// field file becomes `NaN` for that field, and field-file dates absent from
/// the close file are dropped.
pub fn load_csv_dataset(
    close_path: &Path,
    extra_fields: &[(String, PathBuf)],
) -> Result<PriceDataset, LoadError> {
    let closes = read_wide_csv(open(close_path)?)?;
    let mut fields = BTreeMap::new();

    for (name, path) in extra_fields {
        let table = read_wide_csv(open(path)?)?;
        let row_of: HashMap<NaiveDate, usize> = table
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();
        let aligned: BTreeMap<String, Vec<f64>> = table
            .columns
            .iter()
            .map(|(asset, column)| {
                let values = closes
                    .dates
                    .iter()
                    .map(|d| row_of.get(d).map_or(f64::NAN, |&i| column[i]))
                    .collect();
                (asset.clone(), values)
            })
            .collect();
        debug!(field = %name, assets = aligned.len(), "merged field file");
        fields.insert(name.clone(), aligned);
    }
    fields.insert(CLOSE.to_string(), closes.columns);

    let dataset = PriceDataset::from_fields(closes.dates, fields)?;
    info!(
        path = %close_path.display(),
        rows = dataset.len(),
        assets = dataset.assets().len(),
        "loaded csv dataset"
    );
    warn_missing(&dataset);
    Ok(dataset)
}

/// Parse long-format closes (`date,asset,close`) from any reader.
pub fn read_long_csv<R: Read>(reader: R) -> Result<PriceDataset, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let names: Vec<String> = headers.iter().map(str::to_ascii_lowercase).collect();
    if names != ["date", "asset", "close"] {
        return Err(LoadError::LongHeader(headers.iter().collect::<Vec<_>>().join(",")));
    }

    let mut series: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let raw_date = record.get(0).unwrap_or_default();
        let date = raw_date
            .parse::<NaiveDate>()
            .map_err(|_| LoadError::InvalidDate {
                row,
                value: raw_date.to_string(),
            })?;
        let asset = record.get(1).unwrap_or_default().to_string();
        let cell = record.get(2).unwrap_or_default();
        let close = parse_cell(cell).ok_or_else(|| LoadError::InvalidValue {
            row,
            asset: asset.clone(),
            value: cell.to_string(),
        })?;
        series.entry(asset).or_default().push((date, close));
    }
    if series.is_empty() {
        return Err(LoadError::NoAssets);
    }
    Ok(align_series(series)?)
}

/// Load a long-format close CSV.
pub fn load_long_csv(path: &Path) -> Result<PriceDataset, LoadError> {
    let dataset = read_long_csv(open(path)?)?;
    info!(
        path = %path.display(),
        rows = dataset.len(),
        assets = dataset.assets().len(),
        "loaded long csv dataset"
    );
    warn_missing(&dataset);
    Ok(dataset)
}

fn warn_missing(dataset: &PriceDataset) {
    for (asset, rate) in missing_rates(dataset) {
        if rate > 0.0 {
            warn!(asset = %asset, missing_pct = rate * 100.0, "close has gaps");
        }
    }
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Deterministic synthetic dataset over the weekdays in `[start, end]`.
///
/// Each asset gets a random-walk close (daily moves in ±3%) and a market cap
/// from a fixed share count, both seeded from the asset name so the same name
/// always yields the same series.
pub fn synthetic_dataset(
    assets: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceDataset, LoadError> {
    let dates = weekdays(start, end);
    if dates.is_empty() {
        return Err(LoadError::EmptyRange { start, end });
    }

    let mut closes = BTreeMap::new();
    let mut caps = BTreeMap::new();
    for asset in assets {
        let (close, cap) = synthetic_series(asset, dates.len());
        closes.insert(asset.clone(), close);
        caps.insert(asset.clone(), cap);
    }

    let mut fields = BTreeMap::new();
    fields.insert(CLOSE.to_string(), closes);
    fields.insert(MARKET_CAP.to_string(), caps);
    let dataset = PriceDataset::from_fields(dates, fields)?;
    info!(
        rows = dataset.len(),
        assets = dataset.assets().len(),
        "generated synthetic dataset"
    );
    Ok(dataset)
}

fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(current);
        }
        current += chrono::Duration::days(1);
    }
    dates
}

fn synthetic_series(asset: &str, n: usize) -> (Vec<f64>, Vec<f64>) {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(asset.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let shares: f64 = rng.gen_range(1.0e6..1.0e8);
    let mut price = 100.0_f64;
    let mut closes = Vec::with_capacity(n);
    let mut caps = Vec::with_capacity(n);
    for _ in 0..n {
        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        price *= 1.0 + daily_return;
        closes.push(price);
        caps.push(price * shares);
    }
    (closes, caps)
}

// ─── Fingerprint ────────────────────────────────────────────────────

/// Deterministic BLAKE3 hash over the dataset's dates and every column.
///
/// Columns are visited in sorted (field, asset) order, so the hash depends
/// only on content.
pub fn dataset_fingerprint(dataset: &PriceDataset) -> String {
    let mut hasher = blake3::Hasher::new();
    for date in dataset.dates() {
        hasher.update(date.to_string().as_bytes());
    }
    for (field, asset, column) in dataset.columns() {
        hasher.update(field.as_bytes());
        hasher.update(asset.as_bytes());
        for value in column {
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
