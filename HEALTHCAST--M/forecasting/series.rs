use std::{fs::File, path::Path};

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Daily observations for one region, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Region identifier.
    pub name: String,
    /// Observations in chronological order.
    pub values: Vec<f64>,
}

impl Series {
    /// Creates a named series.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the series holds no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Provider of historical series by region.
pub trait SeriesSource: Send + Sync {
    /// Returns the series for `region`.
    fn series(&self, region: &str) -> Result<Series, SeriesError>;
}

/// Series held in memory, keyed by region.
#[derive(Debug, Clone, Default)]
pub struct InMemorySeriesSource {
    series: IndexMap<String, Vec<f64>>,
}

impl InMemorySeriesSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a region's observations.
    #[must_use]
    pub fn with_series(mut self, region: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert(region, values);
        self
    }

    /// Adds or replaces a region's observations.
    pub fn insert(&mut self, region: impl Into<String>, values: Vec<f64>) {
        self.series.insert(region.into(), values);
    }

    /// Regions in insertion order.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl SeriesSource for InMemorySeriesSource {
    fn series(&self, region: &str) -> Result<Series, SeriesError> {
        self.series
            .get(region)
            .map(|values| Series::new(region, values.clone()))
            .ok_or_else(|| SeriesError::UnknownRegion(region.to_string()))
    }
}

/// Wide CSV with one date column and one numeric column per region.
///
/// Rows are ordered by ascending date on load; rows sharing a date keep
/// their file order. Blank cells load as NaN. A non-numeric cell only
/// poisons its own column: that region's series fails, the others load.
#[derive(Debug, Clone)]
pub struct CsvSeriesSource {
    dates: Vec<NaiveDate>,
    inner: InMemorySeriesSource,
    rejected: IndexMap<String, RejectedCell>,
}

/// First non-numeric cell of a region column.
#[derive(Debug, Clone)]
struct RejectedCell {
    row: usize,
    value: String,
}

impl CsvSeriesSource {
    /// Reads and validates the whole file.
    pub fn load(path: impl AsRef<Path>, date_column: &str) -> Result<Self, SeriesError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, date_column)
    }

    /// Parses CSV content from any reader.
    pub fn from_reader(reader: impl std::io::Read, date_column: &str) -> Result<Self, SeriesError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();
        let date_idx = headers
            .iter()
            .position(|header| header == date_column)
            .ok_or_else(|| SeriesError::MissingDateColumn(date_column.to_string()))?;
        let regions: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != date_idx)
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();

        let mut rejected: IndexMap<String, RejectedCell> = IndexMap::new();
        let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
        for (offset, record) in reader.records().enumerate() {
            let record = record?;
            let row = offset + 1;
            let raw_date = record.get(date_idx).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| {
                SeriesError::InvalidDate {
                    row,
                    value: raw_date.to_string(),
                }
            })?;
            let mut values = Vec::with_capacity(regions.len());
            for (idx, name) in &regions {
                let raw = record.get(*idx).unwrap_or_default();
                let value = if raw.is_empty() {
                    f64::NAN
                } else if let Ok(value) = raw.parse::<f64>() {
                    value
                } else {
                    rejected
                        .entry(name.clone())
                        .or_insert_with(|| RejectedCell {
                            row,
                            value: raw.to_string(),
                        });
                    f64::NAN
                };
                values.push(value);
            }
            rows.push((date, values));
        }
        rows.sort_by_key(|(date, _)| *date);

        let mut inner = InMemorySeriesSource::new();
        for (position, (_, name)) in regions.iter().enumerate() {
            inner.insert(
                name.clone(),
                rows.iter().map(|(_, values)| values[position]).collect(),
            );
        }
        Ok(Self {
            dates: rows.into_iter().map(|(date, _)| date).collect(),
            inner,
            rejected,
        })
    }

    /// Dates of the loaded rows, ascending.
    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Region columns in file order.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.inner.regions()
    }
}

impl SeriesSource for CsvSeriesSource {
    fn series(&self, region: &str) -> Result<Series, SeriesError> {
        if let Some(cell) = self.rejected.get(region) {
            return Err(SeriesError::InvalidValue {
                row: cell.row,
                column: region.to_string(),
                value: cell.value.clone(),
            });
        }
        self.inner.series(region)
    }
}
