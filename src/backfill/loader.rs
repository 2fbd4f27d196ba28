use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::backfill::DATE_FORMAT;
use crate::error::LoadError;
use crate::models::DailyRecord;

const HEADERS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

/// Column positions resolved from a header row
#[derive(Debug, Default)]
struct Columns {
    date: Option<usize>,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    adj_close: Option<usize>,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut columns = Columns::default();
        for (i, header) in headers.iter().enumerate() {
            let normalized: String = header
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            match normalized.as_str() {
                "date" => columns.date = Some(i),
                "open" => columns.open = Some(i),
                "high" => columns.high = Some(i),
                "low" => columns.low = Some(i),
                "close" => columns.close = Some(i),
                "adjclose" => columns.adj_close = Some(i),
                "volume" => columns.volume = Some(i),
                _ => {}
            }
        }
        columns
    }

    /// Adjusted close when present, plain close otherwise
    fn price(&self) -> Option<(usize, &'static str)> {
        self.adj_close
            .map(|i| (i, "Adj Close"))
            .or_else(|| self.close.map(|i| (i, "Close")))
    }
}

/// Pick tab or comma by looking at the header line
pub fn sniff_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Load a daily series from a tab- or comma-delimited file
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<Vec<DailyRecord>, LoadError> {
    let content = fs::read_to_string(path.as_ref())?;
    let header_line = content.lines().next().unwrap_or_default();
    let delimiter = sniff_delimiter(header_line);

    let records = parse_series(content.as_bytes(), delimiter)?;
    tracing::debug!(
        "Loaded {} daily records from {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(records)
}

/// Parse rows in file order, numbering them from 0
pub fn parse_series<R: Read>(reader: R, delimiter: u8) -> Result<Vec<DailyRecord>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = Columns::from_headers(&headers);
    let (price_idx, price_name) = columns.price().ok_or_else(|| {
        LoadError::MissingPriceColumn(headers.iter().collect::<Vec<_>>().join(", "))
    })?;

    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let price = parse_required(&row, price_idx, price_name, line)?;
        if !(price > 0.0) {
            return Err(LoadError::NonPositivePrice {
                line,
                column: price_name.to_string(),
                value: price,
            });
        }

        let close = match columns.close {
            Some(i) => parse_optional(&row, i, "Close", line)?.unwrap_or(price),
            None => price,
        };
        let field = |idx: Option<usize>, name: &str, default: f64| -> Result<f64, LoadError> {
            match idx {
                Some(i) => Ok(parse_optional(&row, i, name, line)?.unwrap_or(default)),
                None => Ok(default),
            }
        };

        records.push(DailyRecord {
            sequence_index: records.len(),
            date: parse_date_column(&row, columns.date, line)?,
            open: field(columns.open, "Open", close)?,
            high: field(columns.high, "High", close)?,
            low: field(columns.low, "Low", close)?,
            close,
            adj_close: price,
            volume: field(columns.volume, "Volume", 0.0)?,
        });
    }

    if records.is_empty() {
        return Err(LoadError::Empty);
    }

    Ok(records)
}

fn parse_required(row: &StringRecord, idx: usize, column: &str, line: u64) -> Result<f64, LoadError> {
    parse_optional(row, idx, column, line)?.ok_or_else(|| LoadError::InvalidValue {
        line,
        column: column.to_string(),
        value: String::new(),
    })
}

/// Empty cells and "null" are treated as missing
fn parse_optional(
    row: &StringRecord,
    idx: usize,
    column: &str,
    line: u64,
) -> Result<Option<f64>, LoadError> {
    let raw = row.get(idx).unwrap_or_default();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| LoadError::InvalidValue {
            line,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

fn parse_date_column(
    row: &StringRecord,
    idx: Option<usize>,
    line: u64,
) -> Result<Option<NaiveDate>, LoadError> {
    let Some(raw) = idx.and_then(|i| row.get(i)).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    // Accept "2023-04-20" as well as "2023-04-20 00:00:00"
    let day_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day_part, DATE_FORMAT)
        .map(Some)
        .map_err(|_| LoadError::InvalidValue {
            line,
            column: "Date".to_string(),
            value: raw.to_string(),
        })
}

/// Write records as TSV with a Date/Open/High/Low/Close/Adj Close/Volume header
pub fn write_series<P: AsRef<Path>>(path: P, records: &[DailyRecord]) -> Result<(), LoadError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_ref())?;

    writer.write_record(HEADERS)?;
    for rec in records {
        let date = rec
            .date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        writer.write_record([
            date,
            rec.open.to_string(),
            rec.high.to_string(),
            rec.low.to_string(),
            rec.close.to_string(),
            rec.adj_close.to_string(),
            rec.volume.to_string(),
        ])?;
    }
    writer.flush()?;

    Ok(())
}
