// Trend Reports
// Trend table and per-record prediction CSVs

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::TrendError;
use crate::models::{ClassLabel, YearlyAggregate};

use super::aggregation::RecordPrediction;

pub fn trend_header() -> Vec<&'static str> {
    let mut header = vec!["year"];
    header.extend(ClassLabel::ALL.iter().map(|l| l.display_name()));
    header.push("total");
    header.extend(ClassLabel::ALL.iter().map(|l| l.percent_column()));
    header
}

/// Write the trend table, rows in the given (ascending) order. Percentages are fractions of `total`.
pub fn write_trends<W: Write>(writer: W, rows: &[YearlyAggregate]) -> Result<(), TrendError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(trend_header())?;
    for row in rows {
        let mut record = vec![row.year.to_string()];
        record.extend(ClassLabel::ALL.iter().map(|l| row.count(*l).to_string()));
        record.push(row.total.to_string());
        record.extend(ClassLabel::ALL.iter().map(|l| row.percent(*l).to_string()));
        out.write_record(&record)?;
    }
    out.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_trends_file(path: &Path, rows: &[YearlyAggregate]) -> Result<(), TrendError> {
    let file = create_file(path)?;
    write_trends(file, rows)?;
    tracing::info!(path = %path.display(), years = rows.len(), "Trend table written");
    Ok(())
}

pub fn write_predictions<W: Write>(writer: W, predictions: &[RecordPrediction]) -> Result<(), TrendError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["year", "predicted_label", "confidence"])?;
    for p in predictions {
        out.write_record([
            p.year.to_string(),
            p.label.short_name().to_string(),
            p.confidence.to_string(),
        ])?;
    }
    out.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_predictions_file(path: &Path, predictions: &[RecordPrediction]) -> Result<(), TrendError> {
    let file = create_file(path)?;
    write_predictions(file, predictions)?;
    tracing::info!(path = %path.display(), records = predictions.len(), "Record predictions written");
    Ok(())
}

/// Read stored `(year, label)` rows. The label column may be `label` or
/// `predicted_label`, holding short or display names.
pub fn read_label_rows<R: Read>(reader: R) -> Result<Vec<(i32, ClassLabel)>, TrendError> {
    let mut input = csv::Reader::from_reader(reader);
    let headers = input.headers()?.clone();
    let year_idx = headers
        .iter()
        .position(|h| h.trim() == "year")
        .ok_or_else(|| TrendError::InvalidRow("missing 'year' column".to_string()))?;
    let label_idx = headers
        .iter()
        .position(|h| matches!(h.trim(), "label" | "predicted_label"))
        .ok_or_else(|| TrendError::InvalidRow("missing 'label' or 'predicted_label' column".to_string()))?;

    let mut rows = Vec::new();
    for (line, record) in input.records().enumerate() {
        let record = record?;
        let year_raw = record.get(year_idx).unwrap_or("").trim();
        let year = year_raw
            .parse::<f64>()
            .ok()
            .filter(|y| y.fract() == 0.0)
            .map(|y| y as i32)
            .ok_or_else(|| TrendError::InvalidRow(format!("row {}: bad year '{}'", line + 1, year_raw)))?;
        let label_raw = record.get(label_idx).unwrap_or("");
        let label = ClassLabel::parse(label_raw)
            .ok_or_else(|| TrendError::InvalidRow(format!("row {}: unknown label '{}'", line + 1, label_raw)))?;
        rows.push((year, label));
    }
    Ok(rows)
}

pub fn read_label_rows_file(path: &Path) -> Result<Vec<(i32, ClassLabel)>, TrendError> {
    let file = fs::File::open(path).map_err(|e| TrendError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_label_rows(file)
}

fn create_file(path: &Path) -> Result<fs::File, TrendError> {
    let io_err = |e| TrendError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    fs::File::create(path).map_err(io_err)
}
