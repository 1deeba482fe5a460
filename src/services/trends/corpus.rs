// Corpus Loading
// Dated article files (CSV, JSON array, JSON lines) into cleaned trend records

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrendError;
use crate::models::TrendRecord;
use crate::services::config_store::CleanerConfig;
use crate::services::text_cleaner::clean_text;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year regex"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M:%S"];

#[derive(Debug, Clone, Default)]
pub struct CorpusLoad {
    pub records: Vec<TrendRecord>,
    pub files_loaded: Vec<PathBuf>,
    pub files_missing: Vec<PathBuf>,
    /// Rows whose date could not be turned into a year.
    pub bad_dates: usize,
    pub empty_texts: usize,
}

#[derive(Debug, Clone)]
pub struct CorpusColumns<'a> {
    pub date: &'a str,
    pub text: &'a str,
}

// ============ Year Parsing ============

/// Year of a free-form date string. Falls back to the first plausible 4-digit year.
pub fn parse_year(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.year());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.year());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.year());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.year());
        }
    }
    if let Ok(n) = s.parse::<f64>() {
        return year_from_number(n);
    }
    YEAR_RE
        .captures(s)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Bare years pass through; larger values are epoch milliseconds or seconds.
fn year_from_number(n: f64) -> Option<i32> {
    if !n.is_finite() {
        return None;
    }
    if (1900.0..=2100.0).contains(&n) && n.fract() == 0.0 {
        return Some(n as i32);
    }
    let millis = if n.abs() >= 1e11 { n as i64 } else { (n * 1000.0) as i64 };
    Utc.timestamp_millis_opt(millis).single().map(|dt| dt.year())
}

fn year_from_json(value: &Value) -> Option<i32> {
    match value {
        Value::String(s) => parse_year(s),
        Value::Number(n) => n.as_f64().and_then(year_from_number),
        _ => None,
    }
}

// ============ Loading ============

/// Directories expand to their `.csv`, `.json` and `.jsonl` files. Missing paths are
/// warned about and skipped; at least one file must load.
pub fn load_corpus(
    inputs: &[PathBuf],
    columns: &CorpusColumns<'_>,
    cleaner: &CleanerConfig,
) -> Result<CorpusLoad, TrendError> {
    let mut load = CorpusLoad::default();

    for path in expand_inputs(inputs, &mut load)? {
        let before = load.records.len();
        match extension(&path).as_str() {
            "csv" => load_csv(&path, columns, cleaner, &mut load)?,
            "json" | "jsonl" => load_json(&path, columns, cleaner, &mut load)?,
            _ => {
                tracing::warn!(path = %path.display(), "Unsupported corpus file type, skipping");
                continue;
            }
        }
        tracing::info!(
            path = %path.display(),
            records = load.records.len() - before,
            "Corpus file loaded"
        );
        load.files_loaded.push(path);
    }

    if load.files_loaded.is_empty() {
        return Err(TrendError::NoInput(format!(
            "none of {} input path(s) could be read",
            inputs.len()
        )));
    }
    if load.bad_dates > 0 {
        tracing::warn!(rows = load.bad_dates, "Rows with unparseable dates skipped");
    }
    Ok(load)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

fn expand_inputs(inputs: &[PathBuf], load: &mut CorpusLoad) -> Result<Vec<PathBuf>, TrendError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(input)
                .map_err(|e| TrendError::Io {
                    path: input.clone(),
                    source: e,
                })?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && matches!(extension(p).as_str(), "csv" | "json" | "jsonl"))
                .collect();
            entries.sort();
            files.extend(entries);
        } else if input.exists() {
            files.push(input.clone());
        } else {
            tracing::warn!(path = %input.display(), "Corpus file not found, skipping");
            load.files_missing.push(input.clone());
        }
    }
    Ok(files)
}

fn push_record(load: &mut CorpusLoad, year: Option<i32>, text: &str, cleaner: &CleanerConfig) {
    let Some(year) = year else {
        load.bad_dates += 1;
        return;
    };
    let cleaned = clean_text(text, cleaner);
    if cleaned.is_empty() {
        load.empty_texts += 1;
        return;
    }
    load.records.push(TrendRecord {
        year,
        cleaned_text: cleaned,
    });
}

fn load_csv(
    path: &Path,
    columns: &CorpusColumns<'_>,
    cleaner: &CleanerConfig,
    load: &mut CorpusLoad,
) -> Result<(), TrendError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let find = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| TrendError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };
    let date_idx = find(columns.date)?;
    let text_idx = find(columns.text)?;

    for row in reader.records() {
        let row = row?;
        let year = row.get(date_idx).and_then(parse_year);
        let text = row.get(text_idx).unwrap_or("");
        push_record(load, year, text, cleaner);
    }
    Ok(())
}

fn load_json(
    path: &Path,
    columns: &CorpusColumns<'_>,
    cleaner: &CleanerConfig,
    load: &mut CorpusLoad,
) -> Result<(), TrendError> {
    let content = fs::read_to_string(path).map_err(|e| TrendError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let json_err = |e| TrendError::Json {
        path: path.to_path_buf(),
        source: e,
    };

    let items: Vec<Value> = if content.trim_start().starts_with('[') {
        serde_json::from_str(&content).map_err(json_err)?
    } else {
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()
            .map_err(json_err)?
    };

    for item in &items {
        let year = item.get(columns.date).and_then(year_from_json);
        let text = item.get(columns.text).and_then(Value::as_str).unwrap_or("");
        push_record(load, year, text, cleaner);
    }
    Ok(())
}
