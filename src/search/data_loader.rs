use csv::ReaderBuilder;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PickerError, Result};

/// One dataset entry: field name to value, in file order.
pub type DatasetRecord = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    /// A single JSON array of objects.
    Json,
    /// One JSON object per line.
    JsonLines,
    /// Header row plus string cells.
    Csv,
}

impl DatasetFormat {
    /// Picks the format from the file extension; anything unrecognised is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jsonl") | Some("ndjson") => DatasetFormat::JsonLines,
            Some("csv") => DatasetFormat::Csv,
            _ => DatasetFormat::Json,
        }
    }
}

fn io_error(path: &Path, err: io::Error) -> PickerError {
    if err.kind() == io::ErrorKind::NotFound {
        PickerError::FileNotFound(path.to_path_buf())
    } else {
        PickerError::Io {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

fn into_record(path: &Path, value: Value, position: usize) -> Result<DatasetRecord> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PickerError::parse(
            path,
            format!("entry {} is not an object (found {})", position, json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn load_json(path: &Path) -> Result<Vec<DatasetRecord>> {
    let contents = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let entries: Vec<Value> = serde_json::from_str(&contents).map_err(|e| PickerError::parse(path, e))?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, v)| into_record(path, v, i))
        .collect()
}

fn load_json_lines(path: &Path) -> Result<Vec<DatasetRecord>> {
    let contents = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let mut records = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|e| PickerError::parse(path, format!("line {}: {}", line_no + 1, e)))?;
        records.push(into_record(path, value, records.len())?);
    }
    Ok(records)
}

fn load_csv(path: &Path) -> Result<Vec<DatasetRecord>> {
    let file = fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = rdr.headers().map_err(|e| PickerError::parse(path, e))?.clone();

    let mut records = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| PickerError::parse(path, format!("row {}: {}", row_index, e)))?;
        let record: DatasetRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(h, cell)| (h.to_string(), Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Reads every record of a dataset file.
pub fn load_records(path: &Path) -> Result<Vec<DatasetRecord>> {
    if !path.exists() {
        return Err(PickerError::FileNotFound(path.to_path_buf()));
    }

    match DatasetFormat::from_path(path) {
        DatasetFormat::Json => load_json(path),
        DatasetFormat::JsonLines => load_json_lines(path),
        DatasetFormat::Csv => load_csv(path),
    }
}

/// Pulls the text of `field` out of every record, failing on the first record
/// that lacks it or holds a non-string value.
pub fn field_texts(path: &Path, records: &[DatasetRecord], field: &str) -> Result<Vec<String>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| match record.get(field) {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(_) => Err(PickerError::FieldNotText {
                path: path.to_path_buf(),
                field: field.to_string(),
                index,
            }),
            None => Err(PickerError::MissingField {
                path: path.to_path_buf(),
                field: field.to_string(),
                index,
            }),
        })
        .collect()
}
