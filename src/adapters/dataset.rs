//! CSV dataset loader for training.
//!
//! Expects a header row naming the thirteen feature columns plus `target`;
//! column order in the file does not matter.

use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{FeatureRecord, LabeledRecord};

/// Error type for dataset loading.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to open dataset {path:?}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed dataset row {line}: {reason}")]
    Row { line: u64, reason: String },

    #[error("Target on row {line} must be 0 or 1, got {value}")]
    Target { line: u64, value: u8 },

    #[error("Dataset contains no rows")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct DatasetRow {
    age: i32,
    sex: i32,
    cp: i32,
    trestbps: i32,
    chol: i32,
    fbs: i32,
    restecg: i32,
    thalach: i32,
    exang: i32,
    oldpeak: f64,
    slope: i32,
    ca: i32,
    thal: i32,
    target: u8,
}

impl From<DatasetRow> for LabeledRecord {
    fn from(row: DatasetRow) -> Self {
        Self {
            features: FeatureRecord {
                age: row.age,
                sex: row.sex,
                cp: row.cp,
                trestbps: row.trestbps,
                chol: row.chol,
                fbs: row.fbs,
                restecg: row.restecg,
                thalach: row.thalach,
                exang: row.exang,
                oldpeak: row.oldpeak,
                slope: row.slope,
                ca: row.ca,
                thal: row.thal,
            },
            target: row.target,
        }
    }
}

/// Read labeled records from any CSV source.
///
/// Rows outside the inference-time input domain are kept (the model is
/// trained on the data as recorded) but counted in a warning.
///
/// # Errors
/// Returns error on unparsable rows, non-binary targets or an empty file.
pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<LabeledRecord>, DatasetError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    let mut out_of_domain = 0usize;

    for result in csv.deserialize::<DatasetRow>() {
        let row = result.map_err(|e| DatasetError::Row {
            line: e.position().map_or(0, csv::Position::line),
            reason: e.to_string(),
        })?;
        let line = records.len() as u64 + 2;
        if !row.oldpeak.is_finite() {
            return Err(DatasetError::Row {
                line,
                reason: "oldpeak is not finite".into(),
            });
        }
        if row.target > 1 {
            return Err(DatasetError::Target {
                line,
                value: row.target,
            });
        }
        let record = LabeledRecord::from(row);
        if record.features.validate().is_err() {
            out_of_domain += 1;
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(DatasetError::Empty);
    }
    if out_of_domain > 0 {
        tracing::warn!(
            "{out_of_domain} of {} dataset rows fall outside the input domain",
            records.len()
        );
    }
    Ok(records)
}

/// Load labeled records from a CSV file.
///
/// # Errors
/// Returns error if the file cannot be opened or parsed.
pub fn load_records(path: &Path) -> Result<Vec<LabeledRecord>, DatasetError> {
    let file = std::fs::File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(io::BufReader::new(file))?;
    tracing::info!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}
