//! File-based checkpoint store

use super::{relative_path, CheckpointStore, CheckpointValue, SerializationMode};
use crate::dataset::{Cell, Dataset};
use crate::error::CheckpointError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Bumped whenever the opaque layout changes
const OPAQUE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct OpaqueEnvelope {
    version: u32,
    record: OpaqueRecord,
}

// bincode is not self-describing, so JSON values travel as their text
#[derive(Serialize, Deserialize)]
enum OpaqueRecord {
    Table(Dataset),
    Json(String),
}

/// Checkpoint store writing one file per `(stage, key)` under a base directory
///
/// Files are written to a temporary sibling and renamed into place, so an
/// interrupted save never leaves a truncated checkpoint behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    base_dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute location of a checkpoint: `{base_dir}/{stage}/{key}.{ext}`
    pub fn path_for(
        &self,
        stage: &str,
        key: &str,
        mode: SerializationMode,
    ) -> Result<PathBuf, CheckpointError> {
        Ok(self.base_dir.join(relative_path(stage, key, mode)?))
    }

    fn encode(
        key: &str,
        value: &CheckpointValue,
        mode: SerializationMode,
    ) -> Result<Vec<u8>, CheckpointError> {
        match mode {
            SerializationMode::Structured => match value {
                CheckpointValue::Table(dataset) => encode_table(dataset),
                CheckpointValue::Json(_) => Err(CheckpointError::NotTabular {
                    key: key.to_string(),
                }),
            },
            SerializationMode::Opaque => {
                let record = match value {
                    CheckpointValue::Table(dataset) => OpaqueRecord::Table(dataset.clone()),
                    CheckpointValue::Json(json) => OpaqueRecord::Json(
                        serde_json::to_string(json)
                            .map_err(|e| CheckpointError::Encode(e.to_string()))?,
                    ),
                };
                let envelope = OpaqueEnvelope {
                    version: OPAQUE_FORMAT_VERSION,
                    record,
                };
                bincode::serialize(&envelope).map_err(|e| CheckpointError::Encode(e.to_string()))
            }
        }
    }

    fn decode(
        path: &Path,
        bytes: &[u8],
        mode: SerializationMode,
    ) -> Result<CheckpointValue, CheckpointError> {
        let corrupt = |reason: String| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        match mode {
            SerializationMode::Structured => decode_table(bytes)
                .map(CheckpointValue::Table)
                .map_err(corrupt),
            SerializationMode::Opaque => {
                let envelope: OpaqueEnvelope =
                    bincode::deserialize(bytes).map_err(|e| corrupt(e.to_string()))?;
                if envelope.version != OPAQUE_FORMAT_VERSION {
                    return Err(corrupt(format!(
                        "unsupported format version {}",
                        envelope.version
                    )));
                }
                match envelope.record {
                    OpaqueRecord::Table(dataset) => Ok(CheckpointValue::Table(dataset)),
                    OpaqueRecord::Json(text) => serde_json::from_str(&text)
                        .map(CheckpointValue::Json)
                        .map_err(|e| corrupt(e.to_string())),
                }
            }
        }
    }
}

/// CSV with a header row; every cell is written as its JSON literal so
/// types survive the trip (`"1"` stays text, `1` stays an integer)
///
/// Tables the format cannot carry back unchanged are refused: rows without
/// any column, and non-finite floats, which JSON has no literal for.
fn encode_table(dataset: &Dataset) -> Result<Vec<u8>, CheckpointError> {
    let encode_err = |e: csv::Error| CheckpointError::Encode(e.to_string());

    if dataset.columns().is_empty() {
        if !dataset.is_empty() {
            return Err(CheckpointError::Encode(format!(
                "{} rows have no columns to write",
                dataset.len()
            )));
        }
        return Ok(Vec::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.columns()).map_err(encode_err)?;

    for (line, row) in dataset.rows().iter().enumerate() {
        let mut fields = Vec::with_capacity(row.len());
        for (cell, column) in row.iter().zip(dataset.columns()) {
            if !is_finite(cell) {
                return Err(CheckpointError::Encode(format!(
                    "row {}, column '{}': non-finite float {}",
                    line + 1,
                    column,
                    cell
                )));
            }
            fields.push(
                serde_json::to_string(&cell.to_json())
                    .map_err(|e| CheckpointError::Encode(e.to_string()))?,
            );
        }
        writer.write_record(&fields).map_err(encode_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| CheckpointError::Encode(e.to_string()))
}

fn is_finite(cell: &Cell) -> bool {
    match cell {
        Cell::Float(x) => x.is_finite(),
        Cell::Vector(values) => values.iter().all(|x| x.is_finite()),
        _ => true,
    }
}

fn decode_table(bytes: &[u8]) -> Result<Dataset, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let mut dataset = Dataset::new(headers.iter());

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let mut row = Vec::with_capacity(record.len());
        for field in record.iter() {
            let json: serde_json::Value = serde_json::from_str(field)
                .map_err(|e| format!("row {}: {}", line + 1, e))?;
            let cell = Cell::from_json(&json)
                .ok_or_else(|| format!("row {}: value {} is not a cell", line + 1, json))?;
            row.push(cell);
        }
        dataset.push_row(row).map_err(|e| e.to_string())?;
    }

    Ok(dataset)
}

fn io_error(path: &Path, source: std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(
        &self,
        stage: &str,
        key: &str,
        value: &CheckpointValue,
        mode: SerializationMode,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.path_for(stage, key, mode)?;
        let bytes = Self::encode(key, value, mode)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let tmp_path = path.with_extension(format!("{}.tmp", mode.extension()));
        fs::write(&tmp_path, &bytes).map_err(|e| io_error(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| io_error(&path, e))?;

        Ok(path)
    }

    fn load(
        &self,
        stage: &str,
        key: &str,
        mode: SerializationMode,
    ) -> Result<Option<CheckpointValue>, CheckpointError> {
        let path = self.path_for(stage, key, mode)?;

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        Self::decode(&path, &bytes, mode).map(Some)
    }

    fn remove(
        &self,
        stage: &str,
        key: &str,
        mode: SerializationMode,
    ) -> Result<bool, CheckpointError> {
        let path = self.path_for(stage, key, mode)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn exists(&self, stage: &str, key: &str, mode: SerializationMode) -> bool {
        self.path_for(stage, key, mode)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }
}
