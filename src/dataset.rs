//! Tabular working data threaded through the pipeline under the `dataset` key

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A single typed value in a [`Dataset`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Vector(Vec<f64>),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Cell::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// JSON literal for this cell
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Vector(v) => Value::Array(
                v.iter()
                    .map(|x| {
                        serde_json::Number::from_f64(*x)
                            .map(Value::Number)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            ),
        }
    }

    /// Inverse of [`Cell::to_json`]; objects and mixed arrays have no cell form
    pub fn from_json(value: &Value) -> Option<Cell> {
        match value {
            Value::Null => Some(Cell::Null),
            Value::Bool(b) => Some(Cell::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Cell::Int(i)),
                None => n.as_f64().map(Cell::Float),
            },
            Value::String(s) => Some(Cell::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<f64>>>()
                .map(Cell::Vector),
            Value::Object(_) => None,
        }
    }

    /// Best-effort typing of a raw CSV field
    pub fn infer(raw: &str) -> Cell {
        if raw.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Cell::Float(f);
            }
        }
        match raw {
            "true" | "True" => Cell::Bool(true),
            "false" | "False" => Cell::Bool(false),
            _ => Cell::Text(raw.to_string()),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
            Cell::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Column-named table of [`Cell`] rows
///
/// Every row has exactly one cell per column, including rows that arrive
/// through deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRecord")]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Deserialize)]
struct DatasetRecord {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TryFrom<DatasetRecord> for Dataset {
    type Error = PipelineError;

    fn try_from(record: DatasetRecord) -> PipelineResult<Self> {
        Self::from_rows(record.columns, record.rows)
    }
}

impl Dataset {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a dataset and check every row against the column count
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Cell>>) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dataset = Self::new(columns);
        for row in rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    /// Read a headed CSV file, typing each field with [`Cell::infer`]
    pub fn from_csv_path(path: &Path) -> PipelineResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(false).from_path(path)?;
        let headers = reader.headers()?.clone();
        let mut dataset = Self::new(headers.iter());

        for record in reader.records() {
            let record = record?;
            dataset.push_row(record.iter().map(Cell::infer).collect())?;
        }

        Ok(dataset)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> PipelineResult<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::Shape(format!(
                "row has {} cells but dataset has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column index, or a `MissingInput` error attributed to `step`
    pub fn require_column(&self, step: &str, name: &str) -> PipelineResult<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::missing(step, format!("dataset.{}", name)))
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Replace every cell of column `index` with `f(cell)`
    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(index) {
                *cell = f(cell);
            }
        }
    }

    /// Overwrite column `name`, appending it if it does not exist yet
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> PipelineResult<()> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::Shape(format!(
                "column '{}' has {} values but dataset has {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }
}
