//! In-memory tabular dataset
//!
//! `SignalTable` holds rows of CSV cells under one shared header. Leading
//! columns carry metadata and the label, the trailing block carries the
//! signal window.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::error::{HeatError, Result};

/// A single CSV cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Parse a raw CSV field: empty is `Missing`, numeric text is `Number`
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Missing => Ok(()),
        }
    }
}

/// A label value with a total order: numbers first (by `total_cmp`), then text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Category {
    Number(f64),
    Text(String),
}

impl Category {
    /// Convert a cell into a category; missing cells have no category
    pub fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            // -0.0 and 0.0 are the same label
            Cell::Number(v) if *v == 0.0 => Some(Category::Number(0.0)),
            Cell::Number(v) => Some(Category::Number(*v)),
            Cell::Text(s) => Some(Category::Text(s.clone())),
            Cell::Missing => None,
        }
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Category {}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Category::Number(a), Category::Number(b)) => a.total_cmp(b),
            (Category::Number(_), Category::Text(_)) => Ordering::Less,
            (Category::Text(_), Category::Number(_)) => Ordering::Greater,
            (Category::Text(a), Category::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Number(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{}", *v as i64),
            Category::Number(v) => write!(f, "{}", v),
            Category::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Rows of cells under a shared header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl SignalTable {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from a header and rows, checking every row width
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append a row; its width must match the header
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(HeatError::Dataset(format!(
                "row {} has {} cells but the header has {} columns",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| HeatError::MissingColumn(name.to_string()))
    }

    /// Label categories of `column`, one per row
    pub fn categories(&self, column: &str) -> Result<Vec<Category>> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                Category::from_cell(&row[idx]).ok_or_else(|| {
                    HeatError::InvalidInput(format!(
                        "row {} has no value in label column '{}'",
                        row_idx, column
                    ))
                })
            })
            .collect()
    }

    /// Count rows per label category
    pub fn label_counts(&self, column: &str) -> Result<BTreeMap<Category, usize>> {
        let mut counts = BTreeMap::new();
        for category in self.categories(column)? {
            *counts.entry(category).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// The last `count` columns of every row as f32, row-major
    pub fn trailing_values(&self, count: usize) -> Result<Vec<f32>> {
        let start = self.trailing_start(count)?;
        let mut values = Vec::with_capacity(self.rows.len() * count);
        for (row_idx, row) in self.rows.iter().enumerate() {
            for (col_idx, cell) in row[start..].iter().enumerate() {
                let value = cell.as_f64().ok_or_else(|| self.non_numeric(row_idx, start + col_idx, cell))?;
                values.push(value as f32);
            }
        }
        Ok(values)
    }

    /// Index of the first of the last `count` columns
    pub fn trailing_start(&self, count: usize) -> Result<usize> {
        if self.width() < count {
            return Err(HeatError::SizeMismatch {
                expected: count,
                actual: self.width(),
            });
        }
        Ok(self.width() - count)
    }

    pub(crate) fn non_numeric(&self, row: usize, col: usize, cell: &Cell) -> HeatError {
        HeatError::InvalidInput(format!(
            "row {} column '{}' is not numeric: {:?}",
            row, self.columns[col], cell
        ))
    }

    /// New table with the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let rows = indices
            .iter()
            .map(|&i| {
                self.rows.get(i).cloned().ok_or_else(|| {
                    HeatError::InvalidInput(format!("row index {} out of range ({})", i, self.len()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Append all rows of `other`; headers must be identical
    pub fn append(&mut self, other: SignalTable) -> Result<()> {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.columns != other.columns {
            return Err(HeatError::Dataset(format!(
                "header mismatch: expected {} columns starting with {:?}, found {} starting with {:?}",
                self.columns.len(),
                self.columns.first(),
                other.columns.len(),
                other.columns.first()
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> SignalTable {
        SignalTable::from_rows(
            vec!["id".into(), "Heat".into(), "v0".into(), "v1".into()],
            vec![
                vec![Cell::Text("a".into()), Cell::Number(0.0), Cell::Number(1.0), Cell::Number(2.0)],
                vec![Cell::Text("b".into()), Cell::Number(1.0), Cell::Number(3.0), Cell::Number(4.0)],
                vec![Cell::Text("c".into()), Cell::Number(1.0), Cell::Number(5.0), Cell::Number(6.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(" 1.5 "), Cell::Number(1.5));
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse("plant_a"), Cell::Text("plant_a".into()));
    }

    #[test]
    fn test_push_row_width_checked() {
        let mut table = SignalTable::new(vec!["a".into(), "b".into()]);
        assert!(table.push_row(vec![Cell::Missing]).is_err());
        assert!(table.push_row(vec![Cell::Missing, Cell::Missing]).is_ok());
    }

    #[test]
    fn test_category_order_numbers_before_text() {
        let mut cats = vec![
            Category::Text("hot".into()),
            Category::Number(1.0),
            Category::Number(0.0),
        ];
        cats.sort();
        assert_eq!(cats[0], Category::Number(0.0));
        assert_eq!(cats[2], Category::Text("hot".into()));
        assert_eq!(Category::Number(1.0).to_string(), "1");
    }

    #[test]
    fn test_negative_zero_is_the_zero_label() {
        let table = SignalTable::from_rows(
            vec!["Heat".into()],
            vec![vec![Cell::Number(-0.0)], vec![Cell::Number(0.0)], vec![Cell::Number(1.0)]],
        )
        .unwrap();
        let counts = table.label_counts("Heat").unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&Category::Number(0.0)], 2);
        assert_eq!(Category::from_cell(&Cell::Number(-0.0)).unwrap().to_string(), "0");
    }

    #[test]
    fn test_label_counts_and_missing_column() {
        let table = small_table();
        let counts = table.label_counts("Heat").unwrap();
        assert_eq!(counts[&Category::Number(0.0)], 1);
        assert_eq!(counts[&Category::Number(1.0)], 2);
        assert!(matches!(table.label_counts("Cold"), Err(HeatError::MissingColumn(_))));
    }

    #[test]
    fn test_trailing_values_row_major() {
        let table = small_table();
        assert_eq!(table.trailing_values(2).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(matches!(
            table.trailing_values(5),
            Err(HeatError::SizeMismatch { expected: 5, actual: 4 })
        ));
        assert!(table.trailing_values(4).is_err());
    }

    #[test]
    fn test_select_rows_and_append() {
        let table = small_table();
        let picked = table.select_rows(&[2, 0]).unwrap();
        assert_eq!(picked.row(0).unwrap()[0], Cell::Text("c".into()));
        assert!(table.select_rows(&[7]).is_err());

        let mut merged = SignalTable::default();
        merged.append(picked.clone()).unwrap();
        merged.append(picked).unwrap();
        assert_eq!(merged.len(), 4);

        let other = SignalTable::new(vec!["x".into()]);
        assert!(merged.append(other).is_err());
    }
}
