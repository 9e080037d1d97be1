//! In-memory tabular datasets
//!
//! An uploaded workbook becomes a [`Dataset`]: an ordered list of named
//! sheets, each a [`Table`] whose first spreadsheet row supplied the column
//! names. Cell values keep their spreadsheet type so that identifiers can be
//! rendered the way a spreadsheet displays them.

use serde::Serialize;
use serde_json::{Map, Value};

/// Sheet holding the learner master records
pub const PROFILE_SHEET: &str = "learner_profiles";

/// Sheets every uploaded workbook must contain (exact, case-sensitive)
pub const REQUIRED_SHEETS: [&str; 8] = [
    PROFILE_SHEET,
    "pre_confidence_and_self_esteem",
    "post_confidence_and_self_esteem",
    "attendance",
    "worksheet_score",
    "hope_index",
    "pre_competency_evaluation",
    "post_competency_evaluation",
];

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Date/time already rendered as text
    DateTime(String),
}

impl Cell {
    /// Render the cell as display text.
    ///
    /// Whole floats print without a fractional part, so a learner number
    /// stored as `1001.0` compares equal to one stored as `1001`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) | Cell::DateTime(s) => s.clone(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// JSON value for page rendering; empty cells become `""`
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::String(String::new()),
            Cell::Text(s) | Cell::DateTime(s) => Value::String(s.clone()),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            Cell::Bool(b) => Value::Bool(*b),
        }
    }
}

/// A sheet's rows under a header of column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table from raw rows, the first of which is the header.
    ///
    /// Blank header cells are named `Unnamed: {index}`, completely blank data
    /// rows are dropped, and short rows are padded with empty cells.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<Cell>>,
    {
        let mut rows = rows.into_iter();
        let columns: Vec<String> = match rows.next() {
            Some(header) => header
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let name = cell.as_text();
                    if name.is_empty() {
                        format!("Unnamed: {}", i)
                    } else {
                        name
                    }
                })
                .collect(),
            None => return Table::default(),
        };

        let width = columns.len();
        let rows = rows
            .filter(|row| !row.iter().all(Cell::is_empty))
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Table { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell of `row` under column `name`, if the column exists
    pub fn cell<'a>(&'a self, row: &'a [Cell], name: &str) -> Option<&'a Cell> {
        self.column_index(name).and_then(|i| row.get(i))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column name
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, cell)| (col.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }

    pub fn preview(&self) -> TablePreview {
        TablePreview {
            columns: self.columns.clone(),
            rows: self.records(),
        }
    }
}

/// Serializable view of a table for page rendering
#[derive(Debug, Clone, Default, Serialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// Named sheet within a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
}

/// Ordered collection of named tables (workbook order)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    sheets: Vec<Sheet>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet, replacing an existing sheet of the same name in place
    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        let name = name.into();
        match self.sheets.iter_mut().find(|s| s.name == name) {
            Some(sheet) => sheet.table = table,
            None => self.sheets.push(Sheet { name, table }),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|s| s.name == name).map(|s| &s.table)
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Required sheet names absent from this dataset, in required order
    pub fn missing_sheets(&self) -> Vec<&'static str> {
        REQUIRED_SHEETS
            .iter()
            .copied()
            .filter(|name| self.sheet(name).is_none())
            .collect()
    }
}

impl FromIterator<(String, Table)> for Dataset {
    fn from_iter<T: IntoIterator<Item = (String, Table)>>(iter: T) -> Self {
        let mut dataset = Dataset::new();
        for (name, table) in iter {
            dataset.insert(name, table);
        }
        dataset
    }
}
