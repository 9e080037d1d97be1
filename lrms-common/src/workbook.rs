//! `.xlsx` workbook reading
//!
//! Uses `calamine` to turn every worksheet into a [`Table`], keeping the
//! workbook's sheet order.

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::path::Path;
use tracing::debug;

use crate::dataset::{Cell, Dataset, Table};
use crate::Result;

/// File extension accepted for uploads
pub const WORKBOOK_EXTENSION: &str = ".xlsx";

/// Read every sheet of the workbook at `path`
pub fn read_workbook(path: &Path) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let mut dataset = Dataset::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let table = table_from_range(&range);
        debug!(sheet = %name, rows = table.len(), "Read worksheet");
        dataset.insert(name, table);
    }

    Ok(dataset)
}

/// Read a single sheet; `Ok(None)` when the workbook has no such sheet
pub fn read_sheet(path: &Path, sheet: &str) -> Result<Option<Table>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Ok(None);
    }

    let range = workbook.worksheet_range(sheet)?;
    Ok(Some(table_from_range(&range)))
}

fn table_from_range(range: &Range<Data>) -> Table {
    Table::from_rows(range.rows().map(|row| row.iter().map(cell_from_data).collect()))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => Cell::DateTime(ndt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::DateTime(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
