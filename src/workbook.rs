use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

use crate::roster::Cell;

fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::from(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

/// Reads one worksheet (the first unless `sheet` names another) into rows of
/// cells. Row and column positions are absolute: calamine ranges start at the
/// first used cell, so the gap above/left of it is padded back in.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> anyhow::Result<Vec<Vec<Cell>>> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    if ext == "csv" {
        return read_csv_rows(path);
    }

    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("cannot open workbook {}", path.display()))?;
    let name = match sheet {
        Some(s) => s.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("workbook contains no sheets"))?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| anyhow!("error reading sheet '{}': {}", name, e))?;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };
    let mut rows: Vec<Vec<Cell>> = (0..start_row).map(|_| Vec::new()).collect();
    for r in range.rows() {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(r.iter().map(cell_from_data));
        rows.push(cells);
    }
    log::debug!(
        "read {} rows from sheet '{}' of {}",
        rows.len(),
        name,
        path.display()
    );
    Ok(rows)
}

fn read_csv_rows(path: &Path) -> anyhow::Result<Vec<Vec<Cell>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot open csv {}", path.display()))?;
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from).collect());
    }
    Ok(rows)
}
