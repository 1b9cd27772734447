/// One spreadsheet cell, normalized at the reader boundary.
///
/// Spreadsheet dates arrive as `Number` serials and error cells as `Empty`,
/// so nothing downstream has to know which reader produced the row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }

    /// Display text of the cell. Integral numbers render without a fraction
    /// so numeric student codes come out as `21200123`, not `21200123.0`.
    pub fn text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => b.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

pub fn cell_at(row: &[Cell], col: Option<usize>) -> &Cell {
    const EMPTY: &Cell = &Cell::Empty;
    col.and_then(|c| row.get(c)).unwrap_or(EMPTY)
}

pub fn non_blank_count(row: &[Cell]) -> usize {
    row.iter().filter(|c| !c.is_blank()).count()
}
