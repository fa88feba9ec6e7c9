use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell of a loaded table.
///
/// `Number` exists for collaborators that hand over typed spreadsheet cells;
/// a NaN number is treated exactly like `Empty`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Wraps raw text from a delimited file; an empty string stays empty.
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// True for `Empty`, NaN and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
        }
    }

    pub fn is_present(&self) -> bool {
        !self.is_blank()
    }

    pub fn as_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.is_nan() => String::new(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e21 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::from_raw(value)
    }
}

/// A whole table held in memory: header names plus rows in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.headers.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pads or truncates every row to the header width. Rows built by hand
    /// may be ragged; missing cells become `Empty`.
    pub fn conform_rows(&mut self) {
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, CellValue::Empty);
        }
    }

    /// Adds a column filled with `Empty` and returns its index.
    pub fn add_empty_column(&mut self, name: &str) -> usize {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(CellValue::Empty);
        }
        self.headers.len() - 1
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Renders every row as display strings.
    pub fn display_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows
            .iter()
            .map(|row| row.iter().map(CellValue::as_display).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection_covers_nan_and_whitespace() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Number(f64::NAN).is_blank());
        assert!(CellValue::text("   ").is_blank());
        assert!(CellValue::Number(0.0).is_present());
        assert!(CellValue::text("x").is_present());
    }

    #[test]
    fn whole_numbers_render_without_decimals() {
        assert_eq!(CellValue::Number(12345678901.0).as_display(), "12345678901");
        assert_eq!(CellValue::Number(2.5).as_display(), "2.5");
        assert_eq!(CellValue::Number(f64::NAN).as_display(), "");
    }

    #[test]
    fn push_row_pads_short_rows() {
        let mut table = Table::new(vec!["a".into(), "b".into(), "c".into()]);
        table.push_row(vec![CellValue::text("1")]);
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][2], CellValue::Empty);
    }

    #[test]
    fn add_empty_column_extends_every_row() {
        let mut table = Table::new(vec!["a".into()]);
        table.push_row(vec![CellValue::text("1")]);
        table.push_row(vec![CellValue::text("2")]);
        let idx = table.add_empty_column("b");
        assert_eq!(idx, 1);
        assert!(table.rows.iter().all(|row| row[1] == CellValue::Empty));
    }

    #[test]
    fn conform_rows_fixes_hand_built_tables() {
        let mut table = Table {
            headers: vec!["a".into(), "b".into()],
            rows: vec![
                vec![CellValue::text("1")],
                vec![CellValue::text("2"), CellValue::text("3"), CellValue::text("4")],
            ],
        };
        table.conform_rows();
        table.add_empty_column("c");
        assert_eq!(
            table.rows[0],
            vec![CellValue::text("1"), CellValue::Empty, CellValue::Empty]
        );
        assert_eq!(
            table.rows[1],
            vec![CellValue::text("2"), CellValue::text("3"), CellValue::Empty]
        );
    }
}
