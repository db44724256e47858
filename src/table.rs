//! Row-oriented source tables read from CSV files.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// One input table: a header row plus raw cells. An empty cell is `None`.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; cells past the header width are dropped and short rows
    /// are padded with empty cells.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut row: Vec<Option<String>> = cells
            .into_iter()
            .take(self.columns.len())
            .map(|c| c.map(Into::into))
            .collect();
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    pub fn from_csv_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let name = name.into();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let columns = csv_reader
            .headers()
            .with_context(|| format!("Failed to read CSV headers of {}", name))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<String>>();

        let mut table = Table::new(name, columns);
        for (i, record) in csv_reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Failed to read row {} of {}", i + 1, table.name))?;
            table.push_row(record.iter().map(|c| if c.is_empty() { None } else { Some(c) }));
        }

        Ok(table)
    }

    pub fn from_csv_path(name: impl Into<String>, path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open CSV file {:?}", path))?;
        Self::from_csv_reader(name, std::io::BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_empty_cells_become_none() {
        let csv = "id,name,country\n7,Acme,\n8,,DE\n";
        let table = Table::from_csv_reader("companies", csv.as_bytes()).unwrap();

        assert_eq!(table.columns, vec!["id", "name", "country"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), Some("7"));
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.cell(1, 2), Some("DE"));
        assert_eq!(table.column_index("country"), Some(2));
        assert_eq!(table.column_index("missing"), None);
    }

    #[test]
    fn test_csv_ragged_rows_are_rejected() {
        let csv = "id,name\n1,a,extra\n";
        assert!(Table::from_csv_reader("bad", csv.as_bytes()).is_err());
    }

    #[test]
    fn test_push_row_pads_short_rows() {
        let mut table = Table::new("t", vec!["a".to_string(), "b".to_string()]);
        table.push_row([Some("1")]);
        assert_eq!(table.rows[0], vec![Some("1".to_string()), None]);
    }
}
