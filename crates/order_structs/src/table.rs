/// An uploaded order table, kept as text cells so that unknown columns
/// round-trip untouched into the results file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl OrderTable {
    /// Creates a table from headers and rows.
    ///
    /// Rows shorter than the header are padded with empty cells so that every
    /// row can be indexed by column position.
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        Self { headers, rows }
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Returns the number of data rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no data rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the position of a column, if present.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns a cell by row and column position.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = OrderTable::new(strings(&["a", "b", "c"]), vec![strings(&["1"])]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 2), Some(""));
    }

    #[test]
    fn test_column_lookup_ignores_header_whitespace() {
        let table = OrderTable::new(strings(&[" created_at ", "subtotal"]), vec![]);

        assert_eq!(table.column_index("created_at"), Some(0));
        assert!(table.has_column("subtotal"));
        assert!(!table.has_column("total_items"));
        assert!(table.is_empty());
    }
}
