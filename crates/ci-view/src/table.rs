//! Flattened, display-ready tables.

use ci_protocol::{value_text, TableDescriptor};

/// Headers plus text cells; every row has exactly one cell per header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn from_descriptor(descriptor: &TableDescriptor) -> Self {
        match descriptor {
            TableDescriptor::Rows { headers, rows } => {
                let headers = if headers.is_empty() {
                    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
                    (1..=width).map(|i| format!("#{i}")).collect()
                } else {
                    headers.clone()
                };
                let rows = rows
                    .iter()
                    .map(|row| {
                        (0..headers.len())
                            .map(|i| row.get(i).map(value_text).unwrap_or_default())
                            .collect()
                    })
                    .collect();
                Self { headers, rows }
            }
            TableDescriptor::Objects(objects) => {
                let headers: Vec<String> = objects
                    .first()
                    .map(|first| first.keys().cloned().collect())
                    .unwrap_or_default();
                let rows = objects
                    .iter()
                    .map(|obj| {
                        headers
                            .iter()
                            .map(|h| obj.get(h).map(value_text).unwrap_or_default())
                            .collect()
                    })
                    .collect();
                Self { headers, rows }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest cell per column, header included, in characters.
    pub fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                self.rows
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}
