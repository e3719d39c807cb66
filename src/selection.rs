use serde_json::Value;
use tracing::debug;

use crate::error::{LensError, Result};
use crate::query::QueryResult;
use crate::viewport::{Align, ViewportModel, VisibleRange};

/// How a source numbers its lines in query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBase {
    Zero,
    One,
}

/// The highlighted line, kept in sync with what the viewport shows.
#[derive(Debug, Default)]
pub struct SelectionSync {
    selected: Option<u64>,
}

impl SelectionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Selects `index` and centers it. An index outside the source leaves both
    /// the selection and the viewport untouched.
    pub fn select_and_reveal(
        &mut self,
        index: i64,
        viewport: &mut ViewportModel,
    ) -> Result<VisibleRange> {
        let range = viewport.scroll_to_index(index, Align::Center)?;
        debug!(index, %range, "selected line");
        self.selected = Some(index as u64);
        Ok(range)
    }
}

/// Reads the line-number cell of `row` and converts it to a 0-based line index.
pub fn line_index_for_row(
    result: &QueryResult,
    row: usize,
    column: &str,
    base: IndexBase,
) -> Result<i64> {
    let column_idx = result
        .columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| LensError::Query(format!("result has no {} column", column)))?;
    let cells = result
        .rows
        .get(row)
        .ok_or_else(|| LensError::Query(format!("no row {} in result", row)))?;

    let value = match cells.get(column_idx) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| LensError::Query(format!("row {} has no usable {}", row, column)))?;

    Ok(match base {
        IndexBase::Zero => value,
        IndexBase::One => value - 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn viewport(line_count: u64) -> ViewportModel {
        let mut viewport = ViewportModel::new(1);
        viewport.set_line_count(line_count);
        viewport.update_viewport(0, 31);
        viewport
    }

    fn result() -> QueryResult {
        QueryResult {
            columns: vec!["line_number".to_string(), "line".to_string()],
            rows: vec![
                vec![json!(42), json!("ERROR disk full")],
                vec![json!("7"), json!("x")],
                vec![Value::Null, json!("y")],
            ],
            row_count: 3,
        }
    }

    #[test]
    fn test_select_and_reveal_centers() {
        let mut viewport = viewport(1_000_000);
        let mut selection = SelectionSync::new();

        let range = selection.select_and_reveal(4035, &mut viewport).unwrap();
        assert_eq!(range, VisibleRange::inclusive(4020, 4050));
        assert_eq!(selection.selected(), Some(4035));
    }

    #[test]
    fn test_out_of_bounds_selection_keeps_previous() {
        let mut viewport = viewport(100);
        let mut selection = SelectionSync::new();
        selection.select_and_reveal(10, &mut viewport).unwrap();
        let before = viewport.visible_range();

        assert!(selection.select_and_reveal(-1, &mut viewport).is_err());
        assert!(selection.select_and_reveal(100, &mut viewport).is_err());
        assert_eq!(selection.selected(), Some(10));
        assert_eq!(viewport.visible_range(), before);
    }

    #[test]
    fn test_row_maps_one_based_line_number() {
        let result = result();
        assert_eq!(
            line_index_for_row(&result, 0, "line_number", IndexBase::One).unwrap(),
            41
        );
        assert_eq!(
            line_index_for_row(&result, 1, "line_number", IndexBase::One).unwrap(),
            6
        );
        assert_eq!(
            line_index_for_row(&result, 0, "line_number", IndexBase::Zero).unwrap(),
            42
        );
    }

    #[test]
    fn test_row_mapping_errors() {
        let result = result();
        assert!(line_index_for_row(&result, 2, "line_number", IndexBase::One).is_err());
        assert!(line_index_for_row(&result, 9, "line_number", IndexBase::One).is_err());
        assert!(line_index_for_row(&result, 0, "offset", IndexBase::One).is_err());
    }
}
