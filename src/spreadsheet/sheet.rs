use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use std::collections::BTreeMap;

/// The non-empty cells of one worksheet together with their used bounds.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// All cells in the sheet, in file order
    pub(crate) cells: Vec<Cell>,
    /// Used range, determined from cell positions
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Adds a cell to the sheet, widening the used range.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        self.cells.push(cell);
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|row_lower_bound| row < row_lower_bound).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|row_upper_bound| row_upper_bound < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|col_lower_bound| col < col_lower_bound).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Replaces shared string indexes with the strings they point to.
    pub(super) fn resolve_shared_strings(&mut self, shared_strings: &[String]) -> Result<(), SpreadsheetError> {
        for cell in self.cells.iter_mut().filter(|cell| cell.kind == CellType::SharedString) {
            let string = cell.value.parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .ok_or_else(|| SpreadsheetError::SharedStringError(
                    self.file_name.to_owned(),
                    self.name.to_owned(),
                    cell.reference(),
                    cell.value.to_owned(),
                ))?;
            cell.kind = CellType::Text;
            cell.value = string.to_owned();
        }
        Ok(())
    }

    /// Groups the cells by row, then by column, keyed by their position in
    /// the worksheet. Rows and columns without cells are absent.
    pub(crate) fn rows(&self) -> BTreeMap<usize, BTreeMap<usize, &Cell>> {
        let mut rows = BTreeMap::<usize, BTreeMap<usize, &Cell>>::new();
        for cell in &self.cells {
            // Later duplicates win, as a spreadsheet application would show them
            rows.entry(cell.row).or_default().insert(cell.col, cell);
        }
        rows
    }
}
