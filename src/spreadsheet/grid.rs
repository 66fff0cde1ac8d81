use crate::spreadsheet::cell::CellStyle;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::SheetSelector;
use std::ops::RangeInclusive;

/// Value and style of one grid position
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridCell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl GridCell {
    pub fn new(value: CellValue, style: CellStyle) -> Self {
        GridCell { value, style }
    }
}

impl From<CellValue> for GridCell {
    fn from(value: CellValue) -> Self {
        GridCell {
            value,
            style: CellStyle::default(),
        }
    }
}

/// What the extractor asks a loader for. Column and row hints are read
/// optimisations only; a loader may ignore them as long as the returned
/// grid reports the origin it actually covers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridRequest {
    /// Sheet to read
    pub sheet: SheetSelector,
    /// Inclusive range of absolute column indices to keep
    pub columns: Option<RangeInclusive<usize>>,
    /// Number of leading rows to skip
    pub skip_rows: Option<usize>,
    /// Maximum number of rows to read after the skipped ones
    pub row_limit: Option<usize>,
}

/// Dense, rectangular block of cells.
///
/// Local position `(0, 0)` is the absolute sheet position
/// `(first_row, first_column)`. The block ends at the last row and column
/// holding a non-empty value; trailing blank or merely styled cells are cut.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    first_row: usize,
    first_column: usize,
    column_count: usize,
    rows: Vec<Vec<GridCell>>,
}

impl Grid {
    /// Builds a grid from rows of cells, padding short rows with empty cells
    pub fn new(first_row: usize, first_column: usize, mut rows: Vec<Vec<GridCell>>) -> Self {
        let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize_with(column_count, GridCell::default);
        }
        if column_count == 0 {
            rows.clear();
        }
        Grid {
            first_row,
            first_column,
            column_count,
            rows,
        }
    }

    /// Builds an unstyled grid starting at A1
    pub fn from_values<R, V>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|value| GridCell::from(value.into())).collect())
            .collect();
        Grid::new(0, 0, rows)
    }

    pub fn first_row(&self) -> usize {
        self.first_row
    }

    pub fn first_column(&self) -> usize {
        self.first_column
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at a grid-local position
    pub fn cell_at(&self, row: usize, column: usize) -> Option<&GridCell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    /// Value at a grid-local position
    pub fn value_at(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.cell_at(row, column).map(|cell| &cell.value)
    }

    /// Cell at an absolute sheet position, None outside the grid
    pub fn get(&self, row: usize, column: usize) -> Option<&GridCell> {
        let row = row.checked_sub(self.first_row)?;
        let column = column.checked_sub(self.first_column)?;
        self.cell_at(row, column)
    }

    /// Rows of the grid in order
    pub fn rows(&self) -> impl Iterator<Item = &[GridCell]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// A rectangular run of identical cells, as produced by repeated ODS rows and columns
struct CellRun {
    row: usize,
    row_count: usize,
    col: usize,
    col_count: usize,
    cell: GridCell,
}

/// Collects cells streamed out of a worksheet, keeping only those inside the
/// requested window, and turns them into a dense [`Grid`].
pub(crate) struct GridBuilder {
    row_lower_bound: usize,
    /// First row past the window
    row_end: Option<usize>,
    col_lower_bound: usize,
    col_upper_bound: Option<usize>,
    runs: Vec<CellRun>,
    /// Last row and column holding a value
    row_extent: Option<usize>,
    col_extent: Option<usize>,
}

impl GridBuilder {
    pub(crate) fn new(request: &GridRequest) -> Self {
        let row_lower_bound = request.skip_rows.unwrap_or(0);
        let (col_lower_bound, col_upper_bound) = match &request.columns {
            Some(columns) => (*columns.start(), Some(*columns.end())),
            None => (0, None),
        };
        GridBuilder {
            row_lower_bound,
            row_end: request.row_limit.map(|limit| row_lower_bound.saturating_add(limit)),
            col_lower_bound,
            col_upper_bound,
            runs: Vec::new(),
            row_extent: None,
            col_extent: None,
        }
    }

    pub(crate) fn before_row_lower_bound(&self, row: usize) -> bool {
        row < self.row_lower_bound
    }

    /// True once a row lies past the requested window; readers stop there
    pub(crate) fn after_row_upper_bound(&self, row: usize) -> bool {
        self.row_end.map(|row_end| row_end <= row).unwrap_or(false)
    }

    pub(crate) fn before_col_lower_bound(&self, col: usize) -> bool {
        col < self.col_lower_bound
    }

    pub(crate) fn after_col_upper_bound(&self, col: usize) -> bool {
        self.col_upper_bound
            .map(|col_upper_bound| col_upper_bound < col)
            .unwrap_or(false)
    }

    pub(crate) fn contains(&self, row: usize, col: usize) -> bool {
        !self.before_row_lower_bound(row)
            && !self.after_row_upper_bound(row)
            && !self.before_col_lower_bound(col)
            && !self.after_col_upper_bound(col)
    }

    pub(crate) fn push(&mut self, row: usize, col: usize, cell: GridCell) {
        self.push_run(row, 1, col, 1, cell);
    }

    /// Adds `row_count × col_count` copies of a cell, clipped to the window.
    /// Blank unstyled cells are dropped.
    pub(crate) fn push_run(&mut self, row: usize, row_count: usize, col: usize, col_count: usize, cell: GridCell) {
        if row_count == 0 || col_count == 0 || (cell.value.is_empty() && cell.style.is_plain()) {
            return;
        }
        let row_first = row.max(self.row_lower_bound);
        let mut row_end = row.saturating_add(row_count);
        if let Some(window_end) = self.row_end {
            row_end = row_end.min(window_end);
        }
        if row_first >= row_end {
            return;
        }
        let row_last = row_end - 1;
        let col_first = col.max(self.col_lower_bound);
        let mut col_last = col.saturating_add(col_count - 1);
        if let Some(col_upper_bound) = self.col_upper_bound {
            col_last = col_last.min(col_upper_bound);
        }
        if col_first > col_last {
            return;
        }

        if !cell.value.is_empty() {
            self.row_extent = Some(self.row_extent.map_or(row_last, |extent| extent.max(row_last)));
            self.col_extent = Some(self.col_extent.map_or(col_last, |extent| extent.max(col_last)));
        }
        self.runs.push(CellRun {
            row: row_first,
            row_count: row_last - row_first + 1,
            col: col_first,
            col_count: col_last - col_first + 1,
            cell,
        });
    }

    /// Materialises the collected runs between the window origin and the value extents
    pub(crate) fn finish(self) -> Grid {
        let (Some(row_extent), Some(col_extent)) = (self.row_extent, self.col_extent) else {
            return Grid::new(self.row_lower_bound, self.col_lower_bound, Vec::new());
        };
        let row_count = row_extent + 1 - self.row_lower_bound;
        let col_count = col_extent + 1 - self.col_lower_bound;
        let mut rows = vec![vec![GridCell::default(); col_count]; row_count];
        for run in self.runs {
            let row_last = (run.row + run.row_count - 1).min(row_extent);
            let col_last = (run.col + run.col_count - 1).min(col_extent);
            for row in run.row..=row_last {
                for col in run.col..=col_last {
                    rows[row - self.row_lower_bound][col - self.col_lower_bound] = run.cell.clone();
                }
            }
        }
        Grid::new(self.row_lower_bound, self.col_lower_bound, rows)
    }
}
