use crate::error::ExcelTableError;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridRequest;
use crate::spreadsheet::reference::AddressSpec;
use crate::spreadsheet::reference::CellAddress;
use crate::spreadsheet::GridLoader;
use crate::spreadsheet::WorkbookLoader;
use crate::table::request::ExtractRequest;
use crate::table::CellRole;
use crate::table::ResolvedRange;
use crate::table::Table;
use crate::table::TableCell;
use crate::table::DEFAULT_WIDTH;
use log::debug;
use log::warn;

/// Turns a cell range of a spreadsheet into a [`Table`].
///
/// The extractor keeps no state between calls; the range it resolved is
/// returned inside each table.
#[derive(Clone, Debug, Default)]
pub struct RangeExtractor<L: GridLoader = WorkbookLoader> {
    loader: L,
}

impl<L: GridLoader> RangeExtractor<L> {
    pub fn new(loader: L) -> Self {
        RangeExtractor { loader }
    }

    /// Extracts the requested range.
    ///
    /// Missing endpoints default to A1 and to the end of the sheet. Either
    /// way the range is cut back to the last row and column holding a value,
    /// and the cut end is reported in the table. Reversed ranges and ranges
    /// without values give an empty table.
    pub fn extract(&self, request: &ExtractRequest) -> Result<Table, ExcelTableError> {
        let source = request.source.as_ref().ok_or(ExcelTableError::MissingSource)?;
        let from = resolve_endpoint(request.from.as_deref())?;
        let to = resolve_endpoint(request.to.as_deref())?;
        debug!("Extracting {:?}..{:?} from '{}' sheet {}", from, to, source, request.sheet);

        let first_row = from.map(|from| from.row).unwrap_or(0);
        let grid_request = GridRequest {
            sheet: request.sheet.clone(),
            columns: to.map(|to| from.map(|from| from.column).unwrap_or(0)..=to.column),
            skip_rows: from.map(|from| from.row),
            row_limit: to.map(|to| to.row.saturating_add(1).saturating_sub(first_row)),
        };
        let grid = self.loader.load(source, &grid_request)?;
        debug!(
            "Loaded grid of {}x{} cells at row {}, column {}",
            grid.row_count(),
            grid.column_count(),
            grid.first_row(),
            grid.first_column()
        );

        let from = from.unwrap_or_default();
        let window_end = to.unwrap_or(CellAddress::new(usize::MAX, usize::MAX));
        let mut table = match data_end(&grid, from, window_end) {
            Some(end) => build_table(&grid, from, end, request),
            None => Table {
                headers: Vec::new(),
                rows: Vec::new(),
                range: ResolvedRange { from, to },
            },
        };

        if !request.header_names.is_empty() && !table.is_empty() {
            let columns = table.column_count();
            if request.header_names.len() != columns {
                return Err(ExcelTableError::invalid_option(
                    "header",
                    format!("{} names given for {} columns", request.header_names.len(), columns),
                ));
            }
            table.prepend_header_names(&request.header_names);
        }
        Ok(table)
    }
}

impl RangeExtractor<WorkbookLoader> {
    /// An extractor reading workbook files
    pub fn workbook() -> Self {
        RangeExtractor::new(WorkbookLoader)
    }
}

fn resolve_endpoint(text: Option<&str>) -> Result<Option<CellAddress>, ExcelTableError> {
    Ok(text.map(|text| AddressSpec::parse(text).resolve()).transpose()?)
}

/// Last row and column holding a value inside `from..=to`, None when there is none
fn data_end(grid: &Grid, from: CellAddress, to: CellAddress) -> Option<CellAddress> {
    let mut end: Option<CellAddress> = None;
    for (offset, cells) in grid.rows().enumerate() {
        let row = grid.first_row() + offset;
        if row < from.row {
            continue;
        }
        if row > to.row {
            break;
        }
        for (offset, cell) in cells.iter().enumerate() {
            let column = grid.first_column() + offset;
            if column < from.column || column > to.column || cell.value.is_empty() {
                continue;
            }
            let column = end.map_or(column, |end| end.column.max(column));
            end = Some(CellAddress::new(column, row));
        }
    }
    end
}

/// Builds the table for `from..=to`, where `to` is at or after `from` on both axes
fn build_table(grid: &Grid, from: CellAddress, to: CellAddress, request: &ExtractRequest) -> Table {
    let range = ResolvedRange { from, to: Some(to) };
    let column_count = to.column - from.column + 1;

    let widths: &[u32] = if request.widths.len() == column_count {
        request.widths.as_slice()
    } else {
        if !request.widths.is_empty() {
            warn!(
                "{} widths given for {} columns, using the default width {}",
                request.widths.len(),
                column_count,
                DEFAULT_WIDTH
            );
        }
        &[]
    };

    let mut headers = Vec::new();
    let mut rows = Vec::new();
    for row in from.row..=to.row {
        let role = if row < request.header_rows {
            CellRole::Header
        } else {
            CellRole::Body
        };
        let cells: Vec<TableCell> = (from.column..=to.column)
            .enumerate()
            .map(|(position, column)| {
                let cell = grid.get(row, column).cloned().unwrap_or_default();
                let width = widths.get(position).copied().filter(|width| *width > 0).unwrap_or(DEFAULT_WIDTH);
                TableCell {
                    value: cell.value,
                    width,
                    role,
                    bold: cell.style.bold || role == CellRole::Header,
                    italic: cell.style.italic,
                    background: cell.style.background,
                }
            })
            .collect();
        match role {
            CellRole::Header => headers.push(cells),
            CellRole::Body => rows.push(cells),
        }
    }
    debug!("Built table with {} header rows and {} rows", headers.len(), rows.len());
    Table { headers, rows, range }
}
