use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridRequest;
use crate::spreadsheet::source::Source;
use crate::spreadsheet::GridLoader;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;

/// Workbook built in code, for callers that already hold their data as cells.
///
/// As a [`GridLoader`] it ignores the source and returns whole sheets,
/// leaving the range slicing to the extractor.
#[derive(Clone, Debug)]
pub struct MemoryWorkbook {
    name: String,
    sheets: Vec<(String, Grid)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        MemoryWorkbook {
            name: "memory".to_owned(),
            sheets: Vec::new(),
        }
    }

    /// Appends a sheet
    pub fn with_sheet(mut self, name: &str, grid: Grid) -> Self {
        self.sheets.push((name.to_owned(), grid));
        self
    }

    fn grid(&self, sheet_index: usize) -> Result<Grid, SpreadsheetError> {
        self.sheets
            .get(sheet_index)
            .map(|(_, grid)| grid.clone())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name(), format!("#{sheet_index}")))
    }
}

impl Default for MemoryWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Spreadsheet for MemoryWorkbook {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_grid(&mut self, sheet_index: usize, _request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        self.grid(sheet_index)
    }
}

impl GridLoader for MemoryWorkbook {
    fn load(&self, _source: &Source, request: &GridRequest) -> Result<Grid, SpreadsheetError> {
        let sheet_index = self.resolve_sheet(&request.sheet)?;
        self.grid(sheet_index)
    }
}
