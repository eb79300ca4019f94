// Spreadsheet input and output.

use calamine::{open_workbook_auto, DataType, Range, Reader};
use rust_xlsxwriter::{Format, Workbook};

use crate::tgi::{io_common::write_atomic, *};

/// Reads the first sheet of a workbook as a raw grid.
///
/// Positions are absolute: a sheet whose first used cell is `B3` still gets
/// two empty rows and an empty first column.
pub fn read_grid(path: &Path) -> TgiResult<Grid> {
    let path_s = path.display().to_string();
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu {
        path: path_s.clone(),
    })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu {
            path: path_s.clone(),
        })?
        .context(OpeningExcelSnafu { path: path_s })?;
    Ok(range_to_grid(&wrange))
}

fn range_to_grid(wrange: &Range<DataType>) -> Grid {
    let (row_offset, col_offset) = match wrange.start() {
        Some((r, c)) => (r as usize, c as usize),
        // Empty sheet
        None => return Grid::default(),
    };
    debug!(
        "range_to_grid: range starts at ({}, {})",
        row_offset, col_offset
    );
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in wrange.rows() {
        let mut cells: Vec<Cell> = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(read_cell));
        rows.push(cells);
    }
    Grid::new(rows)
}

fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::DateTime(f) => Cell::Number(*f),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        DataType::Empty => Cell::Empty,
        _ => {
            debug!("read_cell: treating {:?} as empty", cell);
            Cell::Empty
        }
    }
}

/// Writes the records as a workbook: a header row, then one row per record.
///
/// Missing values are left as blank cells.
pub fn write_xlsx(path: &Path, records: &[Record]) -> TgiResult<()> {
    let path_s = path.display().to_string();
    let mut xlsx = Workbook::new();
    fill_workbook(&mut xlsx, records).context(WritingXlsxSnafu {
        path: path_s.clone(),
    })?;
    let buffer = xlsx
        .save_to_buffer()
        .context(WritingXlsxSnafu { path: path_s })?;
    write_atomic(path, &buffer)
}

fn fill_workbook(
    xlsx: &mut Workbook,
    records: &[Record],
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let worksheet = xlsx.add_worksheet();
    let bold = Format::new().set_bold();
    for (col, name) in Record::COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }
    for (idx, rec) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        worksheet.write_string(row, 0, &rec.group_label)?;
        worksheet.write_string(row, 1, &rec.segment_label)?;
        for (midx, metric) in Metric::ALL.iter().enumerate() {
            let col = (midx + 2) as u16;
            match rec.metric(*metric) {
                Some(MetricValue::Number(n)) => {
                    worksheet.write_number(row, col, *n)?;
                }
                Some(MetricValue::Text(s)) => {
                    worksheet.write_string(row, col, s)?;
                }
                None => {}
            }
        }
    }
    Ok(())
}
