use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use tgi_sheet::*;

use std::fs;
use std::path::{Path, PathBuf};

use text_diff::print_diff;

mod io_common;
mod io_csv;
mod io_excel;
mod io_jsonl;

pub use crate::tgi::io_common::default_output_paths;
pub use crate::tgi::io_jsonl::{read_jsonl, records_to_jsonl};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TgiError {
    #[snafu(display("Error opening spreadsheet {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("The spreadsheet {path} has no sheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Could not flatten {path}"))]
    Flattening { source: SheetError, path: String },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error moving the finished output to {path}"))]
    PersistingFile {
        source: tempfile::PersistError,
        path: String,
    },
    #[snafu(display("Error building the workbook for {path}"))]
    WritingXlsx {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error writing CSV to {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON at {path}:{lineno}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error serializing record {index} to JSON"))]
    SerializingJson {
        source: serde_json::Error,
        index: usize,
    },
    #[snafu(display("The output differs from the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TgiResult<T> = Result<T, TgiError>;

/// Where the results of a conversion go.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OutputPaths {
    pub table: PathBuf,
    pub jsonl: PathBuf,
}

/// The tabular formats.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TableFormat {
    Xlsx,
    Csv,
}

impl TableFormat {
    /// CSV for a `.csv` extension, a workbook for anything else.
    pub fn from_path(path: &Path) -> TableFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => TableFormat::Csv,
            _ => TableFormat::Xlsx,
        }
    }
}

pub fn write_table(path: &Path, records: &[Record]) -> TgiResult<()> {
    match TableFormat::from_path(path) {
        TableFormat::Xlsx => io_excel::write_xlsx(path, records),
        TableFormat::Csv => io_csv::write_csv(path, records),
    }
}

/// Reads, flattens and writes one export.
///
/// Each output is written atomically: a failed write leaves no partial file
/// at its destination. If a reference file is given, the records must match
/// the ones it holds.
pub fn run_conversion(
    input: &Path,
    outputs: &OutputPaths,
    reference: Option<&Path>,
) -> TgiResult<Vec<Record>> {
    info!("Reading TGI export {:?}", input);
    let grid = io_excel::read_grid(input)?;
    debug!(
        "run_conversion: grid of {} rows, {} columns",
        grid.height(),
        grid.width()
    );
    let records = flatten(&grid).context(FlatteningSnafu {
        path: input.display().to_string(),
    })?;

    let jsonl = records_to_jsonl(&records)?;

    write_table(&outputs.table, &records)?;
    io_common::write_atomic(&outputs.jsonl, jsonl.as_bytes())?;

    if let Some(ref_path) = reference {
        check_reference(&records, ref_path)?;
    }
    Ok(records)
}

// Values are compared, not text: a reference may write `12.0` where we write `12`.
fn check_reference(records: &[Record], ref_path: &Path) -> TgiResult<()> {
    let path = ref_path.display().to_string();
    let ref_records = read_jsonl(ref_path)?;
    debug!("check_reference: {} reference records", ref_records.len());
    if ref_records.as_slice() != records {
        warn!("Found differences with the reference file {}", path);
        let expected = records_to_jsonl(&ref_records)?;
        let actual = records_to_jsonl(records)?;
        print_diff(expected.as_str(), actual.as_str(), "\n");
        return ReferenceMismatchSnafu { path }.fail();
    }
    info!("Output matches the reference {}", path);
    Ok(())
}
