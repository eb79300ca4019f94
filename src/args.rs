use clap::Parser;

/// Converts a TGI audience-survey export into long-format records.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The TGI export to convert (xlsx, xls or ods). Only the first sheet is read.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (file path, optional) Where to write the table. A path ending with .csv produces a CSV file,
    /// anything else an Excel workbook. Defaults to <input name>_long_ALL_AVEC_TOTAL.xlsx.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, optional) Where to write the JSON lines (one record per line).
    /// Defaults to <input name>_long_ALL_AVEC_TOTAL.json.
    #[clap(short, long, value_parser)]
    pub jsonl: Option<String>,

    /// (directory, default current directory) The directory of the outputs that are not given
    /// explicitly with --out or --jsonl.
    #[clap(long, value_parser)]
    pub out_dir: Option<String>,

    /// (file path, optional) A reference file of JSON lines. If provided, tgiflat will
    /// check that the generated JSON lines match the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
