// ********* Input data structures ***********

use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt::Display;

/// The content of a single cell of the raw sheet.
///
/// The readers map every spreadsheet type onto these three states. Dates are
/// kept as their serial number, booleans as text.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The value of this cell as a metric. Empty cells are missing values.
    pub fn to_metric(&self) -> Option<MetricValue> {
        match self {
            Cell::Empty => None,
            Cell::Number(f) => Some(MetricValue::Number(*f)),
            Cell::Text(s) => Some(MetricValue::Text(s.clone())),
        }
    }

    /// Renders the cell as a label. Whole numbers print without decimals.
    pub fn to_label(&self) -> String {
        match self {
            Cell::Empty => "".to_string(),
            Cell::Number(f) => format_number(*f),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// A raw sheet: rows of cells, addressed positionally.
///
/// Rows may have different lengths. A cell beyond the end of its row reads as
/// `Cell::Empty`.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Grid {
    pub rows: Vec<Vec<Cell>>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Grid {
        Grid { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// The length of the longest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// A view on the grid without its first `n` rows.
    pub fn skip_rows(&self, n: usize) -> GridView<'_> {
        GridView {
            rows: self.rows.get(n..).unwrap_or(&[]),
        }
    }
}

/// Borrowed rows of a grid, indexed from the first kept row.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct GridView<'a> {
    pub rows: &'a [Vec<Cell>],
}

impl<'a> GridView<'a> {
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &'a Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// The position of the various parts of a sheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetLayout {
    /// Number of rows at the top of the sheet that are dropped before anything else.
    pub preamble_rows: usize,
    /// Column holding the metric names inside a block.
    pub label_column: usize,
    /// Column holding the values of the whole population.
    pub total_column: usize,
    /// First segment column. All the columns after it are segments too.
    pub first_segment_column: usize,
    /// Number of rows in a block.
    pub block_height: usize,
    /// Text that identifies a marker row (searched in the first column).
    pub group_marker: &'static str,
    /// Group label of the block at the top of the sheet.
    pub total_group_label: &'static str,
    /// Segment label of the aggregate record of each block.
    pub total_segment_label: &'static str,
}

impl SheetLayout {
    pub const TGI: SheetLayout = SheetLayout {
        preamble_rows: 4,
        label_column: 1,
        total_column: 2,
        first_segment_column: 3,
        block_height: 5,
        group_marker: "Interviewé:",
        total_group_label: "Total interviewé",
        total_segment_label: "Total",
    };
}

impl Default for SheetLayout {
    fn default() -> Self {
        SheetLayout::TGI
    }
}

/// The metrics that are extracted from each block.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Metric {
    Echantillon,
    Thousands,
    VerticalPct,
    HorizontalPct,
    Indice,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Echantillon,
        Metric::Thousands,
        Metric::VerticalPct,
        Metric::HorizontalPct,
        Metric::Indice,
    ];

    /// The label of the metric, as written in the label column and in the outputs.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Echantillon => "Echantillon",
            Metric::Thousands => "(000)",
            Metric::VerticalPct => "% Vert",
            Metric::HorizontalPct => "% Horz",
            Metric::Indice => "Indice",
        }
    }

    /// Exact match only: labels are not trimmed or case-folded.
    pub fn from_label(s: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.label() == s)
    }
}

// ******** Output data structures *********

/// A value found in a block.
///
/// A missing value is represented as `None` by the users of this type, so
/// that it never collides with a zero.
///
/// Whole numbers serialize as integers, so JSON and CSV print `1001` alike.
#[derive(PartialEq, Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Number(x) if is_whole(*x) => serializer.serialize_i64(*x as i64),
            MetricValue::Number(x) => serializer.serialize_f64(*x),
            MetricValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number(x) => write!(f, "{}", format_number(*x)),
            MetricValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One line of the long format.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Groupe_interviewé")]
    pub group_label: String,
    #[serde(rename = "Segment")]
    pub segment_label: String,
    #[serde(rename = "Echantillon")]
    pub echantillon: Option<MetricValue>,
    #[serde(rename = "(000)")]
    pub thousands: Option<MetricValue>,
    #[serde(rename = "% Vert")]
    pub vertical_pct: Option<MetricValue>,
    #[serde(rename = "% Horz")]
    pub horizontal_pct: Option<MetricValue>,
    #[serde(rename = "Indice")]
    pub indice: Option<MetricValue>,
}

impl Record {
    /// The output column names, in order.
    pub const COLUMNS: [&'static str; 7] = [
        "Groupe_interviewé",
        "Segment",
        "Echantillon",
        "(000)",
        "% Vert",
        "% Horz",
        "Indice",
    ];

    pub fn metric(&self, m: Metric) -> Option<&MetricValue> {
        match m {
            Metric::Echantillon => self.echantillon.as_ref(),
            Metric::Thousands => self.thousands.as_ref(),
            Metric::VerticalPct => self.vertical_pct.as_ref(),
            Metric::HorizontalPct => self.horizontal_pct.as_ref(),
            Metric::Indice => self.indice.as_ref(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SheetError {
    /// Nothing left once the preamble is removed.
    EmptyGrid,
    /// The grid stops before the first segment column.
    NoSegmentColumns { width: usize },
}

impl Error for SheetError {}

impl Display for SheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetError::EmptyGrid => write!(f, "the sheet has no rows after the preamble"),
            SheetError::NoSegmentColumns { width } => write!(
                f,
                "the sheet is {} columns wide and has no segment column",
                width
            ),
        }
    }
}

fn is_whole(x: f64) -> bool {
    x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15
}

fn format_number(x: f64) -> String {
    if is_whole(x) {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}
