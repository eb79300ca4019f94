/*!
Flattening of TGI audience-survey sheets.

A TGI export is a wide sheet: a header row lists the segments (brands,
titles, ...), and the values come in blocks of five rows (`Echantillon`,
`(000)`, `% Vert`, `% Horz`, `Indice`), one block per interviewed group. The
first block covers the whole population. The other blocks are closed by a
marker row whose first cell reads `Interviewé: <group>`.

[`flatten`] turns such a sheet into the long format: one [`Record`] per
(group, segment) pair, plus one aggregate record per group.

```
use tgi_sheet::{flatten, Cell, Grid};

let t = |s: &str| Cell::Text(s.to_string());
let n = Cell::Number;
let mut rows: Vec<Vec<Cell>> = vec![vec![]; 4];
rows.push(vec![Cell::Empty, Cell::Empty, t("Total"), t("Peugeot")]);
for label in ["Echantillon", "(000)", "% Vert", "% Horz", "Indice"] {
    rows.push(vec![Cell::Empty, t(label), n(100.0), n(40.0)]);
}

let records = flatten(&Grid::new(rows))?;
assert_eq!(records.len(), 2);
assert_eq!(records[0].segment_label, "Peugeot");
assert_eq!(records[1].segment_label, "Total");
# Ok::<(), tgi_sheet::SheetError>(())
```
*/

mod config;

pub mod collab;

use log::{debug, info, warn};
use std::collections::HashMap;

pub use crate::config::*;

/// A row that announces a named group.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GroupMarker {
    /// Index of the marker row, after the preamble has been removed.
    pub row: usize,
    /// The trimmed content of the first cell.
    pub name: String,
}

/// The rows of one group, ready to be read.
#[derive(Eq, PartialEq, Debug, Clone)]
struct Block {
    group_label: String,
    total_label: String,
    // First row of the block (inclusive).
    start: usize,
}

/// Flattens a TGI sheet with the standard layout.
///
/// The first four rows of the grid are the preamble of the export and are
/// ignored.
pub fn flatten(grid: &Grid) -> Result<Vec<Record>, SheetError> {
    flatten_with(grid, &SheetLayout::TGI)
}

/// Flattens a sheet with the given layout.
///
/// Records come out in a stable order: the total block first, then the named
/// groups in the order of their marker rows. Inside a block, the segments
/// come in header order and are followed by the aggregate record.
pub fn flatten_with(grid: &Grid, layout: &SheetLayout) -> Result<Vec<Record>, SheetError> {
    let sheet = grid.skip_rows(layout.preamble_rows);
    check_sheet(&sheet, layout)?;

    let segments = segment_labels(&sheet, layout);
    debug!("flatten: segments: {:?}", segments);

    let markers = find_group_markers(&sheet, layout);
    debug!("flatten: markers: {:?}", markers);

    let mut blocks = vec![Block {
        group_label: layout.total_group_label.to_string(),
        total_label: layout.total_group_label.to_string(),
        start: 1,
    }];
    blocks.extend(group_blocks(&markers, layout));

    let mut res: Vec<Record> = Vec::with_capacity(blocks.len() * (segments.len() + 1));
    for block in blocks.iter() {
        debug!(
            "flatten: block {:?} rows {}..{}",
            block.group_label,
            block.start,
            block.start + layout.block_height
        );
        res.extend(block_records(&sheet, layout, block, &segments));
    }
    info!(
        "Flattened {} blocks over {} segments into {} records",
        blocks.len(),
        segments.len(),
        res.len()
    );
    Ok(res)
}

fn check_sheet(sheet: &GridView, layout: &SheetLayout) -> Result<(), SheetError> {
    if sheet.height() == 0 {
        return Err(SheetError::EmptyGrid);
    }
    if sheet.height() < 1 + layout.block_height {
        debug!(
            "check_sheet: only {} rows after the preamble, the total block is cut short",
            sheet.height()
        );
    }
    if sheet.width() <= layout.first_segment_column {
        return Err(SheetError::NoSegmentColumns {
            width: sheet.width(),
        });
    }
    Ok(())
}

fn segment_labels(sheet: &GridView, layout: &SheetLayout) -> Vec<String> {
    (layout.first_segment_column..sheet.width())
        .map(|col| sheet.cell(0, col).to_label())
        .collect()
}

/// All the marker rows of the sheet, in row order.
///
/// Only text cells are considered. Nothing is filtered here: markers too
/// close to the top of the sheet are dropped later.
pub fn find_group_markers(sheet: &GridView, layout: &SheetLayout) -> Vec<GroupMarker> {
    sheet
        .rows
        .iter()
        .enumerate()
        .filter_map(|(row, cells)| match cells.first() {
            Some(Cell::Text(s)) if s.contains(layout.group_marker) => Some(GroupMarker {
                row,
                name: s.trim().to_string(),
            }),
            _ => None,
        })
        .collect()
}

// A marker is only usable if a full block fits above it.
fn group_blocks(markers: &[GroupMarker], layout: &SheetLayout) -> Vec<Block> {
    markers
        .iter()
        .filter(|m| {
            let keep = m.row >= layout.block_height;
            if !keep {
                warn!(
                    "Skipping group {:?}: marker at row {} has less than {} rows above it",
                    m.name, m.row, layout.block_height
                );
            }
            keep
        })
        .map(|m| Block {
            group_label: m.name.clone(),
            total_label: format!(
                "{} : {}",
                layout.total_group_label,
                strip_group_prefix(&m.name)
            ),
            start: m.row - layout.block_height,
        })
        .collect()
}

/// `Interviewé: Hommes 25-49` -> `Hommes 25-49`
fn strip_group_prefix(name: &str) -> &str {
    match name.split_once(':') {
        Some((_, rest)) => rest.trim(),
        None => name.trim(),
    }
}

/// Reads the metrics of a block for one value column.
///
/// The rows are folded in order, so a label that appears twice takes the
/// value of its last row. Labels that are not metrics are dropped. The
/// window stops at the end of the sheet.
fn block_lookup(
    sheet: &GridView,
    layout: &SheetLayout,
    start: usize,
    value_column: usize,
) -> HashMap<Metric, Option<MetricValue>> {
    let end = (start + layout.block_height).min(sheet.height());
    (start..end).fold(HashMap::new(), |mut acc, row| {
        let label = sheet.cell(row, layout.label_column).as_text();
        if let Some(metric) = label.and_then(Metric::from_label) {
            acc.insert(metric, sheet.cell(row, value_column).to_metric());
        }
        acc
    })
}

fn make_record(
    group_label: &str,
    segment_label: &str,
    lookup: &HashMap<Metric, Option<MetricValue>>,
) -> Record {
    let get = |m: Metric| lookup.get(&m).cloned().flatten();
    Record {
        group_label: group_label.to_string(),
        segment_label: segment_label.to_string(),
        echantillon: get(Metric::Echantillon),
        thousands: get(Metric::Thousands),
        vertical_pct: get(Metric::VerticalPct),
        horizontal_pct: get(Metric::HorizontalPct),
        indice: get(Metric::Indice),
    }
}

fn block_records(
    sheet: &GridView,
    layout: &SheetLayout,
    block: &Block,
    segments: &[String],
) -> Vec<Record> {
    let mut res: Vec<Record> = segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            let lookup = block_lookup(
                sheet,
                layout,
                block.start,
                layout.first_segment_column + idx,
            );
            make_record(&block.group_label, segment, &lookup)
        })
        .collect();
    let lookup = block_lookup(sheet, layout, block.start, layout.total_column);
    res.push(make_record(
        &block.total_label,
        layout.total_segment_label,
        &lookup,
    ));
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: [&str; 5] = ["Echantillon", "(000)", "% Vert", "% Horz", "Indice"];

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn preamble() -> Vec<Vec<Cell>> {
        vec![
            vec![t("TGI France 2023")],
            vec![t("Base: Ensemble 15 ans et plus")],
            vec![],
            vec![t("Poids: population")],
        ]
    }

    fn header(segments: &[&str]) -> Vec<Cell> {
        let mut row = vec![Cell::Empty, Cell::Empty, t("Total")];
        row.extend(segments.iter().map(|s| t(s)));
        row
    }

    // Five metric rows. The value of a cell encodes the block, the row and the column.
    fn block(base: f64, num_segments: usize) -> Vec<Vec<Cell>> {
        LABELS
            .iter()
            .enumerate()
            .map(|(ridx, label)| {
                let mut row = vec![Cell::Empty, t(label)];
                for col in 0..=num_segments {
                    row.push(Cell::Number(base + (ridx * 10 + col) as f64));
                }
                row
            })
            .collect()
    }

    fn marker(name: &str) -> Vec<Cell> {
        vec![t(name)]
    }

    fn num(x: f64) -> Option<MetricValue> {
        Some(MetricValue::Number(x))
    }

    fn labels(records: &[Record]) -> Vec<(String, String)> {
        records
            .iter()
            .map(|r| (r.group_label.clone(), r.segment_label.clone()))
            .collect()
    }

    fn brands_grid() -> Grid {
        let mut rows = preamble();
        rows.push(header(&["Peugeot", "Renault"]));
        rows.extend(block(1000.0, 2));
        rows.push(marker("Interviewé: Hommes 25-49"));
        Grid::new(rows)
    }

    #[test]
    fn total_block_only() {
        init();
        let mut rows = preamble();
        rows.push(header(&["Peugeot", "Renault", "Citroën"]));
        rows.extend(block(0.0, 3));
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res.len(), 4);
        assert_eq!(
            labels(&res),
            vec![
                ("Total interviewé".to_string(), "Peugeot".to_string()),
                ("Total interviewé".to_string(), "Renault".to_string()),
                ("Total interviewé".to_string(), "Citroën".to_string()),
                ("Total interviewé".to_string(), "Total".to_string()),
            ]
        );
        // Row 0 of the block is Echantillon, segment Renault is the third value column.
        assert_eq!(res[1].echantillon, num(2.0));
        assert_eq!(res[1].indice, num(42.0));
    }

    #[test]
    fn named_group() {
        init();
        // The marker sits at row 6 after the preamble: the block above it is
        // the total block itself.
        let res = flatten(&brands_grid()).unwrap();
        assert_eq!(
            labels(&res),
            vec![
                ("Total interviewé".to_string(), "Peugeot".to_string()),
                ("Total interviewé".to_string(), "Renault".to_string()),
                ("Total interviewé".to_string(), "Total".to_string()),
                ("Interviewé: Hommes 25-49".to_string(), "Peugeot".to_string()),
                ("Interviewé: Hommes 25-49".to_string(), "Renault".to_string()),
                (
                    "Total interviewé : Hommes 25-49".to_string(),
                    "Total".to_string()
                ),
            ]
        );
    }

    #[test]
    fn marker_below_an_annotation_row() {
        init();
        let mut rows = preamble();
        rows.push(header(&["Peugeot", "Renault"]));
        rows.extend(block(1000.0, 2));
        rows.push(vec![Cell::Empty, t("Source: TGI")]);
        rows.push(marker("Interviewé: Hommes 25-49"));
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res.len(), 6);
        assert_eq!(res[3].group_label, "Interviewé: Hommes 25-49");
        assert_eq!(res[5].group_label, "Total interviewé : Hommes 25-49");
        // The window is rows 2..=6: the Echantillon row is not part of it.
        assert_eq!(res[3].echantillon, None);
        assert_eq!(res[3].thousands, num(1011.0));
        assert_eq!(res[5].indice, num(1040.0));
    }

    #[test]
    fn two_named_groups() {
        init();
        let mut rows = preamble();
        rows.push(header(&["Peugeot", "Renault"]));
        rows.extend(block(1000.0, 2));
        rows.push(vec![t("Interviewé: Femmes")]);
        rows.extend(block(2000.0, 2));
        rows.push(marker("   Interviewé: Hommes 25-49  "));
        let grid = Grid::new(rows);
        let res = flatten(&grid).unwrap();
        // Both markers (rows 6 and 12) have a full block above them.
        assert_eq!(res.len(), 3 * 3);
        let hommes: Vec<&Record> = res
            .iter()
            .filter(|r| r.group_label.contains("Hommes"))
            .collect();
        assert_eq!(hommes.len(), 3);
        assert_eq!(hommes[0].group_label, "Interviewé: Hommes 25-49");
        assert_eq!(hommes[0].echantillon, num(2001.0));
        assert_eq!(hommes[1].vertical_pct, num(2022.0));
        assert_eq!(hommes[2].group_label, "Total interviewé : Hommes 25-49");
        assert_eq!(hommes[2].echantillon, num(2000.0));
        assert_eq!(hommes[2].indice, num(2040.0));
    }

    #[test]
    fn record_count() {
        init();
        let segments = ["A", "B", "C", "D"];
        let mut rows = preamble();
        rows.push(header(&segments));
        rows.extend(block(0.0, segments.len()));
        for g in 0..3 {
            rows.push(marker(&format!("Interviewé: groupe {}", g)));
            rows.extend(block(100.0 * (g + 1) as f64, segments.len()));
        }
        let res = flatten(&Grid::new(rows)).unwrap();
        let k = segments.len();
        let m = 3;
        assert_eq!(res.len(), (k + 1) + m * (k + 1));
    }

    #[test]
    fn aggregate_uses_total_column() {
        init();
        let res = flatten(&brands_grid()).unwrap();
        let total = &res[2];
        assert_eq!(total.segment_label, "Total");
        for (ridx, m) in Metric::ALL.iter().enumerate() {
            assert_eq!(
                total.metric(*m),
                Some(&MetricValue::Number(1000.0 + (ridx * 10) as f64))
            );
        }
    }

    #[test]
    fn first_usable_marker_row() {
        init();
        // Marker at row 5: rows 0..=4 fit above it.
        let mut rows = preamble();
        rows.push(header(&["A"]));
        rows.extend(block(0.0, 1).into_iter().take(4));
        rows.push(marker("Interviewé: limite"));
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res.len(), 4);
        assert_eq!(res[2].group_label, "Interviewé: limite");
        assert_eq!(res[3].group_label, "Total interviewé : limite");

        // Marker at row 4: one row short.
        let mut rows = preamble();
        rows.push(header(&["A"]));
        rows.extend(block(0.0, 1).into_iter().take(3));
        rows.push(marker("Interviewé: limite"));
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res.len(), 2);
        assert!(res.iter().all(|r| !r.group_label.contains("limite")));
    }

    #[test]
    fn early_marker_is_skipped() {
        init();
        let mut rows = preamble();
        rows.push(header(&["Peugeot", "Renault"]));
        let mut b = block(0.0, 2);
        // Row index 2 after the preamble.
        b[1] = vec![t("Interviewé: trop haut"), t("(000)"), Cell::Number(5.0)];
        rows.extend(b);
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res.len(), 3);
        assert!(res.iter().all(|r| !r.group_label.contains("trop haut")));
    }

    #[test]
    fn duplicate_label_last_wins() {
        init();
        let mut rows = preamble();
        rows.push(header(&["Peugeot"]));
        rows.push(vec![Cell::Empty, t("Echantillon"), Cell::Number(1.0), Cell::Number(2.0)]);
        rows.push(vec![Cell::Empty, t("% Vert"), Cell::Number(3.0), Cell::Number(12.0)]);
        rows.push(vec![Cell::Empty, t("% Vert"), Cell::Number(4.0), Cell::Number(34.0)]);
        rows.push(vec![Cell::Empty, t("% Horz"), Cell::Number(5.0), Cell::Number(6.0)]);
        rows.push(vec![Cell::Empty, t("Indice"), Cell::Number(7.0), Cell::Number(8.0)]);
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res[0].vertical_pct, num(34.0));
        assert_eq!(res[1].vertical_pct, num(4.0));
        // No (000) row in this block.
        assert_eq!(res[0].thousands, None);
    }

    #[test]
    fn missing_is_not_zero() {
        init();
        let mut rows = preamble();
        rows.push(header(&["Peugeot"]));
        rows.push(vec![Cell::Empty, t("Echantillon"), Cell::Number(0.0), Cell::Number(0.0)]);
        rows.push(vec![Cell::Empty, t("(000)"), Cell::Number(0.0), Cell::Empty]);
        rows.push(vec![Cell::Empty, t("commentaire"), t("n.s."), t("n.s.")]);
        rows.push(vec![Cell::Empty, t("% Horz"), Cell::Number(1.0), t("*")]);
        rows.push(vec![Cell::Empty, t("Indice"), Cell::Number(100.0), Cell::Number(87.0)]);
        let res = flatten(&Grid::new(rows)).unwrap();
        let r = &res[0];
        assert_eq!(r.echantillon, num(0.0));
        assert_eq!(r.thousands, None);
        assert_eq!(r.vertical_pct, None);
        assert_eq!(r.horizontal_pct, Some(MetricValue::Text("*".to_string())));
        assert_eq!(r.indice, num(87.0));
    }

    #[test]
    fn segment_labels_are_kept_verbatim() {
        init();
        let mut rows = preamble();
        rows.push(vec![
            Cell::Empty,
            Cell::Empty,
            t("Total"),
            t("Audi"),
            Cell::Empty,
            t("Audi"),
            Cell::Number(2024.0),
        ]);
        rows.extend(block(0.0, 4));
        let res = flatten(&Grid::new(rows)).unwrap();
        let segs: Vec<&str> = res.iter().map(|r| r.segment_label.as_str()).collect();
        assert_eq!(segs, vec!["Audi", "", "Audi", "2024", "Total"]);
    }

    #[test]
    fn repeated_group_names_are_not_merged() {
        init();
        let mut rows = preamble();
        rows.push(header(&["A"]));
        rows.extend(block(0.0, 1));
        rows.push(marker("Interviewé: Cadres"));
        rows.extend(block(10.0, 1));
        rows.push(marker("Interviewé: Cadres"));
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res.len(), 6);
        assert_eq!(res[2].group_label, "Interviewé: Cadres");
        assert_eq!(res[4].group_label, "Interviewé: Cadres");
        assert_ne!(res[2].echantillon, res[4].echantillon);
    }

    #[test]
    fn flatten_is_idempotent() {
        init();
        let grid = brands_grid();
        assert_eq!(flatten(&grid).unwrap(), flatten(&grid).unwrap());
    }

    #[test]
    fn markers_in_row_order() {
        let mut rows = preamble();
        rows.push(header(&["A"]));
        rows.push(vec![Cell::Number(3.0)]);
        rows.push(marker("x Interviewé: 1 "));
        rows.push(marker("Interviewé 2"));
        rows.push(marker("Interviewé:3"));
        let grid = Grid::new(rows);
        let markers = find_group_markers(&grid.skip_rows(4), &SheetLayout::TGI);
        assert_eq!(
            markers,
            vec![
                GroupMarker {
                    row: 2,
                    name: "x Interviewé: 1".to_string()
                },
                GroupMarker {
                    row: 4,
                    name: "Interviewé:3".to_string()
                },
            ]
        );
    }

    #[test]
    fn group_prefix() {
        assert_eq!(strip_group_prefix("Interviewé: Hommes 25-49"), "Hommes 25-49");
        assert_eq!(strip_group_prefix("Interviewé: a: b"), "a: b");
        assert_eq!(strip_group_prefix(" sans prefixe "), "sans prefixe");
    }

    #[test]
    fn empty_grid() {
        let grid = Grid::new(preamble());
        assert_eq!(flatten(&grid), Err(SheetError::EmptyGrid));
        assert_eq!(flatten(&Grid::default()), Err(SheetError::EmptyGrid));
    }

    #[test]
    fn short_total_block() {
        init();
        let mut rows = preamble();
        rows.push(header(&["A"]));
        rows.extend(block(0.0, 1).into_iter().take(4));
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(
            labels(&res),
            vec![
                ("Total interviewé".to_string(), "A".to_string()),
                ("Total interviewé".to_string(), "Total".to_string()),
            ]
        );
        assert_eq!(res[0].echantillon, num(1.0));
        assert_eq!(res[0].horizontal_pct, num(31.0));
        assert_eq!(res[0].indice, None);
        assert_eq!(res[1].indice, None);

        // Only the header row.
        let mut rows = preamble();
        rows.push(header(&["A"]));
        let res = flatten(&Grid::new(rows)).unwrap();
        assert_eq!(res.len(), 2);
        assert!(res.iter().all(|r| r.echantillon.is_none() && r.indice.is_none()));
    }

    #[test]
    fn no_segment_column() {
        let mut rows = preamble();
        for _ in 0..6 {
            rows.push(vec![Cell::Empty, t("Echantillon"), Cell::Number(1.0)]);
        }
        assert_eq!(
            flatten(&Grid::new(rows)),
            Err(SheetError::NoSegmentColumns { width: 3 })
        );
    }
}
