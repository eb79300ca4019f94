// Primitives for writing CSV files.

use crate::tgi::{io_common::write_atomic_with, *};

fn metric_field(value: Option<&MetricValue>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the records as CSV with a header line. Missing values are empty fields.
pub fn write_csv(path: &Path, records: &[Record]) -> TgiResult<()> {
    let path_s = path.display().to_string();
    write_atomic_with(path, |file| {
        let mut wtr = csv::Writer::from_writer(file);
        wtr.write_record(Record::COLUMNS).context(WritingCsvSnafu {
            path: path_s.clone(),
        })?;
        for rec in records.iter() {
            let mut line: Vec<String> = vec![rec.group_label.clone(), rec.segment_label.clone()];
            line.extend(Metric::ALL.iter().map(|m| metric_field(rec.metric(*m))));
            wtr.write_record(&line).context(WritingCsvSnafu {
                path: path_s.clone(),
            })?;
        }
        wtr.flush().context(WritingFileSnafu {
            path: path_s.clone(),
        })?;
        Ok(())
    })
}
