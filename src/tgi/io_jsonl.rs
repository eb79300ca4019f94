// JSON lines: one record per line, fields in output column order.

use crate::tgi::*;

/// Serializes the records, one JSON object per line.
///
/// Non-ASCII characters are written as is. Missing values are `null`.
pub fn records_to_jsonl(records: &[Record]) -> TgiResult<String> {
    let mut res = String::new();
    for (index, rec) in records.iter().enumerate() {
        let line = serde_json::to_string(rec).context(SerializingJsonSnafu { index })?;
        res.push_str(&line);
        res.push('\n');
    }
    Ok(res)
}

pub(crate) fn parse_jsonl(content: &str, path: &str) -> TgiResult<Vec<Record>> {
    let mut res: Vec<Record> = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let rec: Record = serde_json::from_str(line).context(ParsingJsonSnafu {
            path: path.to_string(),
            lineno: idx + 1,
        })?;
        res.push(rec);
    }
    Ok(res)
}

pub fn read_jsonl(path: &Path) -> TgiResult<Vec<Record>> {
    let path_s = path.display().to_string();
    let content = fs::read_to_string(path).context(ReadingFileSnafu {
        path: path_s.clone(),
    })?;
    debug!("read_jsonl: {} bytes from {}", content.len(), path_s);
    parse_jsonl(&content, &path_s)
}
