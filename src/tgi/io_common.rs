use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::tgi::*;

pub const OUTPUT_SUFFIX: &str = "_long_ALL_AVEC_TOTAL";

/// The default outputs for an input file: `<stem>_long_ALL_AVEC_TOTAL.xlsx` and
/// `<stem>_long_ALL_AVEC_TOTAL.json`, placed in `out_dir`.
pub fn default_output_paths(input: &Path, out_dir: &Path) -> TgiResult<OutputPaths> {
    let stem = match input.file_stem().and_then(|s| s.to_str()) {
        Some(s) if !s.is_empty() => s,
        _ => whatever!("Cannot derive an output name from {:?}", input),
    };
    let base = format!("{}{}", stem, OUTPUT_SUFFIX);
    Ok(OutputPaths {
        table: out_dir.join(format!("{}.xlsx", base)),
        jsonl: out_dir.join(format!("{}.json", base)),
    })
}

// The directory that receives the temporary file. It must be on the same
// filesystem as the destination for the final rename.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Writes the content next to the destination, then moves it in place.
///
/// On failure the destination is left untouched.
pub fn write_atomic(path: &Path, content: &[u8]) -> TgiResult<()> {
    write_atomic_with(path, |file| {
        file.write_all(content)
            .context(WritingFileSnafu {
                path: path.display().to_string(),
            })
    })
}

pub fn write_atomic_with<F>(path: &Path, fill: F) -> TgiResult<()>
where
    F: FnOnce(&mut NamedTempFile) -> TgiResult<()>,
{
    let path_s = path.display().to_string();
    let mut tmp = NamedTempFile::new_in(parent_dir(path)).context(WritingFileSnafu {
        path: path_s.clone(),
    })?;
    fill(&mut tmp)?;
    tmp.as_file()
        .sync_all()
        .context(WritingFileSnafu { path: path_s.clone() })?;
    tmp.persist(path).context(PersistingFileSnafu { path: path_s })?;
    debug!("write_atomic: wrote {:?}", path);
    Ok(())
}
