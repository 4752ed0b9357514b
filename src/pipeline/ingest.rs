//! Ingestion: turn user-supplied paths into label files, and read them.
//!
//! Only `.zpl` and `.txt` files are accepted (case-insensitive); anything
//! else is dropped silently, logged at debug level. Directories are walked
//! recursively so a whole export folder can be handed over at once.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions recognised as label markup.
pub const LABEL_EXTENSIONS: [&str; 2] = ["zpl", "txt"];

/// `true` if `path` carries a label-markup extension.
pub fn is_label_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            LABEL_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Expand and filter the inputs into an ordered list of label files.
///
/// Files are kept in argument order; the contents of a directory are
/// appended in sorted path order. Paths that do not exist are skipped with
/// a warning.
pub fn collect_label_files<P: AsRef<Path>>(inputs: &[P]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let walker = WalkDir::new(input).sort_by_file_name().into_iter();
            for entry in walker.filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry under {}: {}", input.display(), err);
                    None
                }
            }) {
                if entry.file_type().is_file() {
                    push_if_label(&mut files, entry.path());
                }
            }
        } else if input.exists() {
            push_if_label(&mut files, input);
        } else {
            warn!("Skipping missing input: {}", input.display());
        }
    }

    files
}

fn push_if_label(files: &mut Vec<PathBuf>, path: &Path) {
    if is_label_file(path) {
        files.push(path.to_path_buf());
    } else {
        debug!("Ignoring non-label file: {}", path.display());
    }
}

/// Read a label file as text.
///
/// Invalid UTF-8 is replaced rather than rejected: printers and their
/// export tools commonly emit Latin-1.
pub async fn read_markup(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!("{} is not valid UTF-8; decoding lossily", path.display());
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    })
}
