use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

const OUTPUT_PREFIX: &str = "compressedfinal_";

/// `compressedfinal_<name>` next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.pdf".to_string());
    input.with_file_name(format!("{}{}", OUTPUT_PREFIX, name))
}

/// Write `bytes` to `path` through a temporary file in the same directory.
///
/// The temporary is removed if anything fails, so `path` either holds the
/// complete document or is left untouched.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
