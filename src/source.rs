use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CompressError, Result};

/// Read-only handle to the document being compressed.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    data: Arc<Vec<u8>>,
}

impl SourceDocument {
    /// Open a PDF from disk, rejecting anything that is not plausibly a PDF.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let is_pdf_name = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf_name {
            return Err(CompressError::invalid_input(path, "expected a .pdf file"));
        }
        if !path.is_file() {
            return Err(CompressError::invalid_input(path, "file does not exist"));
        }

        let data = std::fs::read(path)?;
        Self::from_bytes(path, data)
    }

    /// Wrap PDF bytes already in memory. `name` is only used for reporting.
    pub fn from_bytes(name: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self> {
        let path = name.into();
        if !data.starts_with(b"%PDF") {
            return Err(CompressError::invalid_input(path, "missing %PDF header"));
        }
        Ok(Self {
            path,
            data: Arc::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.data)
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"%PDF-1.5").unwrap();

        let err = SourceDocument::open(&path).unwrap_err();
        assert!(matches!(err, CompressError::InvalidInput { .. }));
    }

    #[test]
    fn rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceDocument::open(dir.path().join("gone.pdf")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn rejects_bytes_without_header() {
        let err = SourceDocument::from_bytes("x.pdf", b"GIF89a".to_vec()).unwrap_err();
        assert!(err.to_string().contains("%PDF"));
    }

    #[test]
    fn accepts_uppercase_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SCAN.PDF");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();

        let source = SourceDocument::open(&path).unwrap();
        assert_eq!(source.size_bytes(), 9);
        assert_eq!(source.path(), path.as_path());
    }
}
