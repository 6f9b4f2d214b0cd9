//! Local file helpers for the CLI and the warm-up hook.

use crate::error::Pdf2MdError;
use std::path::{Path, PathBuf};

/// Read a PDF from disk, mapping I/O failures onto input errors.
pub async fn read_document(path: &Path) -> Result<Vec<u8>, Pdf2MdError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Pdf2MdError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Pdf2MdError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2MdError::Internal(format!("reading {}: {}", path.display(), e)),
    })
}

/// Write `contents` to `path` via a sibling temp file and a rename, so a
/// crash never leaves a half-written file behind.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Pdf2MdError> {
    let fail = |source| Pdf2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)
}

/// Write single-page PDFs as `page-0001.pdf`, `page-0002.pdf`, … into `dir`.
pub async fn write_pages(dir: &Path, pages: &[Vec<u8>]) -> Result<Vec<PathBuf>, Pdf2MdError> {
    let mut written = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        let path = dir.join(page_file_name(i));
        write_atomic(&path, page).await?;
        written.push(path);
    }
    Ok(written)
}

/// File name for 0-based page `index`.
pub fn page_file_name(index: usize) -> String {
    format!("page-{:04}.pdf", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_names_are_one_based_and_padded() {
        assert_eq!(page_file_name(0), "page-0001.pdf");
        assert_eq!(page_file_name(41), "page-0042.pdf");
    }

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.md");
        write_atomic(&target, b"# Hello\n").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"# Hello\n");
        assert!(!dir.path().join("nested").join("out.md.tmp").exists());
    }

    #[tokio::test]
    async fn write_pages_names_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_pages(dir.path(), &[b"a".to_vec(), b"b".to_vec()])
            .await
            .unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[1].ends_with("page-0002.pdf"));
        assert_eq!(std::fs::read(&written[1]).unwrap(), b"b");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = read_document(Path::new("/no/such/file.pdf")).await.unwrap_err();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
    }
}
