//! Utility functions for the finchat CLI

use anyhow::{Context, Result};
use finchat::Upload;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand ~ to home directory in paths
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return path.replacen("~", &home, 1);
        }
    }
    path.to_string()
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Calculate total size of a directory recursively
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Expand files and directories into a sorted list of PDF paths
pub fn collect_pdfs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();
    for path in paths {
        let path = PathBuf::from(expand_path(&path.to_string_lossy()));
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(&path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            pdfs.extend(found);
        } else if path.is_file() {
            pdfs.push(path);
        } else {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(pdfs)
}

/// Read PDFs into uploads named after their file names.
///
/// Files over `max_bytes` are rejected before they are read.
pub fn read_uploads(paths: &[PathBuf], max_bytes: usize) -> Result<Vec<Upload>> {
    collect_pdfs(paths)?
        .into_iter()
        .map(|path| {
            Upload::from_path(&path, max_bytes).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(50 * 1024 * 1024), "50.0 MB");
    }

    #[test]
    fn test_expand_path_leaves_plain_paths() {
        assert_eq!(expand_path("/tmp/a.pdf"), "/tmp/a.pdf");
        assert_eq!(expand_path("reports/q3.pdf"), "reports/q3.pdf");
    }

    #[test]
    fn test_collect_pdfs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-").unwrap();
        std::fs::write(dir.path().join("nested").join("a.PDF"), b"%PDF-").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let pdfs = collect_pdfs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(pdfs.len(), 2);
        assert!(pdfs.iter().all(|p| is_pdf(p)));

        let uploads = read_uploads(&[dir.path().join("b.pdf")], 1024).unwrap();
        assert_eq!(uploads[0].name, "b.pdf");
    }

    #[test]
    fn test_read_uploads_enforces_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.pdf"), b"%PDF-").unwrap();
        std::fs::write(dir.path().join("large.pdf"), vec![b'x'; 64]).unwrap();

        let err = read_uploads(&[dir.path().to_path_buf()], 16).unwrap_err();
        let library_err = err.downcast_ref::<finchat::Error>().unwrap();
        assert_eq!(library_err.kind(), finchat::ErrorKind::DocumentParse);

        assert_eq!(read_uploads(&[dir.path().join("small.pdf")], 16).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_path_is_error() {
        assert!(collect_pdfs(&[PathBuf::from("/definitely/not/here.pdf")]).is_err());
    }
}
