//! File-based attachment storage

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::traits::AttachmentStore;

/// Name of the per-message details file written next to attachments
pub const DETAILS_FILENAME: &str = "email_details.txt";

/// Writes attachments to plain files under an upload directory
///
/// Directory structure:
/// ```text
/// uploads/
///   self_20240301_093000_18e0c1f2a3b4c5d6/
///     report.pdf
///     email_details.txt
///   self_20240302_101500_18e0c9aa00112233/
///     minutes.docx
///     email_details.txt
/// ```
pub struct FileAttachmentStore {
    root: PathBuf,
}

impl FileAttachmentStore {
    /// Create a store rooted at the given directory, creating it if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create upload directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Write atomically (temp file, then rename over the destination)
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create folder {}", parent.display()))?;
        }

        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        fs::write(&temp_path, data)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to move file into place at {}", path.display()))?;
        Ok(())
    }
}

impl AttachmentStore for FileAttachmentStore {
    fn save_attachment(&self, folder: &str, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self
            .root
            .join(sanitize_filename(folder))
            .join(sanitize_filename(filename));
        self.write_atomic(&path, data)?;
        Ok(path)
    }

    fn save_details(&self, folder: &str, text: &str) -> Result<PathBuf> {
        let path = self
            .root
            .join(sanitize_filename(folder))
            .join(DETAILS_FILENAME);
        self.write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Make a single path component safe to join under the upload root
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = name.trim().replace(['/', '\\'], "_");
    match cleaned.as_str() {
        "" | "." | ".." => "attachment".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_attachment() {
        let dir = tempdir().unwrap();
        let store = FileAttachmentStore::new(dir.path().join("uploads")).unwrap();

        let path = store
            .save_attachment("self_20240301_093000_m1", "report.pdf", b"%PDF-1.4")
            .unwrap();

        assert!(path.ends_with("self_20240301_093000_m1/report.pdf"));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_save_attachment_overwrites() {
        let dir = tempdir().unwrap();
        let store = FileAttachmentStore::new(dir.path()).unwrap();

        store.save_attachment("f", "a.txt", b"first").unwrap();
        let path = store.save_attachment("f", "a.txt", b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        // No temp file left behind
        let entries: Vec<_> = fs::read_dir(dir.path().join("f")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_save_details() {
        let dir = tempdir().unwrap();
        let store = FileAttachmentStore::new(dir.path()).unwrap();

        let path = store.save_details("f", "Email Details:\n").unwrap();

        assert!(path.ends_with(DETAILS_FILENAME));
        assert_eq!(fs::read_to_string(&path).unwrap(), "Email Details:\n");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_filename(""), "attachment");
        assert_eq!(sanitize_filename(".."), "attachment");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_path_traversal_stays_under_root() {
        let dir = tempdir().unwrap();
        let store = FileAttachmentStore::new(dir.path()).unwrap();

        let path = store.save_attachment("..", "../../etc/passwd", b"x").unwrap();

        assert!(path.starts_with(dir.path()));
    }
}
