use crate::domain::ports::{FileEntry, Storage};
use crate::utils::error::{AnalysisError, Result};
use std::path::{Path, PathBuf};

/// 本機檔案系統儲存，所有路徑相對於 base_path
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.full_path(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        let display = full_path.to_string_lossy().to_string();

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AnalysisError::persistence(display.clone(), e))?;
        }

        tokio::fs::write(&full_path, data)
            .await
            .map_err(|e| AnalysisError::persistence(display, e))?;
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<FileEntry>> {
        let full_dir = self.full_path(dir);
        let mut entries = match tokio::fs::read_dir(&full_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let path = if dir.is_empty() {
                name
            } else {
                format!("{}/{}", dir.trim_end_matches('/'), name)
            };
            files.push(FileEntry {
                path,
                modified: metadata.modified().ok(),
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn display_path(&self, path: &str) -> String {
        self.full_path(path).to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());

        storage.write_file("run/a.csv", b"id\n1\n").await.unwrap();
        storage.write_file("run/b.html", b"<html></html>").await.unwrap();

        let data = storage.read_file("run/a.csv").await.unwrap();
        assert_eq!(data, b"id\n1\n");

        let files = storage.list_files("run").await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["run/a.csv", "run/b.html"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());

        let files = storage.list_files("does-not-exist").await.unwrap();
        assert!(files.is_empty());
    }
}
