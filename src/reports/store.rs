use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Where rendered report content lives. Records keep the returned path.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn put(&self, name: &str, content: &str) -> Result<String, String>;
    async fn get(&self, path: &str) -> Result<String, String>;
    async fn delete(&self, path: &str) -> Result<(), String>;
}

pub struct LocalReportStore {
    root: PathBuf,
}

impl LocalReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Only paths under the store root are served or removed.
    fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(path);
        if !candidate.starts_with(&self.root)
            || candidate
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(format!("Path outside report store: {path}"));
        }
        Ok(candidate.to_path_buf())
    }
}

#[async_trait]
impl ReportStore for LocalReportStore {
    async fn put(&self, name: &str, content: &str) -> Result<String, String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| format!("Failed to create {}: {e}", self.root.display()))?;

        let path = self.root.join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn get(&self, path: &str) -> Result<String, String> {
        let path = self.resolve(path)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))
    }

    async fn delete(&self, path: &str) -> Result<(), String> {
        let path = self.resolve(path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("Failed to delete {}: {e}", path.display())),
        }
    }
}
