use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Serialize `value` as JSON to `path`, creating parent directories first
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let data = serde_json::to_vec(value).context("Failed to serialize JSON")?;
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}

/// Dump an error and its cause chain to `path` for later inspection
pub async fn write_error_report(path: &Path, error: &anyhow::Error) -> Result<()> {
    let chain: Vec<String> = error.chain().map(|cause| cause.to_string()).collect();
    let report = serde_json::json!({
        "message": error.to_string(),
        "chain": chain,
        "debug": format!("{:?}", error),
    });
    write_json(path, &report).await
}

/// Recursively delete `dir`; returns whether anything was removed
pub fn remove_dir_if_exists(dir: &Path) -> Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to clear cache: {}", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_json_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/value.json");

        write_json(&path, &vec![1, 2, 3]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[1,2,3]");
    }

    #[tokio::test]
    async fn test_write_json_bare_file_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value.json");
        write_json(&path, "x").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\"x\"");
    }

    #[tokio::test]
    async fn test_write_error_report_includes_chain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error.json");
        let error = anyhow::anyhow!("socket closed").context("embedding batch 2 failed");

        write_error_report(&path, &error).await.unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["message"], "embedding batch 2 failed");
        assert_eq!(report["chain"][1], "socket closed");
    }

    #[test]
    fn test_remove_dir_if_exists() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("vector-store");
        std::fs::create_dir_all(target.join("inner")).unwrap();
        std::fs::write(target.join("inner/file"), "x").unwrap();

        assert!(remove_dir_if_exists(&target).unwrap());
        assert!(!target.exists());
        assert!(!remove_dir_if_exists(&target).unwrap());
    }
}
