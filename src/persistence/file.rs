use super::PersistenceBackend;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// A directory of one JSON document per key. The directory is created with
/// permissive mode if missing, matching the configured `file` persistence
/// option. Keys are percent-encoded into filenames so arbitrary key strings
/// (cache keys like `"binance-markets"`, but also opaque strategy keys)
/// never collide with path separators.
pub struct FilePersistence {
    directory: PathBuf,
}

impl FilePersistence {
    pub fn new(directory: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let directory = directory.into();
        if !directory.exists() {
            std::fs::create_dir_all(&directory).context("failed to create persistence directory")?;
            set_permissive_mode(&directory)?;
        }
        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", encode_key(key)))
    }
}

#[async_trait]
impl PersistenceBackend for FilePersistence {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .context("failed to read persistence document")?;
        let value: String = serde_json::from_str(&content).context("failed to parse persistence document")?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let content = serde_json::to_string(value).context("failed to serialize persistence document")?;
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .context("failed to write persistence document")?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .context("failed to finalise persistence document")?;
        info!(key, path = %path.display(), "wrote persistence document");
        Ok(())
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.as_bytes() {
        match *byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(*byte as char),
            other => out.push_str(&format!("%{:02x}", other)),
        }
    }
    out
}

#[cfg(unix)]
fn set_permissive_mode(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))
        .context("failed to set persistence directory permissions")
}

#[cfg(not(unix))]
fn set_permissive_mode(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("tradecore-persistence-test-{}", std::process::id()));
        let backend = FilePersistence::new(&dir).unwrap();
        backend.set("binance-markets", "{\"BTCUSDT\":1}").await.unwrap();
        assert_eq!(
            backend.get("binance-markets").await.unwrap(),
            Some("{\"BTCUSDT\":1}".to_string())
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = std::env::temp_dir().join(format!("tradecore-persistence-test-missing-{}", std::process::id()));
        let backend = FilePersistence::new(&dir).unwrap();
        assert_eq!(backend.get("missing").await.unwrap(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn key_encoding_escapes_separators() {
        assert_eq!(encode_key("a/b"), "a%2fb");
        assert_eq!(encode_key("binance-markets"), "binance-markets");
    }
}
