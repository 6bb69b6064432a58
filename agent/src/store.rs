use std::{io::ErrorKind, path::PathBuf};

use anyhow::Context;
use iota_common::AgentConfig;

/// JSON-backed agent configuration.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(|| {
            std::env::var("IOTA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./.iota"))
                .join("agent.json")
        });
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// A missing file yields the defaults.
    pub async fn load(&self) -> anyhow::Result<AgentConfig> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice::<AgentConfig>(&raw)
                .with_context(|| format!("invalid config at {}", self.path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(AgentConfig::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    pub async fn save(&self, config: &AgentConfig) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(&self.path, payload)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_defaults_and_saves_round_trip() {
        let dir = std::env::temp_dir().join(format!("iota-store-{}", std::process::id()));
        let _ = tokio::fs::remove_dir_all(&dir).await;
        let store = ConfigStore::new(Some(dir.join("agent.json")));

        let mut config = store.load().await.unwrap();
        assert_eq!(config.thing_name, "iota");

        config.thing_name = "porch".to_string();
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap().thing_name, "porch");

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("iota-store-bad-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("agent.json");
        tokio::fs::write(&path, b"{ nope").await.unwrap();

        assert!(ConfigStore::new(Some(path)).load().await.is_err());

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }
}
