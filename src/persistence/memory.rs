use super::PersistenceBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Always-present in-process backend, mutex-guarded per the spec's
/// shared-resource policy.
#[derive(Default)]
pub struct MemoryPersistence {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryPersistence {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .expect("persistence lock poisoned")
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .lock()
            .expect("persistence lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
