//! Persistence Facade (C6): a locator over named key/value backends. The
//! facade itself never persists anything — it dispatches `get`/`set` to
//! whichever backend the caller names.

mod file;
mod memory;
mod remote;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;
pub use remote::RemotePersistence;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// One named key/value backend.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// A tagged container of available backends, selected by name. `memory` is
/// always present; `file` and `remote` are registered when configured.
pub struct PersistenceFacade {
    backends: HashMap<String, Arc<dyn PersistenceBackend>>,
}

impl PersistenceFacade {
    /// Always registers a `memory` backend.
    pub fn new() -> Self {
        let mut backends: HashMap<String, Arc<dyn PersistenceBackend>> = HashMap::new();
        backends.insert("memory".to_string(), Arc::new(MemoryPersistence::new()));
        Self { backends }
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn PersistenceBackend>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn backend(&self, name: &str) -> Option<Arc<dyn PersistenceBackend>> {
        self.backends.get(name).cloned()
    }

    /// Convenience used by the Metadata Cache: get/set against the `memory`
    /// backend specifically, which is always present.
    pub fn memory(&self) -> Arc<dyn PersistenceBackend> {
        self.backends
            .get("memory")
            .cloned()
            .expect("memory backend always registered")
    }
}

impl Default for PersistenceFacade {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_is_always_present() {
        let facade = PersistenceFacade::new();
        assert!(facade.backend("memory").is_some());
        assert!(facade.backend("file").is_none());
    }

    #[tokio::test]
    async fn registered_backend_is_retrievable_by_name() {
        let mut facade = PersistenceFacade::new();
        facade.register("file", Arc::new(MemoryPersistence::new()));
        assert!(facade.backend("file").is_some());
    }
}
