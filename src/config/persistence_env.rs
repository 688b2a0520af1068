use crate::error::{EnvironmentError, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceBackendKind {
    Memory,
    File,
    Remote,
}

/// Loads `PERSISTENCE_BACKEND`, `PERSISTENCE_FILE_DIR`,
/// `PERSISTENCE_REMOTE_URL`, `PERSISTENCE_REMOTE_TOKEN`.
#[derive(Debug, Clone)]
pub struct PersistenceEnvConfig {
    pub backend: PersistenceBackendKind,
    pub file_dir: Option<String>,
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
}

impl PersistenceEnvConfig {
    pub fn from_env() -> Result<Self> {
        let backend_str = env::var("PERSISTENCE_BACKEND").unwrap_or_else(|_| "memory".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "memory" => PersistenceBackendKind::Memory,
            "file" => PersistenceBackendKind::File,
            "remote" => PersistenceBackendKind::Remote,
            other => {
                return Err(EnvironmentError::ConfigInvalid {
                    reason: format!("invalid PERSISTENCE_BACKEND '{other}', expected memory|file|remote"),
                });
            }
        };

        let file_dir = env::var("PERSISTENCE_FILE_DIR").ok();
        let remote_url = env::var("PERSISTENCE_REMOTE_URL").ok();
        let remote_token = env::var("PERSISTENCE_REMOTE_TOKEN").ok();

        if backend == PersistenceBackendKind::File && file_dir.is_none() {
            return Err(EnvironmentError::ConfigInvalid {
                reason: "PERSISTENCE_BACKEND=file requires PERSISTENCE_FILE_DIR".to_string(),
            });
        }
        if backend == PersistenceBackendKind::Remote && (remote_url.is_none() || remote_token.is_none()) {
            return Err(EnvironmentError::ConfigInvalid {
                reason: "PERSISTENCE_BACKEND=remote requires PERSISTENCE_REMOTE_URL and PERSISTENCE_REMOTE_TOKEN"
                    .to_string(),
            });
        }

        Ok(Self {
            backend,
            file_dir,
            remote_url,
            remote_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_to_memory() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::remove_var("PERSISTENCE_BACKEND");
        }
        let cfg = PersistenceEnvConfig::from_env().unwrap();
        assert_eq!(cfg.backend, PersistenceBackendKind::Memory);
    }

    #[test]
    fn file_backend_without_dir_is_invalid() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("PERSISTENCE_BACKEND", "file");
            env::remove_var("PERSISTENCE_FILE_DIR");
        }
        let err = PersistenceEnvConfig::from_env().unwrap_err();
        assert!(matches!(err, EnvironmentError::ConfigInvalid { .. }));
        unsafe {
            env::remove_var("PERSISTENCE_BACKEND");
        }
    }

    #[test]
    fn unknown_backend_is_invalid() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("PERSISTENCE_BACKEND", "carrier-pigeon");
        }
        let err = PersistenceEnvConfig::from_env().unwrap_err();
        assert!(matches!(err, EnvironmentError::ConfigInvalid { .. }));
        unsafe {
            env::remove_var("PERSISTENCE_BACKEND");
        }
    }
}
