//! Configuration (C9): environment-variable loading composed from focused
//! sub-loaders, the way the teacher's own `Config::from_env` layers
//! `BrokerEnvConfig`/`StrategyEnvConfig`/`RiskEnvConfig`/
//! `ObservabilityEnvConfig`. Malformed values anywhere are *config-invalid*
//! and fail fast, before any session is added.

mod notification_env;
mod persistence_env;
mod sync_env;

pub use notification_env::NotificationEnvConfig;
pub use persistence_env::{PersistenceBackendKind, PersistenceEnvConfig};
pub use sync_env::SyncEnvConfig;

use crate::environment::Environment;
use crate::error::{EnvironmentError, Result};
use crate::notification::{NotificationConfig, NotificationRouter};
use crate::persistence::{FilePersistence, PersistenceFacade, RemotePersistence};
use crate::ports::{NotificationTransport, TradeStore};
use std::sync::Arc;

/// Aggregated environment configuration for one `Environment` instance.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub persistence: PersistenceEnvConfig,
    pub notification: NotificationEnvConfig,
    pub sync: SyncEnvConfig,
}

impl EnvironmentConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            persistence: PersistenceEnvConfig::from_env()?,
            notification: NotificationEnvConfig::from_env()?,
            sync: SyncEnvConfig::from_env()?,
        })
    }

    /// Build the `PersistenceFacade` this config describes: `memory` is
    /// always registered; `file`/`remote` are additionally registered and
    /// selected as the configured backend. The metadata cache itself always
    /// addresses `memory` directly (§4.6), so a `file`/`remote` choice here
    /// only affects callers that look up a backend by name.
    pub fn build_persistence(&self) -> Result<PersistenceFacade> {
        let mut facade = PersistenceFacade::new();
        match self.persistence.backend {
            PersistenceBackendKind::Memory => {}
            PersistenceBackendKind::File => {
                let dir = self
                    .persistence
                    .file_dir
                    .as_deref()
                    .expect("from_env validated file_dir is present for the file backend");
                let backend = FilePersistence::new(dir).map_err(|e| EnvironmentError::ConfigInvalid {
                    reason: format!("failed to initialise file persistence at '{dir}': {e}"),
                })?;
                facade.register("file", Arc::new(backend));
            }
            PersistenceBackendKind::Remote => {
                let url = self
                    .persistence
                    .remote_url
                    .as_deref()
                    .expect("from_env validated remote_url is present for the remote backend");
                let token = self
                    .persistence
                    .remote_token
                    .as_deref()
                    .expect("from_env validated remote_token is present for the remote backend");
                facade.register("remote", Arc::new(RemotePersistence::new(url, token)));
            }
        }
        Ok(facade)
    }

    /// Build the `NotificationConfig` this config describes, ready to hand
    /// to `NotificationRouter::new` alongside an injected transport.
    pub fn notification_config(&self) -> NotificationConfig {
        NotificationConfig {
            symbol_channels: self.notification.symbol_channels.clone(),
            session_channels: self.notification.session_channels.clone(),
            trade: self.notification.trade,
            order: self.notification.order,
            submit_order: self.notification.submit_order,
            pnl: self.notification.pnl,
            ..NotificationConfig::default()
        }
    }

    /// Assemble a ready-to-use `Environment` from this configuration, the
    /// way the teacher's `Config::from_env` output feeds directly into
    /// `Application::new` in `application/system.rs`.
    pub fn into_environment(
        self,
        trade_store: Option<Arc<dyn TradeStore>>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Result<Environment> {
        let persistence = self.build_persistence()?;
        let notification = NotificationRouter::new(self.notification_config(), transport);
        Ok(Environment::new(
            persistence,
            notification,
            trade_store,
            self.sync.trade_scan_time,
            self.sync.start_time,
        ))
    }
}
