use crate::error::{EnvironmentError, Result};
use chrono::{DateTime, Duration, Utc};
use std::env;

/// Loads `TRADE_SCAN_TIME` (RFC3339) and `START_TIME` (RFC3339, optional).
/// `trade_scan_time` defaults to seven days before load; `start_time`
/// defaults to unset, letting `Init` set it to "now" per the design note's
/// resolved open question.
#[derive(Debug, Clone)]
pub struct SyncEnvConfig {
    pub trade_scan_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
}

impl SyncEnvConfig {
    pub fn from_env() -> Result<Self> {
        let trade_scan_time = match env::var("TRADE_SCAN_TIME") {
            Ok(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| EnvironmentError::ConfigInvalid {
                    reason: format!("invalid TRADE_SCAN_TIME '{raw}': {e}"),
                })?,
            Err(_) => Utc::now() - Duration::days(7),
        };

        let start_time = match env::var("START_TIME") {
            Ok(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| EnvironmentError::ConfigInvalid {
                        reason: format!("invalid START_TIME '{raw}': {e}"),
                    })?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            trade_scan_time,
            start_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_trade_scan_time_to_seven_days_ago() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::remove_var("TRADE_SCAN_TIME");
            env::remove_var("START_TIME");
        }
        let cfg = SyncEnvConfig::from_env().unwrap();
        assert!(cfg.start_time.is_none());
        let delta = Utc::now() - cfg.trade_scan_time;
        assert!(delta >= Duration::days(6) && delta <= Duration::days(8));
    }

    #[test]
    fn malformed_start_time_is_config_invalid() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("START_TIME", "not-a-date");
        }
        let err = SyncEnvConfig::from_env().unwrap_err();
        assert!(matches!(err, EnvironmentError::ConfigInvalid { .. }));
        unsafe {
            env::remove_var("START_TIME");
        }
    }
}
