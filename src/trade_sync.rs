//! Trade Sync Service (C4): reconciles a venue's trade history with the
//! durable trade store from a cutoff time forward.

use crate::error::{EnvironmentError, Result};
use crate::ports::{ExchangeAdapter, TradeStore};
use crate::types::Trade;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Reconciles venue trade history with a durable `TradeStore`. Holds no
/// per-symbol state itself — every call is a fresh reconciliation pass.
pub struct TradeSyncService {
    store: Arc<dyn TradeStore>,
}

impl TradeSyncService {
    pub fn new(store: Arc<dyn TradeStore>) -> Self {
        Self { store }
    }

    /// Sync `(venue, symbol)` from `max(scan_time, last local trade time)`.
    /// Pages through venue history via `page_size`-sized windows and inserts
    /// each returned trade; at-least-once insertion is acceptable because
    /// the store dedupes on `(venue, id)`.
    pub async fn sync(
        &self,
        exchange: &dyn ExchangeAdapter,
        symbol: &str,
        scan_time: DateTime<Utc>,
        page_size: usize,
    ) -> Result<usize> {
        let venue = exchange.name();

        let last_local = self
            .store
            .last_trade_time(venue, symbol)
            .await
            .map_err(|e| EnvironmentError::StoreUnavailable {
                venue: venue.to_string(),
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;

        let cutoff = match last_local {
            Some(t) if t > scan_time => t,
            _ => scan_time,
        };

        let trades = exchange
            .query_trades_from(symbol, cutoff, page_size)
            .await
            .map_err(|e| EnvironmentError::VenueUnavailable {
                venue: venue.to_string(),
                reason: e.to_string(),
            })?;

        let mut inserted = 0usize;
        for trade in &trades {
            self.store
                .insert(venue, trade)
                .await
                .map_err(|e| EnvironmentError::StoreWriteFailed {
                    venue: venue.to_string(),
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                })?;
            inserted += 1;
        }

        debug!(venue, symbol, inserted, %cutoff, "trade sync complete");
        Ok(inserted)
    }

    /// Load the reconciled local trade log for `(venue, symbol)`, choosing
    /// the fee-currency query variant when `symbol` begins with the venue's
    /// platform fee currency (case-sensitive, per design notes).
    pub async fn load_trades(
        &self,
        exchange: &dyn ExchangeAdapter,
        symbol: &str,
    ) -> Result<Vec<Trade>> {
        let venue = exchange.name();
        let fee_currency = exchange.platform_fee_currency();

        let result = if symbol.starts_with(fee_currency) {
            self.store
                .query_for_trading_fee_currency(venue, symbol, fee_currency)
                .await
        } else {
            self.store.query(venue, symbol).await
        };

        result.map_err(|e| EnvironmentError::StoreUnavailable {
            venue: venue.to_string(),
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryExchangeAdapter, InMemoryTradeStore};
    use crate::types::Side;
    use rust_decimal_macros::dec;

    fn trade(id: u64, symbol: &str, ts: DateTime<Utc>) -> Trade {
        Trade {
            id,
            symbol: symbol.to_string(),
            side: Side::Buy,
            is_buyer: true,
            is_maker: false,
            price: dec!(100),
            volume: dec!(1),
            fee: dec!(0.01),
            fee_currency: "BNB".into(),
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn sync_dedups_against_local_store_and_appends_venue_order() {
        let store = Arc::new(InMemoryTradeStore::new());
        let scan_time = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();

        store.insert("binance", &trade(1, "BTCUSDT", scan_time)).await.unwrap();
        store.insert("binance", &trade(2, "BTCUSDT", scan_time)).await.unwrap();

        let exchange = InMemoryExchangeAdapter::new("binance", "BNB");
        exchange.push_trades(
            "BTCUSDT",
            vec![
                trade(2, "BTCUSDT", scan_time),
                trade(3, "BTCUSDT", scan_time),
                trade(4, "BTCUSDT", scan_time),
            ],
        );

        let service = TradeSyncService::new(store.clone());
        service
            .sync(&exchange, "BTCUSDT", scan_time, 100)
            .await
            .unwrap();

        let trades = service.load_trades(&exchange, "BTCUSDT").await.unwrap();
        let mut ids: Vec<u64> = trades.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn sync_twice_is_idempotent() {
        let store = Arc::new(InMemoryTradeStore::new());
        let scan_time = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let exchange = InMemoryExchangeAdapter::new("binance", "BNB");
        exchange.push_trades("BTCUSDT", vec![trade(1, "BTCUSDT", scan_time)]);

        let service = TradeSyncService::new(store.clone());
        service.sync(&exchange, "BTCUSDT", scan_time, 100).await.unwrap();
        service.sync(&exchange, "BTCUSDT", scan_time, 100).await.unwrap();

        let trades = service.load_trades(&exchange, "BTCUSDT").await.unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[tokio::test]
    async fn future_scan_time_yields_zero_rows() {
        let store = Arc::new(InMemoryTradeStore::new());
        let future = Utc::now() + chrono::Duration::days(365);
        let exchange = InMemoryExchangeAdapter::new("binance", "BNB");
        exchange.push_trades("BTCUSDT", vec![trade(1, "BTCUSDT", Utc::now())]);

        let service = TradeSyncService::new(store.clone());
        let inserted = service.sync(&exchange, "BTCUSDT", future, 100).await.unwrap();
        assert_eq!(inserted, 0);
    }

    #[test]
    fn fee_currency_match_is_case_sensitive() {
        assert!("BNBUSDT".starts_with("BNB"));
        assert!(!"bnbusdt".starts_with("BNB"));
    }

    #[tokio::test]
    async fn store_read_failure_on_last_trade_time_is_store_unavailable() {
        let store = Arc::new(InMemoryTradeStore::new());
        store.fail_last_trade_time();
        let exchange = InMemoryExchangeAdapter::new("binance", "BNB");

        let service = TradeSyncService::new(store);
        let err = service
            .sync(&exchange, "BTCUSDT", Utc::now(), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::StoreUnavailable { venue, .. } if venue == "binance"));
    }

    #[tokio::test]
    async fn venue_query_failure_on_sync_is_venue_unavailable() {
        let store = Arc::new(InMemoryTradeStore::new());
        let exchange = InMemoryExchangeAdapter::new("binance", "BNB");
        exchange.fail_query_trades_from();

        let service = TradeSyncService::new(store);
        let err = service
            .sync(&exchange, "BTCUSDT", Utc::now(), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::VenueUnavailable { venue, .. } if venue == "binance"));
    }

    #[tokio::test]
    async fn store_write_failure_on_insert_is_store_write_failed() {
        let store = Arc::new(InMemoryTradeStore::new());
        store.fail_insert();
        let exchange = InMemoryExchangeAdapter::new("binance", "BNB");
        exchange.push_trades("BTCUSDT", vec![trade(1, "BTCUSDT", Utc::now())]);

        let service = TradeSyncService::new(store);
        let err = service
            .sync(&exchange, "BTCUSDT", Utc::now() - chrono::Duration::days(1), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::StoreWriteFailed { venue, .. } if venue == "binance"));
    }

    #[tokio::test]
    async fn store_read_failure_on_load_trades_is_store_unavailable() {
        let store = Arc::new(InMemoryTradeStore::new());
        store.fail_query();
        let exchange = InMemoryExchangeAdapter::new("binance", "BNB");

        let service = TradeSyncService::new(store);
        let err = service.load_trades(&exchange, "BTCUSDT").await.unwrap_err();
        assert!(matches!(err, EnvironmentError::StoreUnavailable { venue, .. } if venue == "binance"));
    }
}
