//! Environment Orchestrator (C8): owns sessions, runs `Init` then
//! `Connect`, and owns the lifecycle.

use crate::error::{EnvironmentError, Result};
use crate::market_data::MarketDataStore;
use crate::market_data::indicators::StandardIndicatorSet;
use crate::market_metadata::MarketMetadataCache;
use crate::notification::{NotifiableEvent, NotificationRouter};
use crate::persistence::PersistenceFacade;
use crate::ports::{ExchangeAdapter, KLineQuery, TradeStore};
use crate::session::ExchangeSession;
use crate::trade_sync::TradeSyncService;
use crate::types::{Interval, StreamChannel};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The maximum candles fetched per `(symbol, interval)` during historical
/// seeding — the minimum the standard indicator set needs to warm up.
const HISTORICAL_SEED_LIMIT: usize = 1000;

pub struct Environment {
    sessions: tokio::sync::RwLock<Vec<Arc<ExchangeSession>>>,
    trade_store: Option<Arc<dyn TradeStore>>,
    trade_sync: Option<TradeSyncService>,
    persistence: PersistenceFacade,
    notification: NotificationRouter,
    start_time: tokio::sync::RwLock<Option<DateTime<Utc>>>,
    trade_scan_time: DateTime<Utc>,
}

impl Environment {
    pub fn new(
        persistence: PersistenceFacade,
        notification: NotificationRouter,
        trade_store: Option<Arc<dyn TradeStore>>,
        trade_scan_time: DateTime<Utc>,
        start_time: Option<DateTime<Utc>>,
    ) -> Self {
        let trade_sync = trade_store.clone().map(TradeSyncService::new);
        Self {
            sessions: tokio::sync::RwLock::new(Vec::new()),
            trade_store,
            trade_sync,
            persistence,
            notification,
            start_time: tokio::sync::RwLock::new(start_time),
            trade_scan_time,
        }
    }

    /// Add a session under `name`. Names are unique (invariant 1).
    pub async fn add_exchange(
        &self,
        name: impl Into<String>,
        exchange: Arc<dyn ExchangeAdapter>,
    ) -> Result<()> {
        let name = name.into();
        let mut sessions = self.sessions.write().await;
        if sessions.iter().any(|s| s.name == name) {
            return Err(EnvironmentError::ConfigInvalid {
                reason: format!("session '{name}' already exists"),
            });
        }
        sessions.push(Arc::new(ExchangeSession::new(name, exchange)));
        Ok(())
    }

    pub async fn session(&self, name: &str) -> Option<Arc<ExchangeSession>> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    pub async fn notify(&self, event: NotifiableEvent) {
        self.notification.notify(event).await;
    }

    /// Register a symbol the session must serve and a candle subscription
    /// for it, the way a strategy would declare its data requirements
    /// before `Init`.
    pub async fn subscribe_candles(&self, session_name: &str, symbol: &str, interval: &str) -> Result<()> {
        let session = self
            .session(session_name)
            .await
            .ok_or_else(|| EnvironmentError::ConfigInvalid {
                reason: format!("session '{session_name}' not found"),
            })?;
        session.add_subscription(crate::types::Subscription::candle(symbol, interval));
        Ok(())
    }

    /// Runs Init sequentially across sessions and across symbols within a
    /// session, per §4.9's determinism requirement.
    pub async fn init(&self, cancel: CancellationToken) -> Result<()> {
        let sessions = self.sessions.read().await.clone();
        let metadata_cache = MarketMetadataCache::new(&self.persistence);

        for session in &sessions {
            if cancel.is_cancelled() {
                return Err(EnvironmentError::Cancelled);
            }

            let markets = metadata_cache.load(session.exchange.as_ref()).await?;
            session.set_markets(markets);

            for symbol in session.loaded_symbols() {
                if cancel.is_cancelled() {
                    return Err(EnvironmentError::Cancelled);
                }
                self.init_symbol(session, &symbol).await?;
            }

            let balances = session
                .exchange
                .query_account_balances()
                .await
                .map_err(|e| EnvironmentError::VenueUnavailable {
                    venue: session.exchange.name().to_string(),
                    reason: e.to_string(),
                })?;
            session.account.seed(balances);

            self.register_default_handlers(session);
        }

        self.seed_historical_candles(&sessions).await?;

        Ok(())
    }

    async fn init_symbol(&self, session: &Arc<ExchangeSession>, symbol: &str) -> Result<()> {
        let trades = if let Some(sync) = &self.trade_sync {
            sync.sync(
                session.exchange.as_ref(),
                symbol,
                self.trade_scan_time,
                HISTORICAL_SEED_LIMIT,
            )
            .await?;
            sync.load_trades(session.exchange.as_ref(), symbol).await?
        } else {
            Vec::new()
        };

        session.seed_trades(symbol, trades);
        session.set_last_price(symbol, Decimal::ZERO);

        let store = MarketDataStore::new(symbol);
        store.bind_stream(session.stream.as_ref());
        let indicators = StandardIndicatorSet::attach(&store);
        session.set_market_data_store(symbol, store);
        session.set_indicator_set(symbol, indicators);

        Ok(())
    }

    /// Registers the handlers §4.9 step 4 names: balance logging, start/
    /// last price tracking, and trade-log append with optional durable
    /// insert.
    fn register_default_handlers(&self, session: &Arc<ExchangeSession>) {
        let venue = session.exchange.name().to_string();
        session.stream.on_balance_update(Box::new(move |currency, balance| {
            info!(venue = %venue, currency, available = %balance.available, locked = %balance.locked, "balance update");
        }));

        let account_session = Arc::clone(session);
        session.stream.on_balance_update(Box::new(move |currency, balance| {
            account_session.account.apply_update(currency, *balance);
        }));

        for symbol in session.loaded_symbols() {
            let price_session = Arc::clone(session);
            let price_symbol = symbol.clone();
            session.stream.on_candle_closed(Box::new(move |k| {
                if k.symbol != price_symbol {
                    return;
                }
                price_session.set_start_price_if_unset(&price_symbol, k.open);
                price_session.set_last_price(&price_symbol, k.close);
            }));
        }

        let trade_session = Arc::clone(session);
        let trade_store = self.trade_store.clone();
        let venue = session.exchange.name().to_string();
        session.stream.on_trade_update(Box::new(move |trade| {
            trade_session.append_trade(&trade.symbol, trade.clone());
            if let Some(store) = trade_store.clone() {
                let venue = venue.clone();
                let trade = trade.clone();
                tokio::spawn(async move {
                    if let Err(e) = store.insert(&venue, &trade).await {
                        error!(venue = %venue, symbol = %trade.symbol, error = %e, "durable trade insert failed");
                    }
                });
            }
        }));
    }

    /// §4.9 step 5: seed historical candles for every distinct
    /// `(symbol, interval)` a session subscribes to, ending strictly before
    /// `start_time - interval` so the currently-forming candle is excluded.
    async fn seed_historical_candles(&self, sessions: &[Arc<ExchangeSession>]) -> Result<()> {
        let start_time = {
            let mut start_time = self.start_time.write().await;
            if start_time.is_none() {
                *start_time = Some(Utc::now());
            }
            start_time.expect("just set if unset")
        };

        for session in sessions {
            let mut seen = HashSet::new();
            for subscription in session.subscriptions() {
                if subscription.channel != StreamChannel::Candle {
                    continue;
                }
                let Some(interval) = subscription.options.interval.clone() else {
                    continue;
                };
                if !seen.insert((subscription.symbol.clone(), interval.clone())) {
                    continue;
                }
                self.seed_symbol_interval(session, &subscription.symbol, &interval, start_time)
                    .await?;
            }
        }

        Ok(())
    }

    async fn seed_symbol_interval(
        &self,
        session: &Arc<ExchangeSession>,
        symbol: &str,
        interval: &Interval,
        start_time: DateTime<Utc>,
    ) -> Result<()> {
        let Some(duration) = interval.duration() else {
            warn!(symbol, %interval, "unrecognised interval, skipping historical seed");
            return Ok(());
        };

        let store = session
            .market_data_store(symbol)
            .ok_or_else(|| EnvironmentError::SymbolUndefined {
                session: session.name.clone(),
                symbol: symbol.to_string(),
            })?;

        let query = KLineQuery {
            start_time: None,
            end_time: Some(start_time - duration),
            limit: Some(HISTORICAL_SEED_LIMIT),
        };

        let mut candles = session
            .exchange
            .query_klines(symbol, interval, query)
            .await
            .map_err(|e| EnvironmentError::VenueUnavailable {
                venue: session.exchange.name().to_string(),
                reason: e.to_string(),
            })?;

        if candles.is_empty() {
            warn!(symbol, %interval, "venue returned no historical candles for interval");
            return Ok(());
        }

        candles.sort_by_key(|k| k.end_time);
        for candle in &candles {
            store.add_kline(candle.clone());
        }

        if let Some(latest) = store.latest_across_intervals() {
            session.set_last_price(symbol, latest.close);
        }

        Ok(())
    }

    /// Runs Connect sequentially across sessions: warn on no subscriptions,
    /// forward subscriptions, then open the transport. Handlers are always
    /// bound before `Connect` returns, since binding happens in `Init`.
    pub async fn connect(&self, cancel: CancellationToken) -> Result<()> {
        let sessions = self.sessions.read().await.clone();
        for session in &sessions {
            if session.subscriptions().is_empty() {
                warn!(session = %session.name, "connecting session with no subscriptions");
            }
            for subscription in session.subscriptions() {
                session.stream.subscribe(subscription);
            }
            session.stream.connect(cancel.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{LoggingTransport, NotificationConfig};
    use crate::testing::InMemoryExchangeAdapter;
    use crate::types::{Interval, KLine, MarketMetadata, MarketMetadataMap};
    use rust_decimal_macros::dec;

    fn environment() -> Environment {
        Environment::new(
            PersistenceFacade::new(),
            NotificationRouter::new(NotificationConfig::default(), Arc::new(LoggingTransport::new())),
            None,
            Utc::now() - chrono::Duration::days(7),
            None,
        )
    }

    fn metadata(symbol: &str) -> MarketMetadataMap {
        let mut m = MarketMetadataMap::new();
        m.insert(
            symbol.to_string(),
            MarketMetadata {
                symbol: symbol.to_string(),
                tick_size: dec!(0.01),
                step_size: dec!(0.0001),
                min_notional: dec!(10),
                base_currency: "BTC".into(),
                quote_currency: "USDT".into(),
            },
        );
        m
    }

    #[tokio::test]
    async fn single_session_happy_path() {
        let env = environment();
        let exchange = Arc::new(InMemoryExchangeAdapter::new("binance", "BNB"));
        exchange.set_markets(metadata("BTCUSDT"));
        env.add_exchange("bin", exchange.clone()).await.unwrap();

        env.subscribe_candles("bin", "BTCUSDT", "1m").await.unwrap();
        env.init(CancellationToken::new()).await.unwrap();
        env.connect(CancellationToken::new()).await.unwrap();

        let session = env.session("bin").await.unwrap();
        let stream = exchange.stream();

        let first = KLine {
            symbol: "BTCUSDT".into(),
            interval: Interval::new("1m"),
            open: dec!(100),
            high: dec!(110),
            low: dec!(100),
            close: dec!(110),
            open_time: Utc::now(),
            end_time: Utc::now(),
        };
        stream.emit_candle_closed(&first);
        assert_eq!(session.last_price("BTCUSDT"), Some(dec!(110)));
        assert_eq!(session.start_price("BTCUSDT"), Some(dec!(100)));

        let second = KLine {
            close: dec!(105),
            end_time: Utc::now() + chrono::Duration::seconds(1),
            ..first
        };
        stream.emit_candle_closed(&second);
        assert_eq!(session.last_price("BTCUSDT"), Some(dec!(105)));
        assert_eq!(session.start_price("BTCUSDT"), Some(dec!(100)), "start price unchanged");
    }

    #[tokio::test]
    async fn empty_markets_fails_init_with_metadata_empty() {
        let env = environment();
        let exchange = Arc::new(InMemoryExchangeAdapter::new("binance", "BNB"));
        env.add_exchange("bin", exchange).await.unwrap();

        let err = env.init(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::MetadataEmpty { .. }));
    }

    #[tokio::test]
    async fn duplicate_session_name_is_rejected() {
        let env = environment();
        let exchange_a = Arc::new(InMemoryExchangeAdapter::new("binance", "BNB"));
        let exchange_b = Arc::new(InMemoryExchangeAdapter::new("binance2", "BNB"));
        env.add_exchange("bin", exchange_a).await.unwrap();
        let err = env.add_exchange("bin", exchange_b).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::ConfigInvalid { .. }));
    }

    #[tokio::test]
    async fn balance_query_failure_is_venue_unavailable() {
        let env = environment();
        let exchange = Arc::new(InMemoryExchangeAdapter::new("binance", "BNB"));
        exchange.set_markets(metadata("BTCUSDT"));
        exchange.fail_query_account_balances();
        env.add_exchange("bin", exchange).await.unwrap();

        let err = env.init(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::VenueUnavailable { venue, .. } if venue == "binance"));
    }

    #[tokio::test]
    async fn historical_candle_query_failure_is_venue_unavailable() {
        let env = environment();
        let exchange = Arc::new(InMemoryExchangeAdapter::new("binance", "BNB"));
        exchange.set_markets(metadata("BTCUSDT"));
        exchange.fail_query_klines();
        env.add_exchange("bin", exchange).await.unwrap();
        env.subscribe_candles("bin", "BTCUSDT", "1m").await.unwrap();

        let err = env.init(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::VenueUnavailable { venue, .. } if venue == "binance"));
    }
}
