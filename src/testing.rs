//! In-memory fakes for every external collaborator (C11), always compiled
//! (not `#[cfg(test)]`-gated) so integration tests in `tests/` can use them
//! too — mirroring the teacher's `infrastructure::mock` and in-memory
//! repository modules.

use crate::error::Result;
use crate::ports::{ExchangeAdapter, KLineQuery, TradeStore};
use crate::session::stream::{
    BalanceHandler, BookSnapshotHandler, BookUpdateHandler, CandleHandler, LocalStream, OrderHandler, Stream,
    TradeHandler,
};
use crate::types::{BalanceMap, Interval, KLine, MarketMetadataMap, Subscription, Trade};
use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// Forwards every `Stream` method to a shared `LocalStream`, so tests can
/// keep a handle to the same stream a session holds (the session wraps
/// whatever `new_stream` returns in its own `Arc`, so the concrete type
/// would otherwise be unreachable once inside the session).
struct SharedLocalStream(Arc<LocalStream>);

#[async_trait]
impl Stream for SharedLocalStream {
    fn subscribe(&self, subscription: Subscription) {
        self.0.subscribe(subscription);
    }

    fn set_public_only(&self) {
        self.0.set_public_only();
    }

    fn on_balance_update(&self, handler: BalanceHandler) {
        self.0.on_balance_update(handler);
    }

    fn on_candle_closed(&self, handler: CandleHandler) {
        self.0.on_candle_closed(handler);
    }

    fn on_trade_update(&self, handler: TradeHandler) {
        self.0.on_trade_update(handler);
    }

    fn on_order_update(&self, handler: OrderHandler) {
        self.0.on_order_update(handler);
    }

    fn on_book_snapshot(&self, handler: BookSnapshotHandler) {
        self.0.on_book_snapshot(handler);
    }

    fn on_book_update(&self, handler: BookUpdateHandler) {
        self.0.on_book_update(handler);
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.0.subscriptions()
    }

    async fn connect(&self, cancel: CancellationToken) -> Result<()> {
        self.0.connect(cancel).await
    }
}

/// A fully scriptable `ExchangeAdapter`: tests populate its canned
/// responses before exercising a session or the orchestrator. Keeps a
/// handle to the `LocalStream` it hands out so tests can drive events
/// directly via `stream()`.
pub struct InMemoryExchangeAdapter {
    name: String,
    platform_fee_currency: String,
    markets: RwLock<MarketMetadataMap>,
    balances: RwLock<BalanceMap>,
    klines: RwLock<std::collections::HashMap<(String, String), Vec<KLine>>>,
    trades: RwLock<std::collections::HashMap<String, Vec<Trade>>>,
    stream: Arc<LocalStream>,
    fail_query_markets: RwLock<bool>,
    fail_query_account_balances: RwLock<bool>,
    fail_query_klines: RwLock<bool>,
    fail_query_trades_from: RwLock<bool>,
}

impl InMemoryExchangeAdapter {
    pub fn new(name: impl Into<String>, platform_fee_currency: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            stream: Arc::new(LocalStream::new(name.clone())),
            name,
            platform_fee_currency: platform_fee_currency.into(),
            markets: RwLock::new(MarketMetadataMap::new()),
            balances: RwLock::new(BalanceMap::new()),
            klines: RwLock::new(std::collections::HashMap::new()),
            trades: RwLock::new(std::collections::HashMap::new()),
            fail_query_markets: RwLock::new(false),
            fail_query_account_balances: RwLock::new(false),
            fail_query_klines: RwLock::new(false),
            fail_query_trades_from: RwLock::new(false),
        }
    }

    /// The same `LocalStream` a session built from this adapter uses —
    /// tests drive events by calling its `emit_*` methods.
    pub fn stream(&self) -> Arc<LocalStream> {
        self.stream.clone()
    }

    pub fn set_markets(&self, markets: MarketMetadataMap) {
        *self.markets.write().expect("fake lock poisoned") = markets;
    }

    pub fn set_balances(&self, balances: BalanceMap) {
        *self.balances.write().expect("fake lock poisoned") = balances;
    }

    pub fn push_klines(&self, symbol: &str, interval: &str, klines: Vec<KLine>) {
        self.klines
            .write()
            .expect("fake lock poisoned")
            .insert((symbol.to_string(), interval.to_string()), klines);
    }

    pub fn push_trades(&self, symbol: &str, trades: Vec<Trade>) {
        self.trades
            .write()
            .expect("fake lock poisoned")
            .insert(symbol.to_string(), trades);
    }

    /// Make the next (and every subsequent) `query_markets` call fail, to
    /// exercise the orchestrator's venue-error translation.
    pub fn fail_query_markets(&self) {
        *self.fail_query_markets.write().expect("fake lock poisoned") = true;
    }

    /// Make the next (and every subsequent) `query_account_balances` call
    /// fail, to exercise the orchestrator's venue-error translation.
    pub fn fail_query_account_balances(&self) {
        *self
            .fail_query_account_balances
            .write()
            .expect("fake lock poisoned") = true;
    }

    /// Make the next (and every subsequent) `query_klines` call fail, to
    /// exercise the historical-seeding venue-error translation.
    pub fn fail_query_klines(&self) {
        *self.fail_query_klines.write().expect("fake lock poisoned") = true;
    }

    /// Make the next (and every subsequent) `query_trades_from` call fail,
    /// to exercise the trade-sync venue-error translation.
    pub fn fail_query_trades_from(&self) {
        *self
            .fail_query_trades_from
            .write()
            .expect("fake lock poisoned") = true;
    }
}

#[async_trait]
impl ExchangeAdapter for InMemoryExchangeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform_fee_currency(&self) -> &str {
        &self.platform_fee_currency
    }

    async fn query_markets(&self) -> AnyResult<MarketMetadataMap> {
        if *self.fail_query_markets.read().expect("fake lock poisoned") {
            return Err(anyhow!("simulated query_markets failure"));
        }
        Ok(self.markets.read().expect("fake lock poisoned").clone())
    }

    async fn query_account_balances(&self) -> AnyResult<BalanceMap> {
        if *self
            .fail_query_account_balances
            .read()
            .expect("fake lock poisoned")
        {
            return Err(anyhow!("simulated query_account_balances failure"));
        }
        Ok(self.balances.read().expect("fake lock poisoned").clone())
    }

    async fn query_klines(
        &self,
        symbol: &str,
        interval: &Interval,
        query: KLineQuery,
    ) -> AnyResult<Vec<KLine>> {
        if *self.fail_query_klines.read().expect("fake lock poisoned") {
            return Err(anyhow!("simulated query_klines failure"));
        }
        let stored = self
            .klines
            .read()
            .expect("fake lock poisoned")
            .get(&(symbol.to_string(), interval.to_string()))
            .cloned()
            .unwrap_or_default();

        let mut filtered: Vec<KLine> = stored
            .into_iter()
            .filter(|k| query.start_time.is_none_or(|t| k.end_time >= t))
            .filter(|k| query.end_time.is_none_or(|t| k.end_time < t))
            .collect();

        if let Some(limit) = query.limit {
            filtered.truncate(limit);
        }
        Ok(filtered)
    }

    async fn query_trades_from(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        limit: usize,
    ) -> AnyResult<Vec<Trade>> {
        if *self
            .fail_query_trades_from
            .read()
            .expect("fake lock poisoned")
        {
            return Err(anyhow!("simulated query_trades_from failure"));
        }
        let mut trades: Vec<Trade> = self
            .trades
            .read()
            .expect("fake lock poisoned")
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.timestamp >= from)
            .collect();
        trades.sort_by_key(|t| t.id);
        trades.truncate(limit);
        Ok(trades)
    }

    fn new_stream(&self) -> Box<dyn Stream> {
        Box::new(SharedLocalStream(self.stream.clone()))
    }
}

/// A `TradeStore` deduplicating on `(venue, id)`, backed by an in-process
/// map — good enough to exercise the Trade Sync Service deterministically.
#[derive(Default)]
pub struct InMemoryTradeStore {
    trades: RwLock<std::collections::HashMap<(String, String), Vec<Trade>>>,
    fail_insert: RwLock<bool>,
    fail_query: RwLock<bool>,
    fail_last_trade_time: RwLock<bool>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next (and every subsequent) `insert` call fail, to exercise
    /// the trade-sync durable-write error translation.
    pub fn fail_insert(&self) {
        *self.fail_insert.write().expect("fake lock poisoned") = true;
    }

    /// Make the next (and every subsequent) `query`/
    /// `query_for_trading_fee_currency` call fail, to exercise the
    /// store-unavailable error translation.
    pub fn fail_query(&self) {
        *self.fail_query.write().expect("fake lock poisoned") = true;
    }

    /// Make the next (and every subsequent) `last_trade_time` call fail, to
    /// exercise the store-unavailable error translation in trade sync.
    pub fn fail_last_trade_time(&self) {
        *self.fail_last_trade_time.write().expect("fake lock poisoned") = true;
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn insert(&self, venue: &str, trade: &Trade) -> AnyResult<()> {
        if *self.fail_insert.read().expect("fake lock poisoned") {
            return Err(anyhow!("simulated insert failure"));
        }
        let mut trades = self.trades.write().expect("fake lock poisoned");
        let bucket = trades
            .entry((venue.to_string(), trade.symbol.clone()))
            .or_default();
        if !bucket.iter().any(|t| t.id == trade.id) {
            bucket.push(trade.clone());
        }
        Ok(())
    }

    async fn query(&self, venue: &str, symbol: &str) -> AnyResult<Vec<Trade>> {
        if *self.fail_query.read().expect("fake lock poisoned") {
            return Err(anyhow!("simulated query failure"));
        }
        Ok(self
            .trades
            .read()
            .expect("fake lock poisoned")
            .get(&(venue.to_string(), symbol.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn query_for_trading_fee_currency(
        &self,
        venue: &str,
        symbol: &str,
        _fee_currency: &str,
    ) -> AnyResult<Vec<Trade>> {
        self.query(venue, symbol).await
    }

    async fn last_trade_time(&self, venue: &str, symbol: &str) -> AnyResult<Option<DateTime<Utc>>> {
        if *self.fail_last_trade_time.read().expect("fake lock poisoned") {
            return Err(anyhow!("simulated last_trade_time failure"));
        }
        Ok(self
            .trades
            .read()
            .expect("fake lock poisoned")
            .get(&(venue.to_string(), symbol.to_string()))
            .and_then(|trades| trades.iter().map(|t| t.timestamp).max()))
    }
}
