//! Exchange Session (C3): one venue's stream, account, per-symbol derived
//! state, and subscription list. The Environment wires handlers onto
//! `session.stream` during `Init`; after `Connect`, per-symbol maps are
//! mutated only from stream dispatch.

pub mod account;
pub mod stream;

use crate::market_data::MarketDataStore;
use crate::market_data::indicators::StandardIndicatorSet;
use crate::ports::ExchangeAdapter;
use crate::types::{MarketMetadataMap, Subscription, Trade};
use account::Account;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use stream::SharedStream;

/// One venue: adapter, stream, account, and all per-symbol derived state.
/// Identified by its session name (not its venue name) within an
/// `Environment` — two sessions may point at the same venue under
/// different names (e.g. spot vs. margin).
pub struct ExchangeSession {
    pub name: String,
    pub exchange: Arc<dyn ExchangeAdapter>,
    pub stream: SharedStream,
    pub account: Account,

    markets: RwLock<MarketMetadataMap>,
    loaded_symbols: RwLock<HashSet<String>>,
    subscriptions: RwLock<Vec<Subscription>>,
    trades: RwLock<HashMap<String, Vec<Trade>>>,
    market_data_stores: RwLock<HashMap<String, Arc<MarketDataStore>>>,
    standard_indicator_sets: RwLock<HashMap<String, Arc<StandardIndicatorSet>>>,
    last_prices: RwLock<HashMap<String, Decimal>>,
    start_prices: RwLock<HashMap<String, Decimal>>,
}

impl ExchangeSession {
    pub fn new(name: impl Into<String>, exchange: Arc<dyn ExchangeAdapter>) -> Self {
        let stream: SharedStream = Arc::from(exchange.new_stream());
        Self {
            name: name.into(),
            exchange,
            stream,
            account: Account::new(),
            markets: RwLock::new(MarketMetadataMap::new()),
            loaded_symbols: RwLock::new(HashSet::new()),
            subscriptions: RwLock::new(Vec::new()),
            trades: RwLock::new(HashMap::new()),
            market_data_stores: RwLock::new(HashMap::new()),
            standard_indicator_sets: RwLock::new(HashMap::new()),
            last_prices: RwLock::new(HashMap::new()),
            start_prices: RwLock::new(HashMap::new()),
        }
    }

    /// Declare a symbol the session must serve, independent of any
    /// subscription (e.g. a strategy that only polls, never subscribes).
    pub fn require_symbol(&self, symbol: impl Into<String>) {
        self.loaded_symbols
            .write()
            .expect("session lock poisoned")
            .insert(symbol.into());
    }

    /// Register subscription intent. Has no network effect until `Connect`
    /// forwards it to the stream. Also folds the symbol into
    /// `loaded_symbols`, since loaded symbols are the union of subscription
    /// and strategy symbols.
    pub fn add_subscription(&self, subscription: Subscription) {
        self.require_symbol(subscription.symbol.clone());
        self.subscriptions
            .write()
            .expect("session lock poisoned")
            .push(subscription);
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    pub fn loaded_symbols(&self) -> Vec<String> {
        self.loaded_symbols
            .read()
            .expect("session lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn set_markets(&self, markets: MarketMetadataMap) {
        *self.markets.write().expect("session lock poisoned") = markets;
    }

    pub fn markets(&self) -> MarketMetadataMap {
        self.markets.read().expect("session lock poisoned").clone()
    }

    pub fn set_market_data_store(&self, symbol: &str, store: Arc<MarketDataStore>) {
        self.market_data_stores
            .write()
            .expect("session lock poisoned")
            .insert(symbol.to_string(), store);
    }

    pub fn market_data_store(&self, symbol: &str) -> Option<Arc<MarketDataStore>> {
        self.market_data_stores
            .read()
            .expect("session lock poisoned")
            .get(symbol)
            .cloned()
    }

    pub fn set_indicator_set(&self, symbol: &str, set: Arc<StandardIndicatorSet>) {
        self.standard_indicator_sets
            .write()
            .expect("session lock poisoned")
            .insert(symbol.to_string(), set);
    }

    pub fn indicator_set(&self, symbol: &str) -> Option<Arc<StandardIndicatorSet>> {
        self.standard_indicator_sets
            .read()
            .expect("session lock poisoned")
            .get(symbol)
            .cloned()
    }

    pub fn seed_trades(&self, symbol: &str, trades: Vec<Trade>) {
        self.trades
            .write()
            .expect("session lock poisoned")
            .insert(symbol.to_string(), trades);
    }

    pub fn append_trade(&self, symbol: &str, trade: Trade) {
        self.trades
            .write()
            .expect("session lock poisoned")
            .entry(symbol.to_string())
            .or_default()
            .push(trade);
    }

    pub fn trades(&self, symbol: &str) -> Vec<Trade> {
        self.trades
            .read()
            .expect("session lock poisoned")
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.last_prices
            .read()
            .expect("session lock poisoned")
            .get(symbol)
            .copied()
    }

    /// Unconditionally overwrite; callers establish monotonicity by
    /// comparing candle `end_time` before calling this (invariant 3).
    pub fn set_last_price(&self, symbol: &str, price: Decimal) {
        self.last_prices
            .write()
            .expect("session lock poisoned")
            .insert(symbol.to_string(), price);
    }

    pub fn start_price(&self, symbol: &str) -> Option<Decimal> {
        self.start_prices
            .read()
            .expect("session lock poisoned")
            .get(symbol)
            .copied()
    }

    /// Set only if unset (invariant 4: start price is set at most once).
    pub fn set_start_price_if_unset(&self, symbol: &str, price: Decimal) {
        self.start_prices
            .write()
            .expect("session lock poisoned")
            .entry(symbol.to_string())
            .or_insert(price);
    }
}
