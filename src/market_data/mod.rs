//! Market Data Store (C1): a per-symbol container of recent candles,
//! indexed by interval, fanning out to bound indicators.

pub mod indicators;

use crate::session::stream::Stream;
use crate::types::{Interval, KLine};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

/// Minimum candles retained per interval — the floor the standard
/// indicator set needs to warm up.
pub const DEFAULT_RETENTION: usize = 1000;

type UpdateHandler = Box<dyn Fn(&KLine) + Send + Sync>;

pub struct MarketDataStore {
    symbol: String,
    retention: usize,
    candles: RwLock<HashMap<Interval, VecDeque<KLine>>>,
    subscribers: RwLock<Vec<UpdateHandler>>,
}

impl MarketDataStore {
    pub fn new(symbol: impl Into<String>) -> Arc<Self> {
        Self::with_retention(symbol, DEFAULT_RETENTION)
    }

    pub fn with_retention(symbol: impl Into<String>, retention: usize) -> Arc<Self> {
        Arc::new(Self {
            symbol: symbol.into(),
            retention,
            candles: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Append a candle, notify subscribers, then trim to the retention
    /// bound. Candles for intervals other than `k.interval` are untouched.
    pub fn add_kline(&self, k: KLine) {
        {
            let mut candles = self.candles.write().expect("store lock poisoned");
            let bucket = candles.entry(k.interval.clone()).or_default();
            bucket.push_back(k.clone());
            while bucket.len() > self.retention {
                bucket.pop_front();
            }
        }
        let subscribers = self.subscribers.read().expect("store lock poisoned");
        for handler in subscribers.iter() {
            handler(&k);
        }
    }

    /// Register an indicator (or any other) callback invoked on every
    /// `add_kline`, after retention trimming has already run for this
    /// candle (trimming never drops the just-added candle).
    pub fn subscribe(&self, handler: UpdateHandler) {
        self.subscribers
            .write()
            .expect("store lock poisoned")
            .push(handler);
    }

    /// Subscribe to the stream's candle-closed event, filtering to this
    /// store's symbol. No-op for candles belonging to other symbols.
    pub fn bind_stream(self: &Arc<Self>, stream: &dyn Stream) {
        let store = Arc::clone(self);
        let symbol = self.symbol.clone();
        stream.on_candle_closed(Box::new(move |k: &KLine| {
            if k.symbol == symbol {
                store.add_kline(k.clone());
            }
        }));
    }

    pub fn candles(&self, interval: &Interval) -> Vec<KLine> {
        self.candles
            .read()
            .expect("store lock poisoned")
            .get(interval)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last(&self, interval: &Interval) -> Option<KLine> {
        self.candles
            .read()
            .expect("store lock poisoned")
            .get(interval)
            .and_then(|d| d.back())
            .cloned()
    }

    /// The most recently closed candle across all intervals, compared by
    /// `end_time` — used to seed `last_prices` during history replay.
    pub fn latest_across_intervals(&self) -> Option<KLine> {
        self.candles
            .read()
            .expect("store lock poisoned")
            .values()
            .filter_map(|d| d.back())
            .max_by_key(|k| k.end_time)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::stream::LocalStream;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn kline(symbol: &str, interval: &str, end_time_offset_secs: i64, close: rust_decimal::Decimal) -> KLine {
        let now = Utc::now();
        KLine {
            symbol: symbol.to_string(),
            interval: Interval::new(interval),
            open: close,
            high: close,
            low: close,
            close,
            open_time: now,
            end_time: now + Duration::seconds(end_time_offset_secs),
        }
    }

    #[test]
    fn add_kline_trims_to_retention_bound() {
        let store = MarketDataStore::with_retention("BTCUSDT", 3);
        for i in 0..5 {
            store.add_kline(kline("BTCUSDT", "1m", i, dec!(1)));
        }
        assert_eq!(store.candles(&Interval::new("1m")).len(), 3);
    }

    #[test]
    fn subscribers_see_non_decreasing_end_times() {
        let store = MarketDataStore::new("BTCUSDT");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        store.subscribe(Box::new(move |k: &KLine| {
            seen_clone.lock().unwrap().push(k.end_time);
        }));

        for i in [0, 1, 2, 3] {
            store.add_kline(kline("BTCUSDT", "1m", i, dec!(1)));
        }

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn bind_stream_filters_by_symbol() {
        let store = MarketDataStore::new("BTCUSDT");
        let stream = LocalStream::new("bin");
        store.bind_stream(&stream);

        stream.emit_candle_closed(&kline("BTCUSDT", "1m", 0, dec!(100)));
        stream.emit_candle_closed(&kline("ETHUSDT", "1m", 1, dec!(50)));

        assert_eq!(store.candles(&Interval::new("1m")).len(), 1);
    }

    #[test]
    fn latest_across_intervals_picks_max_end_time() {
        let store = MarketDataStore::new("BTCUSDT");
        store.add_kline(kline("BTCUSDT", "1m", 10, dec!(100)));
        store.add_kline(kline("BTCUSDT", "5m", 20, dec!(200)));
        store.add_kline(kline("BTCUSDT", "1m", 5, dec!(300)));

        let latest = store.latest_across_intervals().unwrap();
        assert_eq!(latest.close, dec!(200));
    }
}
