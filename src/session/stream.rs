//! The per-session event fabric (§4.3). `Stream` is the seam venue
//! adapters implement; `LocalStream` is a transport-agnostic reference
//! implementation good enough for in-process fakes and for adapters that
//! already receive decoded events from elsewhere (e.g. a supervisor task
//! that owns the actual websocket).
//!
//! Handler invocation is always serialised per event kind, in registration
//! order, matching `infrastructure::event_bus::EventBus` in spirit: a
//! `Vec` of boxed listeners behind a lock, fanned out synchronously.

use crate::error::{EnvironmentError, Result};
use crate::types::{Balance, KLine, Subscription, Trade};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub symbol: String,
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub symbol: String,
    pub bids: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>,
    pub asks: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>,
}

#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub symbol: String,
    pub bids: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>,
    pub asks: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>,
}

pub type BalanceHandler = Box<dyn Fn(&str, &Balance) + Send + Sync>;
pub type CandleHandler = Box<dyn Fn(&KLine) + Send + Sync>;
pub type TradeHandler = Box<dyn Fn(&Trade) + Send + Sync>;
pub type OrderHandler = Box<dyn Fn(&OrderUpdate) + Send + Sync>;
pub type BookSnapshotHandler = Box<dyn Fn(&BookSnapshot) + Send + Sync>;
pub type BookUpdateHandler = Box<dyn Fn(&BookUpdate) + Send + Sync>;

/// Capability set for one session's event fabric. Implementors must
/// serialise handler invocation per event (no concurrent dispatch of the
/// same event) and invoke handlers for one kind in registration order.
#[async_trait]
pub trait Stream: Send + Sync {
    fn subscribe(&self, subscription: Subscription);

    /// Restrict to public channels; subsequent `connect` must not open
    /// account/trade streams.
    fn set_public_only(&self);

    fn on_balance_update(&self, handler: BalanceHandler);
    fn on_candle_closed(&self, handler: CandleHandler);
    fn on_trade_update(&self, handler: TradeHandler);
    fn on_order_update(&self, handler: OrderHandler);
    fn on_book_snapshot(&self, handler: BookSnapshotHandler);
    fn on_book_update(&self, handler: BookUpdateHandler);

    fn subscriptions(&self) -> Vec<Subscription>;

    async fn connect(&self, cancel: CancellationToken) -> Result<()>;
}

#[derive(Default)]
struct Handlers {
    balance: Vec<BalanceHandler>,
    candle: Vec<CandleHandler>,
    trade: Vec<TradeHandler>,
    order: Vec<OrderHandler>,
    book_snapshot: Vec<BookSnapshotHandler>,
    book_update: Vec<BookUpdateHandler>,
}

/// Transport-agnostic reference `Stream`. `connect` is a no-op beyond
/// marking the stream connected; callers (typically a test fake, or an
/// adapter-owned decode task) drive events by calling `emit_*` directly.
/// Real transports follow the same registration/dispatch shape but back
/// `connect` with an actual websocket loop.
pub struct LocalStream {
    venue: String,
    handlers: Mutex<Handlers>,
    subscriptions: Mutex<Vec<Subscription>>,
    public_only: Mutex<bool>,
    connected: Mutex<bool>,
}

impl LocalStream {
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            handlers: Mutex::new(Handlers::default()),
            subscriptions: Mutex::new(Vec::new()),
            public_only: Mutex::new(false),
            connected: Mutex::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock().expect("stream lock poisoned")
    }

    pub fn is_public_only(&self) -> bool {
        *self.public_only.lock().expect("stream lock poisoned")
    }

    pub fn emit_balance_update(&self, currency: &str, balance: &Balance) {
        let handlers = self.handlers.lock().expect("stream lock poisoned");
        for h in &handlers.balance {
            h(currency, balance);
        }
    }

    pub fn emit_candle_closed(&self, k: &KLine) {
        let handlers = self.handlers.lock().expect("stream lock poisoned");
        for h in &handlers.candle {
            h(k);
        }
    }

    pub fn emit_trade_update(&self, t: &Trade) {
        let handlers = self.handlers.lock().expect("stream lock poisoned");
        for h in &handlers.trade {
            h(t);
        }
    }

    pub fn emit_order_update(&self, o: &OrderUpdate) {
        let handlers = self.handlers.lock().expect("stream lock poisoned");
        for h in &handlers.order {
            h(o);
        }
    }
}

#[async_trait]
impl Stream for LocalStream {
    fn subscribe(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .expect("stream lock poisoned")
            .push(subscription);
    }

    fn set_public_only(&self) {
        *self.public_only.lock().expect("stream lock poisoned") = true;
    }

    fn on_balance_update(&self, handler: BalanceHandler) {
        self.handlers
            .lock()
            .expect("stream lock poisoned")
            .balance
            .push(handler);
    }

    fn on_candle_closed(&self, handler: CandleHandler) {
        self.handlers
            .lock()
            .expect("stream lock poisoned")
            .candle
            .push(handler);
    }

    fn on_trade_update(&self, handler: TradeHandler) {
        self.handlers
            .lock()
            .expect("stream lock poisoned")
            .trade
            .push(handler);
    }

    fn on_order_update(&self, handler: OrderHandler) {
        self.handlers
            .lock()
            .expect("stream lock poisoned")
            .order
            .push(handler);
    }

    fn on_book_snapshot(&self, handler: BookSnapshotHandler) {
        self.handlers
            .lock()
            .expect("stream lock poisoned")
            .book_snapshot
            .push(handler);
    }

    fn on_book_update(&self, handler: BookUpdateHandler) {
        self.handlers
            .lock()
            .expect("stream lock poisoned")
            .book_update
            .push(handler);
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().expect("stream lock poisoned").clone()
    }

    async fn connect(&self, cancel: CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }
        if self.subscriptions().is_empty() {
            warn!(venue = %self.venue, "connecting stream with no subscriptions");
        }
        *self.connected.lock().expect("stream lock poisoned") = true;
        Ok(())
    }
}

pub type SharedStream = Arc<dyn Stream>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[tokio::test]
    async fn connect_marks_stream_connected() {
        let stream = LocalStream::new("bin");
        stream.subscribe(Subscription::candle("BTCUSDT", "1m"));
        stream.connect(CancellationToken::new()).await.unwrap();
        assert!(stream.is_connected());
    }

    #[tokio::test]
    async fn connect_with_cancelled_token_fails() {
        let stream = LocalStream::new("bin");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = stream.connect(cancel).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::Cancelled));
    }

    #[test]
    fn candle_handlers_fire_in_registration_order() {
        let stream = LocalStream::new("bin");
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        stream.on_candle_closed(Box::new(move |_| o1.lock().unwrap().push(1)));
        let o2 = order.clone();
        stream.on_candle_closed(Box::new(move |_| o2.lock().unwrap().push(2)));

        let k = KLine {
            symbol: "BTCUSDT".into(),
            interval: Interval::new("1m"),
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            open_time: Utc::now(),
            end_time: Utc::now(),
        };
        stream.emit_candle_closed(&k);

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn handlers_see_every_emitted_event_exactly_once() {
        let stream = LocalStream::new("bin");
        let count = Arc::new(AtomicI32::new(0));
        let c = count.clone();
        stream.on_trade_update(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        let trade = Trade {
            id: 1,
            symbol: "BTCUSDT".into(),
            side: crate::types::Side::Buy,
            is_buyer: true,
            is_maker: false,
            price: dec!(100),
            volume: dec!(1),
            fee: dec!(0),
            fee_currency: "USDT".into(),
            timestamp: Utc::now(),
        };
        stream.emit_trade_update(&trade);
        stream.emit_trade_update(&trade);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
