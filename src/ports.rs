//! External collaborator interfaces. The core only ever depends on these
//! traits; concrete venue adapters, trade stores, and notification
//! transports are injected by the caller and are out of scope for this
//! crate (see `testing` for in-memory fakes used by the test suite).
//!
//! Fallible methods return `anyhow::Result`, matching `PersistenceBackend`
//! (`persistence::mod`) and the teacher's own boundary traits
//! (`domain::ports::MarketDataService`/`ExecutionService`,
//! `domain::repositories::TradeRepository`/`PortfolioRepository`): an
//! out-of-scope collaborator has no business constructing
//! `EnvironmentError` variants, which are the orchestrator's own taxonomy.
//! The translation into a typed `EnvironmentError` happens only at the
//! orchestrator boundary (`environment.rs`, `trade_sync.rs`,
//! `market_metadata.rs`), preserving the original error's source chain
//! until it is logged.

use crate::notification::NotifiableEvent;
use crate::session::stream::Stream;
use crate::types::{BalanceMap, Interval, KLine, MarketMetadataMap, Trade};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Options for a historical candle query.
#[derive(Debug, Clone, Default)]
pub struct KLineQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Capability set a venue adapter must expose to the core. Adapters
/// themselves (websocket/REST clients for a specific exchange) are out of
/// scope; this is purely the seam the orchestrator calls through.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// The currency the venue denominates its own platform trading fees in,
    /// e.g. "BNB" for Binance. Used to pick the fee-currency trade query
    /// variant during trade sync.
    fn platform_fee_currency(&self) -> &str;

    async fn query_markets(&self) -> Result<MarketMetadataMap>;

    async fn query_account_balances(&self) -> Result<BalanceMap>;

    async fn query_klines(
        &self,
        symbol: &str,
        interval: &Interval,
        query: KLineQuery,
    ) -> Result<Vec<KLine>>;

    /// Page through trade history for `symbol` from `from` forward, in
    /// venue order, at most `limit` trades.
    async fn query_trades_from(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Trade>>;

    /// Construct a fresh, unconnected `Stream` for this venue.
    fn new_stream(&self) -> Box<dyn Stream>;
}

/// Durable trade history, keyed by `(venue, id)`. Out of scope to implement
/// for real; the core only calls through this trait.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn insert(&self, venue: &str, trade: &Trade) -> Result<()>;

    async fn query(&self, venue: &str, symbol: &str) -> Result<Vec<Trade>>;

    /// Specialised query used when `symbol` begins with the venue's platform
    /// fee currency (case-sensitive, see design notes). Exact fee-folding
    /// semantics are delegated to the store implementation.
    async fn query_for_trading_fee_currency(
        &self,
        venue: &str,
        symbol: &str,
        fee_currency: &str,
    ) -> Result<Vec<Trade>>;

    /// Last recorded trade timestamp for `(venue, symbol)`, if any, used by
    /// the trade sync service to pick a paging cursor.
    async fn last_trade_time(
        &self,
        venue: &str,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>>;
}

/// Notification transport: chat, log, or any other sink. Implementations
/// receive the resolved channel name, the rendered text, and the raw typed
/// event so richer transports can render structured payloads.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn notify(&self, channel: &str, text: &str, event: &NotifiableEvent);
}
