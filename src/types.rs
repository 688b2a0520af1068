//! Core data model: trades, candles, balances, market metadata and
//! subscriptions. These types are intentionally thin — behaviour lives in
//! the components that own collections of them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// A single executed fill reported by a venue. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub is_buyer: bool,
    pub is_maker: bool,
    pub price: Decimal,
    pub volume: Decimal,
    pub fee: Decimal,
    pub fee_currency: String,
    pub timestamp: DateTime<Utc>,
}

/// The candle interval, e.g. "1m", "5m", "1h". Kept as a newtype string
/// rather than an enum so adapters can pass through venue-native spellings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval(pub String);

impl Interval {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Interval {
    fn from(s: &str) -> Self {
        Interval::new(s)
    }
}

impl Interval {
    /// Parse a Binance-style interval string ("1m", "5m", "1h", "1d") into
    /// its duration. Returns `None` for an interval this crate doesn't
    /// recognise rather than failing — unrecognised intervals are skipped
    /// during historical seeding, not fatal.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let s = self.0.as_str();
        let split_at = s.find(|c: char| !c.is_ascii_digit())?;
        let (amount, unit) = s.split_at(split_at);
        let amount: i64 = amount.parse().ok()?;
        match unit {
            "s" => Some(chrono::Duration::seconds(amount)),
            "m" => Some(chrono::Duration::minutes(amount)),
            "h" => Some(chrono::Duration::hours(amount)),
            "d" => Some(chrono::Duration::days(amount)),
            _ => None,
        }
    }
}

/// An OHLC bar for a symbol over an interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KLine {
    pub symbol: String,
    pub interval: Interval,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub open_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl KLine {
    /// A candle is closed once its end time has passed `now`.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }
}

/// Per-currency available/locked amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub available: Decimal,
    pub locked: Decimal,
}

pub type BalanceMap = HashMap<String, Balance>;

/// Immutable per-venue symbol metadata snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMetadata {
    pub symbol: String,
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_notional: Decimal,
    pub base_currency: String,
    pub quote_currency: String,
}

pub type MarketMetadataMap = HashMap<String, MarketMetadata>;

/// A venue stream topic, distinct from a notification channel of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamChannel {
    Candle,
    Book,
    Trade,
}

/// Options accompanying a subscription. Only the candle channel uses `interval`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOptions {
    pub interval: Option<Interval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub channel: StreamChannel,
    pub symbol: String,
    pub options: SubscriptionOptions,
}

impl Subscription {
    pub fn candle(symbol: impl Into<String>, interval: impl Into<Interval>) -> Self {
        Self {
            channel: StreamChannel::Candle,
            symbol: symbol.into(),
            options: SubscriptionOptions {
                interval: Some(interval.into()),
            },
        }
    }

    pub fn trade(symbol: impl Into<String>) -> Self {
        Self {
            channel: StreamChannel::Trade,
            symbol: symbol.into(),
            options: SubscriptionOptions::default(),
        }
    }

    pub fn book(symbol: impl Into<String>) -> Self {
        Self {
            channel: StreamChannel::Book,
            symbol: symbol.into(),
            options: SubscriptionOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn kline_is_closed_iff_end_time_passed() {
        let now = Utc::now();
        let k = KLine {
            symbol: "BTCUSDT".into(),
            interval: Interval::new("1m"),
            open: Decimal::ONE,
            high: Decimal::ONE,
            low: Decimal::ONE,
            close: Decimal::ONE,
            open_time: now - Duration::minutes(1),
            end_time: now - Duration::seconds(1),
        };
        assert!(k.is_closed(now));

        let forming = KLine {
            end_time: now + Duration::seconds(1),
            ..k
        };
        assert!(!forming.is_closed(now));
    }

    #[test]
    fn subscription_candle_carries_interval() {
        let sub = Subscription::candle("BTCUSDT", "1m");
        assert_eq!(sub.channel, StreamChannel::Candle);
        assert_eq!(sub.options.interval, Some(Interval::new("1m")));
    }

    #[test]
    fn interval_duration_parses_recognised_suffixes() {
        assert_eq!(Interval::new("5m").duration(), Some(Duration::minutes(5)));
        assert_eq!(Interval::new("1h").duration(), Some(Duration::hours(1)));
        assert_eq!(Interval::new("1d").duration(), Some(Duration::days(1)));
        assert_eq!(Interval::new("bogus").duration(), None);
    }
}
