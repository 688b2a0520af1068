//! Standard Indicator Set (C2): the per-symbol bundle of indicators bound
//! to a `MarketDataStore`. Indicator math itself is external — this is a
//! thin incremental wrapper around the `ta` crate, the same crate and
//! calling convention the teacher already uses in its feature-engineering
//! services (`.next(price)` on a `&mut` indicator, one call per close).

use super::MarketDataStore;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::{Arc, Mutex, RwLock};
use ta::Next;
use ta::indicators::{AverageTrueRange, ExponentialMovingAverage, SimpleMovingAverage};

#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorValues {
    pub fast_sma: Option<Decimal>,
    pub slow_sma: Option<Decimal>,
    pub ema: Option<Decimal>,
    pub atr: Option<Decimal>,
}

struct Indicators {
    fast_sma: SimpleMovingAverage,
    slow_sma: SimpleMovingAverage,
    ema: ExponentialMovingAverage,
    atr: AverageTrueRange,
}

/// Holds the standard indicators for one symbol. Constructed with a
/// `MarketDataStore`; each indicator updates incrementally as candles
/// arrive. The current value is always a pure function of the candles the
/// store has delivered up to now.
pub struct StandardIndicatorSet {
    indicators: Mutex<Indicators>,
    current: RwLock<IndicatorValues>,
}

impl StandardIndicatorSet {
    pub const DEFAULT_FAST_PERIOD: usize = 20;
    pub const DEFAULT_SLOW_PERIOD: usize = 50;
    pub const DEFAULT_EMA_PERIOD: usize = 20;
    pub const DEFAULT_ATR_PERIOD: usize = 14;

    /// Build the standard set and bind it to `store`'s update event.
    pub fn attach(store: &Arc<MarketDataStore>) -> Arc<Self> {
        Self::attach_with_periods(
            store,
            Self::DEFAULT_FAST_PERIOD,
            Self::DEFAULT_SLOW_PERIOD,
            Self::DEFAULT_EMA_PERIOD,
            Self::DEFAULT_ATR_PERIOD,
        )
    }

    pub fn attach_with_periods(
        store: &Arc<MarketDataStore>,
        fast_period: usize,
        slow_period: usize,
        ema_period: usize,
        atr_period: usize,
    ) -> Arc<Self> {
        let set = Arc::new(Self {
            indicators: Mutex::new(Indicators {
                fast_sma: SimpleMovingAverage::new(fast_period).expect("valid sma period"),
                slow_sma: SimpleMovingAverage::new(slow_period).expect("valid sma period"),
                ema: ExponentialMovingAverage::new(ema_period).expect("valid ema period"),
                atr: AverageTrueRange::new(atr_period).expect("valid atr period"),
            }),
            current: RwLock::new(IndicatorValues::default()),
        });

        let set_clone = Arc::clone(&set);
        store.subscribe(Box::new(move |k| {
            set_clone.on_kline(k.close);
        }));

        set
    }

    fn on_kline(&self, close: Decimal) {
        let price = close.to_string().parse::<f64>().unwrap_or(0.0);
        let mut indicators = self.indicators.lock().expect("indicator lock poisoned");
        let fast_sma = indicators.fast_sma.next(price);
        let slow_sma = indicators.slow_sma.next(price);
        let ema = indicators.ema.next(price);
        let atr = indicators.atr.next(price);
        drop(indicators);

        *self.current.write().expect("indicator lock poisoned") = IndicatorValues {
            fast_sma: Decimal::from_f64(fast_sma),
            slow_sma: Decimal::from_f64(slow_sma),
            ema: Decimal::from_f64(ema),
            atr: Decimal::from_f64(atr),
        };
    }

    pub fn values(&self) -> IndicatorValues {
        *self.current.read().expect("indicator lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interval, KLine};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn kline(close: Decimal) -> KLine {
        KLine {
            symbol: "BTCUSDT".into(),
            interval: Interval::new("1m"),
            open: close,
            high: close,
            low: close,
            close,
            open_time: Utc::now(),
            end_time: Utc::now(),
        }
    }

    #[test]
    fn indicator_value_is_a_function_of_delivered_candles() {
        let store = MarketDataStore::new("BTCUSDT");
        let indicators = StandardIndicatorSet::attach_with_periods(&store, 2, 3, 2, 2);

        store.add_kline(kline(dec!(10)));
        store.add_kline(kline(dec!(20)));

        let values = indicators.values();
        assert!(values.fast_sma.is_some());
        assert_eq!(values.fast_sma.unwrap(), dec!(15));
    }

    #[test]
    fn untouched_indicator_set_reports_none() {
        let store = MarketDataStore::new("BTCUSDT");
        let indicators = StandardIndicatorSet::attach(&store);
        let values = indicators.values();
        assert!(values.fast_sma.is_none());
    }
}
