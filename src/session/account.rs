//! Per-session account state: the current balance map, updated only by
//! stream balance events (and seeded once from a REST snapshot at Init).

use crate::types::{Balance, BalanceMap};
use std::sync::RwLock;

#[derive(Default)]
pub struct Account {
    balances: RwLock<BalanceMap>,
}

impl Account {
    pub fn new() -> Self {
        Self {
            balances: RwLock::new(BalanceMap::new()),
        }
    }

    /// Replace the whole balance map, used once at Init with the REST
    /// snapshot before any stream events have been observed.
    pub fn seed(&self, balances: BalanceMap) {
        *self.balances.write().expect("account lock poisoned") = balances;
    }

    /// Apply a single-currency balance update, as delivered by the stream.
    pub fn apply_update(&self, currency: &str, balance: Balance) {
        self.balances
            .write()
            .expect("account lock poisoned")
            .insert(currency.to_string(), balance);
    }

    pub fn balance(&self, currency: &str) -> Option<Balance> {
        self.balances
            .read()
            .expect("account lock poisoned")
            .get(currency)
            .copied()
    }

    pub fn balances(&self) -> BalanceMap {
        self.balances.read().expect("account lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn seed_replaces_the_whole_map() {
        let account = Account::new();
        account.apply_update(
            "BTC",
            Balance {
                available: dec!(1),
                locked: dec!(0),
            },
        );

        let mut snapshot = BalanceMap::new();
        snapshot.insert(
            "USDT".to_string(),
            Balance {
                available: dec!(1000),
                locked: dec!(0),
            },
        );
        account.seed(snapshot);

        assert!(account.balance("BTC").is_none());
        assert_eq!(account.balance("USDT").unwrap().available, dec!(1000));
    }

    #[test]
    fn apply_update_overwrites_single_currency() {
        let account = Account::new();
        account.apply_update(
            "BTC",
            Balance {
                available: dec!(1),
                locked: dec!(0),
            },
        );
        account.apply_update(
            "BTC",
            Balance {
                available: dec!(2),
                locked: dec!(0.5),
            },
        );
        let b = account.balance("BTC").unwrap();
        assert_eq!(b.available, dec!(2));
        assert_eq!(b.locked, dec!(0.5));
    }
}
