//! Market Metadata Cache (C5): a persistence-backed cache of per-venue
//! symbol metadata, keyed by venue name.

use crate::error::{EnvironmentError, Result};
use crate::persistence::PersistenceFacade;
use crate::ports::ExchangeAdapter;
use crate::types::MarketMetadataMap;

pub struct MarketMetadataCache<'a> {
    persistence: &'a PersistenceFacade,
}

impl<'a> MarketMetadataCache<'a> {
    pub fn new(persistence: &'a PersistenceFacade) -> Self {
        Self { persistence }
    }

    fn cache_key(venue: &str) -> String {
        format!("{venue}-markets")
    }

    /// Return the metadata map for `exchange`, querying on a cache miss and
    /// populating the cache. An empty map is never cached and never
    /// accepted: the venue must be re-queried, and an empty result from the
    /// venue itself is *metadata-empty*.
    pub async fn load(&self, exchange: &dyn ExchangeAdapter) -> Result<MarketMetadataMap> {
        let key = Self::cache_key(exchange.name());

        if let Some(cached) = self
            .persistence
            .memory()
            .get(&key)
            .await
            .map_err(|e| EnvironmentError::CacheUnavailable {
                venue: exchange.name().to_string(),
                reason: e.to_string(),
            })?
        {
            let markets: MarketMetadataMap =
                serde_json::from_str(&cached).map_err(|e| EnvironmentError::CacheUnavailable {
                    venue: exchange.name().to_string(),
                    reason: format!("corrupt cached markets: {e}"),
                })?;
            if !markets.is_empty() {
                return Ok(markets);
            }
        }

        let markets = exchange
            .query_markets()
            .await
            .map_err(|e| EnvironmentError::VenueUnavailable {
                venue: exchange.name().to_string(),
                reason: e.to_string(),
            })?;

        if markets.is_empty() {
            return Err(EnvironmentError::MetadataEmpty {
                venue: exchange.name().to_string(),
            });
        }

        let serialized = serde_json::to_string(&markets).expect("market metadata map is always serializable");
        self.persistence
            .memory()
            .set(&key, &serialized)
            .await
            .map_err(|e| EnvironmentError::CacheUnavailable {
                venue: exchange.name().to_string(),
                reason: e.to_string(),
            })?;

        Ok(markets)
    }
}
