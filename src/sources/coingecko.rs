//! CoinGecko REST client for the configured instrument set.
//!
//! Failure semantics: `refresh` never throws out to callers. Rate limits
//! (HTTP 429), transport errors and bad payloads all leave the previous
//! cache contents in place; the caller's fixed polling interval is the
//! only backoff.

use crate::config::Config;
use crate::services::PriceCache;
use crate::types::Quote;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// One entry of the `simple/price` response.
#[derive(Debug, Deserialize)]
struct SimplePrice {
    eur: Option<f64>,
    eur_24h_change: Option<f64>,
}

/// CoinGecko quote source feeding the price cache.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    coins: Vec<String>,
    cache: Arc<PriceCache>,
}

impl CoinGeckoClient {
    /// Create a new client with a bounded request timeout.
    pub fn new(config: &Config, cache: Arc<PriceCache>) -> Self {
        let client = Client::builder()
            .user_agent("Magnate/0.1 (Tycoon Game Engine)")
            .timeout(Duration::from_secs(config.quote_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.quote_base_url.clone(),
            api_key: config.coingecko_api_key.clone(),
            coins: config.supported_coins.clone(),
            cache,
        }
    }

    /// Fetch current EUR prices with 24h change for the configured coins
    /// and swap them into the cache. On any failure the stale snapshot is
    /// served instead; the returned map is always usable.
    pub async fn refresh(&self) -> Arc<HashMap<String, Quote>> {
        let ids = self.coins.join(",");
        let mut url = format!(
            "{}/simple/price?ids={}&vs_currencies=eur&include_24hr_change=true",
            self.base_url, ids
        );
        if let Some(ref key) = self.api_key {
            url.push_str(&format!("&x_cg_pro_api_key={}", key));
        }

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Quote fetch failed: {}. Serving cached prices.", e);
                return self.cache.get_all();
            }
        };

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            // Rate limits are logged distinctly but do not change the
            // polling cadence.
            warn!("Quote source rate limited (429). Serving cached prices.");
            return self.cache.get_all();
        }

        if !response.status().is_success() {
            error!(
                "Quote source returned {}. Serving cached prices.",
                response.status()
            );
            return self.cache.get_all();
        }

        let payload: HashMap<String, SimplePrice> = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                error!("Quote payload parse failed: {}. Serving cached prices.", e);
                return self.cache.get_all();
            }
        };

        let mut quotes = HashMap::with_capacity(payload.len());
        for (coin_id, entry) in payload {
            let Some(price) = entry.eur else { continue };
            quotes.insert(
                coin_id,
                Quote::new(price, entry.eur_24h_change.unwrap_or(0.0)),
            );
        }

        if quotes.is_empty() {
            warn!("Quote source returned no usable prices. Serving cached prices.");
            return self.cache.get_all();
        }

        self.cache.replace_all(quotes);
        debug!("Market cache refreshed ({} instruments)", self.coins.len());
        self.cache.get_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_price_deserialization() {
        let json = r#"{"bitcoin":{"eur":62450.0,"eur_24h_change":1.2}}"#;
        let payload: HashMap<String, SimplePrice> = serde_json::from_str(json).unwrap();
        let btc = payload.get("bitcoin").unwrap();
        assert_eq!(btc.eur, Some(62450.0));
        assert_eq!(btc.eur_24h_change, Some(1.2));
    }

    #[test]
    fn test_simple_price_missing_fields() {
        let json = r#"{"bitcoin":{}}"#;
        let payload: HashMap<String, SimplePrice> = serde_json::from_str(json).unwrap();
        let btc = payload.get("bitcoin").unwrap();
        assert!(btc.eur.is_none());
        assert!(btc.eur_24h_change.is_none());
    }
}
