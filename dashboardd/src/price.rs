use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;

use shared::protocol::TOKEN_SLUG;
use shared::types::PriceQuote;

use crate::error::{Error, Result};

/// Source of "now", so tests can substitute a deterministic clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Slot {
    payload: PriceQuote,
    fetched_at: DateTime<Utc>,
}

/// Single-slot, time-boxed cache in front of the market-data API. The slot
/// is shared by every caller; the api_key is not part of the key. Entries
/// expire purely by age, never by explicit eviction.
pub struct PriceCache {
    ttl: Duration,
    clock: Box<dyn Clock>,
    slot: Mutex<Option<Slot>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }

    pub fn with_clock(ttl: Duration, clock: impl Clock + 'static) -> Self {
        Self {
            ttl,
            clock: Box::new(clock),
            slot: Mutex::new(None),
        }
    }

    /// The cached payload, returned unconditionally while younger than the
    /// ttl. An entry aged exactly ttl counts as expired.
    pub fn fresh(&self) -> Option<PriceQuote> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().and_then(|s| {
            let age = (self.clock.now() - s.fetched_at).to_std().ok()?;
            (age < self.ttl).then(|| s.payload.clone())
        })
    }

    pub fn store(&self, payload: PriceQuote) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Slot {
            payload,
            fetched_at: self.clock.now(),
        });
    }
}

/// Market-data API client. The API key is supplied by the caller on every
/// request; nothing about it is retained.
pub struct MarketClient {
    client: Client,
    base_url: String,
}

impl MarketClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn latest_quote(&self, api_key: &str) -> Result<PriceQuote> {
        let url = format!(
            "{}/v2/cryptocurrency/quotes/latest?slug={TOKEN_SLUG}",
            self.base_url
        );
        let resp = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Upstream {
                status: 502,
                body: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json().await.map_err(|e| Error::Upstream {
            status: 502,
            body: e.to_string(),
        })?;
        let coin = body
            .get("data")
            .and_then(Value::as_object)
            .and_then(|data| data.values().next())
            .ok_or(Error::MissingData)?;
        extract_quote(coin).ok_or(Error::MissingData)
    }
}

/// Pull the fixed field set out of one quote entry.
fn extract_quote(coin: &Value) -> Option<PriceQuote> {
    let usd = coin.pointer("/quote/USD")?;
    let field = |v: &Value, key: &str| v.get(key).and_then(Value::as_f64);
    Some(PriceQuote {
        name: coin.get("name")?.as_str()?.to_string(),
        symbol: coin.get("symbol")?.as_str()?.to_string(),
        price: field(usd, "price")?,
        percent_change_1h: field(usd, "percent_change_1h")?,
        percent_change_24h: field(usd, "percent_change_24h")?,
        percent_change_7d: field(usd, "percent_change_7d")?,
        percent_change_30d: field(usd, "percent_change_30d")?,
        volume_24h: field(usd, "volume_24h")?,
        volume_change_24h: field(usd, "volume_change_24h")?,
        market_cap: field(usd, "market_cap")?,
        fully_diluted_market_cap: field(usd, "fully_diluted_market_cap")?,
        max_supply: field(coin, "max_supply"),
        circulating_supply: field(coin, "circulating_supply")?,
        total_supply: field(coin, "total_supply")?,
        last_updated: usd.get("last_updated")?.as_str()?.to_string(),
    })
}
