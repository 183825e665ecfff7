use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A registered node endpoint.
/// This is the canonical data model used by the store, the gateway, and the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    /// Unique id, allocated as the lowest positive integer not in use.
    /// Ids are reused after deletion; callers must not assume monotonicity.
    pub id: u32,

    /// Operator-chosen name, unique across the store
    pub name: String,

    /// Host or IP of the node's management API
    pub address: String,

    /// Management API port
    pub port: u16,

    /// Bearer token obtained from the node's auth endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// One identity reported by a node. Only `id` is interpreted; everything
/// else round-trips untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityList {
    #[serde(default)]
    pub identities: Vec<Identity>,
}

impl IdentityList {
    /// The provider id used for discovery lookups and service starts.
    pub fn first_id(&self) -> Option<&str> {
        self.identities.first().map(|i| i.id.as_str())
    }
}

/// A service proposal published by a node. Only `nat_compatibility` is
/// interpreted, as the NAT fallback source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default)]
    pub nat_compatibility: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalized NAT detection result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NatInfo {
    #[serde(rename = "type")]
    pub nat_type: String,
    pub status: String,
}

/// Connection statistics as reported by a node. `Default` is the zeroed
/// placeholder returned when the endpoint is unreachable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub duration: u64,
    pub tokens_spent: u64,
}

/// The single wire shape accepted by a node's service-start endpoint.
/// Both controller entry points normalize their payloads into this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceStartRequest {
    pub provider_id: String,
    #[serde(rename = "type")]
    pub service_type: String,
}

/// The fixed field set extracted from a market-data quote response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
    pub percent_change_30d: f64,
    pub volume_24h: f64,
    pub volume_change_24h: f64,
    pub market_cap: f64,
    pub fully_diluted_market_cap: f64,
    pub max_supply: Option<f64>,
    pub circulating_supply: f64,
    pub total_supply: f64,
    pub last_updated: String,
}

/// Outcome of an enrichment call. Enrichment paths never fail the overall
/// request; a failure degrades to a placeholder value with the cause kept
/// alongside it instead of being swallowed.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment<T> {
    Fresh(T),
    Degraded { value: T, cause: String },
}

impl<T> Enrichment<T> {
    pub fn degraded(value: T, cause: impl Into<String>) -> Self {
        Self::Degraded { value, cause: cause.into() }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Fresh(value) => value,
            Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Fresh(value) => value,
            Self::Degraded { value, .. } => value,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Fresh(_) => None,
            Self::Degraded { cause, .. } => Some(cause),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}
