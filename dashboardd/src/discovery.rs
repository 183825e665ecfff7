use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use shared::types::Enrichment;

/// Quality and location metadata for a provider, as reported by the public
/// discovery service. Both fields stay absent when the lookup yields nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderMetrics {
    pub quality: Option<Value>,
    pub location: Option<Value>,
}

/// Best-effort client for the public discovery service. Lookups carry an
/// explicit timeout and degrade to absent metrics on any failure; they never
/// fail the request that triggered them.
pub struct DiscoveryClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DiscoveryClient {
    pub fn new(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }

    pub async fn provider_metrics(&self, provider_id: &str) -> Enrichment<ProviderMetrics> {
        match self.fetch(provider_id).await {
            Ok(metrics) => Enrichment::Fresh(metrics),
            Err(cause) => Enrichment::degraded(ProviderMetrics::default(), cause),
        }
    }

    async fn fetch(&self, provider_id: &str) -> Result<ProviderMetrics, String> {
        let url = format!("{}/proposals", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("access_policy", "all"), ("provider_id", provider_id)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        let proposals: Vec<Value> = resp.json().await.map_err(|e| e.to_string())?;
        // An empty listing is a valid answer, not a failure.
        let Some(first) = proposals.into_iter().next() else {
            return Ok(ProviderMetrics::default());
        };
        Ok(ProviderMetrics {
            quality: first.get("quality").cloned(),
            location: first.get("location").cloned(),
        })
    }
}
