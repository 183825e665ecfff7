use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use shared::protocol::{API_PREFIX, AUTH_USERNAME};
use shared::types::{
    ConnectionStats, Enrichment, IdentityList, NatInfo, NodeRecord, Proposal, ServiceStartRequest,
};

use crate::error::{Error, Result};

/// Client for one node's management API. Stateless: constructed per request
/// from a node record and the shared connection pool; each call is a single
/// HTTP round trip.
pub struct NodeApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl NodeApi {
    pub fn new(client: Client, address: &str, port: u16, token: Option<String>) -> Self {
        Self {
            client,
            base_url: format!("http://{address}:{port}{API_PREFIX}"),
            token,
        }
    }

    pub fn from_record(client: Client, node: &NodeRecord) -> Self {
        Self::new(client, &node.address, node.port, node.token.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        capability: &'static str,
        req: RequestBuilder,
    ) -> Result<T> {
        let remote = |cause: reqwest::Error| Error::RemoteCallFailed {
            capability,
            cause: cause.to_string(),
        };
        let resp = req.send().await.map_err(remote)?;
        let resp = resp.error_for_status().map_err(remote)?;
        resp.json().await.map_err(remote)
    }

    /// Exchange the fixed username and the given password for a bearer
    /// token. On success the client keeps the token for subsequent calls.
    pub async fn authenticate(&mut self, password: &str) -> Result<String> {
        let auth_err = |cause: String| Error::AuthenticationFailed(cause);
        let body = serde_json::json!({
            "username": AUTH_USERNAME,
            "password": password,
        });
        let resp = self
            .client
            .post(format!("{}/auth/authenticate", self.base_url))
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| auth_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| auth_err(e.to_string()))?;

        let body: Value = resp.json().await.map_err(|e| auth_err(e.to_string()))?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| auth_err("no token in response".to_string()))?
            .to_string();
        self.token = Some(token.clone());
        Ok(token)
    }

    pub async fn health_check(&self) -> Result<Value> {
        self.call("get health check", self.get("/healthcheck")).await
    }

    pub async fn session_stats(&self) -> Result<Value> {
        self.call("get session stats", self.get("/sessions/stats-aggregated"))
            .await
    }

    pub async fn session_stats_daily(&self) -> Result<Value> {
        self.call("get daily session stats", self.get("/sessions/stats-daily"))
            .await
    }

    pub async fn sessions(&self, query: &[(&str, &str)]) -> Result<Value> {
        self.call("get sessions", self.get("/sessions").query(query))
            .await
    }

    /// Optional probe: absence or failure reads as `None`.
    pub async fn session_by_id(&self, session_id: &str) -> Option<Value> {
        match self
            .call("session by id", self.get(&format!("/sessions/{session_id}")))
            .await
        {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!("session {session_id} unavailable: {e}");
                None
            }
        }
    }

    pub async fn identity_list(&self) -> Result<IdentityList> {
        self.call("get identities", self.get("/identities")).await
    }

    pub async fn service_list(&self) -> Result<Value> {
        self.call("get services", self.get("/services")).await
    }

    pub async fn start_service(&self, request: &ServiceStartRequest) -> Result<Value> {
        self.call(
            "start service",
            self.request(Method::POST, "/services").json(request),
        )
        .await
    }

    pub async fn stop_service(&self, service_id: &str) -> Result<()> {
        let remote = |cause: reqwest::Error| Error::RemoteCallFailed {
            capability: "stop service",
            cause: cause.to_string(),
        };
        self.request(Method::DELETE, &format!("/services/{service_id}"))
            .send()
            .await
            .map_err(remote)?
            .error_for_status()
            .map_err(remote)?;
        Ok(())
    }

    /// Never fails: an unreachable statistics endpoint reads as all zeros
    /// so callers are not blocked on it.
    pub async fn connection_statistics(&self) -> ConnectionStats {
        match self
            .call("connection statistics", self.get("/connection/statistics"))
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                tracing::debug!("connection statistics unavailable: {e}");
                ConnectionStats::default()
            }
        }
    }

    /// Optional probe: absence or failure reads as `None`.
    pub async fn monitoring_status(&self) -> Option<Value> {
        match self
            .call("monitoring status", self.get("/node/monitoring-status"))
            .await
        {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::debug!("monitoring status unavailable: {e}");
                None
            }
        }
    }

    pub async fn proposals(&self) -> Result<Vec<Proposal>> {
        self.call("get proposals", self.get("/proposals")).await
    }

    /// NAT detection with a fixed fallback order: the dedicated /nat/type
    /// endpoint first, the proposals listing second, a placeholder last.
    /// The order reflects the relative reliability of the two endpoints.
    pub async fn nat_status(&self) -> Enrichment<NatInfo> {
        let probe_err = match self.call::<NatProbe>("get nat type", self.get("/nat/type")).await {
            Ok(probe) => match probe.into_nat_info() {
                Some(info) => return Enrichment::Fresh(info),
                None => None,
            },
            Err(e) => Some(e),
        };

        let proposals_err = match self.proposals().await {
            Ok(proposals) => match nat_from_proposals(&proposals) {
                Some(info) => return Enrichment::Fresh(info),
                None => None,
            },
            Err(e) => Some(e),
        };

        let cause = [probe_err, proposals_err]
            .into_iter()
            .flatten()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        let cause = if cause.is_empty() {
            "no NAT information reported".to_string()
        } else {
            cause
        };
        Enrichment::degraded(
            NatInfo {
                nat_type: "unknown".to_string(),
                status: "unavailable".to_string(),
            },
            cause,
        )
    }
}

/// Loosely-typed body of the /nat/type endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct NatProbe {
    #[serde(rename = "type")]
    pub nat_type: Option<String>,
    pub status: Option<String>,
}

impl NatProbe {
    /// A probe only counts when it names a type; a missing status then
    /// defaults to "finished".
    pub fn into_nat_info(self) -> Option<NatInfo> {
        let nat_type = self.nat_type?;
        Some(NatInfo {
            nat_type,
            status: self.status.unwrap_or_else(|| "finished".to_string()),
        })
    }
}

/// Second-tier NAT source: `nat_compatibility` of the first proposal.
pub fn nat_from_proposals(proposals: &[Proposal]) -> Option<NatInfo> {
    let nat_type = proposals.first()?.nat_compatibility.clone()?;
    Some(NatInfo {
        nat_type,
        status: "finished".to_string(),
    })
}
