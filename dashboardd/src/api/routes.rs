use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use shared::protocol::DEFAULT_NODE_PORT;
use shared::types::{NodeRecord, ServiceStartRequest};

use crate::api::views;
use crate::discovery::{DiscoveryClient, ProviderMetrics};
use crate::error::{Error, Result};
use crate::gateway::NodeApi;
use crate::help::HelpCenter;
use crate::price::{MarketClient, PriceCache};
use crate::store::{NewNode, NodeStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NodeStore>,
    pub http: reqwest::Client,
    pub price_cache: Arc<PriceCache>,
    pub market: Arc<MarketClient>,
    pub discovery: Arc<DiscoveryClient>,
    pub help: Arc<HelpCenter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/add_node", get(add_node_page).post(add_node))
        .route("/remove_node/:id", post(remove_node))
        .route("/node/:id", get(node_details))
        .route("/node/:id/data", get(node_data))
        .route("/node/:id/connection_stats", get(connection_stats))
        .route("/node/:id/session_stats/:session_id", get(session_stats))
        .route("/node/:id/active_sessions", get(active_sessions))
        .route("/node/:id/services", get(list_services).post(create_service))
        .route("/node/:id/services/:service_id", delete(delete_service))
        .route("/node/:id/start_service", post(start_service))
        .route("/node/:id/stop_service", post(stop_service))
        .route("/node/:id/credentials", get(get_credentials).post(update_credentials))
        .route("/help", get(help_index))
        .route("/help/:id", get(help_topic))
        .route("/api/myst-price", get(myst_price))
        .with_state(state)
}

fn require_node(state: &AppState, id: u32) -> Result<NodeRecord> {
    state.store.get(id).ok_or(Error::NodeNotFound(id))
}

fn node_api(state: &AppState, node: &NodeRecord) -> NodeApi {
    NodeApi::from_record(state.http.clone(), node)
}

fn flash_redirect(to: &str, message: &str, category: &str) -> Redirect {
    Redirect::to(&format!(
        "{to}?flash={}&category={category}",
        urlencoding::encode(message)
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct FlashParams {
    pub flash: Option<String>,
    pub category: Option<String>,
}

// ---- pages ----

async fn index(State(state): State<AppState>, Query(params): Query<FlashParams>) -> Html<String> {
    let nodes = state.store.list();
    Html(views::index(&nodes, &params))
}

async fn add_node_page() -> Html<String> {
    Html(views::add_node())
}

#[derive(Debug, Deserialize)]
pub struct AddNodeForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub port: Option<String>,
    pub password: Option<String>,
}

async fn add_node(State(state): State<AppState>, Form(form): Form<AddNodeForm>) -> Redirect {
    if form.name.is_empty() || form.address.is_empty() {
        return flash_redirect("/", "Name and address are required fields", "danger");
    }

    // Reject duplicates before any remote call is made.
    if state.store.list().iter().any(|node| node.name == form.name) {
        let message = Error::DuplicateName(form.name).to_string();
        return flash_redirect("/", &message, "danger");
    }

    let port = form
        .port
        .as_deref()
        .filter(|port| !port.is_empty())
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_NODE_PORT);

    let mut api = NodeApi::new(state.http.clone(), &form.address, port, None);
    let token = match api.authenticate(form.password.as_deref().unwrap_or_default()).await {
        Ok(token) => token,
        Err(e) => {
            return flash_redirect("/", &format!("Error connecting to node: {e}"), "danger");
        }
    };

    match state.store.add(NewNode {
        name: form.name,
        address: form.address,
        port,
        token: Some(token),
    }) {
        Ok(record) => flash_redirect(
            "/",
            &format!("Node {} added successfully", record.name),
            "success",
        ),
        Err(e) => flash_redirect("/", &e.to_string(), "danger"),
    }
}

async fn remove_node(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    match state.store.remove(id) {
        Ok(Some(record)) => flash_redirect(
            "/",
            &format!("Node {} removed successfully", record.name),
            "success",
        )
        .into_response(),
        Ok(None) => Redirect::to("/").into_response(),
        Err(e) => flash_redirect("/", &e.to_string(), "danger").into_response(),
    }
}

async fn node_details(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
    match state.store.get(id) {
        Some(node) => Html(views::node_details(&node)).into_response(),
        None => flash_redirect("/", "Node not found", "danger").into_response(),
    }
}

async fn help_index(State(state): State<AppState>) -> Result<Html<String>> {
    let topics = state.help.topics()?;
    Ok(Html(views::help_index(&topics)))
}

async fn help_topic(State(state): State<AppState>, Path(id): Path<String>) -> Result<Html<String>> {
    let topic = state.help.topic(&id)?;
    Ok(Html(views::help_topic(&topic)))
}

// ---- node data ----

async fn node_data(State(state): State<AppState>, Path(id): Path<u32>) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;
    let api = node_api(&state, &node);

    // Primary calls: any failure surfaces to the caller.
    let health = api.health_check().await?;
    let stats = api.session_stats().await?;
    let stats_daily = api.session_stats_daily().await?;
    let services = api.service_list().await?;
    let identities = api.identity_list().await?;
    // Enough history for 30+ days of charts.
    let sessions = api.sessions(&[("page_size", "1000")]).await?;

    // Enrichment calls: failures degrade to placeholders.
    let nat_info = api.nat_status().await;
    if let Some(cause) = nat_info.cause() {
        tracing::warn!(node = id, "NAT status degraded: {cause}");
    }
    let monitoring = api
        .monitoring_status()
        .await
        .unwrap_or_else(|| json!({ "status": "unknown" }));

    let metrics = match identities.first_id() {
        Some(provider_id) => {
            let metrics = state.discovery.provider_metrics(provider_id).await;
            if let Some(cause) = metrics.cause() {
                tracing::warn!(node = id, "discovery metrics degraded: {cause}");
            }
            metrics.into_value()
        }
        None => ProviderMetrics::default(),
    };

    Ok(Json(json!({
        "health": health,
        "stats": stats,
        "stats_daily": stats_daily,
        "services": services,
        "identities": identities,
        "sessions": sessions,
        "quality_metrics": metrics.quality,
        "location_info": metrics.location,
        "nat_info": nat_info.into_value(),
        "monitoring_status": monitoring,
    })))
}

async fn connection_stats(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;
    let stats = node_api(&state, &node).connection_statistics().await;
    Ok(Json(serde_json::to_value(stats)?))
}

async fn session_stats(
    State(state): State<AppState>,
    Path((id, session_id)): Path<(u32, String)>,
) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;
    let session = node_api(&state, &node).session_by_id(&session_id).await;
    Ok(Json(session.unwrap_or(Value::Null)))
}

async fn active_sessions(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;
    // Smaller page, and no discovery lookups on this path.
    let sessions = node_api(&state, &node)
        .sessions(&[("page_size", "100")])
        .await?;
    Ok(Json(json!({ "sessions": sessions })))
}

// ---- services ----

/// Payload of the start-service route; the client sends `type`.
#[derive(Debug, Deserialize)]
pub struct StartServicePayload {
    #[serde(rename = "type")]
    pub service_type: Option<String>,
    pub provider_id: Option<String>,
}

/// Payload of the create-service route; the client sends `service_type`.
#[derive(Debug, Deserialize)]
pub struct CreateServicePayload {
    pub service_type: Option<String>,
    pub provider_id: Option<String>,
}

async fn start_service(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(payload): Json<StartServicePayload>,
) -> Result<Json<Value>> {
    submit_service_start(&state, id, payload.service_type, payload.provider_id).await
}

async fn create_service(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(payload): Json<CreateServicePayload>,
) -> Result<Json<Value>> {
    submit_service_start(&state, id, payload.service_type, payload.provider_id).await
}

/// Both entry points accept differently-named client fields; everything is
/// normalized to the `{provider_id, type}` wire shape before the gateway
/// call, with a missing provider id resolved from the node's first identity.
async fn submit_service_start(
    state: &AppState,
    id: u32,
    service_type: Option<String>,
    provider_id: Option<String>,
) -> Result<Json<Value>> {
    let node = require_node(state, id)?;
    let api = node_api(state, &node);

    let service_type = service_type
        .filter(|t| !t.is_empty())
        .ok_or(Error::ServiceTypeRequired)?;
    let provider_id = match provider_id.filter(|p| !p.is_empty()) {
        Some(provider_id) => provider_id,
        None => api
            .identity_list()
            .await?
            .first_id()
            .map(str::to_string)
            .ok_or(Error::NoIdentities)?,
    };

    let request = ServiceStartRequest {
        provider_id,
        service_type,
    };
    tracing::debug!(node = id, "starting service: {request:?}");
    let service = api.start_service(&request).await?;
    Ok(Json(json!({ "success": true, "service": service })))
}

async fn list_services(State(state): State<AppState>, Path(id): Path<u32>) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;
    let services = node_api(&state, &node).service_list().await?;
    Ok(Json(services))
}

async fn delete_service(
    State(state): State<AppState>,
    Path((id, service_id)): Path<(u32, String)>,
) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;
    node_api(&state, &node).stop_service(&service_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct StopServiceForm {
    pub service_id: String,
}

async fn stop_service(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Form(form): Form<StopServiceForm>,
) -> Response {
    let node = match state.store.get(id) {
        Some(node) => node,
        None => return flash_redirect("/", "Node not found", "danger").into_response(),
    };

    let back = format!("/node/{id}");
    match node_api(&state, &node).stop_service(&form.service_id).await {
        Ok(()) => flash_redirect(&back, "Service stopped successfully", "success").into_response(),
        Err(e) => {
            flash_redirect(&back, &format!("Error stopping service: {e}"), "danger").into_response()
        }
    }
}

// ---- credentials ----

async fn get_credentials(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;
    Ok(Json(json!({
        "name": node.name,
        "address": node.address,
        "port": node.port,
        "token": node.token,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCredentials {
    pub password: String,
}

/// Re-authenticate against the node and replace the stored token in place.
async fn update_credentials(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(payload): Json<UpdateCredentials>,
) -> Result<Json<Value>> {
    let node = require_node(&state, id)?;

    let mut api = NodeApi::new(state.http.clone(), &node.address, node.port, None);
    let token = api.authenticate(&payload.password).await?;

    state
        .store
        .update(id, |record| record.token = Some(token.clone()))?
        .ok_or(Error::NodeNotFound(id))?;
    Ok(Json(json!({ "success": true, "token": token })))
}

// ---- price ----

#[derive(Debug, Deserialize)]
pub struct PriceParams {
    pub api_key: Option<String>,
}

async fn myst_price(
    State(state): State<AppState>,
    Query(params): Query<PriceParams>,
) -> Result<Json<Value>> {
    // Cached data is served regardless of the supplied key; the cache is
    // not keyed per caller.
    if let Some(quote) = state.price_cache.fresh() {
        return Ok(Json(serde_json::to_value(quote)?));
    }

    let api_key = params
        .api_key
        .filter(|key| !key.is_empty())
        .ok_or(Error::ApiKeyRequired)?;
    let quote = state.market.latest_quote(&api_key).await?;
    state.price_cache.store(quote.clone());
    Ok(Json(serde_json::to_value(quote)?))
}
