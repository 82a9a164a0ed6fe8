//! HTTP read API
//!
//! Two routes: `GET /` is a plain-text readiness marker, `GET /price`
//! serves the cache-or-fetch read path. Malformed or missing query
//! parameters are a 400; fetch or storage failures surface as a 500 with
//! the error text as a plain-text body.

use crate::resolver::CacheResolver;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<CacheResolver>,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    token: Option<String>,
    #[serde(rename = "chainId")]
    chain_id: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
struct PriceResponse {
    #[serde(rename = "priceUsd")]
    price_usd: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/price", get(get_price))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "price-index OK"
}

async fn get_price(State(state): State<AppState>, Query(query): Query<PriceQuery>) -> Response {
    let token = query.token.as_deref().unwrap_or("");
    let chain_id = query.chain_id.as_deref().unwrap_or("");
    let timestamp = query.timestamp.as_deref().unwrap_or("");

    match state.resolver.resolve(token, chain_id, timestamp).await {
        Ok(price_usd) => (StatusCode::OK, Json(PriceResponse { price_usd })).into_response(),
        Err(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            error!("GET /price error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
