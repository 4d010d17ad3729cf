//! HTTP surface: `/api/stock/gold` and `/api/crypto/gold`

pub mod error;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::core::config::{AppConfig, RatioConfig};
use crate::core::{HistoryProvider, Pipeline, RatioError, RatioPoint, RatioRequest};
use crate::providers::YahooFinanceProvider;

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn HistoryProvider>,
    pub ratio: Arc<RatioConfig>,
}

impl AppState {
    pub fn new(provider: Arc<dyn HistoryProvider>, ratio: RatioConfig) -> Self {
        AppState {
            provider,
            ratio: Arc::new(ratio),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = YahooFinanceProvider::new(&config.providers.yahoo.base_url)?;
        Ok(Self::new(Arc::new(provider), config.ratio.clone()))
    }
}

/// Raw query pairs. Repeated keys are allowed and the first value wins.
#[derive(Debug, Default)]
pub struct RatioParams(Vec<(String, String)>);

impl RatioParams {
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/stock/gold", get(stock_gold))
        .route("/api/crypto/gold", get(crypto_gold))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn stock_gold(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<RatioPoint>>, RatioError> {
    gold_ratio(Pipeline::Stock, &state, RatioParams(pairs)).await
}

async fn crypto_gold(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<RatioPoint>>, RatioError> {
    gold_ratio(Pipeline::Crypto, &state, RatioParams(pairs)).await
}

async fn gold_ratio(
    pipeline: Pipeline,
    state: &AppState,
    params: RatioParams,
) -> Result<Json<Vec<RatioPoint>>, RatioError> {
    let request = RatioRequest::parse(params.first("ticker"), params.first("start_date"))?;
    let points = pipeline
        .run(state.provider.as_ref(), &state.ratio, &request)
        .await?;
    debug!(
        %pipeline,
        ticker = %request.ticker,
        points = points.len(),
        "Computed gold ratio"
    );
    Ok(Json(points))
}
