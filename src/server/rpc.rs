//! Worker RPC: exposes one [`ConverterWorker`] to remote gateways.
//!
//! `POST /rpc/submit` takes an [`RpcRequest`] and answers with the matching
//! [`RpcResponse`]; `GET /health` reports whether the engine is loaded.

use crate::dispatch::wire::{RpcRequest, RpcResponse, HEALTH_PATH, SUBMIT_PATH};
use crate::dispatch::{LocalDispatcher, WorkDispatcher};
use crate::error::Pdf2MdError;
use crate::server::ApiError;
use crate::worker::ConverterWorker;
use axum::{
    extract::rejection::JsonRejection,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the worker router. `max_request_bytes` bounds the JSON body, which
/// carries base64 and is about 4/3 of the raw document size.
pub fn rpc_router(worker: Arc<ConverterWorker>, max_request_bytes: usize) -> Router {
    Router::new()
        .route(SUBMIT_PATH, post(submit))
        .route(HEALTH_PATH, get(health))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(LocalDispatcher::new(worker))
}

async fn health(State(local): State<LocalDispatcher>) -> Json<serde_json::Value> {
    let worker = local.worker();
    Json(json!({
        "status": "ok",
        "state": worker.state(),
        "engine": worker.engine_name(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn submit(
    State(local): State<LocalDispatcher>,
    request: Result<Json<RpcRequest>, JsonRejection>,
) -> Result<Json<RpcResponse>, ApiError> {
    let Json(request) = request.map_err(|e| Pdf2MdError::InvalidUpload(e.body_text()))?;
    let job = request.into_job()?;
    let op = job.op_name();
    let output = local.submit(job).await?;
    info!("RPC {} done", op);
    Ok(Json(output.into()))
}
