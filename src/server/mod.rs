//! HTTP surfaces: the public gateway and the worker RPC.
//!
//! Both are axum routers with a `TraceLayer` and a body limit. They share
//! one error response: every [`Pdf2MdError`] becomes a JSON
//! [`ErrorBody`] `{ "error": kind, "message": text }` with a status
//! derived from its [`ErrorKind`].

pub mod gateway;
pub mod rpc;

use crate::dispatch::wire::ErrorBody;
use crate::error::{ErrorKind, Pdf2MdError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

pub use gateway::gateway_router;
pub use rpc::rpc_router;

/// A [`Pdf2MdError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub Pdf2MdError);

impl From<Pdf2MdError> for ApiError {
    fn from(e: Pdf2MdError) -> Self {
        Self(e)
    }
}

/// HTTP status for an error.
///
/// | kind       | status |
/// |------------|--------|
/// | parse      | 400 |
/// | input      | 400, 413 for oversized uploads |
/// | conversion | 422, 500 when the engine itself is broken |
/// | transport  | 502, 504 on timeout |
/// | internal   | 500 |
pub fn status_for(err: &Pdf2MdError) -> StatusCode {
    match err {
        Pdf2MdError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Pdf2MdError::TransportTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Pdf2MdError::EngineInit { .. }
        | Pdf2MdError::ProviderNotConfigured { .. }
        | Pdf2MdError::PdfiumBindingFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        e => match e.kind() {
            ErrorKind::Parse | ErrorKind::Input => StatusCode::BAD_REQUEST,
            ErrorKind::Conversion => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Transport => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("{} {}", status.as_u16(), self.0);
        } else {
            warn!("{} {}", status.as_u16(), self.0);
        }
        let body = ErrorBody {
            error: self.0.kind().as_str().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Serve `router` on `listener` until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, router: Router) -> Result<(), Pdf2MdError> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("server error: {}", e)))?;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
