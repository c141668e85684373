use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Quote request failed: {0}")]
    QuoteRequest(String),

    #[error("Chain switch failed: {0}")]
    ChainSwitch(String),

    #[error("No wallet signing session available")]
    WalletUnavailable,

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("External API error: {0}")]
    ExternalAPI(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(ref msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::QuoteRequest(ref msg) => {
                (StatusCode::BAD_GATEWAY, "QUOTE_REQUEST_FAILED", msg.clone())
            }
            AppError::ChainSwitch(ref msg) => {
                (StatusCode::CONFLICT, "CHAIN_SWITCH_FAILED", msg.clone())
            }
            AppError::WalletUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "WALLET_UNAVAILABLE",
                "No wallet signing session available. Connect a wallet and try again.".to_string(),
            ),
            AppError::Transaction(ref msg) => {
                (StatusCode::BAD_GATEWAY, "TRANSACTION_FAILED", msg.clone())
            }
            AppError::BlockchainRPC(ref msg) => {
                (StatusCode::BAD_GATEWAY, "BLOCKCHAIN_RPC_ERROR", msg.clone())
            }
            AppError::ExternalAPI(ref msg) => {
                (StatusCode::BAD_GATEWAY, "EXTERNAL_API_ERROR", msg.clone())
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
