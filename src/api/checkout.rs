use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    constants::{token_by_address, ChainId},
    error::{AppError, Result},
    models::{ApiResponse, PaymentSession, Quote, SessionStatus},
    services::{
        ChainAlignController, CheckoutFlow, QuoteParams, SettlementExecutor,
    },
};

use super::AppState;

/// GET /api/v1/checkout/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<PaymentSession>>> {
    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound("Payment session not found".to_string()))?;
    Ok(Json(ApiResponse::success(session)))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutQuoteRequest {
    /// Chain of the selected pay-in asset.
    pub chain_id: u64,
    /// Token contract of the selected pay-in asset.
    pub token_address: String,
    pub payer_address: String,
    /// Merchant-scoped key issued at registration.
    pub recipient_api_key: String,
    /// Defaults to the amount the payment link was generated for.
    pub usd_amount: Option<f64>,
}

/// POST /api/v1/checkout/{session_id}/quote
pub async fn request_quote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<CheckoutQuoteRequest>,
) -> Result<Json<ApiResponse<Quote>>> {
    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound("Payment session not found".to_string()))?;
    if session.status == SessionStatus::Completed {
        return Err(AppError::BadRequest(
            "Payment session is already completed".to_string(),
        ));
    }
    let chain = ChainId::from_id(req.chain_id).ok_or_else(|| {
        AppError::Validation(format!("Unsupported chain {}", req.chain_id))
    })?;
    let token = token_by_address(chain, &req.token_address).ok_or_else(|| {
        AppError::Validation(format!(
            "Token {} is not configured on chain {}",
            req.token_address, req.chain_id
        ))
    })?;

    let flow = flow_for_session(&state, &session_id).await;
    let quote = flow
        .request_quote(QuoteParams {
            from_chain: req.chain_id,
            from_token: token.address.to_string(),
            from_address: req.payer_address,
            usd_amount: req.usd_amount.unwrap_or(session.usd_amount),
            recipient_api_key: req.recipient_api_key,
        })
        .await?;

    Ok(Json(ApiResponse::success(quote)))
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub transaction_hash: String,
    pub session: PaymentSession,
}

/// POST /api/v1/checkout/{session_id}/confirm
///
/// Runs chain alignment and settlement for the session's active quote.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<ConfirmResponse>>> {
    let flow = existing_flow(&state, &session_id).await?;
    let tx_hash = flow.confirm().await?;

    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound("Payment session not found".to_string()))?;

    Ok(Json(ApiResponse::success(ConfirmResponse {
        transaction_hash: format!("{:#x}", tx_hash),
        session,
    })))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /api/v1/checkout/{session_id}/cancel
///
/// Discards the active quote and returns the flow to asset selection.
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<CancelResponse>>> {
    let flow = existing_flow(&state, &session_id).await?;
    flow.cancel().await?;
    Ok(Json(ApiResponse::success(CancelResponse { cancelled: true })))
}

/// Returns the session's flow, creating it on first use. One flow exists
/// per session for the life of the process.
async fn flow_for_session(state: &AppState, session_id: &str) -> Arc<CheckoutFlow> {
    {
        let flows = state.flows.read().await;
        if let Some(flow) = flows.get(session_id) {
            return flow.clone();
        }
    }

    let mut flows = state.flows.write().await;
    if let Some(flow) = flows.get(session_id) {
        return flow.clone();
    }

    let flow = Arc::new(CheckoutFlow::new(
        state.provider.clone(),
        ChainAlignController::from_config(state.wallet.clone(), &state.config),
        SettlementExecutor::new(state.wallet.clone()),
        state.wallet.clone(),
        state.sessions.clone(),
        session_id.to_string(),
    ));
    flows.insert(session_id.to_string(), flow.clone());
    flow
}

async fn existing_flow(state: &AppState, session_id: &str) -> Result<Arc<CheckoutFlow>> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| AppError::NotFound("Payment session not found".to_string()))?;
    let flows = state.flows.read().await;
    flows
        .get(session_id)
        .cloned()
        .ok_or_else(|| AppError::BadRequest("No quote has been requested for this session".to_string()))
}
