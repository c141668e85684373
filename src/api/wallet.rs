use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::ApiResponse,
    services::BalanceSnapshot,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct BalanceRequest {
    pub wallet_address: String,
}

/// POST /api/v1/wallet/balances
///
/// Resolves per-chain token balances for the payer's asset picker. Lookup
/// failures degrade to zero balances rather than failing the request.
pub async fn get_balances(
    State(state): State<AppState>,
    Json(req): Json<BalanceRequest>,
) -> Result<Json<ApiResponse<BalanceSnapshot>>> {
    let wallet_address = req.wallet_address.trim();
    if wallet_address.is_empty() {
        return Err(AppError::Validation(
            "Wallet address is required".to_string(),
        ));
    }

    let snapshot = state.balances.resolve_balances(wallet_address).await;
    Ok(Json(ApiResponse::success(snapshot)))
}
