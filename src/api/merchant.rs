use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    constants::{chain_by_id, chain_by_name, is_settlement_chain, token_by_symbol},
    error::{AppError, Result},
    models::payment::is_valid_evm_address,
    models::{ApiResponse, CreateSubpayeeRequest, PaymentSession},
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateMerchantRequest {
    pub name: String,
    pub description: Option<String>,
    pub network: String,
    pub token: String,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementDetails {
    /// Settlement token contract address, not its symbol.
    pub token: String,
    /// Settlement chain id, serialized as a string.
    pub network: String,
}

#[derive(Debug, Serialize)]
pub struct MerchantCreatedResponse {
    pub id: String,
    pub name: String,
    pub wallet_address: String,
    pub api_key: String,
    pub settlement_details: SettlementDetails,
}

/// POST /api/v1/merchant/create
///
/// Registers a merchant with the payment provider and returns the
/// per-merchant API key that later authenticates quote requests.
pub async fn create_merchant(
    State(state): State<AppState>,
    Json(req): Json<CreateMerchantRequest>,
) -> Result<Json<ApiResponse<MerchantCreatedResponse>>> {
    let name = req.name.trim();
    if name.len() < 2 {
        return Err(AppError::Validation(
            "Merchant name must be at least 2 characters".to_string(),
        ));
    }

    let chain = chain_by_name(&req.network)
        .ok_or_else(|| AppError::Validation("Invalid network selected".to_string()))?;
    if !is_settlement_chain(chain.id) {
        return Err(AppError::Validation(format!(
            "{} is not yet supported for settlement",
            chain.name
        )));
    }

    let token = token_by_symbol(chain.id, &req.token)
        .ok_or_else(|| AppError::Validation("Invalid token selected".to_string()))?;

    let wallet_address = req.wallet_address.trim();
    if !is_valid_evm_address(wallet_address) {
        return Err(AppError::Validation(
            "Invalid wallet address format (expected 0x + 40 hex chars)".to_string(),
        ));
    }

    let registration = CreateSubpayeeRequest {
        name: name.to_string(),
        to_chain: chain.id.id().to_string(),
        to_token: token.address.to_string(),
        to_address: wallet_address.to_string(),
        description: req
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    };
    let created = state.provider.create_subpayee(&registration).await?;

    let merchant_id = created
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("merchant-{}", Utc::now().timestamp_millis()));
    let api_key = created
        .api_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| state.config.platform_api_key.clone())
        .unwrap_or_default();

    tracing::info!("Merchant {} registered for {}", merchant_id, chain.name);

    Ok(Json(ApiResponse::success(MerchantCreatedResponse {
        id: merchant_id,
        name: name.to_string(),
        wallet_address: wallet_address.to_string(),
        api_key,
        settlement_details: SettlementDetails {
            token: token.address.to_string(),
            network: chain.id.id().to_string(),
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkRequest {
    pub merchant_id: String,
    pub merchant_name: String,
    pub amount: f64,
    /// Preferred settlement token address, if the merchant has one.
    pub token: Option<String>,
    /// Preferred settlement chain id.
    pub network: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PaymentLinkResponse {
    pub url: String,
    pub session: PaymentSession,
}

/// POST /api/v1/merchant/payment-link
///
/// Creates a payment session and the checkout URL that encodes it.
pub async fn create_payment_link(
    State(state): State<AppState>,
    Json(req): Json<PaymentLinkRequest>,
) -> Result<Json<ApiResponse<PaymentLinkResponse>>> {
    if !(req.amount > 0.0) {
        return Err(AppError::Validation(
            "Please enter a valid amount".to_string(),
        ));
    }
    if req.merchant_id.trim().is_empty() {
        return Err(AppError::Validation("Merchant id is required".to_string()));
    }
    if let Some(network) = req.network {
        if chain_by_id(network).is_none() {
            return Err(AppError::Validation(format!(
                "Unsupported network {}",
                network
            )));
        }
    }

    let session = state
        .sessions
        .create(
            req.merchant_id.trim(),
            req.merchant_name.trim(),
            req.amount,
            req.token.clone(),
            req.network,
        )
        .await;

    let url = build_checkout_url(&state.config.checkout_base_url, &session)?;
    tracing::debug!("Generated payment URL for session {}", session.session_id);

    Ok(Json(ApiResponse::success(PaymentLinkResponse {
        url,
        session,
    })))
}

fn build_checkout_url(base_url: &str, session: &PaymentSession) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::Internal(format!("Invalid checkout base URL: {}", e)))?;
    url.set_path("/checkout");

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("merchantId", &session.merchant_id);
        query.append_pair("amount", &session.usd_amount.to_string());
        query.append_pair("session", &session.session_id);
        query.append_pair("merchantName", &session.merchant_name);
        if let (Some(token), Some(network)) =
            (session.preferred_token.as_deref(), session.preferred_network)
        {
            query.append_pair("token", token);
            query.append_pair("network", &network.to_string());
        }
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use chrono::Utc;

    fn session(token: Option<&str>, network: Option<u64>) -> PaymentSession {
        PaymentSession {
            session_id: "session-1700000000000-abcd1234".to_string(),
            merchant_id: "merchant-1".to_string(),
            merchant_name: "Coffee & Co".to_string(),
            usd_amount: 25.0,
            preferred_token: token.map(str::to_string),
            preferred_network: network,
            status: SessionStatus::Pending,
            tx_hash: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn checkout_url_carries_the_session_parameters() {
        let url = build_checkout_url("https://pay.example.com", &session(None, None))
            .expect("valid base url");
        assert!(url.starts_with("https://pay.example.com/checkout?"));
        assert!(url.contains("merchantId=merchant-1"));
        assert!(url.contains("amount=25"));
        assert!(url.contains("session=session-1700000000000-abcd1234"));
        // Query encoding applies to the merchant name.
        assert!(url.contains("merchantName=Coffee+%26+Co"));
        assert!(!url.contains("token="));
    }

    #[test]
    fn checkout_url_includes_settlement_preferences_when_present() {
        let url = build_checkout_url(
            "https://pay.example.com",
            &session(Some("0xaf88d065e77c8cC2239327C5EDb3A432268e5831"), Some(42161)),
        )
        .expect("valid base url");
        assert!(url.contains("token=0xaf88d065e77c8cC2239327C5EDb3A432268e5831"));
        assert!(url.contains("network=42161"));
    }

    #[test]
    fn invalid_base_url_is_an_internal_error() {
        let err = build_checkout_url("not a url", &session(None, None)).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
