use async_trait::async_trait;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::payment::is_valid_evm_address,
    models::{CreateSubpayeeRequest, Quote, SubpayeeCreated},
};

/// Inputs for one quote request. The chain and amount travel as strings on
/// the wire; the recipient key authenticates the request for the merchant.
#[derive(Debug, Clone)]
pub struct QuoteParams {
    pub from_chain: u64,
    pub from_token: String,
    pub from_address: String,
    pub usd_amount: f64,
    pub recipient_api_key: String,
}

/// Remote payment provider: quoting plus merchant (subpayee) registration.
/// The quote computation itself is opaque to this service.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn request_quote(&self, params: &QuoteParams) -> Result<Quote>;
    async fn create_subpayee(&self, request: &CreateSubpayeeRequest) -> Result<SubpayeeCreated>;
}

pub struct BindpayClient {
    http: reqwest::Client,
    api_url: String,
    platform_api_key: Option<String>,
}

impl BindpayClient {
    pub fn new(api_url: String, platform_api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            platform_api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.quote_api_url.clone(), config.platform_api_key.clone())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentProvider for BindpayClient {
    /// Issues exactly one quote request. All validation happens before any
    /// network traffic, and failures are never retried here.
    async fn request_quote(&self, params: &QuoteParams) -> Result<Quote> {
        let api_key = params.recipient_api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::Validation(
                "Missing API key for recipient".to_string(),
            ));
        }
        if !is_valid_evm_address(&params.from_token) {
            return Err(AppError::Validation("Invalid token address".to_string()));
        }
        if !is_valid_evm_address(&params.from_address) {
            return Err(AppError::Validation("Invalid wallet address".to_string()));
        }
        if !(params.usd_amount > 0.0) {
            return Err(AppError::Validation(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let body = serde_json::json!({
            "fromChain": params.from_chain.to_string(),
            "fromToken": params.from_token,
            "fromAddress": params.from_address,
            "usdAmount": params.usd_amount.to_string(),
        });
        tracing::debug!(
            "Requesting quote for ${} on chain {} with key {}",
            params.usd_amount,
            params.from_chain,
            mask_api_key(api_key)
        );

        let response = self
            .http
            .post(self.endpoint("v1/quote"))
            .header("x-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::QuoteRequest(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::QuoteRequest(format!("status {}: {}", status, e)))?;

        if !status.is_success() {
            tracing::warn!("Quote API error (status {}): {}", status, text);
            return Err(AppError::QuoteRequest(format!("status {}: {}", status, text)));
        }

        let quote: Quote = serde_json::from_str(&text).map_err(|e| {
            AppError::QuoteRequest(format!("status {}: unparsable response: {}", status, e))
        })?;
        if !quote.has_transaction() {
            return Err(AppError::QuoteRequest(format!(
                "status {}: quote carries no transaction parameters",
                status
            )));
        }
        Ok(quote)
    }

    async fn create_subpayee(&self, request: &CreateSubpayeeRequest) -> Result<SubpayeeCreated> {
        let Some(api_key) = self
            .platform_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return Err(AppError::ExternalAPI(
                "Bindpay API key not configured".to_string(),
            ));
        };

        let response = self
            .http
            .post(self.endpoint("v1/create-subpayee"))
            .header("x-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("Subpayee API error (status {}): {}", status, text);
            return Err(AppError::ExternalAPI(format!(
                "Subpayee registration failed (status {}): {}",
                status, text
            )));
        }

        response
            .json::<SubpayeeCreated>()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("Unparsable subpayee response: {}", e)))
    }
}

/// Keeps the first and last four characters, for log lines only.
fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    // The client points at an unroutable URL in these tests; a validation
    // failure must surface before any request is attempted.
    fn client() -> BindpayClient {
        BindpayClient::new("http://invalid.invalid".to_string(), None)
    }

    fn valid_params() -> QuoteParams {
        QuoteParams {
            from_chain: 42161,
            from_token: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831".to_string(),
            from_address: "0x1111111111111111111111111111111111111111".to_string(),
            usd_amount: 25.0,
            recipient_api_key: "bp_live_1234567890".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_recipient_key_fails_locally() {
        let mut params = valid_params();
        params.recipient_api_key = "  ".to_string();
        let err = client().request_quote(&params).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn malformed_addresses_fail_locally() {
        let mut params = valid_params();
        params.from_token = "0x123".to_string();
        assert!(matches!(
            client().request_quote(&params).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut params = valid_params();
        params.from_address = "not-hex".to_string();
        assert!(matches!(
            client().request_quote(&params).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn non_positive_amount_fails_locally() {
        for amount in [0.0, -3.0, f64::NAN] {
            let mut params = valid_params();
            params.usd_amount = amount;
            assert!(matches!(
                client().request_quote(&params).await.unwrap_err(),
                AppError::Validation(_)
            ));
        }
    }

    #[tokio::test]
    async fn subpayee_requires_platform_key() {
        let request = CreateSubpayeeRequest {
            name: "Coffee Shop".to_string(),
            to_chain: "42161".to_string(),
            to_token: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831".to_string(),
            to_address: "0x1111111111111111111111111111111111111111".to_string(),
            description: None,
        };
        let err = client().create_subpayee(&request).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalAPI(_)));
    }

    #[test]
    fn api_keys_are_masked_in_logs() {
        assert_eq!(mask_api_key("bp_live_1234567890"), "bp_l...7890");
        assert_eq!(mask_api_key("short"), "****");
    }
}
