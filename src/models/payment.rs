use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Conversion offer issued by the payment provider, together with the
/// transaction(s) that execute it. Short-lived: discarded on cancellation,
/// on parameter changes, and once settlement finishes either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub message: String,
    pub transaction_id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Direct transfer shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_tx_params: Option<TxParams>,
    /// Allowance grant required before a provider-routed transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_tx_params: Option<TxParams>,
    /// Generic transaction-request shape used by provider-routed transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_request: Option<ProviderTxRequest>,
}

impl Quote {
    pub fn has_transaction(&self) -> bool {
        self.transfer_tx_params.is_some()
            || self.approval_tx_params.is_some()
            || self.transaction_request.is_some()
    }

    /// Normalizes whichever transfer shape the provider returned into one
    /// canonical transaction request.
    pub fn transfer_request(&self) -> Result<TransactionRequest> {
        if let Some(params) = &self.transfer_tx_params {
            return params.to_request();
        }
        if let Some(request) = &self.transaction_request {
            return request.to_request();
        }
        Err(AppError::Transaction(
            "No transaction parameters found".to_string(),
        ))
    }
}

/// Raw transaction fields as the provider serializes them: hex strings,
/// with `gas`/`gasPrice`/`nonce`/`value` optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxParams {
    pub from: String,
    pub to: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl TxParams {
    pub fn to_request(&self) -> Result<TransactionRequest> {
        let mut request = TransactionRequest::new()
            .from(parse_address("from", &self.from)?)
            .to(parse_address("to", &self.to)?)
            .data(parse_call_data(&self.data)?)
            .value(match &self.value {
                Some(value) => parse_hex_u256("value", value)?,
                None => U256::zero(),
            });
        if let Some(gas) = &self.gas {
            request = request.gas(parse_hex_u256("gas", gas)?);
        }
        if let Some(gas_price) = &self.gas_price {
            request = request.gas_price(parse_hex_u256("gasPrice", gas_price)?);
        }
        if let Some(nonce) = &self.nonce {
            request = request.nonce(parse_hex_u256("nonce", nonce)?);
        }
        Ok(request)
    }
}

/// Same transaction, different field names: `gasLimit` instead of `gas`
/// and no nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTxRequest {
    pub to: String,
    pub from: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
}

impl ProviderTxRequest {
    pub fn to_request(&self) -> Result<TransactionRequest> {
        let mut request = TransactionRequest::new()
            .from(parse_address("from", &self.from)?)
            .to(parse_address("to", &self.to)?)
            .data(parse_call_data(&self.data)?)
            .value(match &self.value {
                Some(value) => parse_hex_u256("value", value)?,
                None => U256::zero(),
            });
        if let Some(gas_limit) = &self.gas_limit {
            request = request.gas(parse_hex_u256("gasLimit", gas_limit)?);
        }
        if let Some(gas_price) = &self.gas_price {
            request = request.gas_price(parse_hex_u256("gasPrice", gas_price)?);
        }
        Ok(request)
    }
}

/// Merchant registration payload for the provider's subpayee endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubpayeeRequest {
    pub name: String,
    pub to_chain: String,
    pub to_token: String,
    pub to_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubpayeeCreated {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Completed,
}

/// One merchant-initiated payment attempt, shared with the payer via a
/// link or QR code. Held only in process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub session_id: String,
    pub merchant_id: String,
    pub merchant_name: String,
    pub usd_amount: f64,
    pub preferred_token: Option<String>,
    pub preferred_network: Option<u64>,
    pub status: SessionStatus,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|_| AppError::Validation(format!("Invalid {} address: {}", field, value)))
}

pub fn parse_hex_u256(field: &str, value: &str) -> Result<U256> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(AppError::Validation(format!("Empty {} value", field)));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| AppError::Validation(format!("Invalid {} hex value {}: {}", field, value, e)))
}

pub fn parse_call_data(value: &str) -> Result<Bytes> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.is_empty() {
        return Ok(Bytes::default());
    }
    let raw = hex::decode(digits)
        .map_err(|e| AppError::Validation(format!("Invalid call data {}: {}", value, e)))?;
    Ok(Bytes::from(raw))
}

pub fn is_valid_evm_address(value: &str) -> bool {
    let normalized = value.trim();
    normalized.starts_with("0x")
        && normalized.len() == 42
        && normalized[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Renders a raw token amount as a decimal string, trimming trailing zeros
/// from the fractional part.
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let base = U256::exp10(decimals as usize);
    let integer = value / base;
    let fraction = value % base;
    if fraction.is_zero() {
        return integer.to_string();
    }
    let mut fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    while fraction.ends_with('0') {
        fraction.pop();
    }
    format!("{}.{}", integer, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_params() -> TxParams {
        TxParams {
            from: "0x1111111111111111111111111111111111111111".to_string(),
            to: "0x2222222222222222222222222222222222222222".to_string(),
            data: "0xdeadbeef".to_string(),
            gas: Some("0x5208".to_string()),
            gas_price: Some("0x3b9aca00".to_string()),
            nonce: Some("0x1".to_string()),
            value: Some("0x0".to_string()),
        }
    }

    #[test]
    fn tx_params_normalize_hex_fields() {
        let request = transfer_params().to_request().expect("valid params");
        assert_eq!(request.gas, Some(U256::from(21_000)));
        assert_eq!(request.gas_price, Some(U256::from(1_000_000_000u64)));
        assert_eq!(request.nonce, Some(U256::from(1)));
        assert_eq!(request.value, Some(U256::zero()));
    }

    #[test]
    fn provider_request_maps_gas_limit_to_gas() {
        let provider_shape = ProviderTxRequest {
            to: "0x2222222222222222222222222222222222222222".to_string(),
            from: "0x1111111111111111111111111111111111111111".to_string(),
            data: "0x".to_string(),
            value: Some("0xde0b6b3a7640000".to_string()),
            gas_price: Some("0x3b9aca00".to_string()),
            gas_limit: Some("0x5208".to_string()),
        };
        let request = provider_shape.to_request().expect("valid request");
        assert_eq!(request.gas, Some(U256::from(21_000)));
        assert_eq!(request.value, Some(U256::exp10(18)));
        assert_eq!(request.nonce, None);
    }

    #[test]
    fn quote_prefers_transfer_params_over_transaction_request() {
        let quote = Quote {
            message: "ok".to_string(),
            transaction_id: "tx-1".to_string(),
            kind: Some("Direct".to_string()),
            transfer_tx_params: Some(transfer_params()),
            approval_tx_params: None,
            transaction_request: Some(ProviderTxRequest {
                to: "0x3333333333333333333333333333333333333333".to_string(),
                from: "0x1111111111111111111111111111111111111111".to_string(),
                data: "0x".to_string(),
                value: None,
                gas_price: None,
                gas_limit: None,
            }),
        };
        let request = quote.transfer_request().expect("transfer shape wins");
        assert_eq!(
            request.to,
            Some(parse_address("to", "0x2222222222222222222222222222222222222222")
                .unwrap()
                .into())
        );
    }

    #[test]
    fn quote_without_descriptors_has_no_transaction() {
        let quote = Quote {
            message: "ok".to_string(),
            transaction_id: "tx-2".to_string(),
            kind: None,
            transfer_tx_params: None,
            approval_tx_params: None,
            transaction_request: None,
        };
        assert!(!quote.has_transaction());
        assert!(matches!(
            quote.transfer_request(),
            Err(AppError::Transaction(_))
        ));
    }

    #[test]
    fn quote_deserializes_provider_camel_case() {
        let raw = r#"{
            "message": "Quote generated",
            "transactionId": "abc-123",
            "type": "Provider",
            "approvalTxParams": {
                "from": "0x1111111111111111111111111111111111111111",
                "to": "0x4444444444444444444444444444444444444444",
                "data": "0x095ea7b3",
                "gas": "0xb3b0",
                "gasPrice": "0x3b9aca00",
                "nonce": "0x2",
                "value": "0x0"
            },
            "transactionRequest": {
                "to": "0x5555555555555555555555555555555555555555",
                "from": "0x1111111111111111111111111111111111111111",
                "data": "0x",
                "value": "0x0",
                "gasPrice": "0x3b9aca00",
                "gasLimit": "0x30d40"
            }
        }"#;
        let quote: Quote = serde_json::from_str(raw).expect("valid provider payload");
        assert_eq!(quote.transaction_id, "abc-123");
        assert!(quote.approval_tx_params.is_some());
        assert!(quote.transfer_tx_params.is_none());
        assert!(quote.transfer_request().is_ok());
    }

    #[test]
    fn format_units_trims_trailing_zeros() {
        assert_eq!(format_units(U256::zero(), 6), "0");
        assert_eq!(format_units(U256::from(100_000_000u64), 6), "100");
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::from(123u64), 0), "123");
    }

    #[test]
    fn evm_address_validation() {
        assert!(is_valid_evm_address(
            "0xaf88d065e77c8cC2239327C5EDb3A432268e5831"
        ));
        assert!(!is_valid_evm_address("0x1234"));
        assert!(!is_valid_evm_address(
            "af88d065e77c8cC2239327C5EDb3A432268e5831"
        ));
        assert!(!is_valid_evm_address(
            "0xZZ88d065e77c8cC2239327C5EDb3A432268e5831"
        ));
    }
}
