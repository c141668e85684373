use ethers::types::H256;
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    models::Quote,
    services::wallet_session::WalletSession,
};

/// Executes the transaction(s) attached to a quote: an optional approval,
/// fully confirmed first, then the transfer. Partial progress is not rolled
/// back; a failed settlement invalidates the quote for the caller.
pub struct SettlementExecutor {
    wallet: Arc<dyn WalletSession>,
}

impl SettlementExecutor {
    pub fn new(wallet: Arc<dyn WalletSession>) -> Self {
        Self { wallet }
    }

    pub async fn settle(&self, quote: &Quote) -> Result<H256> {
        if !self.wallet.is_connected() {
            return Err(AppError::WalletUnavailable);
        }

        if let Some(approval) = &quote.approval_tx_params {
            let request = approval.to_request().map_err(as_transaction_error)?;
            tracing::debug!("Sending approval transaction for quote {}", quote.transaction_id);
            let approval_hash = self
                .wallet
                .send_transaction(request)
                .await
                .map_err(as_transaction_error)?;
            self.wallet
                .wait_for_confirmation(approval_hash)
                .await
                .map_err(as_transaction_error)?;
            tracing::debug!("Approval transaction confirmed: {:#x}", approval_hash);
        }

        let transfer = quote.transfer_request().map_err(as_transaction_error)?;
        tracing::debug!("Sending transfer transaction for quote {}", quote.transaction_id);
        let tx_hash = self
            .wallet
            .send_transaction(transfer)
            .await
            .map_err(as_transaction_error)?;
        self.wallet
            .wait_for_confirmation(tx_hash)
            .await
            .map_err(as_transaction_error)?;
        tracing::debug!("Transfer transaction confirmed: {:#x}", tx_hash);

        Ok(tx_hash)
    }
}

fn as_transaction_error(err: AppError) -> AppError {
    match err {
        AppError::Transaction(_) | AppError::WalletUnavailable => err,
        other => AppError::Transaction(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::{ProviderTxRequest, TxParams};
    use async_trait::async_trait;
    use ethers::types::{Address, TransactionRequest};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWallet {
        calls: Mutex<Vec<String>>,
        fail_confirmation_of: Option<H256>,
    }

    impl RecordingWallet {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WalletSession for RecordingWallet {
        fn is_connected(&self) -> bool {
            true
        }

        fn address(&self) -> Option<Address> {
            Some(Address::repeat_byte(0x11))
        }

        async fn active_chain_id(&self) -> Result<u64> {
            Ok(42161)
        }

        async fn switch_chain(&self, _chain_id: u64) -> Result<()> {
            Ok(())
        }

        async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256> {
            let to = match tx.to {
                Some(ethers::types::NameOrAddress::Address(addr)) => format!("{:#x}", addr),
                other => format!("{:?}", other),
            };
            let mut calls = self.calls.lock().unwrap();
            let n = calls.iter().filter(|c| c.starts_with("send")).count() as u64 + 1;
            calls.push(format!("send {}", to));
            Ok(H256::from_low_u64_be(n))
        }

        async fn wait_for_confirmation(&self, tx_hash: H256) -> Result<()> {
            self.calls.lock().unwrap().push(format!("confirm {:#x}", tx_hash));
            if self.fail_confirmation_of == Some(tx_hash) {
                return Err(AppError::Transaction("transaction reverted".to_string()));
            }
            Ok(())
        }
    }

    struct OfflineWallet;

    #[async_trait]
    impl WalletSession for OfflineWallet {
        fn is_connected(&self) -> bool {
            false
        }

        fn address(&self) -> Option<Address> {
            None
        }

        async fn active_chain_id(&self) -> Result<u64> {
            Err(AppError::WalletUnavailable)
        }

        async fn switch_chain(&self, _chain_id: u64) -> Result<()> {
            unreachable!("must not be reached when disconnected")
        }

        async fn send_transaction(&self, _tx: TransactionRequest) -> Result<H256> {
            unreachable!("must not be reached when disconnected")
        }

        async fn wait_for_confirmation(&self, _tx_hash: H256) -> Result<()> {
            unreachable!("must not be reached when disconnected")
        }
    }

    fn tx_params(to: &str) -> TxParams {
        TxParams {
            from: "0x1111111111111111111111111111111111111111".to_string(),
            to: to.to_string(),
            data: "0xdeadbeef".to_string(),
            gas: Some("0x5208".to_string()),
            gas_price: Some("0x3b9aca00".to_string()),
            nonce: None,
            value: Some("0x0".to_string()),
        }
    }

    fn quote_with(approval: bool, transfer: bool) -> Quote {
        Quote {
            message: "ok".to_string(),
            transaction_id: "tx-1".to_string(),
            kind: None,
            approval_tx_params: approval
                .then(|| tx_params("0x4444444444444444444444444444444444444444")),
            transfer_tx_params: transfer
                .then(|| tx_params("0x2222222222222222222222222222222222222222")),
            transaction_request: None,
        }
    }

    #[tokio::test]
    async fn approval_is_confirmed_before_the_transfer_is_sent() {
        let wallet = Arc::new(RecordingWallet::default());
        let executor = SettlementExecutor::new(wallet.clone());

        let hash = executor
            .settle(&quote_with(true, true))
            .await
            .expect("settlement succeeds");

        let approval_hash = H256::from_low_u64_be(1);
        let transfer_hash = H256::from_low_u64_be(2);
        assert_eq!(hash, transfer_hash);
        assert_eq!(
            wallet.calls(),
            vec![
                "send 0x4444444444444444444444444444444444444444".to_string(),
                format!("confirm {:#x}", approval_hash),
                "send 0x2222222222222222222222222222222222222222".to_string(),
                format!("confirm {:#x}", transfer_hash),
            ]
        );
    }

    #[tokio::test]
    async fn approval_failure_aborts_before_the_transfer() {
        let wallet = Arc::new(RecordingWallet {
            fail_confirmation_of: Some(H256::from_low_u64_be(1)),
            ..Default::default()
        });
        let executor = SettlementExecutor::new(wallet.clone());

        let err = executor.settle(&quote_with(true, true)).await.unwrap_err();
        assert!(matches!(err, AppError::Transaction(_)));

        let sends: Vec<_> = wallet
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("send"))
            .collect();
        assert_eq!(sends.len(), 1, "transfer must not be submitted");
    }

    #[tokio::test]
    async fn transfer_only_quote_submits_exactly_one_transaction() {
        let wallet = Arc::new(RecordingWallet::default());
        let executor = SettlementExecutor::new(wallet.clone());

        let hash = executor
            .settle(&quote_with(false, true))
            .await
            .expect("settlement succeeds");

        assert_eq!(hash, H256::from_low_u64_be(1));
        let sends = wallet
            .calls()
            .iter()
            .filter(|c| c.starts_with("send"))
            .count();
        assert_eq!(sends, 1);
    }

    #[tokio::test]
    async fn generic_transaction_request_shape_is_accepted() {
        let wallet = Arc::new(RecordingWallet::default());
        let executor = SettlementExecutor::new(wallet.clone());

        let mut quote = quote_with(false, false);
        quote.transaction_request = Some(ProviderTxRequest {
            to: "0x5555555555555555555555555555555555555555".to_string(),
            from: "0x1111111111111111111111111111111111111111".to_string(),
            data: "0x".to_string(),
            value: Some("0x0".to_string()),
            gas_price: Some("0x3b9aca00".to_string()),
            gas_limit: Some("0x30d40".to_string()),
        });

        executor.settle(&quote).await.expect("settlement succeeds");
        assert_eq!(
            wallet.calls()[0],
            "send 0x5555555555555555555555555555555555555555"
        );
    }

    #[tokio::test]
    async fn quote_without_descriptors_is_a_transaction_error() {
        let wallet = Arc::new(RecordingWallet::default());
        let executor = SettlementExecutor::new(wallet.clone());

        let err = executor.settle(&quote_with(false, false)).await.unwrap_err();
        assert!(matches!(err, AppError::Transaction(_)));
        assert!(wallet.calls().is_empty());
    }

    #[tokio::test]
    async fn disconnected_wallet_fails_without_network_contact() {
        let executor = SettlementExecutor::new(Arc::new(OfflineWallet));
        let err = executor.settle(&quote_with(true, true)).await.unwrap_err();
        assert!(matches!(err, AppError::WalletUnavailable));
    }
}
