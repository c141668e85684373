use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionRequest, H256, U64};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;

use crate::{
    config::Config,
    constants::PRIORITIZED_CHAIN_ORDER,
    error::{AppError, Result},
};

/// The wallet signing session: a singleton resource that holds the active
/// chain, signs transactions one at a time, and reports confirmations.
#[async_trait]
pub trait WalletSession: Send + Sync {
    fn is_connected(&self) -> bool;
    fn address(&self) -> Option<Address>;
    async fn active_chain_id(&self) -> Result<u64>;
    async fn switch_chain(&self, chain_id: u64) -> Result<()>;
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256>;
    async fn wait_for_confirmation(&self, tx_hash: H256) -> Result<()>;
}

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

struct ActiveChain {
    chain_id: u64,
    client: Arc<SignerClient>,
}

/// Signing session backed by a locally held key and per-chain HTTP providers.
pub struct EthersWalletSession {
    signer: LocalWallet,
    endpoints: HashMap<u64, String>,
    active: RwLock<ActiveChain>,
    poll_interval: Duration,
    poll_attempts: usize,
}

impl EthersWalletSession {
    /// Returns `None` when no signing key or no RPC endpoint is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(key) = config
            .payer_private_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return Ok(None);
        };

        let signer = LocalWallet::from_str(key)
            .map_err(|e| AppError::Internal(format!("Invalid payer private key: {}", e)))?;

        let endpoints = config.rpc_endpoints();
        let Some(initial_chain) = PRIORITIZED_CHAIN_ORDER
            .iter()
            .map(|chain| chain.id())
            .find(|id| endpoints.contains_key(id))
            .or_else(|| endpoints.keys().next().copied())
        else {
            tracing::warn!("Payer key configured but no RPC endpoints; wallet disabled");
            return Ok(None);
        };

        let client = build_client(&signer, initial_chain, &endpoints[&initial_chain])?;
        Ok(Some(Self {
            signer,
            endpoints,
            active: RwLock::new(ActiveChain {
                chain_id: initial_chain,
                client,
            }),
            poll_interval: Duration::from_millis(config.confirmation_poll_interval_ms.max(1)),
            poll_attempts: config.confirmation_poll_attempts,
        }))
    }

    async fn client(&self) -> Arc<SignerClient> {
        self.active.read().await.client.clone()
    }
}

fn build_client(signer: &LocalWallet, chain_id: u64, url: &str) -> Result<Arc<SignerClient>> {
    let provider = Provider::<Http>::try_from(url)
        .map_err(|e| AppError::Internal(format!("Invalid RPC URL for chain {}: {}", chain_id, e)))?;
    let wallet = signer.clone().with_chain_id(chain_id);
    Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
}

#[async_trait]
impl WalletSession for EthersWalletSession {
    fn is_connected(&self) -> bool {
        true
    }

    fn address(&self) -> Option<Address> {
        Some(self.signer.address())
    }

    async fn active_chain_id(&self) -> Result<u64> {
        Ok(self.active.read().await.chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        let Some(url) = self.endpoints.get(&chain_id) else {
            return Err(AppError::ChainSwitch(format!(
                "No RPC endpoint configured for chain {}",
                chain_id
            )));
        };
        let client = build_client(&self.signer, chain_id, url)
            .map_err(|e| AppError::ChainSwitch(e.to_string()))?;
        let mut active = self.active.write().await;
        active.chain_id = chain_id;
        active.client = client;
        Ok(())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256> {
        let client = self.client().await;
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| AppError::Transaction(e.to_string()))?;
        Ok(*pending)
    }

    async fn wait_for_confirmation(&self, tx_hash: H256) -> Result<()> {
        let client = self.client().await;
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match client.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status == Some(U64::zero()) {
                        return Err(AppError::Transaction(format!(
                            "Transaction {:#x} reverted",
                            tx_hash
                        )));
                    }
                    return Ok(());
                }
                Ok(None) => {
                    tracing::debug!("Transaction {:#x} not yet mined (poll {})", tx_hash, attempt);
                }
                Err(e) => {
                    tracing::debug!("Receipt poll failed for {:#x}: {}", tx_hash, e);
                }
            }

            if self.poll_attempts > 0 && attempt >= self.poll_attempts {
                return Err(AppError::Transaction(format!(
                    "Transaction {:#x} still pending after {} polls",
                    tx_hash, attempt
                )));
            }
            sleep(self.poll_interval).await;
        }
    }
}

/// Stand-in used when no signing key is configured. Every signing call
/// reports the wallet as unavailable.
pub struct DisconnectedWallet;

#[async_trait]
impl WalletSession for DisconnectedWallet {
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
        Err(AppError::WalletUnavailable)
    }

    async fn send_transaction(&self, _tx: TransactionRequest) -> Result<H256> {
        Err(AppError::WalletUnavailable)
    }

    async fn wait_for_confirmation(&self, _tx_hash: H256) -> Result<()> {
        Err(AppError::WalletUnavailable)
    }
}
