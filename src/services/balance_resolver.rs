use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, U256};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::Config,
    constants::{is_native_token, tokens_for_chain, ChainId, PRIORITIZED_CHAIN_ORDER},
    error::{AppError, Result},
    models::payment::format_units,
};

/// Per-chain, per-symbol balances as decimal strings, keyed by numeric
/// chain id.
pub type BalanceSnapshot = HashMap<u64, HashMap<String, String>>;

/// Read-only balance access for one wallet across the supported chains.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn has_endpoint(&self, chain: ChainId) -> bool;
    async fn native_balance(&self, chain: ChainId, owner: Address) -> Result<U256>;
    async fn token_balance(&self, chain: ChainId, token: Address, owner: Address) -> Result<U256>;
}

ethers::contract::abigen!(
    Erc20,
    r#"[
        function balanceOf(address) view returns (uint256)
    ]"#
);

pub struct EthersChainReader {
    endpoints: HashMap<u64, String>,
}

impl EthersChainReader {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoints: config.rpc_endpoints(),
        }
    }

    fn provider(&self, chain: ChainId) -> Result<Arc<Provider<Http>>> {
        let url = self
            .endpoints
            .get(&chain.id())
            .ok_or_else(|| {
                AppError::BlockchainRPC(format!("No RPC endpoint for chain {}", chain.id()))
            })?;
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid RPC URL: {}", e)))?;
        Ok(Arc::new(provider))
    }
}

#[async_trait]
impl ChainReader for EthersChainReader {
    fn has_endpoint(&self, chain: ChainId) -> bool {
        self.endpoints.contains_key(&chain.id())
    }

    async fn native_balance(&self, chain: ChainId, owner: Address) -> Result<U256> {
        let provider = self.provider(chain)?;
        provider
            .get_balance(owner, None)
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))
    }

    async fn token_balance(&self, chain: ChainId, token: Address, owner: Address) -> Result<U256> {
        let provider = self.provider(chain)?;
        let erc20 = Erc20::new(token, provider);
        erc20
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))
    }
}

pub struct BalanceResolver {
    reader: Arc<dyn ChainReader>,
}

impl BalanceResolver {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Resolves balances for every configured token on every supported
    /// chain. Chains are scanned concurrently; a failed lookup degrades to
    /// "0" for that token, and the call as a whole never fails.
    pub async fn resolve_balances(&self, wallet_address: &str) -> BalanceSnapshot {
        let owner = Address::from_str(wallet_address.trim()).ok();
        if owner.is_none() {
            tracing::warn!("Unparsable wallet address {}; reporting zero balances", wallet_address);
        }

        let lookups = PRIORITIZED_CHAIN_ORDER
            .iter()
            .map(|&chain| self.chain_balances(chain, owner));
        let per_chain = join_all(lookups).await;

        PRIORITIZED_CHAIN_ORDER
            .iter()
            .zip(per_chain)
            .map(|(chain, balances)| (chain.id(), balances))
            .collect()
    }

    async fn chain_balances(
        &self,
        chain: ChainId,
        owner: Option<Address>,
    ) -> HashMap<String, String> {
        let mut balances = HashMap::new();

        if !self.reader.has_endpoint(chain) {
            tracing::debug!("No RPC endpoint configured for chain {}", chain.id());
            return balances;
        }

        for token in tokens_for_chain(chain) {
            let amount = match owner {
                Some(owner) => self.token_amount(chain, token.address, owner, token.decimals).await,
                None => "0".to_string(),
            };
            balances.insert(token.symbol.to_string(), amount);
        }

        balances
    }

    async fn token_amount(
        &self,
        chain: ChainId,
        token_address: &str,
        owner: Address,
        decimals: u8,
    ) -> String {
        let raw = if is_native_token(token_address) {
            self.reader.native_balance(chain, owner).await
        } else {
            match Address::from_str(token_address) {
                Ok(token) => self.reader.token_balance(chain, token, owner).await,
                Err(e) => Err(AppError::Internal(format!(
                    "Invalid token address {}: {}",
                    token_address, e
                ))),
            }
        };

        match raw {
            Ok(value) => format_units(value, decimals),
            Err(e) => {
                tracing::debug!(
                    "Balance lookup failed on chain {} for {}: {}",
                    chain.id(),
                    token_address,
                    e
                );
                "0".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::token_by_symbol;

    struct FailingReader;

    #[async_trait]
    impl ChainReader for FailingReader {
        fn has_endpoint(&self, _chain: ChainId) -> bool {
            true
        }

        async fn native_balance(&self, _chain: ChainId, _owner: Address) -> Result<U256> {
            Err(AppError::BlockchainRPC("rpc down".to_string()))
        }

        async fn token_balance(
            &self,
            _chain: ChainId,
            _token: Address,
            _owner: Address,
        ) -> Result<U256> {
            Err(AppError::BlockchainRPC("rpc down".to_string()))
        }
    }

    struct NoEndpointReader;

    #[async_trait]
    impl ChainReader for NoEndpointReader {
        fn has_endpoint(&self, _chain: ChainId) -> bool {
            false
        }

        async fn native_balance(&self, _chain: ChainId, _owner: Address) -> Result<U256> {
            unreachable!("no endpoint, must not be queried")
        }

        async fn token_balance(
            &self,
            _chain: ChainId,
            _token: Address,
            _owner: Address,
        ) -> Result<U256> {
            unreachable!("no endpoint, must not be queried")
        }
    }

    struct UsdcOnArbitrumReader;

    #[async_trait]
    impl ChainReader for UsdcOnArbitrumReader {
        fn has_endpoint(&self, _chain: ChainId) -> bool {
            true
        }

        async fn native_balance(&self, _chain: ChainId, _owner: Address) -> Result<U256> {
            Ok(U256::zero())
        }

        async fn token_balance(
            &self,
            chain: ChainId,
            token: Address,
            _owner: Address,
        ) -> Result<U256> {
            let usdc = token_by_symbol(ChainId::Arbitrum, "USDC").unwrap();
            if chain == ChainId::Arbitrum && token == Address::from_str(usdc.address).unwrap() {
                // 100 USDC in 6-decimal units
                return Ok(U256::from(100_000_000u64));
            }
            Ok(U256::zero())
        }
    }

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    #[tokio::test]
    async fn all_failures_degrade_to_zero_for_every_token() {
        let resolver = BalanceResolver::new(Arc::new(FailingReader));
        let snapshot = resolver.resolve_balances(WALLET).await;

        for chain in PRIORITIZED_CHAIN_ORDER {
            let balances = snapshot.get(&chain.id()).expect("chain present");
            for token in tokens_for_chain(*chain) {
                assert_eq!(
                    balances.get(token.symbol).map(String::as_str),
                    Some("0"),
                    "{:?}/{} should degrade to zero",
                    chain,
                    token.symbol
                );
            }
        }
    }

    #[tokio::test]
    async fn missing_endpoint_yields_empty_chain_mapping() {
        let resolver = BalanceResolver::new(Arc::new(NoEndpointReader));
        let snapshot = resolver.resolve_balances(WALLET).await;

        for chain in PRIORITIZED_CHAIN_ORDER {
            assert!(snapshot.get(&chain.id()).expect("chain present").is_empty());
        }
    }

    #[tokio::test]
    async fn invalid_wallet_address_never_rejects() {
        let resolver = BalanceResolver::new(Arc::new(FailingReader));
        let snapshot = resolver.resolve_balances("not-an-address").await;
        let arbitrum = snapshot.get(&ChainId::Arbitrum.id()).expect("chain present");
        assert_eq!(arbitrum.get("USDC").map(String::as_str), Some("0"));
    }

    #[tokio::test]
    async fn token_balance_is_scaled_to_decimal_string() {
        let resolver = BalanceResolver::new(Arc::new(UsdcOnArbitrumReader));
        let snapshot = resolver.resolve_balances(WALLET).await;
        let arbitrum = snapshot.get(&ChainId::Arbitrum.id()).expect("chain present");
        assert_eq!(arbitrum.get("USDC").map(String::as_str), Some("100"));
        assert_eq!(arbitrum.get("ETH").map(String::as_str), Some("0"));
    }
}
