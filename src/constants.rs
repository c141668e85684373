/// Application constants and chain/token reference data.

// Supported networks. The numeric values are the canonical EVM chain ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum ChainId {
    Ethereum = 1,
    Optimism = 10,
    Polygon = 137,
    Arbitrum = 42161,
    Base = 8453,
    Avalanche = 43114,
    Linea = 59144,
    Scroll = 534352,
}

impl ChainId {
    pub fn id(self) -> u64 {
        self as u64
    }

    pub fn from_id(id: u64) -> Option<Self> {
        SUPPORTED_CHAINS
            .iter()
            .find(|chain| chain.id.id() == id)
            .map(|chain| chain.id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChainSpec {
    pub id: ChainId,
    pub name: &'static str,
    pub native_currency: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenSpec {
    pub chain: ChainId,
    pub symbol: &'static str,
    pub name: &'static str,
    pub address: &'static str,
    pub decimals: u8,
}

/// Zero-address sentinel for a chain's native currency.
pub const NATIVE_TOKEN_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub const SUPPORTED_CHAINS: &[ChainSpec] = &[
    ChainSpec {
        id: ChainId::Ethereum,
        name: "Ethereum",
        native_currency: "ETH",
    },
    ChainSpec {
        id: ChainId::Optimism,
        name: "Optimism",
        native_currency: "ETH",
    },
    ChainSpec {
        id: ChainId::Polygon,
        name: "Polygon",
        native_currency: "POL",
    },
    ChainSpec {
        id: ChainId::Arbitrum,
        name: "Arbitrum",
        native_currency: "ETH",
    },
    ChainSpec {
        id: ChainId::Base,
        name: "Base",
        native_currency: "ETH",
    },
    ChainSpec {
        id: ChainId::Avalanche,
        name: "Avalanche",
        native_currency: "AVAX",
    },
    ChainSpec {
        id: ChainId::Linea,
        name: "Linea",
        native_currency: "ETH",
    },
    ChainSpec {
        id: ChainId::Scroll,
        name: "Scroll",
        native_currency: "ETH",
    },
];

/// Order in which chains are scanned during balance resolution.
pub const PRIORITIZED_CHAIN_ORDER: &[ChainId] = &[
    ChainId::Arbitrum,
    ChainId::Base,
    ChainId::Ethereum,
    ChainId::Optimism,
    ChainId::Avalanche,
    ChainId::Polygon,
];

/// Networks listed in the chain table but not yet accepted for merchant settlement.
pub const COMING_SOON_CHAINS: &[ChainId] = &[ChainId::Linea, ChainId::Scroll];

pub const TOKENS: &[TokenSpec] = &[
    // Ethereum
    TokenSpec {
        chain: ChainId::Ethereum,
        symbol: "ETH",
        name: "Ether",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
    },
    TokenSpec {
        chain: ChainId::Ethereum,
        symbol: "USDC",
        name: "USD Coin",
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Ethereum,
        symbol: "USDT",
        name: "Tether USD",
        address: "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Ethereum,
        symbol: "DAI",
        name: "Dai Stablecoin",
        address: "0x6B175474E89094C44Da98b954EedeAC495271d0F",
        decimals: 18,
    },
    // Arbitrum
    TokenSpec {
        chain: ChainId::Arbitrum,
        symbol: "ETH",
        name: "Ether",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
    },
    TokenSpec {
        chain: ChainId::Arbitrum,
        symbol: "USDC",
        name: "USD Coin",
        address: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Arbitrum,
        symbol: "USDT",
        name: "Tether USD",
        address: "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Arbitrum,
        symbol: "ARB",
        name: "Arbitrum",
        address: "0x912CE59144191C1204E64559FE8253a0e49E6548",
        decimals: 18,
    },
    // Base
    TokenSpec {
        chain: ChainId::Base,
        symbol: "ETH",
        name: "Ether",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
    },
    TokenSpec {
        chain: ChainId::Base,
        symbol: "USDC",
        name: "USD Coin",
        address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Base,
        symbol: "DAI",
        name: "Dai Stablecoin",
        address: "0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb",
        decimals: 18,
    },
    // Optimism
    TokenSpec {
        chain: ChainId::Optimism,
        symbol: "ETH",
        name: "Ether",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
    },
    TokenSpec {
        chain: ChainId::Optimism,
        symbol: "USDC",
        name: "USD Coin",
        address: "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Optimism,
        symbol: "USDT",
        name: "Tether USD",
        address: "0x94b008aA00579c1307B0EF2c499aD98a8ce58e58",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Optimism,
        symbol: "OP",
        name: "Optimism",
        address: "0x4200000000000000000000000000000000000042",
        decimals: 18,
    },
    // Avalanche
    TokenSpec {
        chain: ChainId::Avalanche,
        symbol: "AVAX",
        name: "Avalanche",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
    },
    TokenSpec {
        chain: ChainId::Avalanche,
        symbol: "USDC",
        name: "USD Coin",
        address: "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Avalanche,
        symbol: "USDT",
        name: "Tether USD",
        address: "0x9702230A8Ea53601f5cD2dc00fDBc13d4dF4A8c7",
        decimals: 6,
    },
    // Polygon
    TokenSpec {
        chain: ChainId::Polygon,
        symbol: "POL",
        name: "Polygon Ecosystem Token",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
    },
    TokenSpec {
        chain: ChainId::Polygon,
        symbol: "USDC",
        name: "USD Coin",
        address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
        decimals: 6,
    },
    TokenSpec {
        chain: ChainId::Polygon,
        symbol: "USDT",
        name: "Tether USD",
        address: "0xc2132D05D31c914a87C6611C10748AEb04B58e8F",
        decimals: 6,
    },
];

pub fn chain_by_id(id: u64) -> Option<&'static ChainSpec> {
    SUPPORTED_CHAINS.iter().find(|chain| chain.id.id() == id)
}

pub fn chain_by_name(name: &str) -> Option<&'static ChainSpec> {
    let normalized = name.trim();
    SUPPORTED_CHAINS
        .iter()
        .find(|chain| chain.name.eq_ignore_ascii_case(normalized))
}

pub fn tokens_for_chain(chain: ChainId) -> impl Iterator<Item = &'static TokenSpec> {
    TOKENS.iter().filter(move |token| token.chain == chain)
}

pub fn token_by_symbol(chain: ChainId, symbol: &str) -> Option<&'static TokenSpec> {
    let normalized = symbol.trim();
    tokens_for_chain(chain).find(|token| token.symbol.eq_ignore_ascii_case(normalized))
}

pub fn token_by_address(chain: ChainId, address: &str) -> Option<&'static TokenSpec> {
    let normalized = address.trim();
    tokens_for_chain(chain).find(|token| token.address.eq_ignore_ascii_case(normalized))
}

pub fn is_native_token(address: &str) -> bool {
    address.trim().eq_ignore_ascii_case(NATIVE_TOKEN_ADDRESS)
}

pub fn is_settlement_chain(chain: ChainId) -> bool {
    !COMING_SOON_CHAINS.contains(&chain) && tokens_for_chain(chain).next().is_some()
}

// API version
pub const API_VERSION: &str = "v1";

// Quote provider
pub const DEFAULT_QUOTE_API_URL: &str = "https://api.bindpay.xyz";

// Chain alignment
pub const CHAIN_SWITCH_DEBOUNCE_MS: u64 = 1_000;
pub const CHAIN_SWITCH_SETTLE_MS: u64 = 1_000;
pub const MAX_CHAIN_SWITCH_ATTEMPTS: u32 = 3;

// Settlement confirmation polling. Zero attempts means "poll until confirmed".
pub const CONFIRMATION_POLL_INTERVAL_MS: u64 = 1_500;
pub const CONFIRMATION_POLL_ATTEMPTS: usize = 0;

// Payment sessions
pub const SESSION_STORE_MAX_ENTRIES: usize = 10_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_lookup_by_id_and_name_agree() {
        let by_id = chain_by_id(42161).expect("arbitrum by id");
        let by_name = chain_by_name("arbitrum").expect("arbitrum by name");
        assert_eq!(by_id.id, by_name.id);
        assert_eq!(by_id.name, "Arbitrum");
    }

    #[test]
    fn unknown_chain_id_is_rejected() {
        assert!(ChainId::from_id(99999).is_none());
        assert!(chain_by_id(99999).is_none());
    }

    #[test]
    fn every_prioritized_chain_has_a_native_token() {
        for chain in PRIORITIZED_CHAIN_ORDER {
            let native = tokens_for_chain(*chain).find(|t| is_native_token(t.address));
            assert!(native.is_some(), "{:?} has no native sentinel", chain);
        }
    }

    #[test]
    fn coming_soon_chains_are_not_settlement_eligible() {
        assert!(!is_settlement_chain(ChainId::Linea));
        assert!(!is_settlement_chain(ChainId::Scroll));
        assert!(is_settlement_chain(ChainId::Arbitrum));
    }

    #[test]
    fn token_lookup_is_case_insensitive() {
        let usdc = token_by_symbol(ChainId::Arbitrum, "usdc").expect("usdc on arbitrum");
        assert_eq!(usdc.decimals, 6);
        assert!(token_by_address(ChainId::Arbitrum, &usdc.address.to_lowercase()).is_some());
    }
}
