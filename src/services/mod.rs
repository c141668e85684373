// All service modules
pub mod balance_resolver;
pub mod chain_switch;
pub mod checkout_flow;
pub mod quote_client;
pub mod session_store;
pub mod settlement;
pub mod wallet_session;

// Re-export for convenience
pub use balance_resolver::{BalanceResolver, BalanceSnapshot, ChainReader, EthersChainReader};
pub use chain_switch::ChainAlignController;
pub use checkout_flow::{CheckoutFlow, CheckoutState};
pub use quote_client::{BindpayClient, PaymentProvider, QuoteParams};
pub use session_store::SessionStore;
pub use settlement::SettlementExecutor;
pub use wallet_session::{DisconnectedWallet, EthersWalletSession, WalletSession};
