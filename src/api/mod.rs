// API endpoint modules
pub mod checkout;
pub mod health;
pub mod merchant;
pub mod wallet;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::services::{BalanceResolver, CheckoutFlow, PaymentProvider, SessionStore, WalletSession};

/// Shared application state. Every collaborator is constructed once at the
/// composition root and injected here; handlers never build clients.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub provider: Arc<dyn PaymentProvider>,
    pub balances: Arc<BalanceResolver>,
    pub wallet: Arc<dyn WalletSession>,
    pub sessions: Arc<SessionStore>,
    pub flows: Arc<RwLock<HashMap<String, Arc<CheckoutFlow>>>>,
}
