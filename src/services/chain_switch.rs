use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::{
    config::Config,
    constants::MAX_CHAIN_SWITCH_ATTEMPTS,
    error::{AppError, Result},
    services::wallet_session::WalletSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Idle,
    PendingSwitch,
    Switching,
    Cooldown,
}

struct SwitchTracker {
    state: SwitchState,
    last_target: Option<u64>,
    attempts: u32,
}

/// Aligns the wallet's active chain with the chain required by the selected
/// pay-in asset. Attempts are debounced, bounded per target, and never
/// overlap; the controller knows nothing about quotes or transactions.
pub struct ChainAlignController {
    wallet: Arc<dyn WalletSession>,
    debounce: Duration,
    settle_delay: Duration,
    tracker: Mutex<SwitchTracker>,
}

impl ChainAlignController {
    pub fn new(wallet: Arc<dyn WalletSession>, debounce: Duration, settle_delay: Duration) -> Self {
        Self {
            wallet,
            debounce,
            settle_delay,
            tracker: Mutex::new(SwitchTracker {
                state: SwitchState::Idle,
                last_target: None,
                attempts: 0,
            }),
        }
    }

    pub fn from_config(wallet: Arc<dyn WalletSession>, config: &Config) -> Self {
        Self::new(
            wallet,
            Duration::from_millis(config.chain_switch_debounce_ms),
            Duration::from_millis(config.chain_switch_settle_ms),
        )
    }

    pub async fn state(&self) -> SwitchState {
        self.tracker.lock().await.state
    }

    /// Ensures the wallet sits on `required_chain_id` before settlement.
    /// No-op when the wallet is disconnected or already aligned. After more
    /// than `MAX_CHAIN_SWITCH_ATTEMPTS` consecutive attempts toward the
    /// same target the controller stops and asks for a manual switch.
    pub async fn ensure_chain(&self, required_chain_id: u64) -> Result<()> {
        if !self.wallet.is_connected() {
            return Ok(());
        }
        if self.wallet.active_chain_id().await? == required_chain_id {
            return Ok(());
        }

        {
            let mut tracker = self.tracker.lock().await;
            if tracker.state != SwitchState::Idle {
                // A switch is already in flight; this trigger is ignored.
                return Ok(());
            }
            if tracker.last_target == Some(required_chain_id) {
                tracker.attempts += 1;
                if tracker.attempts > MAX_CHAIN_SWITCH_ATTEMPTS {
                    tracing::warn!(
                        "Too many attempts to switch to chain {}",
                        required_chain_id
                    );
                    return Err(AppError::ChainSwitch(
                        "Unable to switch network automatically. Please switch manually."
                            .to_string(),
                    ));
                }
            } else {
                tracker.last_target = Some(required_chain_id);
                tracker.attempts = 1;
            }
            tracker.state = SwitchState::PendingSwitch;
        }

        // Debounce so a rapidly changing selection does not thrash the wallet.
        sleep(self.debounce).await;

        let active = match self.wallet.active_chain_id().await {
            Ok(chain_id) => chain_id,
            Err(err) => {
                self.set_state(SwitchState::Idle).await;
                return Err(err);
            }
        };
        if active == required_chain_id {
            let mut tracker = self.tracker.lock().await;
            tracker.state = SwitchState::Idle;
            tracker.attempts = 0;
            return Ok(());
        }

        self.set_state(SwitchState::Switching).await;
        tracing::debug!("Attempting to switch from {} to {}", active, required_chain_id);

        match self.wallet.switch_chain(required_chain_id).await {
            Ok(()) => {
                // Give dependent state a moment to catch up before the next
                // attempt can start.
                sleep(self.settle_delay).await;
                let mut tracker = self.tracker.lock().await;
                tracker.state = SwitchState::Idle;
                tracker.attempts = 0;
                tracing::debug!("Chain switch successful to {}", required_chain_id);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Chain switch error: {}", err);
                self.set_state(SwitchState::Cooldown).await;
                sleep(self.settle_delay).await;
                self.set_state(SwitchState::Idle).await;

                let detail = err.to_string().to_ascii_lowercase();
                let message = if detail.contains("rejected") || detail.contains("denied") {
                    "Network switch was rejected. Please try again or switch manually."
                } else {
                    "Failed to switch network. Please try switching manually."
                };
                Err(AppError::ChainSwitch(message.to_string()))
            }
        }
    }

    async fn set_state(&self, state: SwitchState) {
        self.tracker.lock().await.state = state;
    }
}
