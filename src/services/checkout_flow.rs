use ethers::types::H256;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, Result},
    models::Quote,
    services::chain_switch::ChainAlignController,
    services::quote_client::{PaymentProvider, QuoteParams},
    services::session_store::SessionStore,
    services::settlement::SettlementExecutor,
    services::wallet_session::WalletSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    QuotePending,
    QuoteReady,
    Switching,
    Submitting,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub enum CheckoutEvent {
    QuoteRequested,
    QuoteReceived,
    QuoteFailed,
    Cancelled,
    AssetChanged,
    SwitchStarted,
    SwitchCompleted,
    SwitchFailed,
    SubmitFailed,
    Settled,
}

/// The only place checkout state may change. Every other path goes through
/// this function, so there is no hidden re-entrancy.
fn transition(state: CheckoutState, event: CheckoutEvent) -> Result<CheckoutState> {
    use CheckoutEvent::*;
    use CheckoutState::*;

    let next = match (state, event) {
        (Idle | QuoteReady | Confirmed | Failed, QuoteRequested) => QuotePending,
        (QuotePending, QuoteReceived) => QuoteReady,
        (QuotePending, QuoteFailed) => Idle,
        (Idle | QuotePending | QuoteReady | Confirmed | Failed, Cancelled) => Idle,
        (Idle | QuotePending | QuoteReady | Confirmed | Failed, AssetChanged) => Idle,
        (QuoteReady, SwitchStarted) => Switching,
        (Switching, SwitchCompleted) => Submitting,
        (Switching, SwitchFailed) => QuoteReady,
        (Submitting, SubmitFailed) => Failed,
        (Submitting, Settled) => Confirmed,
        (state, event) => {
            return Err(AppError::BadRequest(format!(
                "Invalid checkout transition: {:?} during {:?}",
                event, state
            )))
        }
    };
    Ok(next)
}

/// A quote pinned to the asset and payer it was issued for. Settlement may
/// only run while both still match.
#[derive(Clone)]
struct ActiveQuote {
    quote: Quote,
    chain_id: u64,
    token_address: String,
    payer: String,
}

struct FlowInner {
    state: CheckoutState,
    active: Option<ActiveQuote>,
}

/// Drives one payment attempt for one session: quote, chain alignment,
/// settlement, and session completion, in that order.
pub struct CheckoutFlow {
    provider: Arc<dyn PaymentProvider>,
    align: ChainAlignController,
    executor: SettlementExecutor,
    wallet: Arc<dyn WalletSession>,
    sessions: Arc<SessionStore>,
    session_id: String,
    inner: Mutex<FlowInner>,
}

impl CheckoutFlow {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        align: ChainAlignController,
        executor: SettlementExecutor,
        wallet: Arc<dyn WalletSession>,
        sessions: Arc<SessionStore>,
        session_id: String,
    ) -> Self {
        Self {
            provider,
            align,
            executor,
            wallet,
            sessions,
            session_id,
            inner: Mutex::new(FlowInner {
                state: CheckoutState::Idle,
                active: None,
            }),
        }
    }

    pub async fn state(&self) -> CheckoutState {
        self.inner.lock().await.state
    }

    pub async fn active_quote(&self) -> Option<Quote> {
        self.inner
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.quote.clone())
    }

    /// Fetches a fresh quote for the given parameters. Any previously held
    /// quote is discarded first; at most one quote is ever active.
    pub async fn request_quote(&self, params: QuoteParams) -> Result<Quote> {
        {
            let mut inner = self.inner.lock().await;
            inner.active = None;
            inner.state = transition(inner.state, CheckoutEvent::QuoteRequested)?;
        }

        match self.provider.request_quote(&params).await {
            Ok(quote) => {
                let mut inner = self.inner.lock().await;
                if inner.state != CheckoutState::QuotePending {
                    // Cancelled or invalidated while the request was in
                    // flight; the late quote is dropped unused.
                    tracing::debug!("Dropping quote that arrived after cancellation");
                    return Err(AppError::BadRequest(
                        "Quote request was cancelled".to_string(),
                    ));
                }
                inner.state = transition(inner.state, CheckoutEvent::QuoteReceived)?;
                inner.active = Some(ActiveQuote {
                    quote: quote.clone(),
                    chain_id: params.from_chain,
                    token_address: params.from_token.to_ascii_lowercase(),
                    payer: params.from_address.to_ascii_lowercase(),
                });
                Ok(quote)
            }
            Err(err) => {
                let mut inner = self.inner.lock().await;
                if inner.state == CheckoutState::QuotePending {
                    inner.state = transition(inner.state, CheckoutEvent::QuoteFailed)?;
                }
                inner.active = None;
                Err(err)
            }
        }
    }

    /// Abandons the current attempt: the quote (if any) is discarded and the
    /// flow returns to asset selection. Not available once a transaction may
    /// have been broadcast.
    pub async fn cancel(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.state = transition(inner.state, CheckoutEvent::Cancelled)?;
        inner.active = None;
        Ok(())
    }

    /// Invalidates the active quote because the selected asset or connected
    /// wallet changed.
    pub async fn invalidate_quote(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.state = transition(inner.state, CheckoutEvent::AssetChanged)?;
        inner.active = None;
        Ok(())
    }

    /// Confirms the active quote: aligns the wallet's chain, settles, and
    /// marks the payment session completed with the transfer hash.
    pub async fn confirm(&self) -> Result<H256> {
        let active = {
            let mut inner = self.inner.lock().await;
            let Some(active) = inner.active.clone() else {
                return Err(AppError::BadRequest(
                    "No active quote to confirm".to_string(),
                ));
            };
            if !self.wallet.is_connected() {
                return Err(AppError::WalletUnavailable);
            }
            if let Some(address) = self.wallet.address() {
                if format!("{:#x}", address) != active.payer {
                    inner.state = transition(inner.state, CheckoutEvent::AssetChanged)?;
                    inner.active = None;
                    return Err(AppError::Validation(
                        "Connected wallet changed since the quote was issued".to_string(),
                    ));
                }
            }
            inner.state = transition(inner.state, CheckoutEvent::SwitchStarted)?;
            active
        };

        tracing::debug!(
            "Confirming quote {} for {} on chain {}",
            active.quote.transaction_id,
            active.token_address,
            active.chain_id
        );

        if let Err(err) = self.align.ensure_chain(active.chain_id).await {
            let mut inner = self.inner.lock().await;
            inner.state = transition(inner.state, CheckoutEvent::SwitchFailed)?;
            return Err(err);
        }
        {
            let mut inner = self.inner.lock().await;
            inner.state = transition(inner.state, CheckoutEvent::SwitchCompleted)?;
        }

        let result = self.executor.settle(&active.quote).await;

        let mut inner = self.inner.lock().await;
        // Win or lose, the quote is spent: a retry needs fresh gas data.
        inner.active = None;
        match result {
            Ok(tx_hash) => {
                inner.state = transition(inner.state, CheckoutEvent::Settled)?;
                let hash_hex = format!("{:#x}", tx_hash);
                if let Err(err) = self.sessions.complete(&self.session_id, &hash_hex).await {
                    tracing::warn!(
                        "Settled {} but could not update session {}: {}",
                        hash_hex,
                        self.session_id,
                        err
                    );
                }
                tracing::info!(
                    "Payment session {} settled with transaction {}",
                    self.session_id,
                    hash_hex
                );
                Ok(tx_hash)
            }
            Err(err) => {
                inner.state = transition(inner.state, CheckoutEvent::SubmitFailed)?;
                Err(err)
            }
        }
    }
}
