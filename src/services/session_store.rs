use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, Result},
    models::{PaymentSession, SessionStatus},
};

pub fn generate_session_id() -> String {
    format!(
        "session-{}-{}",
        Utc::now().timestamp_millis(),
        hex::encode(rand::random::<[u8; 4]>())
    )
}

/// In-process store for payment sessions. Bounded; the oldest entries are
/// dropped once the cap is reached. Sessions are never shared across
/// processes, which mirrors the client-local bookkeeping this replaces.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, PaymentSession>>,
    max_entries: usize,
}

impl SessionStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn create(
        &self,
        merchant_id: &str,
        merchant_name: &str,
        usd_amount: f64,
        preferred_token: Option<String>,
        preferred_network: Option<u64>,
    ) -> PaymentSession {
        let session = PaymentSession {
            session_id: generate_session_id(),
            merchant_id: merchant_id.to_string(),
            merchant_name: merchant_name.to_string(),
            usd_amount,
            preferred_token,
            preferred_network,
            status: SessionStatus::Pending,
            tx_hash: None,
            created_at: Utc::now(),
        };

        let mut sessions = self.sessions.write().await;
        while sessions.len() >= self.max_entries {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.created_at)
                .map(|s| s.session_id.clone());
            match oldest {
                Some(id) => {
                    tracing::debug!("Evicting oldest payment session {}", id);
                    sessions.remove(&id);
                }
                None => break,
            }
        }
        sessions.insert(session.session_id.clone(), session.clone());
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<PaymentSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Marks a session completed with the settling transaction hash.
    pub async fn complete(&self, session_id: &str, tx_hash: &str) -> Result<PaymentSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::NotFound(format!("Payment session {}", session_id)))?;
        session.status = SessionStatus::Completed;
        session.tx_hash = Some(tx_hash.to_string());
        Ok(session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique_and_prefixed() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert!(a.starts_with("session-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn create_then_complete_records_the_hash() {
        let store = SessionStore::new(16);
        let session = store
            .create("merchant-1", "Coffee Shop", 25.0, None, Some(42161))
            .await;
        assert_eq!(session.status, SessionStatus::Pending);

        let completed = store
            .complete(&session.session_id, "0xabc123")
            .await
            .expect("session exists");
        assert_eq!(completed.status, SessionStatus::Completed);
        assert_eq!(completed.tx_hash.as_deref(), Some("0xabc123"));

        let fetched = store.get(&session.session_id).await.expect("still stored");
        assert_eq!(fetched.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn completing_an_unknown_session_is_not_found() {
        let store = SessionStore::new(16);
        assert!(matches!(
            store.complete("session-missing", "0x1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn store_is_bounded() {
        let store = SessionStore::new(2);
        let first = store.create("m", "M", 1.0, None, None).await;
        // Keep created-at timestamps strictly ordered so eviction is
        // deterministic.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.create("m", "M", 2.0, None, None).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.create("m", "M", 3.0, None, None).await;

        let sessions = store.sessions.read().await;
        assert!(sessions.len() <= 2);
        assert!(!sessions.contains_key(&first.session_id));
    }
}
