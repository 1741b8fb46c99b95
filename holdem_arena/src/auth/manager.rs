//! Agent registration and API-key verification.

use chrono::Utc;
use log::info;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{
    errors::{AuthError, AuthResult},
    models::{Agent, RegisterRequest},
};
use crate::db::{ArenaStore, StoreError};

const MIN_API_KEY_LEN: usize = 12;
const MAX_AGENT_ID_LEN: usize = 64;

/// Hex-encoded SHA-256 of an API key.
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Constant-time comparison of `api_key` against a stored hash.
pub fn verify_api_key(api_key: &str, stored_hash: &str) -> bool {
    let candidate = hash_api_key(api_key);
    candidate.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    store: Arc<dyn ArenaStore>,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `store` - Durable store holding agents and accounts
    pub fn new(store: Arc<dyn ArenaStore>) -> Self {
        Self { store }
    }

    /// Register a new agent with a funded account
    ///
    /// # Errors
    ///
    /// * `AuthError::AgentExists` - Agent id already registered
    /// * `AuthError::InvalidAgentId` / `AuthError::WeakApiKey` - Validation failed
    pub async fn register_agent(&self, request: RegisterRequest) -> AuthResult<Agent> {
        Self::validate_agent_id(&request.agent_id)?;
        if request.api_key.len() < MIN_API_KEY_LEN {
            return Err(AuthError::WeakApiKey(format!(
                "must be at least {MIN_API_KEY_LEN} characters"
            )));
        }
        if request.initial_balance < 0 {
            return Err(AuthError::InvalidBalance(request.initial_balance));
        }

        let agent = Agent {
            display_name: request
                .display_name
                .unwrap_or_else(|| request.agent_id.clone()),
            agent_id: request.agent_id,
            api_key_hash: hash_api_key(&request.api_key),
            created_at: Utc::now(),
        };

        match self.store.create_agent(&agent, request.initial_balance).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(AuthError::AgentExists),
            Err(e) => return Err(e.into()),
        }

        info!("Registered agent {}", agent.agent_id);
        Ok(agent)
    }

    /// Verify an agent's API key
    ///
    /// Unknown agents and wrong keys are indistinguishable to the caller.
    pub async fn authenticate(&self, agent_id: &str, api_key: &str) -> AuthResult<Agent> {
        let agent = self
            .store
            .find_agent(agent_id)
            .await?
            .ok_or(AuthError::InvalidApiKey)?;

        if !verify_api_key(api_key, &agent.api_key_hash) {
            return Err(AuthError::InvalidApiKey);
        }
        Ok(agent)
    }

    fn validate_agent_id(agent_id: &str) -> AuthResult<()> {
        if agent_id.is_empty() || agent_id.len() > MAX_AGENT_ID_LEN {
            return Err(AuthError::InvalidAgentId(format!(
                "must be 1-{MAX_AGENT_ID_LEN} characters"
            )));
        }
        if !agent_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AuthError::InvalidAgentId(
                "only letters, digits, '_' and '-' allowed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::wallet::Ledger;

    fn request(agent_id: &str, api_key: &str) -> RegisterRequest {
        RegisterRequest {
            agent_id: agent_id.to_string(),
            display_name: None,
            api_key: api_key.to_string(),
            initial_balance: 5_000,
        }
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_api_key("secret-key-123");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key("secret-key-123"));
        assert_ne!(hash, hash_api_key("secret-key-124"));
    }

    #[test]
    fn test_verify_api_key() {
        let hash = hash_api_key("secret-key-123");
        assert!(verify_api_key("secret-key-123", &hash));
        assert!(!verify_api_key("secret-key-12", &hash));
        assert!(!verify_api_key("secret-key-123", "short"));
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthManager::new(store.clone());

        let agent = auth.register_agent(request("bot-1", "long-enough-key")).await.unwrap();
        assert_eq!(agent.display_name, "bot-1");
        assert_eq!(store.balance("bot-1").await.unwrap(), 5_000);

        assert!(auth.authenticate("bot-1", "long-enough-key").await.is_ok());
        assert!(matches!(
            auth.authenticate("bot-1", "wrong-key-value").await,
            Err(AuthError::InvalidApiKey)
        ));
        assert!(matches!(
            auth.authenticate("nobody", "long-enough-key").await,
            Err(AuthError::InvalidApiKey)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let auth = AuthManager::new(Arc::new(MemoryStore::new()));
        auth.register_agent(request("bot-1", "long-enough-key")).await.unwrap();

        assert!(matches!(
            auth.register_agent(request("bot-1", "long-enough-key")).await,
            Err(AuthError::AgentExists)
        ));
        assert!(matches!(
            auth.register_agent(request("bad id", "long-enough-key")).await,
            Err(AuthError::InvalidAgentId(_))
        ));
        assert!(matches!(
            auth.register_agent(request("bot-2", "short")).await,
            Err(AuthError::WeakApiKey(_))
        ));
    }
}
