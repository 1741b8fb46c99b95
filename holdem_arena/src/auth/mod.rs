//! Agent authentication by API key.
//!
//! Keys are stored as hex-encoded SHA-256 digests and compared in constant
//! time.
//!
//! ## Example
//!
//! ```no_run
//! use holdem_arena::auth::{AuthManager, RegisterRequest};
//! use holdem_arena::db::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = AuthManager::new(Arc::new(MemoryStore::new()));
//!
//!     auth.register_agent(RegisterRequest {
//!         agent_id: "bot-1".to_string(),
//!         display_name: None,
//!         api_key: "k3y-for-bot-one".to_string(),
//!         initial_balance: 10_000,
//!     })
//!     .await?;
//!
//!     let agent = auth.authenticate("bot-1", "k3y-for-bot-one").await?;
//!     println!("Authenticated {}", agent.agent_id);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, hash_api_key, verify_api_key};
pub use models::{Agent, RegisterRequest};
