//! Capabilities - External Collaborators
//!
//! The language model, wallet, content store and ledger are opaque services.
//! Each one is reached only through the traits below so the orchestration in
//! `pipeline` can run against fakes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transcript::{ChatMessage, ChatModel};

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Content store error: {0}")]
    Store(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

/// Identifier assigned by the content store (an IPFS path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type TokenId = u64;

pub trait LanguageModelClient: Send + Sync {
    /// Complete the conversation, returning the assistant's reply.
    fn complete(&self, model: ChatModel, history: &[ChatMessage]) -> Result<String, CapabilityError>;
}

pub trait Signer: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> String;
    fn sign_message(&self, message: &str) -> Result<String, CapabilityError>;
}

pub trait ContentStore: Send + Sync {
    fn put(&self, content: &str) -> Result<ContentId, CapabilityError>;
    fn get(&self, id: &ContentId) -> Result<String, CapabilityError>;
}

pub trait LedgerClient: Send + Sync {
    fn mint(
        &self,
        owner: &str,
        uri: &ContentId,
        signature: &str,
        value_wei: u128,
    ) -> Result<TokenId, CapabilityError>;
    fn balance_of(&self, owner: &str) -> Result<u64, CapabilityError>;
    fn token_of_owner_by_index(&self, owner: &str, index: u64) -> Result<TokenId, CapabilityError>;
    fn token_uri(&self, token: TokenId) -> Result<ContentId, CapabilityError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
