//! Proof Pipeline - Chat, Sign, Store, Mint, Browse, Verify
//!
//! Sequencing only. Every side effect goes through a capability trait.
//! Fetched bundles are always validated before they are returned.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bundle::{BundleError, ProofBundle};
use crate::capabilities::{
    CapabilityError, Clock, ContentId, ContentStore, LanguageModelClient, LedgerClient, Signer, TokenId,
};
use crate::config::AppConfig;
use crate::hashing::compute_bundle_digest;
use crate::transcript::{ChatModel, ChatSession, TranscriptError};
use crate::validation::{ValidationContext, ValidationResult, Validator};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Session has no user prompt to sign")]
    NothingToSign,

    #[error("Bundle has no transcript or signature to verify")]
    NothingToVerify,

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied,
    /// The model call failed; the session got a failure notice instead.
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    OriginalSigner,
    NotOriginalSigner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProof {
    pub content_id: ContentId,
    pub signature: String,
    pub bundle: ProofBundle,
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedToken {
    pub token_id: TokenId,
    pub content_id: ContentId,
    pub bundle: ProofBundle,
    pub validation: ValidationResult,
}

/// External services the pipeline drives.
pub struct Services<'a> {
    pub llm: &'a dyn LanguageModelClient,
    pub signer: &'a dyn Signer,
    pub store: &'a dyn ContentStore,
    pub ledger: &'a dyn LedgerClient,
    pub clock: &'a dyn Clock,
}

pub struct ProofPipeline<'a> {
    services: Services<'a>,
    config: AppConfig,
    validator: Validator,
}

impl<'a> ProofPipeline<'a> {
    pub fn new(services: Services<'a>, config: AppConfig) -> Self {
        Self {
            services,
            config,
            validator: Validator::new(),
        }
    }

    /// Run one chat turn with the configured default model.
    pub fn send(&self, session: &mut ChatSession, text: &str) -> Result<TurnOutcome, PipelineError> {
        self.send_with_model(session, self.config.default_model, text)
    }

    pub fn send_with_model(
        &self,
        session: &mut ChatSession,
        model: ChatModel,
        text: &str,
    ) -> Result<TurnOutcome, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }
        session.push_user(text);
        debug!(session = %session.id(), %model, messages = session.len(), "sending prompt");

        match self.services.llm.complete(model, session.messages()) {
            Ok(reply) => {
                session.push_assistant(reply);
                Ok(TurnOutcome::Replied)
            }
            Err(e) => {
                warn!(session = %session.id(), error = %e, "completion failed");
                session.push_failure();
                Ok(TurnOutcome::Failed { reason: e.to_string() })
            }
        }
    }

    /// Sign the transcript, render its identicon and upload the bundle.
    pub fn sign_and_store(&self, session: &ChatSession) -> Result<StoredProof, PipelineError> {
        if !session.has_user_turn() {
            return Err(PipelineError::NothingToSign);
        }

        let payload = session.signing_payload()?;
        let signature = self.services.signer.sign_message(&payload)?;
        let bundle = ProofBundle::assemble(
            session,
            &signature,
            self.services.clock.now(),
            self.config.short_seed_policy,
        )?;
        let digest = compute_bundle_digest(&bundle)?;
        let content_id = self.services.store.put(&bundle.to_json()?)?;

        info!(session = %session.id(), %content_id, %digest, "proof bundle stored");

        Ok(StoredProof {
            content_id,
            signature,
            bundle,
            digest,
        })
    }

    /// Mint a token pointing at a stored bundle, paying the configured price.
    pub fn mint(&self, proof: &StoredProof) -> Result<TokenId, PipelineError> {
        let owner = self.services.signer.address();
        let token = self.services.ledger.mint(
            &owner,
            &proof.content_id,
            &proof.signature,
            self.config.mint_price_wei,
        )?;
        info!(%owner, token, content_id = %proof.content_id, "token minted");
        Ok(token)
    }

    /// Every token held by `owner`, with its bundle fetched and validated.
    ///
    /// Tokens whose bundle cannot be fetched or parsed are skipped.
    pub fn collection(&self, owner: &str) -> Result<Vec<CollectedToken>, PipelineError> {
        let balance = self.services.ledger.balance_of(owner)?;
        let ctx = ValidationContext {
            config: &self.config,
            now: self.services.clock.now(),
        };

        let mut tokens = Vec::new();
        for index in 0..balance {
            let token_id = self.services.ledger.token_of_owner_by_index(owner, index)?;
            let content_id = self.services.ledger.token_uri(token_id)?;

            let bundle = match self.fetch_bundle(&content_id) {
                Ok(bundle) => bundle,
                Err(e) => {
                    warn!(token_id, %content_id, error = %e, "skipping token");
                    continue;
                }
            };

            let validation = self.validator.validate(&bundle, &ctx);
            if !validation.violations.is_empty() {
                warn!(token_id, violations = validation.violations.len(), "bundle failed validation");
            }
            tokens.push(CollectedToken {
                token_id,
                content_id,
                bundle,
                validation,
            });
        }

        debug!(%owner, balance, collected = tokens.len(), "collection loaded");
        Ok(tokens)
    }

    fn fetch_bundle(&self, id: &ContentId) -> Result<ProofBundle, PipelineError> {
        let raw = self.services.store.get(id)?;
        Ok(ProofBundle::from_json(&raw)?)
    }

    /// Re-sign the stored transcript with the current wallet and compare.
    pub fn verify(&self, bundle: &ProofBundle) -> Result<Verification, PipelineError> {
        if bundle.chat_session.is_empty() || bundle.signature.is_empty() {
            return Err(PipelineError::NothingToVerify);
        }
        let payload = bundle.chat_session.signing_payload()?;
        let signature = self.services.signer.sign_message(&payload)?;

        Ok(if signature == bundle.signature {
            Verification::OriginalSigner
        } else {
            Verification::NotOriginalSigner
        })
    }

    /// Public gateway URL for a content id.
    pub fn gateway_url(&self, id: &ContentId) -> String {
        format!("{}{}", self.config.gateway_url, id)
    }

    /// Validate a bundle obtained outside of `collection`.
    pub fn validate(&self, bundle: &ProofBundle) -> ValidationResult {
        let ctx = ValidationContext {
            config: &self.config,
            now: self.services.clock.now(),
        };
        self.validator.validate(bundle, &ctx)
    }
}
