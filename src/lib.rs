//! Proof of Prompt Core
//!
//! A chat transcript is signed by a wallet, the signature seeds a
//! deterministic identicon, and the bundle of both is stored and minted.
//!
//! # Guarantees
//! 1. The same seed always renders the same SVG, byte for byte
//! 2. The signed payload is the exact JSON of the transcript
//! 3. External services are only reached through capability traits
//! 4. Fetched bundles are validated before they are shown

pub mod identicon;
pub mod transcript;
pub mod bundle;
pub mod hashing;
pub mod validation;
pub mod capabilities;
pub mod config;
pub mod pipeline;

pub use identicon::{generate, generate_with_policy, to_data_uri, Grid, Rgb, ShortSeedPolicy, IdenticonError};
pub use transcript::{ChatMessage, ChatModel, ChatSession, Role};
pub use bundle::{ProofBundle, BundleError};
pub use hashing::{compute_bundle_digest, canonical_json, sha256_hex};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity, Validator};
pub use capabilities::{CapabilityError, Clock, ContentId, ContentStore, LanguageModelClient, LedgerClient, Signer, SystemClock, TokenId};
pub use config::{AppConfig, FailureMode};
pub use pipeline::{ProofPipeline, PipelineError, Services, StoredProof, CollectedToken, TurnOutcome, Verification};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
