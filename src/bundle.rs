//! Proof Bundle - The Stored Artifact
//!
//! One JSON object per minted token: the signed transcript, the identicon
//! rendered from the signature, the signature itself and a millisecond
//! timestamp. Field names and order follow bundles already in storage.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identicon::{self, IdenticonError, ShortSeedPolicy};
use crate::transcript::ChatSession;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Identicon error: {0}")]
    Identicon(#[from] IdenticonError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBundle {
    pub chat_session: ChatSession,
    /// `data:image/svg+xml;base64,...` identicon of `signature`.
    pub image: String,
    pub signature: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl ProofBundle {
    pub fn assemble(
        session: &ChatSession,
        signature: &str,
        at: DateTime<Utc>,
        policy: ShortSeedPolicy,
    ) -> Result<Self, BundleError> {
        let svg = identicon::generate_with_policy(signature, policy)?;
        Ok(Self {
            chat_session: session.clone(),
            image: identicon::to_data_uri(&svg),
            signature: signature.to_string(),
            timestamp: at.timestamp_millis(),
        })
    }

    pub fn to_json(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, BundleError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>, BundleError> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .ok_or(BundleError::InvalidTimestamp(self.timestamp))
    }

    /// The SVG document embedded in `image`.
    pub fn render_svg(&self) -> Result<String, BundleError> {
        Ok(identicon::decode_data_uri(&self.image)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature() -> String {
        format!("0x{}", "ab".repeat(65))
    }

    fn session() -> ChatSession {
        let mut s = ChatSession::new();
        s.push_user("What is 2+2?");
        s.push_assistant("4");
        s
    }

    #[test]
    fn test_assemble_embeds_identicon() {
        let at = Utc.timestamp_millis_opt(1_684_000_000_123).unwrap();
        let bundle = ProofBundle::assemble(&session(), &signature(), at, ShortSeedPolicy::Reject).unwrap();
        assert_eq!(bundle.timestamp, 1_684_000_000_123);
        assert_eq!(bundle.render_svg().unwrap(), identicon::generate(&signature()).unwrap());
        assert_eq!(bundle.created_at().unwrap(), at);
    }

    #[test]
    fn test_json_field_order() {
        let at = Utc.timestamp_millis_opt(5).unwrap();
        let bundle = ProofBundle::assemble(&session(), &signature(), at, ShortSeedPolicy::Reject).unwrap();
        let json = bundle.to_json().unwrap();
        let chat = json.find("\"chatSession\"").unwrap();
        let image = json.find("\"image\"").unwrap();
        let sig = json.find("\"signature\"").unwrap();
        let ts = json.find("\"timestamp\":5").unwrap();
        assert!(chat < image && image < sig && sig < ts);
        assert_eq!(ProofBundle::from_json(&json).unwrap(), bundle);
    }

    #[test]
    fn test_short_signature_rejected() {
        let err = ProofBundle::assemble(&session(), "0xdead", Utc::now(), ShortSeedPolicy::Reject).unwrap_err();
        assert!(matches!(err, BundleError::Identicon(IdenticonError::InvalidSeedLength { .. })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(ProofBundle::from_json("{\"image\": 1}"), Err(BundleError::Json(_))));
    }
}
