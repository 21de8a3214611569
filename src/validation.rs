//! Validation System - Rule/Policy Separation
//!
//! Rules inspect a fetched bundle and produce structured violations.
//! Policy (`FailureMode`) maps violations to a verdict.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::bundle::ProofBundle;
use crate::config::{AppConfig, FailureMode};
use crate::identicon::{self, SAMPLE_WINDOW};

/// Tolerated clock skew for bundle timestamps.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub signature: String,
}

impl ValidationResult {
    pub fn success(bundle: &ProofBundle) -> Self {
        Self {
            valid: true,
            violations: vec![],
            signature: bundle.signature.clone(),
        }
    }

    pub fn failure(bundle: &ProofBundle, violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: false,
            violations,
            signature: bundle.signature.clone(),
        }
    }

    fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }
}

/// Inputs shared by all rules.
pub struct ValidationContext<'a> {
    pub config: &'a AppConfig,
    pub now: DateTime<Utc>,
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, bundle: &ProofBundle, ctx: &ValidationContext<'_>) -> Vec<ValidationViolation>;
}

fn violation(
    rule: &str,
    severity: ViolationSeverity,
    message: impl Into<String>,
    expected: Option<String>,
    actual: Option<String>,
    remediation: &str,
) -> ValidationViolation {
    ValidationViolation {
        rule: rule.to_string(),
        severity,
        message: message.into(),
        expected,
        actual,
        remediation: vec![remediation.to_string()],
    }
}

// --- Concrete Rules ---

pub struct SignatureFormatRule;

impl ValidationRule for SignatureFormatRule {
    fn name(&self) -> &'static str { "signature_format" }

    fn validate(&self, bundle: &ProofBundle, _ctx: &ValidationContext<'_>) -> Vec<ValidationViolation> {
        let sig = &bundle.signature;
        let well_formed = sig.len() == SAMPLE_WINDOW
            && sig
                .strip_prefix("0x")
                .map_or(false, |hex| hex.bytes().all(|b| b.is_ascii_hexdigit()));

        if well_formed {
            return vec![];
        }
        vec![violation(
            self.name(),
            ViolationSeverity::Error,
            "Signature is not a 0x-prefixed 65-byte hex string",
            Some(format!("{} characters", SAMPLE_WINDOW)),
            Some(format!("{} characters", sig.chars().count())),
            "Re-sign the transcript with the wallet",
        )]
    }
}

pub struct ImageMatchesSignatureRule;

impl ValidationRule for ImageMatchesSignatureRule {
    fn name(&self) -> &'static str { "image_matches_signature" }

    fn validate(&self, bundle: &ProofBundle, ctx: &ValidationContext<'_>) -> Vec<ValidationViolation> {
        let expected = match identicon::generate_with_policy(&bundle.signature, ctx.config.short_seed_policy) {
            Ok(svg) => svg,
            Err(e) => {
                return vec![violation(
                    self.name(),
                    ViolationSeverity::Error,
                    "Signature cannot seed an identicon",
                    None,
                    Some(e.to_string()),
                    "Check the stored signature",
                )]
            }
        };

        match bundle.render_svg() {
            Ok(actual) if actual == expected => vec![],
            Ok(_) => vec![violation(
                self.name(),
                ViolationSeverity::Error,
                "Image was not generated from this signature",
                None,
                None,
                "Regenerate the identicon from the signature",
            )],
            Err(e) => vec![violation(
                self.name(),
                ViolationSeverity::Error,
                "Image is not an SVG data URI",
                Some(identicon::DATA_URI_PREFIX.to_string()),
                Some(e.to_string()),
                "Regenerate the identicon from the signature",
            )],
        }
    }
}

pub struct TranscriptRule;

impl ValidationRule for TranscriptRule {
    fn name(&self) -> &'static str { "transcript" }

    fn validate(&self, bundle: &ProofBundle, _ctx: &ValidationContext<'_>) -> Vec<ValidationViolation> {
        if bundle.chat_session.has_user_turn() {
            return vec![];
        }
        vec![violation(
            self.name(),
            ViolationSeverity::Warning,
            "Transcript has no user prompt",
            Some("at least one user message".to_string()),
            Some(format!("{} messages", bundle.chat_session.len())),
            "Only sign sessions that contain a prompt",
        )]
    }
}

pub struct TimestampRule;

impl ValidationRule for TimestampRule {
    fn name(&self) -> &'static str { "timestamp" }

    fn validate(&self, bundle: &ProofBundle, ctx: &ValidationContext<'_>) -> Vec<ValidationViolation> {
        let latest = ctx.now + Duration::seconds(MAX_CLOCK_SKEW_SECS);
        if bundle.timestamp > 0 && bundle.timestamp <= latest.timestamp_millis() {
            return vec![];
        }
        vec![violation(
            self.name(),
            ViolationSeverity::Warning,
            "Timestamp is not in the past",
            Some(format!("<= {}", latest.timestamp_millis())),
            Some(bundle.timestamp.to_string()),
            "Check the clock of the signing client",
        )]
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule + Send + Sync>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(SignatureFormatRule),
                Box::new(ImageMatchesSignatureRule),
                Box::new(TranscriptRule),
                Box::new(TimestampRule),
            ],
        }
    }

    pub fn validate(&self, bundle: &ProofBundle, ctx: &ValidationContext<'_>) -> ValidationResult {
        let all_violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(bundle, ctx))
            .collect();

        let has_errors = all_violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        match ctx.config.failure_mode {
            FailureMode::Block if has_errors => {
                ValidationResult::failure(bundle, all_violations)
            }
            FailureMode::Block => {
                // Warnings don't block
                ValidationResult::success(bundle)
            }
            FailureMode::Warn | FailureMode::Log => {
                // Never block, just record
                ValidationResult::failure(bundle, all_violations).with_valid(true)
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
