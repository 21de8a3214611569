//! Proof of Prompt CLI
//!
//! Commands: identicon, bundle, validate, digest
//! Outputs JSON to stdout, logs to stderr
//! Returns 1 on bad input, 2 on validation failure

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use proof_of_prompt::{
    compute_bundle_digest, generate_with_policy, to_data_uri, validation::ValidationContext,
    AppConfig, ChatSession, ProofBundle, ShortSeedPolicy, Validator, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "pop-cli")]
#[command(about = "Proof of Prompt CLI - identicons and proof bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON config file
    #[arg(short, long, default_value = "pop.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the identicon for a seed
    Identicon {
        /// Seed string, usually a wallet signature
        #[arg(short, long)]
        seed: String,

        /// Emit a base64 data URI instead of the SVG
        #[arg(long)]
        data_uri: bool,

        /// Print the bare document instead of JSON
        #[arg(long)]
        raw: bool,

        /// Short seed handling: reject or wrap (defaults to config)
        #[arg(long)]
        policy: Option<ShortSeedPolicy>,
    },

    /// Build a proof bundle from a transcript and its signature
    Bundle {
        /// JSON file holding the chat message array
        #[arg(short, long)]
        transcript: PathBuf,

        /// Wallet signature of the transcript
        #[arg(short, long)]
        signature: String,

        /// Epoch milliseconds (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Validate a stored proof bundle
    Validate {
        #[arg(short, long)]
        bundle: PathBuf,
    },

    /// Canonical SHA-256 digest of a proof bundle
    Digest {
        #[arg(short, long)]
        bundle: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => return fail(ExitCode::FAILURE, e),
    };
    debug!(config = %cli.config.display(), engine = ENGINE_VERSION, "config loaded");

    match cli.command {
        Commands::Identicon { seed, data_uri, raw, policy } => {
            let policy = policy.unwrap_or(config.short_seed_policy);
            let svg = match generate_with_policy(&seed, policy) {
                Ok(svg) => svg,
                Err(e) => return fail(ExitCode::FAILURE, e),
            };
            let document = if data_uri { to_data_uri(&svg) } else { svg };

            if raw {
                println!("{}", document);
                return ExitCode::SUCCESS;
            }
            let key = if data_uri { "data_uri" } else { "svg" };
            let mut output = serde_json::Map::new();
            output.insert("success".into(), json!(true));
            output.insert("policy".into(), json!(policy));
            output.insert(key.into(), json!(document));
            emit(&output)
        }

        Commands::Bundle { transcript, signature, timestamp } => {
            let session: ChatSession = match read_json(&transcript) {
                Ok(s) => s,
                Err(e) => return fail(ExitCode::FAILURE, e),
            };
            let at = match timestamp {
                Some(ms) => match Utc.timestamp_millis_opt(ms).single() {
                    Some(at) => at,
                    None => return fail(ExitCode::FAILURE, format!("Invalid timestamp: {}", ms)),
                },
                None => Utc::now(),
            };

            let bundle = match ProofBundle::assemble(&session, &signature, at, config.short_seed_policy) {
                Ok(b) => b,
                Err(e) => return fail(ExitCode::FAILURE, e),
            };
            match compute_bundle_digest(&bundle) {
                Ok(digest) => emit(&json!({
                    "success": true,
                    "bundle": bundle,
                    "digest": digest,
                })),
                Err(e) => fail(ExitCode::FAILURE, e),
            }
        }

        Commands::Validate { bundle } => {
            let bundle: ProofBundle = match read_json(&bundle) {
                Ok(b) => b,
                Err(e) => return fail(ExitCode::FAILURE, e),
            };
            let ctx = ValidationContext { config: &config, now: Utc::now() };
            let result = Validator::new().validate(&bundle, &ctx);
            let code = emit(&result);
            if result.valid { code } else { ExitCode::from(2) }
        }

        Commands::Digest { bundle } => {
            let bundle: ProofBundle = match read_json(&bundle) {
                Ok(b) => b,
                Err(e) => return fail(ExitCode::FAILURE, e),
            };
            match compute_bundle_digest(&bundle) {
                Ok(digest) => emit(&json!({
                    "success": true,
                    "digest": digest,
                })),
                Err(e) => fail(ExitCode::FAILURE, e),
            }
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => fail(ExitCode::FAILURE, e),
    }
}

fn fail(code: ExitCode, error: impl std::fmt::Display) -> ExitCode {
    let output = json!({
        "success": false,
        "error": error.to_string(),
    });
    println!("{}", output);
    code
}
