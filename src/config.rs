//! Configuration for the traceability backend
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use uuid::Uuid;

/// Theobroma - traceability and certification backend for cacao supply chains
#[derive(Parser, Debug, Clone)]
#[command(name = "theobroma")]
#[command(about = "Cacao traceability and certification backend")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Enable development mode (relaxes required secrets, allows running
    /// without MongoDB using in-memory repositories)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "theobroma")]
    pub mongodb_db: String,

    /// URL of the content-addressable snapshot store
    /// (e.g., "http://localhost:8091")
    /// Canonical batch snapshots and signature-link blobs are stored here
    #[arg(long, env = "SNAPSHOT_STORE_URL")]
    pub snapshot_store_url: Option<String>,

    /// Shared secret for the external auth layer's tokens (required in
    /// production; the core never issues tokens itself)
    #[arg(long, env = "TOKEN_SECRET")]
    pub token_secret: Option<String>,

    /// Request timeout for snapshot store calls, in milliseconds
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value = "30000")]
    pub store_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.token_secret.is_none() {
                return Err("TOKEN_SECRET is required in production mode".to_string());
            }
            if self.snapshot_store_url.is_none() {
                return Err("SNAPSHOT_STORE_URL is required in production mode".to_string());
            }
        }

        if let Some(ref url) = self.snapshot_store_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!(
                    "SNAPSHOT_STORE_URL must be an http(s) URL, got '{}'",
                    url
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_mode_relaxes_secrets() {
        let args = Args::parse_from(["theobroma", "--dev-mode"]);
        assert!(args.dev_mode);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret_and_store() {
        let args = Args::parse_from(["theobroma"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_store_url_scheme_checked() {
        let args = Args::parse_from([
            "theobroma",
            "--dev-mode",
            "--snapshot-store-url",
            "ftp://nope",
        ]);
        assert!(args.validate().is_err());
    }
}
