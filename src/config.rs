use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub s3: S3Config,
    /// Base URL clients use to fetch stored objects, e.g. `http://localhost:9200`.
    pub public_endpoint: String,
    pub presign_expiry_secs: u64,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    /// Header carrying the user id resolved by the upstream identity gateway.
    pub auth_header: String,
}

/// Connection settings for the S3-compatible object store.
#[derive(Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    pub timeout_secs: u64,
}

// Keeps the secret key out of the startup log line.
impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("bucket", &self.bucket)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Media storage gateway and generation history API")]
pub struct Args {
    /// Host to bind to (overrides AI_IMAGE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides AI_IMAGE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides AI_IMAGE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// S3-compatible endpoint (overrides AI_IMAGE_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Bucket receiving generated images (overrides AI_IMAGE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Public base URL for stored objects (overrides AI_IMAGE_PUBLIC_ENDPOINT)
    #[arg(long)]
    pub public_endpoint: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env_or("AI_IMAGE_HOST", "0.0.0.0");
        let env_port = env_parse("AI_IMAGE_PORT", 3000u16)?;
        let env_db = env_or("AI_IMAGE_DATABASE_URL", "sqlite://./data/ai_image.db");
        let env_endpoint = env_or("AI_IMAGE_S3_ENDPOINT", "http://localhost:9000");
        let env_bucket = env_or("AI_IMAGE_BUCKET", "ai-images");
        let env_public = env_or("AI_IMAGE_PUBLIC_ENDPOINT", "http://localhost:9200");

        let s3 = S3Config {
            endpoint: args.s3_endpoint.unwrap_or(env_endpoint),
            region: env_or("AI_IMAGE_S3_REGION", "us-east-1"),
            access_key: env::var("AI_IMAGE_S3_ACCESS_KEY").ok(),
            secret_key: env::var("AI_IMAGE_S3_SECRET_KEY").ok(),
            bucket: args.bucket.unwrap_or(env_bucket),
            timeout_secs: env_parse("AI_IMAGE_STORE_TIMEOUT_SECS", 30)?,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            s3,
            public_endpoint: args.public_endpoint.unwrap_or(env_public),
            presign_expiry_secs: env_parse("AI_IMAGE_PRESIGN_EXPIRY_SECS", 60 * 60)?,
            db_acquire_timeout_secs: env_parse("AI_IMAGE_DB_ACQUIRE_TIMEOUT_SECS", 5)?,
            request_timeout_secs: env_parse("AI_IMAGE_REQUEST_TIMEOUT_SECS", 60)?,
            max_upload_bytes: env_parse("AI_IMAGE_MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            auth_header: env_or("AI_IMAGE_AUTH_HEADER", "x-user-id"),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.into())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
