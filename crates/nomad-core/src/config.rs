//! Configuration module
//!
//! Server, database, storage and upload settings, read from the environment
//! (after loading `.env` when present) and validated once at startup.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MIB: u64 = 1024 * 1024;

const WALLET_MAX_FILE_SIZE_MB: u64 = 10;
const POLL_IMAGE_MAX_FILE_SIZE_MB: u64 = 10;
const WALLET_URL_TTL_SECS: u64 = 15 * 60;
const POLL_IMAGE_URL_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const WALLET_PERSONAL_QUOTA_MB: u64 = 100;
const WALLET_GROUP_QUOTA_MB: u64 = 500;
const UPLOAD_CLEANUP_TIMEOUT_SECS: u64 = 5;
const DEFAULT_WALLET_MIME_TYPES: &str =
    "application/pdf,image/jpeg,image/png,image/heic,image/heif";

/// Minimum length of the JWT secret and of the download-token signing key
pub const MIN_SECRET_LEN: usize = 32;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub environment: String,
    pub log_format: Option<String>,
}

/// Upload pipeline limits, allow-lists and URL validity windows
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub wallet_max_file_size: u64,
    pub wallet_allowed_mime_types: Vec<String>,
    pub poll_image_max_file_size: u64,
    pub wallet_url_ttl_secs: u64,
    pub poll_image_url_ttl_secs: u64,
    pub wallet_personal_quota: u64,
    pub wallet_group_quota: u64,
    pub spool_dir: PathBuf,
    pub cleanup_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            wallet_max_file_size: WALLET_MAX_FILE_SIZE_MB * MIB,
            wallet_allowed_mime_types: parse_list(DEFAULT_WALLET_MIME_TYPES),
            poll_image_max_file_size: POLL_IMAGE_MAX_FILE_SIZE_MB * MIB,
            wallet_url_ttl_secs: WALLET_URL_TTL_SECS,
            poll_image_url_ttl_secs: POLL_IMAGE_URL_TTL_SECS,
            wallet_personal_quota: WALLET_PERSONAL_QUOTA_MB * MIB,
            wallet_group_quota: WALLET_GROUP_QUOTA_MB * MIB,
            spool_dir: env::temp_dir(),
            cleanup_timeout_secs: UPLOAD_CLEANUP_TIMEOUT_SECS,
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub database_url: String,
    pub wallet_signing_key: String,
    pub public_base_url: String,
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub upload: UploadConfig,
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        let base = BaseConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env_u64("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret: jwt_secret.clone(),
            environment,
            log_format: env_opt("LOG_FORMAT"),
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()?;

        let upload = UploadConfig {
            wallet_max_file_size: env_u64("WALLET_MAX_FILE_SIZE_MB", WALLET_MAX_FILE_SIZE_MB)
                * MIB,
            wallet_allowed_mime_types: parse_list(
                &env::var("WALLET_ALLOWED_MIME_TYPES")
                    .unwrap_or_else(|_| DEFAULT_WALLET_MIME_TYPES.to_string()),
            ),
            poll_image_max_file_size: env_u64(
                "POLL_IMAGE_MAX_FILE_SIZE_MB",
                POLL_IMAGE_MAX_FILE_SIZE_MB,
            ) * MIB,
            wallet_url_ttl_secs: env_u64("WALLET_URL_TTL_SECS", WALLET_URL_TTL_SECS),
            poll_image_url_ttl_secs: env_u64("POLL_IMAGE_URL_TTL_SECS", POLL_IMAGE_URL_TTL_SECS),
            wallet_personal_quota: env_u64("WALLET_PERSONAL_QUOTA_MB", WALLET_PERSONAL_QUOTA_MB)
                * MIB,
            wallet_group_quota: env_u64("WALLET_GROUP_QUOTA_MB", WALLET_GROUP_QUOTA_MB) * MIB,
            spool_dir: env_opt("UPLOAD_SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            cleanup_timeout_secs: env_u64(
                "UPLOAD_CLEANUP_TIMEOUT_SECS",
                UPLOAD_CLEANUP_TIMEOUT_SECS,
            ),
        };

        Ok(Config {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            wallet_signing_key: env_opt("WALLET_SIGNING_KEY").unwrap_or(jwt_secret),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/wallet".to_string()),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            upload,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {} characters long",
                MIN_SECRET_LEN
            ));
        }

        if self.wallet_signing_key.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "WALLET_SIGNING_KEY must be at least {} bytes long",
                MIN_SECRET_LEN
            ));
        }

        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            return Err(anyhow::anyhow!(
                "S3_BUCKET is required when STORAGE_BACKEND=s3"
            ));
        }

        if self.upload.wallet_max_file_size == 0 || self.upload.poll_image_max_file_size == 0 {
            return Err(anyhow::anyhow!("Upload size limits must be greater than zero"));
        }

        if self.upload.wallet_allowed_mime_types.is_empty() {
            return Err(anyhow::anyhow!(
                "WALLET_ALLOWED_MIME_TYPES must list at least one MIME type"
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.base.jwt_secret
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.base.db_timeout_seconds
    }

    pub fn wallet_signing_key(&self) -> &str {
        &self.wallet_signing_key
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn log_format(&self) -> Option<&str> {
        self.base.log_format.as_deref()
    }

    pub fn upload(&self) -> &UploadConfig {
        &self.upload
    }
}
