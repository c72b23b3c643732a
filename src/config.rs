use crate::services::audio_service::DEFAULT_MAX_UPLOAD_BYTES;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub database_url: String,
    pub public_dir: String,
    pub max_upload_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Audio file hosting service")]
pub struct Args {
    /// Host to bind to (overrides AUDIO_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides AUDIO_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded audio is stored (overrides AUDIO_STORE_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Database URL (overrides AUDIO_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory with the dashboard's static files (overrides AUDIO_STORE_PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<String>,

    /// Largest accepted upload in bytes (overrides AUDIO_STORE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,

    /// Import a legacy audio-metadata.json file into the database and exit
    #[arg(long, value_name = "PATH")]
    pub import_json: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the
    /// optional import path.
    pub fn from_env_and_args() -> Result<(Self, Option<PathBuf>)> {
        let args = Args::parse();
        let cfg = Self::merge(&args)?;
        Ok((cfg, args.import_json))
    }

    /// CLI values win over environment values, which win over defaults.
    fn merge(args: &Args) -> Result<Self> {
        let env_host = env::var("AUDIO_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("AUDIO_STORE_PORT", 3000u16)?;
        let env_uploads = env::var("AUDIO_STORE_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_db = env::var("AUDIO_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/audio.db".into());
        let env_public = env::var("AUDIO_STORE_PUBLIC_DIR").unwrap_or_else(|_| "./public".into());
        let env_max_upload = parse_env("AUDIO_STORE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        Ok(Self {
            host: args.host.clone().unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.clone().unwrap_or(env_uploads),
            database_url: args.database_url.clone().unwrap_or(env_db),
            public_dir: args.public_dir.clone().unwrap_or(env_public),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
