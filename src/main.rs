//! Video Upload Service
//!
//! Uploads videos to S3-compatible storage and serves presigned download links.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use video_upload_service::config::{Config, LoggingConfig};
use video_upload_service::db::PgVideoStore;
use video_upload_service::logging::{self, Severity};
use video_upload_service::storage::{ObjectStore, S3ObjectStore};
use video_upload_service::{fatal, log, AppState, Server};

/// Video upload service backed by object storage and PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "video-upload-service")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file; the environment is used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error, fatal)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::from_env().context("loading configuration from the environment")?,
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.to_lowercase();
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            // Still report through the structured logger.
            let _ = logging::init(&LoggingConfig::default());
            let detail = format!("{:#}", e);
            fatal!("Failed to load configuration", error = %detail)
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    log!(
        Severity::Info,
        "Starting video upload service",
        version = video_upload_service::VERSION
    );

    let storage = &config.storage;
    let objects = match S3ObjectStore::new(storage).await {
        Ok(objects) => objects,
        Err(e) => fatal!(
            "Failed to create object store client",
            error = %e,
            endpoint = %storage.endpoint
        ),
    };

    match objects.ensure_bucket(&storage.bucket).await {
        Ok(true) => log!(
            Severity::Info,
            "Bucket created successfully",
            bucket = %storage.bucket
        ),
        Ok(false) => {}
        Err(e) => fatal!(
            "Failed to ensure bucket exists",
            error = %e,
            endpoint = %storage.endpoint,
            bucket = %storage.bucket
        ),
    }

    log!(
        Severity::Info,
        "Object store client initialized",
        endpoint = %storage.endpoint,
        bucket = %storage.bucket,
        ssl = storage.use_ssl
    );

    let database = &config.database;
    let videos = match PgVideoStore::connect(database).await {
        Ok(videos) => videos,
        Err(e) => fatal!(
            "Failed to connect to database",
            error = %e,
            host = %database.host,
            db = %database.name
        ),
    };

    log!(
        Severity::Info,
        "Connected to database",
        host = %database.host,
        db = %database.name
    );

    if let Err(e) = videos.ensure_schema().await {
        fatal!("Failed to create videos table", error = %e);
    }
    log!(Severity::Info, "Videos table initialized");

    let state = AppState::new(Arc::new(objects), Arc::new(videos), &config);
    let server = match Server::bind(&config.server.address, Arc::new(state)).await {
        Ok(server) => server,
        Err(e) => fatal!(
            "Failed to bind server",
            error = %e,
            address = %config.server.address
        ),
    };

    log!(
        Severity::Info,
        "Server starting",
        address = %server.local_addr()
    );

    if let Err(e) = server.run().await {
        fatal!("Server shutdown unexpectedly", error = %e);
    }

    log!(Severity::Info, "Server stopped");
}
