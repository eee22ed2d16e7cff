//! Appointment Import Worker - imports CSV appointments into GHL locations
//!
//! Serves import requests over NATS, or runs a single operation from the CLI.

mod cli;
mod config;
mod db;
mod defaults;
mod handlers;
mod services;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use config::Config;
use db::PgImportStore;
use services::csv_parser::{detect_headers, DateFormat, InvalidRowPolicy, ParseOptions};
use services::ghl::GhlClient;
use services::importer::{AppointmentImporter, ImportOptions, SystemClock};
use types::UpsertMappingRequest;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stderr and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,appointment_import_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)) // stderr, keeps stdout for CLI output
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(load_config()?).await,
        Command::Migrate => {
            let config = load_config()?;
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await
        }
        Command::Import {
            file,
            location,
            dry_run,
            no_override,
            date_format,
            encoding,
            mappings,
            strict,
        } => {
            let config = load_config()?;
            let csv = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let options = ImportOptions {
                location_id: location,
                dry_run,
                override_availability: !no_override,
                parse: ParseOptions {
                    encoding,
                    date_format: DateFormat::from_hint(date_format.as_deref()),
                    column_mapping: mappings.into_iter().collect(),
                    invalid_rows: if strict { InvalidRowPolicy::Strict } else { InvalidRowPolicy::Skip },
                },
            };

            let store = PgImportStore::new(db::create_pool(&config.database_url).await?);
            let api = GhlClient::new(config.ghl.clone())?;
            let summary = AppointmentImporter::new(&api, &store, &SystemClock)
                .run(&csv, &options)
                .await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Headers { file } => {
            let csv = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            header_lines(&csv).iter().for_each(|line| println!("{}", line));
            Ok(())
        }
        Command::SyncServices { location } => {
            let config = load_config()?;
            let store = PgImportStore::new(db::create_pool(&config.database_url).await?);
            let api = GhlClient::new(config.ghl.clone())?;
            let response = services::catalog_sync::sync_services(&api, &store, location.as_deref()).await?;
            println!("{}", response.message);
            Ok(())
        }
        Command::Calendars { location, calendar_id } => {
            let config = load_config()?;
            let store = PgImportStore::new(db::create_pool(&config.database_url).await?);
            let api = GhlClient::new(config.ghl.clone())?;
            let response = services::catalog_sync::mapping_ids(
                &api,
                &store,
                location.as_deref(),
                calendar_id.as_deref(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::MapService {
            location,
            service_name,
            service_id,
            staff_id,
            calendar_id,
        } => {
            let config = load_config()?;
            let store = PgImportStore::new(db::create_pool(&config.database_url).await?);
            let request = UpsertMappingRequest {
                location_id: location,
                service_name,
                service_id,
                staff_id,
                calendar_id,
            };
            let mapping = services::catalog_sync::save_mapping(&store, request).await?;
            println!("{}", serde_json::to_string_pretty(&mapping)?);
            Ok(())
        }
    }
}

/// Only commands that talk to the database, NATS or GHL need the environment
fn load_config() -> Result<Config> {
    let config = Config::from_env()?;
    info!("Configuration loaded");
    Ok(config)
}

/// `headers` output: one header per line, or "Empty file."
fn header_lines(csv: &[u8]) -> Vec<String> {
    detect_headers(csv).unwrap_or_else(|| vec!["Empty file.".to_string()])
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Appointment Import Worker...");

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    // Connect to NATS (optional user/password auth)
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, pool, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}
