//! CLI argument parsing for the appointment-import-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::services::csv_parser::TextEncoding;

#[derive(Parser)]
#[command(name = "appointment-import-worker", about = "CSV appointment import worker for GHL locations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Import a CSV file of appointments and print the summary as JSON
    Import {
        /// CSV file to import
        file: PathBuf,
        /// Target location (first connected location when omitted)
        #[arg(long)]
        location: Option<String>,
        /// Validate and resolve without calling GHL or saving rows
        #[arg(long)]
        dry_run: bool,
        /// Respect slot availability when booking
        #[arg(long)]
        no_override: bool,
        /// Date format hint: DD/MM/YYYY, MM/DD/YYYY, YYYY-MM-DD or ISO
        #[arg(long)]
        date_format: Option<String>,
        /// File encoding: utf-8 or latin-1
        #[arg(long, value_parser = parse_encoding, default_value = "utf-8")]
        encoding: TextEncoding,
        /// Column mapping as field=Header, repeatable
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,
        /// Abort on the first row with unparseable start/end
        #[arg(long)]
        strict: bool,
    },
    /// Print the header row of a CSV file
    Headers {
        file: PathBuf,
    },
    /// Sync the GHL service catalog of a location
    SyncServices {
        #[arg(long)]
        location: Option<String>,
    },
    /// Print the calendars of a location as JSON, with one calendar in detail
    Calendars {
        #[arg(long)]
        location: Option<String>,
        /// Calendar to load in detail (first calendar when omitted)
        #[arg(long)]
        calendar_id: Option<String>,
    },
    /// Create or replace a service-calendar mapping
    MapService {
        #[arg(long)]
        location: String,
        #[arg(long)]
        service_name: String,
        #[arg(long)]
        service_id: Option<String>,
        #[arg(long)]
        staff_id: Option<String>,
        #[arg(long)]
        calendar_id: Option<String>,
    },
}

fn parse_encoding(value: &str) -> Result<TextEncoding, String> {
    TextEncoding::from_name(value).ok_or_else(|| format!("unsupported encoding '{}'", value))
}

/// Parse `field=Header` into a mapping pair
fn parse_mapping(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((field, header)) if !field.trim().is_empty() && !header.trim().is_empty() => {
            Ok((field.trim().to_string(), header.trim().to_string()))
        }
        _ => Err(format!("expected field=Header, got '{}'", value)),
    }
}
