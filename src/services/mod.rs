//! Business logic services

pub mod catalog_sync;
pub mod contacts;
pub mod csv_parser;
pub mod error_classifier;
pub mod ghl;
pub mod import_history;
pub mod importer;
pub mod past_appointments;
pub mod resolution;
