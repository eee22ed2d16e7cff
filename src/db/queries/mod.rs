//! Database queries

pub mod appointment;
pub mod catalog;
pub mod credentials;
