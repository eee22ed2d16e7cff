//! Type definitions

pub mod appointment;
pub mod catalog;
pub mod import;
pub mod messages;

pub use appointment::*;
pub use catalog::*;
pub use import::*;
pub use messages::*;
