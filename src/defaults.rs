//! Default values shared by config, services and handlers

pub const DEFAULT_GHL_API_BASE: &str = "https://services.leadconnectorhq.com";
pub const GHL_API_VERSION: &str = "2021-07-28";
/// Service bookings require the older API version
pub const GHL_BOOKING_API_VERSION: &str = "2021-04-15";
pub const GHL_HTTP_TIMEOUT_SECS: u64 = 30;

/// Row timezone when the CSV leaves it blank
pub const DEFAULT_TIMEZONE: &str = "UTC";

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;
