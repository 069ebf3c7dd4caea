//! Service-wide limits and defaults.

/// Maximum accepted upload body size (500 MB).
pub const MAX_VIDEO_UPLOAD_SIZE: usize = 500 * 1024 * 1024;

/// Default page size for post listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Hard cap on requested page size.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default seconds between scheduler sweeps.
pub const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 60;
