pub mod analytics;
pub mod auth;
pub mod error;
pub mod platform;
pub mod publisher;
pub mod scheduler;
pub mod tiktok;
