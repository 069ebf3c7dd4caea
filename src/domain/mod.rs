pub mod accounts;
pub mod analytics;
pub mod posts;
pub mod store;
pub mod uploads;
pub mod users;
