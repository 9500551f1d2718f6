pub mod admin;
pub mod health;
pub mod metrics;
pub mod summaries;
pub mod upload;
