//! Image Summary Event server
//!
//! This library provides the core functionality for the image-summary-server
//! system: quota-gated admission of image submissions, a two-lane priority
//! queue, and a background worker that enriches each image through external
//! captioning, detection and summarization model servers before persisting a
//! uniquely sequenced summary record.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
