pub mod api;
pub mod queued;
pub mod summary;
pub mod usage;
