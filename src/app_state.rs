use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{admission::AdmissionController, queue::PriorityQueue};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<PriorityQueue>,
    pub admission: Arc<AdmissionController>,
}

impl AppState {
    pub fn new(db: PgPool, queue: Arc<PriorityQueue>, admission: AdmissionController) -> Self {
        Self {
            db,
            queue,
            admission: Arc::new(admission),
        }
    }
}
