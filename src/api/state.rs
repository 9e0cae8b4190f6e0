//! Shared state handed to every intake handler.

use crate::orchestration::NotificationEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<NotificationEngine>,
}

impl AppState {
    pub fn new(engine: Arc<NotificationEngine>) -> Self {
        Self { engine }
    }
}
