use std::sync::Arc;

use crate::manager::DriveManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DriveManager>,
}

impl AppState {
    pub fn new(manager: DriveManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}
