use crate::db::RecordStore;
use crate::session::SessionStore;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Process-wide state. The store is chosen once at startup and shared by
/// both transports.
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }
}
