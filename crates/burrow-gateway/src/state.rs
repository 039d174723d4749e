use std::sync::Arc;

use burrow_core::{ShortId, Store};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Store>,
    base_url: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, public_base_url: Option<String>) -> Self {
        Self {
            store,
            base_url: public_base_url.filter(|base| !base.trim().is_empty()),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Builds the public link for `id`, falling back to the request's host
    /// when no base URL is configured.
    pub fn short_url(&self, id: &ShortId, host: Option<&str>) -> String {
        match &self.base_url {
            Some(base) => id.to_url(base),
            None => id.to_url(&format!("http://{}", host.unwrap_or("localhost"))),
        }
    }
}
