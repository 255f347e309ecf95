use std::sync::Arc;

use axum::extract::FromRef;
use huddle_collab::Collab;

/// State shared by every handler. The same [Collab] backs the gateway and the REST routes.
#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
}
