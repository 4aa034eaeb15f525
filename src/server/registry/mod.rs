mod catalog;
mod events;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub use events::process_envelope;

pub fn registry_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/registry/catalog", get(catalog::list_catalog))
        .route("/registry/catalog/{id}", get(catalog::get_entry))
        .route("/registry/catalog/{id}", delete(catalog::delete_entry))
        .route("/registry/events", post(events::receive_events))
        .route("/registry/gc", post(catalog::collect_garbage))
}
