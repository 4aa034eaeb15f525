//! Registry notification listener.
//!
//! The registry posts an envelope of events after each push, pull and
//! delete. Pushes create or refresh the entry of the `(repository, tag)`
//! pair, pulls bump its counter, deletes drop every entry of the digest.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::auth::RequireUser;
use crate::error::{Error, Result};
use crate::server::AppState;
use crate::server::dto::{Envelope, EventsResponse, RegistryEvent};
use crate::server::response::{ApiError, ApiResponse};
use crate::store::Store;
use crate::types::RegistryEntry;

const ACTION_PUSH: &str = "push";
const ACTION_PULL: &str = "pull";
const ACTION_DELETE: &str = "delete";

const IMAGE_CONFIG_MEDIA_TYPES: [&str; 2] = [
    "application/vnd.docker.container.image.v1+json",
    "application/vnd.oci.image.config.v1+json",
];

enum Outcome {
    Processed,
    Skipped,
}

pub async fn receive_events(
    _user: RequireUser,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> impl IntoResponse {
    // The registry sends its own media type, so the body is decoded by hand.
    let envelope: Envelope = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid notification envelope: {e}")))?;

    let summary = process_envelope(state.store.as_ref(), &envelope)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(summary)))
}

/// Applies every event of `envelope`. All events are attempted; the first
/// failure is returned after the rest have run.
pub fn process_envelope(store: &dyn Store, envelope: &Envelope) -> Result<EventsResponse> {
    let mut summary = EventsResponse::default();
    let mut first_error = None;

    for event in &envelope.events {
        match process_event(store, event) {
            Ok(Outcome::Processed) => summary.processed += 1,
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                tracing::warn!(
                    "Failed to process {} event for {}:{}: {e}",
                    event.action,
                    event.target.repository,
                    event.target.tag
                );
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

fn process_event(store: &dyn Store, event: &RegistryEvent) -> Result<Outcome> {
    match event.action.as_str() {
        // Blob and by-digest events carry no tag and have no catalog entry.
        ACTION_PUSH | ACTION_PULL if event.target.tag.is_empty() => Ok(Outcome::Skipped),
        ACTION_PUSH | ACTION_PULL => upsert_entry(store, event).map(|()| Outcome::Processed),
        ACTION_DELETE => delete_entries(store, event).map(|()| Outcome::Processed),
        _ => Ok(Outcome::Skipped),
    }
}

fn upsert_entry(store: &dyn Store, event: &RegistryEvent) -> Result<()> {
    let target = &event.target;
    let existing = store.get_repository_by_name_tag(&target.repository, &target.tag)?;

    if event.action == ACTION_PULL {
        let Some(entry) = existing else {
            return Ok(());
        };
        return store.update_repository_fields(
            &BTreeMap::from([("id".to_string(), json!(entry.id))]),
            &BTreeMap::from([("pull_counter".to_string(), json!(entry.pull_counter + 1))]),
        );
    }

    if target.digest.is_empty() {
        return Err(Error::Validation(format!(
            "digest not found for {}:{}",
            target.repository, target.tag
        )));
    }

    let config_digest = target
        .references
        .iter()
        .find(|r| IMAGE_CONFIG_MEDIA_TYPES.contains(&r.media_type.as_str()))
        .map(|r| r.digest.clone())
        .unwrap_or_default();
    let timestamp = event.timestamp.unwrap_or_else(Utc::now).timestamp();
    let raw = serde_json::to_string(event)
        .map_err(|e| Error::Validation(format!("failed to encode event: {e}")))?;

    match existing {
        Some(entry) => store.update_repository_fields(
            &BTreeMap::from([("id".to_string(), json!(entry.id))]),
            &BTreeMap::from([
                ("digest".to_string(), json!(target.digest)),
                ("config_digest".to_string(), json!(config_digest)),
                ("size".to_string(), json!(target.size)),
                ("timestamp".to_string(), json!(timestamp)),
                ("raw".to_string(), json!(raw)),
            ]),
        ),
        None => {
            let mut entry = RegistryEntry {
                repository_name: target.repository.clone(),
                tag: target.tag.clone(),
                digest: target.digest.clone(),
                config_digest,
                size: target.size,
                pull_counter: 0,
                timestamp,
                raw,
                ..Default::default()
            };
            store.create_repository(&mut entry)?;
            tracing::info!(
                "Registry entry {}:{} created with id {}",
                entry.repository_name,
                entry.tag,
                entry.id
            );
            Ok(())
        }
    }
}

fn delete_entries(store: &dyn Store, event: &RegistryEvent) -> Result<()> {
    let digest = &event.target.digest;
    if digest.is_empty() {
        return Err(Error::Validation(format!(
            "delete event for {} carries no digest",
            event.target.repository
        )));
    }

    match store.delete_repository_by_digest(digest) {
        Ok(count) => {
            tracing::info!("Deleted {count} registry entries with digest {digest}");
            Ok(())
        }
        Err(Error::NotFound) => Ok(()),
        Err(e) => Err(e),
    }
}
