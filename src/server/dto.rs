use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a processed notification envelope.
#[derive(Debug, Default, Serialize)]
pub struct EventsResponse {
    pub processed: usize,
    pub skipped: usize,
}

/// Notification envelope posted by the registry.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Envelope {
    #[serde(default)]
    pub events: Vec<RegistryEvent>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub target: EventTarget,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTarget {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Descriptor>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub digest: String,
}
