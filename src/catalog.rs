//!
//! Build image catalog
//! -------------------
//! `BuildEntry` is the catalogued artifact: scalar version/OS fields plus two
//! opaque structured notes payloads. Records live in the store serialized as
//! JSON under their generated image id, and every id is also added to the
//! configured index set so the query engine can enumerate the catalog.
//!
//! Wire field names are PascalCase for compatibility with existing clients
//! and stored records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::store::RecordStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BuildEntry {
    #[serde(rename = "ImageID")]
    pub image_id: String,
    pub version: String,
    #[serde(rename = "BaseOS")]
    pub base_os: String,
    /// Opaque structured payload; compared via its serialized form only.
    pub build_notes: Value,
    /// Opaque structured payload; the only field a PATCH may replace.
    pub release_notes: Value,
    /// Server-assigned ordering hint, overridable at create time.
    pub score: i64,
}

/// Response envelope shared by single-record reads and query results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageQueryResults {
    #[serde(rename = "Results")]
    pub results: Vec<BuildEntry>,
}

impl ImageQueryResults {
    pub fn single(entry: BuildEntry) -> Self {
        Self { results: vec![entry] }
    }

    /// Indented JSON rendering for the HTTP response body.
    pub fn render(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::internal("render_failure", format!("could not serialize results: {e}")))
    }
}

/// Generate a fresh 32-hex-char image id.
pub fn new_image_id() -> String {
    let mut bytes = [0u8; 16];
    let _ = getrandom::getrandom(&mut bytes);
    let mut id = String::with_capacity(32);
    use std::fmt::Write as _;
    for b in &bytes {
        let _ = write!(&mut id, "{:02x}", b);
    }
    id
}

/// Parse a create body, assign id and score, persist the record and index it.
/// Returns the generated image id.
pub async fn create_entry(
    store: &dyn RecordStore,
    settings: &Settings,
    body: &[u8],
    score: i64,
) -> AppResult<String> {
    let mut entry: BuildEntry = serde_json::from_slice(body)
        .map_err(|e| AppError::user("malformed_body", format!("could not parse image record: {e}")))?;
    entry.image_id = new_image_id();
    entry.score = score;
    let payload = serde_json::to_string(&entry)
        .map_err(|e| AppError::internal("serialize_failure", format!("could not serialize image record: {e}")))?;
    store.set(&entry.image_id, &payload, None).await?;
    store.add_member(&settings.image_index_set, &entry.image_id).await?;
    debug!(image_id = %entry.image_id, score, "image record created");
    Ok(entry.image_id)
}

/// Fetch and deserialize one record by id. A stored value that no longer
/// deserializes is an internal failure, not the caller's fault.
pub async fn fetch_entry(store: &dyn RecordStore, image_id: &str) -> AppResult<BuildEntry> {
    let raw = store.get(image_id).await?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::internal(
            "malformed_record",
            format!("stored record '{image_id}' failed to deserialize: {e}"),
        )
    })
}

/// Replace only the `ReleaseNotes` field of an existing record. Every other
/// field of the stored record survives, whatever the patch body carries.
pub async fn patch_release_notes(
    store: &dyn RecordStore,
    image_id: &str,
    body: &[u8],
) -> AppResult<()> {
    let patch: BuildEntry = serde_json::from_slice(body)
        .map_err(|e| AppError::user("malformed_body", format!("could not parse patch body: {e}")))?;
    let mut entry = fetch_entry(store, image_id).await?;
    entry.release_notes = patch.release_notes;
    let payload = serde_json::to_string(&entry)
        .map_err(|e| AppError::internal("serialize_failure", format!("could not serialize image record: {e}")))?;
    store.set(image_id, &payload, None).await?;
    debug!(image_id = %image_id, "release notes replaced");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Authentication, Settings};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn test_settings() -> Settings {
        Settings {
            store_endpoint: "localhost:6379".into(),
            image_index_set: "images_index".into(),
            listen_host: "127.0.0.1".into(),
            listen_port: "0".into(),
            authentication: Authentication {
                enabled: false,
                auth_url: "https://auth.me.com/v1.0".into(),
                header_key: "X-Auth-Token".into(),
                header_group: "X-Auth-Group".into(),
                member_check_path: "/validmember".into(),
                anonymous_search: true,
                support_contact: "catalog-support@example.com".into(),
                groups: vec![],
            },
        }
    }

    fn sample_body() -> Vec<u8> {
        json!({
            "Version": "1.2.3",
            "BaseOS": "ubuntu22.04",
            "BuildNotes": { "Builder": "jenkins", "Took": 420 },
            "ReleaseNotes": { "Changes": ["initial release"] }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn image_ids_are_32_hex_chars() {
        let id = new_image_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_image_id());
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let store = MemoryStore::new();
        let settings = test_settings();
        let id = create_entry(&store, &settings, &sample_body(), 7).await.unwrap();

        let entry = fetch_entry(&store, &id).await.unwrap();
        assert_eq!(entry.image_id, id);
        assert_eq!(entry.version, "1.2.3");
        assert_eq!(entry.base_os, "ubuntu22.04");
        assert_eq!(entry.build_notes, json!({ "Builder": "jenkins", "Took": 420 }));
        assert_eq!(entry.release_notes, json!({ "Changes": ["initial release"] }));
        assert_eq!(entry.score, 7);

        // The id landed in the index set.
        let members = store.members(&settings.image_index_set).await.unwrap();
        assert_eq!(members, vec![id]);
    }

    #[tokio::test]
    async fn malformed_create_body_is_a_user_error() {
        let store = MemoryStore::new();
        let settings = test_settings();
        let err = create_entry(&store, &settings, b"{not json", 0).await.unwrap_err();
        assert!(matches!(err, AppError::UserInput { .. }));
    }

    #[tokio::test]
    async fn patch_replaces_only_release_notes() {
        let store = MemoryStore::new();
        let settings = test_settings();
        let id = create_entry(&store, &settings, &sample_body(), 0).await.unwrap();

        // The patch body supplies conflicting values for every field; only
        // ReleaseNotes may stick.
        let patch = json!({
            "Version": "9.9.9",
            "BaseOS": "arch",
            "BuildNotes": { "Builder": "evil" },
            "ReleaseNotes": { "Changes": ["hotfix"] }
        })
        .to_string();
        patch_release_notes(&store, &id, patch.as_bytes()).await.unwrap();

        let entry = fetch_entry(&store, &id).await.unwrap();
        assert_eq!(entry.version, "1.2.3");
        assert_eq!(entry.base_os, "ubuntu22.04");
        assert_eq!(entry.build_notes, json!({ "Builder": "jenkins", "Took": 420 }));
        assert_eq!(entry.release_notes, json!({ "Changes": ["hotfix"] }));
    }

    #[tokio::test]
    async fn patching_a_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = patch_release_notes(&store, "absent", b"{}").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn partial_bodies_deserialize_with_defaults() {
        let entry: BuildEntry = serde_json::from_str(r#"{"ReleaseNotes": {"Changes": []}}"#).unwrap();
        assert_eq!(entry.version, "");
        assert_eq!(entry.build_notes, Value::Null);
        assert_eq!(entry.release_notes, json!({ "Changes": [] }));
    }
}
