//! Process configuration for the catalog service.
//!
//! Settings are read once at startup from a JSON file and then passed by
//! `Arc` into the server and engines. Nothing in here is mutated after load;
//! runtime reconfiguration means constructing a fresh `Settings` and
//! restarting the server with it.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Crate version, reported by the healthcheck endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_anonymous_search() -> bool {
    true
}

fn default_support_contact() -> String {
    "the catalog operators".to_string()
}

/// A named permission grantable through group membership, e.g. "read" or
/// "write".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entitlement {
    #[serde(rename = "Type")]
    pub kind: String,
}

/// A group known to the remote authority. Membership is decided remotely;
/// the entitlement list here is what membership grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthGroup {
    #[serde(rename = "GroupID")]
    pub group_id: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
}

/// Delegated-authorization settings: where the authority lives, which
/// request headers carry the credential and group id, and the ordered list
/// of groups to consult.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Authentication {
    pub enabled: bool,
    #[serde(rename = "AuthURL")]
    pub auth_url: String,
    pub header_key: String,
    pub header_group: String,
    pub member_check_path: String,
    /// When true, the search endpoint is open to unauthenticated callers.
    /// This is an explicit policy gate, not an accident of deployment.
    #[serde(default = "default_anonymous_search")]
    pub anonymous_search: bool,
    #[serde(default = "default_support_contact")]
    pub support_contact: String,
    #[serde(default)]
    pub groups: Vec<AuthGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// host:port of the KeyDB/Redis instance backing the record store.
    pub store_endpoint: String,
    /// Name of the set holding every known image record key.
    pub image_index_set: String,
    pub listen_host: String,
    pub listen_port: String,
    pub authentication: Authentication,
}

impl Settings {
    /// Read and deserialize settings from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(settings)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// Render the loaded config as one JSON line for startup diagnostics.
    /// The config carries no secrets; credentials only ever arrive per
    /// request and are never persisted here.
    pub fn show(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "error marshalling configuration".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "StoreEndpoint": "localhost:6379",
        "ImageIndexSet": "images_index",
        "ListenHost": "0.0.0.0",
        "ListenPort": "8090",
        "Authentication": {
            "Enabled": true,
            "AuthURL": "https://auth.me.com/v1.0",
            "HeaderKey": "X-Auth-Token",
            "HeaderGroup": "X-Auth-Group",
            "MemberCheckPath": "/validmember",
            "Groups": [
                {
                    "GroupID": "g00919618",
                    "FriendlyName": "image-builders",
                    "Entitlements": [ { "Type": "read" }, { "Type": "write" } ]
                }
            ]
        }
    }"#;

    #[test]
    fn parses_sample_config() {
        let s: Settings = serde_json::from_str(SAMPLE).expect("sample config parses");
        assert_eq!(s.store_endpoint, "localhost:6379");
        assert_eq!(s.listen_addr(), "0.0.0.0:8090");
        assert!(s.authentication.enabled);
        assert_eq!(s.authentication.groups.len(), 1);
        let g = &s.authentication.groups[0];
        assert_eq!(g.group_id, "g00919618");
        assert_eq!(g.entitlements[1].kind, "write");
    }

    #[test]
    fn search_defaults_to_anonymous() {
        let s: Settings = serde_json::from_str(SAMPLE).unwrap();
        assert!(s.authentication.anonymous_search);
        assert_eq!(s.authentication.support_contact, "the catalog operators");
    }

    #[test]
    fn show_round_trips() {
        let s: Settings = serde_json::from_str(SAMPLE).unwrap();
        let rendered = s.show();
        let back: Settings = serde_json::from_str(&rendered).expect("show() output parses");
        assert_eq!(back.image_index_set, "images_index");
    }
}
