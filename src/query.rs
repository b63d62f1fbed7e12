//!
//! Image query engine
//! ------------------
//! A query names at most one field of the record and a regex to match it
//! against. Execution is a full scan: every key in the index set is fetched,
//! deserialized and tested. The catalog is assumed small enough that O(n)
//! store calls per query is acceptable.
//!
//! A record that fails to fetch or deserialize is logged and skipped; one
//! corrupt entry must never fail the whole scan. Only failing to read the
//! index set itself aborts the query.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::catalog::{BuildEntry, ImageQueryResults};
use crate::error::{AppError, AppResult};
use crate::store::RecordStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageQuerySub {
    #[serde(rename = "StringMatch")]
    pub string_match: String,
}

/// One sub-query per queryable field. Unset fields deserialize to empty and
/// are ignored; exactly one populated field is evaluated per query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageQuery {
    pub version: ImageQuerySub,
    #[serde(rename = "BaseOS")]
    pub base_os: ImageQuerySub,
    pub build_notes: ImageQuerySub,
    pub release_notes: ImageQuerySub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    Version,
    BaseOs,
    ReleaseNotes,
    BuildNotes,
}

impl ImageQuery {
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| AppError::user("malformed_query", format!("could not parse query body: {e}")))
    }

    /// Resolve the single active field selector. Precedence is fixed:
    /// Version, then BaseOS, then ReleaseNotes, then BuildNotes; the first
    /// populated match expression wins regardless of the others.
    fn selector(&self) -> Option<(Selector, &str)> {
        if !self.version.string_match.is_empty() {
            Some((Selector::Version, &self.version.string_match))
        } else if !self.base_os.string_match.is_empty() {
            Some((Selector::BaseOs, &self.base_os.string_match))
        } else if !self.release_notes.string_match.is_empty() {
            Some((Selector::ReleaseNotes, &self.release_notes.string_match))
        } else if !self.build_notes.string_match.is_empty() {
            Some((Selector::BuildNotes, &self.build_notes.string_match))
        } else {
            None
        }
    }

    /// Derive the text the regex runs against. Scalar fields compare
    /// directly; the notes payloads are re-serialized to their canonical
    /// JSON form first.
    fn field_text(entry: &BuildEntry, selector: Selector) -> AppResult<String> {
        match selector {
            Selector::Version => Ok(entry.version.clone()),
            Selector::BaseOs => Ok(entry.base_os.clone()),
            Selector::ReleaseNotes => serde_json::to_string(&entry.release_notes)
                .map_err(|e| AppError::internal("serialize_failure", e.to_string())),
            Selector::BuildNotes => serde_json::to_string(&entry.build_notes)
                .map_err(|e| AppError::internal("serialize_failure", e.to_string())),
        }
    }

    /// Scan the catalog and accumulate every record whose selected field
    /// matches. Result order follows the index set's iteration order and is
    /// not guaranteed stable across store implementations.
    pub async fn execute(
        &self,
        store: &dyn RecordStore,
        index_set: &str,
    ) -> AppResult<ImageQueryResults> {
        let mut out = ImageQueryResults::default();
        let Some((selector, expression)) = self.selector() else {
            info!("no query fields populated, returning empty result set");
            return Ok(out);
        };
        // An unparseable expression fails the whole request up front rather
        // than failing once per scanned record.
        let re = Regex::new(expression).map_err(|e| {
            AppError::user(
                "malformed_query",
                format!("invalid match expression '{expression}': {e}"),
            )
        })?;

        debug!(?selector, expression, "executing query");
        let keys = store.members(index_set).await?;
        debug!(index_set, keys = keys.len(), "fetched index set");

        for key in &keys {
            let raw = match store.get(key).await {
                Ok(v) => v,
                Err(e) => {
                    error!(key = %key, error = %e, "failed to retrieve record during scan, skipping");
                    continue;
                }
            };
            let entry: BuildEntry = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    error!(key = %key, error = %e, "record failed to deserialize, skipping");
                    continue;
                }
            };
            let text = match Self::field_text(&entry, selector) {
                Ok(t) => t,
                Err(e) => {
                    error!(key = %key, error = %e, "could not derive match text, skipping");
                    continue;
                }
            };
            if re.is_match(&text) {
                out.results.push(entry);
            }
        }
        info!(results = out.results.len(), "query scan complete");
        Ok(out)
    }
}
