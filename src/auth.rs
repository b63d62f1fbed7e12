//!
//! Delegated authorization
//! -----------------------
//! Nothing in this process knows who belongs to which group. A caller hands
//! us an opaque credential; per configured group we ask the remote authority
//! "is this credential a member of group X?" and cross-reference the group's
//! configured entitlement list against the entitlement the operation needs.
//!
//! The authority call is a single HTTP GET with the credential and group id
//! carried as request headers. 200 means member, 401 means not a member, and
//! anything else is a transport failure that aborts the whole authorization
//! attempt. No retries at this layer; timeouts belong to the HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::{AppError, AppResult};

/// Marker appended to redacted credentials in log output.
pub const REDACTED_SUFFIX: &str = "...[REDACTED]...";

/// Log-safe rendering of a sensitive credential: the first 5 characters (or
/// fewer) plus a fixed withheld marker. Lossy on purpose; never compare the
/// result for equality anywhere in the authorization path.
pub fn redact(credential: &str) -> String {
    let prefix: String = credential.chars().take(5).collect();
    format!("{prefix}{REDACTED_SUFFIX}")
}

/// Seam for the remote membership check so the engine can be exercised
/// against a test double.
#[async_trait]
pub trait MembershipCheck: Send + Sync {
    /// Does `credential` belong to `group_id`?
    ///
    /// `Ok(false)` is a normal outcome (the authority answered 401); an `Err`
    /// means the check itself could not complete and the caller must treat
    /// the current authorization attempt as failed.
    async fn check_membership(&self, credential: &str, group_id: &str) -> AppResult<bool>;
}

/// reqwest-backed membership client talking to the configured authority.
pub struct HttpAuthority {
    client: reqwest::Client,
    url: String,
    header_key: String,
    header_group: String,
}

impl HttpAuthority {
    pub fn new(settings: &Settings) -> Self {
        let auth = &settings.authentication;
        Self {
            client: reqwest::Client::new(),
            url: format!("{}{}", auth.auth_url, auth.member_check_path),
            header_key: auth.header_key.clone(),
            header_group: auth.header_group.clone(),
        }
    }
}

#[async_trait]
impl MembershipCheck for HttpAuthority {
    async fn check_membership(&self, credential: &str, group_id: &str) -> AppResult<bool> {
        debug!(url = %self.url, credential = %redact(credential), group = %group_id, "built membership check request");
        let resp = self
            .client
            .get(&self.url)
            .header(self.header_key.as_str(), credential)
            .header(self.header_group.as_str(), group_id)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.url, group = %group_id, error = %e, "membership check transport failure");
                AppError::authority(
                    "authority_unreachable",
                    format!("membership check against '{}' failed: {e}", self.url),
                )
            })?;
        info!(status = %resp.status(), group = %group_id, "authority response received");
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            other => Err(AppError::authority(
                "authority_status",
                format!("unexpected status {other} from '{}'", self.url),
            )),
        }
    }
}

/// The authorization engine. Holds only immutable configuration and the
/// authority client; safe to share across in-flight requests.
pub struct Authorizer {
    settings: Arc<Settings>,
    authority: Arc<dyn MembershipCheck>,
}

impl Authorizer {
    pub fn new(settings: Arc<Settings>, authority: Arc<dyn MembershipCheck>) -> Self {
        Self { settings, authority }
    }

    /// Decide whether `credential` holds the `needs` entitlement via any
    /// configured group.
    ///
    /// Groups are consulted in configured order and the loop returns on the
    /// first group that both reports membership and grants the entitlement,
    /// so no further authority calls are issued once satisfied. Membership
    /// without the right entitlement keeps scanning later groups. A transport
    /// error from any check aborts immediately.
    pub async fn authorize(&self, credential: &str, needs: &str) -> AppResult<()> {
        let auth = &self.settings.authentication;
        debug!(credential = %redact(credential), needs, "starting authorization");
        for group in &auth.groups {
            debug!(group = %group.group_id, "checking group membership");
            let member = self
                .authority
                .check_membership(credential, &group.group_id)
                .await?;
            if !member {
                continue;
            }
            for entitlement in &group.entitlements {
                debug!(group = %group.group_id, entitlement = %entitlement.kind, "comparing entitlements");
                if entitlement.kind == needs {
                    info!(group = %group.group_id, needs, "entitlement satisfied");
                    return Ok(());
                }
            }
        }
        Err(AppError::unauthorized("unauthorized", self.remediation_message()))
    }

    /// User-facing denial message. Names the authority URL and the support
    /// contact; never the credential.
    fn remediation_message(&self) -> String {
        let auth = &self.settings.authentication;
        format!(
            "Unauthorized. Make sure you have generated a token at '{}' and that the \
             token's owner is a member of an authorized group. For help contact {}.",
            auth.auth_url, auth.support_contact
        )
    }
}
