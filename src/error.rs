//! Unified application error model and mapping helpers.
//! A single enum is shared by the authorization engine, the query engine and
//! the HTTP boundary, with a helper mapping each kind to a response status.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed request body or query parameter.
    UserInput { code: String, message: String },
    /// Record id not present in the store. Distinct from other store errors.
    NotFound { code: String, message: String },
    /// Credential maps to no configured group granting the required
    /// entitlement.
    Unauthorized { code: String, message: String },
    /// The remote membership check could not complete: network failure or a
    /// status other than 200/401. Fatal to the current authorization attempt.
    Authority { code: String, message: String },
    /// The index set or a required key could not be retrieved.
    Store { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Authority { code, .. }
            | AppError::Store { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::Authority { message, .. }
            | AppError::Store { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::UserInput { code: code.into(), message: msg.into() }
    }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::NotFound { code: code.into(), message: msg.into() }
    }
    pub fn unauthorized<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Unauthorized { code: code.into(), message: msg.into() }
    }
    pub fn authority<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Authority { code: code.into(), message: msg.into() }
    }
    pub fn store<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Store { code: code.into(), message: msg.into() }
    }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Internal { code: code.into(), message: msg.into() }
    }

    /// Map to HTTP status code. Authority transport failures surface to the
    /// caller as an authorization failure; the full detail is logged
    /// server-side where the error is raised.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Unauthorized { .. } => 401,
            AppError::Authority { .. } => 401,
            AppError::Store { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::unauthorized("unauthorized", "no").http_status(), 401);
        assert_eq!(AppError::authority("authority_unreachable", "down").http_status(), 401);
        assert_eq!(AppError::store("store_failure", "io").http_status(), 503);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn display_carries_code_and_message() {
        let e = AppError::not_found("not_found", "key 'abc' not present");
        assert_eq!(e.to_string(), "not_found: key 'abc' not present");
    }
}
