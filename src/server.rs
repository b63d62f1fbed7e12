//!
//! imagecat HTTP server
//! --------------------
//! Axum-based HTTP surface for the catalog. Handlers do three things only:
//! gate protected operations through the authorization engine, delegate to
//! the catalog/query modules, and translate `AppError` into structured JSON
//! responses. Engines never see HTTP types and never panic on bad input.
//!
//! Routes:
//! - `GET /images?ImageID=<id>` — fetch one record (anonymous read).
//! - `POST /images[?Score=n]` — create a record; needs "write" when auth is
//!   enabled.
//! - `PATCH /images?ImageID=<id>` — replace only the release notes; needs
//!   "write" when auth is enabled.
//! - `POST /images/query` — regex search; needs "read" only when auth is
//!   enabled and anonymous search is switched off in config.
//! - `GET /healthcheck` — state and version.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info};

use crate::auth::{Authorizer, HttpAuthority, MembershipCheck};
use crate::catalog::{self, ImageQueryResults};
use crate::config::{Settings, VERSION};
use crate::error::{AppError, AppResult};
use crate::query::ImageQuery;
use crate::store::{KeyDbStore, RecordStore};

/// Shared server state injected into all handlers. Everything in here is
/// immutable after startup; concurrent readers need no locking.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn RecordStore>,
    pub authorizer: Arc<Authorizer>,
}

/// Connect the store, wire the engines and serve until the listener dies.
pub async fn run(settings: Arc<Settings>) -> anyhow::Result<()> {
    let store: Arc<dyn RecordStore> =
        Arc::new(KeyDbStore::connect(&settings.store_endpoint).await?);
    let authority: Arc<dyn MembershipCheck> = Arc::new(HttpAuthority::new(&settings));
    let authorizer = Arc::new(Authorizer::new(settings.clone(), authority));
    let state = AppState { settings: settings.clone(), store, authorizer };

    let app = router(state);
    let addr = settings.listen_addr();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Route table, split out so tests can mount the app on an ephemeral
/// listener with their own state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "imagecat ok" }))
        .route("/healthcheck", get(healthcheck))
        .route("/images", get(get_image).post(post_image).patch(patch_image))
        .route("/images/query", post(query_images))
        .with_state(state)
}

fn error_response(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({"status": "error", "code": err.code_str(), "message": err.message()})),
    )
        .into_response()
}

fn pretty_json_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Pull the caller's credential from the configured header and run it
/// through the authorization engine. A disabled Authentication block means
/// every caller passes.
async fn require_entitlement(state: &AppState, headers: &HeaderMap, needs: &str) -> AppResult<()> {
    if !state.settings.authentication.enabled {
        return Ok(());
    }
    let credential = headers
        .get(state.settings.authentication.header_key.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    state.authorizer.authorize(credential, needs).await
}

async fn healthcheck() -> impl IntoResponse {
    Json(json!({"State": "Healthy", "Version": VERSION}))
}

async fn get_image(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(image_id) = params.get("ImageID") else {
        return error_response(&AppError::user(
            "missing_image_id",
            "query parameter 'ImageID' is required",
        ));
    };
    match catalog::fetch_entry(state.store.as_ref(), image_id).await {
        Ok(entry) => match ImageQueryResults::single(entry).render() {
            Ok(body) => pretty_json_response(body),
            Err(e) => error_response(&e),
        },
        Err(e) => {
            error!(image_id = %image_id, error = %e, "image fetch failed");
            error_response(&e)
        }
    }
}

async fn post_image(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = require_entitlement(&state, &headers, "write").await {
        error!(error = %e, "authorization failed for image create");
        return error_response(&e);
    }
    // Score override from the query string; a bad value falls back to zero
    // instead of failing the write.
    let score = match params.get("Score") {
        Some(raw) => raw.parse::<i64>().unwrap_or_else(|e| {
            error!(raw = %raw, error = %e, "could not parse score override, defaulting to zero");
            0
        }),
        None => 0,
    };
    match catalog::create_entry(state.store.as_ref(), &state.settings, &body, score).await {
        Ok(image_id) => {
            (StatusCode::OK, Json(json!({"status": "ok", "image_id": image_id}))).into_response()
        }
        Err(e) => {
            error!(error = %e, "image create failed");
            error_response(&e)
        }
    }
}

async fn patch_image(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = require_entitlement(&state, &headers, "write").await {
        error!(error = %e, "authorization failed for image patch");
        return error_response(&e);
    }
    let Some(image_id) = params.get("ImageID") else {
        return error_response(&AppError::user(
            "missing_image_id",
            "query parameter 'ImageID' is required",
        ));
    };
    match catalog::patch_release_notes(state.store.as_ref(), image_id, &body).await {
        Ok(()) => {
            (StatusCode::OK, Json(json!({"status": "ok", "image_id": image_id}))).into_response()
        }
        Err(e) => {
            error!(image_id = %image_id, error = %e, "image patch failed");
            error_response(&e)
        }
    }
}

async fn query_images(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    // Search is anonymous unless the deployment explicitly turns the
    // entitlement check on.
    if !state.settings.authentication.anonymous_search {
        if let Err(e) = require_entitlement(&state, &headers, "read").await {
            error!(error = %e, "authorization failed for image query");
            return error_response(&e);
        }
    }
    let query = match ImageQuery::parse(&body) {
        Ok(q) => q,
        Err(e) => return error_response(&e),
    };
    match query.execute(state.store.as_ref(), &state.settings.image_index_set).await {
        Ok(results) => match results.render() {
            Ok(rendered) => pretty_json_response(rendered),
            Err(e) => error_response(&e),
        },
        Err(e) => {
            error!(error = %e, "image query failed");
            error_response(&e)
        }
    }
}
