//! Paste HTTP handlers.

use crate::{error::HttpError, models::paste::*, AppError, AppState, PasteService};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use binpaste_core::constants::DEFAULT_LIST_LIMIT;
use binpaste_core::id::is_valid_paste_id;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;

const READ_CACHE_MAX_AGE_SECS: i64 = 300;
const SEARCH_CACHE_CONTROL: &str = "max-age=60";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Opaque requester fingerprint: first `X-Forwarded-For` entry, else the peer IP.
pub fn requester_fingerprint(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// `Cache-Control` for a single-paste read.
///
/// One-time pastes are never cached; others for at most five minutes and
/// never beyond their expiry.
pub fn read_cache_control(view: &DetailView, now: DateTime<Utc>) -> HeaderValue {
    if view.is_one_time {
        return HeaderValue::from_static("no-store");
    }
    let max_age = match view.date_of_expiry {
        Some(expiry) => READ_CACHE_MAX_AGE_SECS.min((expiry - now).num_seconds().max(0)),
        None => READ_CACHE_MAX_AGE_SECS,
    };
    HeaderValue::from_str(&format!("max-age={}", max_age))
        .unwrap_or_else(|_| HeaderValue::from_static("no-store"))
}

fn requester_of(headers: &HeaderMap, connect: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
    requester_fingerprint(headers, connect.map(|ConnectInfo(addr)| addr))
}

fn checked_id(id: String) -> Result<String, HttpError> {
    if is_valid_paste_id(&id) {
        Ok(id)
    } else {
        Err(AppError::NotFound.into())
    }
}

// Core operations block on storage and retry backoff.
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, HttpError>
where
    T: Send + 'static,
    F: FnOnce(&PasteService) -> Result<T, AppError> + Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|err| HttpError::Internal(format!("Blocking task failed: {}", err)))?
        .map_err(HttpError::from)
}

/// Create a new paste.
///
/// # Returns
/// `201 Created` with the stored paste.
///
/// # Errors
/// Returns an error if validation or persistence fails.
pub async fn create_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<CreatePasteRequest>,
) -> Result<Response, HttpError> {
    let requester = requester_of(&headers, connect);
    let view = run_blocking(&state, move |service| {
        service.create(req, requester.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

/// Newest public pastes.
///
/// # Errors
/// Returns an error if listing fails.
pub async fn list_pastes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListItemView>>, HttpError> {
    run_blocking(&state, |service| service.list(DEFAULT_LIST_LIMIT))
        .await
        .map(Json)
}

/// Full-text search over public pastes.
///
/// # Errors
/// Returns `400` when the term length is out of bounds.
pub async fn search_pastes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, HttpError> {
    let hits = run_blocking(&state, move |service| service.search(&query.term)).await?;
    Ok((
        [(header::CACHE_CONTROL, HeaderValue::from_static(SEARCH_CACHE_CONTROL))],
        Json(hits),
    )
        .into_response())
}

/// Read a paste; one-time pastes come back without their content.
///
/// # Errors
/// Returns `404` for malformed ids and for pastes that are gone.
pub async fn get_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, HttpError> {
    let id = checked_id(id)?;
    let requester = requester_of(&headers, connect);
    let view = run_blocking(&state, move |service| {
        service.find(&id, requester.as_deref())
    })
    .await?;
    let cache_control = read_cache_control(&view, Utc::now());
    Ok(([(header::CACHE_CONTROL, cache_control)], Json(view)).into_response())
}

/// Reveal and burn a one-time paste.
///
/// # Errors
/// Returns `404` once the paste has been burnt, `409` under sustained contention.
pub async fn burn_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, HttpError> {
    let id = checked_id(id)?;
    let requester = requester_of(&headers, connect);
    let view = run_blocking(&state, move |service| {
        service.burn(&id, requester.as_deref())
    })
    .await?;
    Ok((
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(view),
    )
        .into_response())
}

/// Expire a paste on behalf of the requester.
///
/// # Errors
/// Returns `403` when the requester may not erase the paste, `404` when it is gone.
pub async fn delete_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
) -> Result<StatusCode, HttpError> {
    let id = checked_id(id)?;
    let requester = requester_of(&headers, connect);
    run_blocking(&state, move |service| {
        service.request_deletion(&id, requester.as_deref())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
