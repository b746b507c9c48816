//! Scrape endpoint.
//!
//! - `/metrics` : Prometheus text format, rebuilt on every request

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;
use crate::snapshot::TEXT_FORMAT;

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.registry().gather().await.render();

    (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response()
}
