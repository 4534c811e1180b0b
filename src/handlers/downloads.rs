use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::Local;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::AppState;
use crate::services::{all_export_filename, export_all_csv, export_host_csv, host_export_filename};

#[derive(Deserialize, Debug)]
pub struct DownloadQuery {
    pub ip: Option<String>,
}

fn csv_attachment(filename: String, body: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, "text/csv".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={}", filename)),
        ],
        body,
    )
        .into_response()
}

pub async fn download_users(State(state): State<AppState>, Query(q): Query<DownloadQuery>) -> Result<Response, AppError> {
    let address = q
        .ip
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| AppError::bad_request("Server IP is required"))?;
    let host = state
        .registry
        .get(address)
        .ok_or_else(|| AppError::NotFound("Server not found".to_string()))?;
    let body = export_host_csv(address, &host)?;
    Ok(csv_attachment(host_export_filename(address, Local::now()), body))
}

pub async fn download_all_users(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = export_all_csv(&state.registry.snapshot())?;
    Ok(csv_attachment(all_export_filename(Local::now()), body))
}
