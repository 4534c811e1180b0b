use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::models::{AppState, HostView};
use crate::templates::IndexTemplate;
use crate::utils::{first_value, parse_urlencoded_body};

use super::helpers::{redirect_with_msg, render_template, FlashQuery};

pub async fn index(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    let hosts: Vec<HostView> = state
        .registry
        .snapshot()
        .iter()
        .map(|(address, rec)| HostView::from_record(address, rec))
        .collect();
    let account_total = hosts.iter().map(|h| h.account_count).sum();
    let globals = flash.globals();
    render_template(IndexTemplate {
        flash_messages: globals.flash_messages,
        has_flash_messages: globals.has_flash_messages,
        version: globals.version,
        hosts,
        account_total,
    })
}

pub async fn add_ip(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let form = parse_urlencoded_body(&body);
    let address = first_value(&form, "ip").ok_or_else(|| AppError::bad_request("Server IP is required"))?;
    let root_username = first_value(&form, "root_username").unwrap_or("");
    let root_password = first_value(&form, "root_password").unwrap_or("");

    let created = state.registry.register(address, root_username, root_password).await?;
    let msg = if created {
        format!("Added server {}", address)
    } else {
        format!("Updated credentials for {}", address)
    };
    Ok(redirect_with_msg("/", &msg).into_response())
}
